//! Per-unit branch impedance with its shunt admittance.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Series impedance `R + jX` and total shunt admittance `G + jB`, all per-unit.
///
/// Impedances of branches in series add term by term. The shunt terms are
/// summed alongside so a chain of segments carries its total charging.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Impedance {
    pub r: f64,
    pub x: f64,
    pub g: f64,
    pub b: f64,
}

impl Impedance {
    pub const ZERO: Impedance = Impedance {
        r: 0.0,
        x: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn new(r: f64, x: f64, g: f64, b: f64) -> Self {
        Self { r, x, g, b }
    }

    /// Series-only impedance (no shunt).
    pub fn series(r: f64, x: f64) -> Self {
        Self { r, x, g: 0.0, b: 0.0 }
    }

    pub fn from_complex(series: Complex64, shunt: Complex64) -> Self {
        Self {
            r: series.re,
            x: series.im,
            g: shunt.re,
            b: shunt.im,
        }
    }

    pub fn series_complex(&self) -> Complex64 {
        Complex64::new(self.r, self.x)
    }

    pub fn shunt_complex(&self) -> Complex64 {
        Complex64::new(self.g, self.b)
    }

    /// Magnitude of the difference of the series terms.
    pub fn distance(&self, other: &Impedance) -> f64 {
        (self.series_complex() - other.series_complex()).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.x.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for Impedance {
    type Output = Impedance;
    fn add(self, rhs: Impedance) -> Impedance {
        Impedance {
            r: self.r + rhs.r,
            x: self.x + rhs.x,
            g: self.g + rhs.g,
            b: self.b + rhs.b,
        }
    }
}

impl AddAssign for Impedance {
    fn add_assign(&mut self, rhs: Impedance) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Impedance {
    fn sum<I: Iterator<Item = Impedance>>(iter: I) -> Impedance {
        iter.fold(Impedance::ZERO, Add::add)
    }
}

impl<'a> std::iter::Sum<&'a Impedance> for Impedance {
    fn sum<I: Iterator<Item = &'a Impedance>>(iter: I) -> Impedance {
        iter.copied().sum()
    }
}

impl std::fmt::Display for Impedance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Z = {:.5}{:+.5}j pu, Y = {:.5}{:+.5}j pu",
            self.r, self.x, self.g, self.b
        )
    }
}
