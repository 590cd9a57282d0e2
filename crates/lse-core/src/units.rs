//! Unit newtypes for the quantities the estimator handles.
//!
//! Phasor telemetry arrives in engineering units (kV line-to-neutral, amperes,
//! degrees) while every inference step works in per-unit on the system base.
//! Keeping the two apart at the type level stops a kV magnitude from being
//! compared against a per-unit threshold by accident.
//!
//! All types are `#[repr(transparent)]` over `f64`.
//!
//! ```
//! use lse_core::units::{Amperes, Kilovolts, MegavoltAmperes};
//!
//! let base_kv = Kilovolts(345.0);
//! let v_base = base_kv.phase_base();
//! assert!((v_base.value() - 199.1858).abs() < 1e-3);
//!
//! let i_base = MegavoltAmperes(100.0).current_base(base_kv);
//! assert!((i_base.value() - 167.3479).abs() < 1e-3);
//! assert!((Amperes(334.6958).to_per_unit(i_base).value() - 2.0).abs() < 1e-4);
//! ```

use serde::{Deserialize, Serialize};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

macro_rules! unit_newtype {
    ($type:ident, $unit_name:literal) => {
        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }
    };
}

// =============================================================================
// Dimensionless
// =============================================================================

/// A quantity expressed on its per-unit base.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

unit_newtype!(PerUnit, "pu");

// =============================================================================
// Voltage, current and power bases
// =============================================================================

/// Voltage in kilovolts.
///
/// Nominal (base) voltages are line-to-line; measured phasor magnitudes are
/// line-to-neutral.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

unit_newtype!(Kilovolts, "kV");

impl Kilovolts {
    /// Line-to-neutral base for a line-to-line nominal voltage.
    #[inline]
    pub fn phase_base(self) -> Kilovolts {
        Kilovolts(self.0 / SQRT_3)
    }

    /// Express a line-to-neutral magnitude on the phase base of `base_ll`.
    #[inline]
    pub fn to_per_unit(self, base_ll: Kilovolts) -> PerUnit {
        PerUnit(self.0 / base_ll.phase_base().0)
    }
}

/// Current in amperes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Amperes(pub f64);

unit_newtype!(Amperes, "A");

impl Amperes {
    #[inline]
    pub fn to_per_unit(self, base: Amperes) -> PerUnit {
        PerUnit(self.0 / base.0)
    }
}

/// Apparent power in megavolt-amperes, used as the three-phase system base.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

unit_newtype!(MegavoltAmperes, "MVA");

impl MegavoltAmperes {
    /// Current base `S / (√3 · V_ll)` in amperes.
    #[inline]
    pub fn current_base(self, base_ll: Kilovolts) -> Amperes {
        Amperes(self.0 * 1000.0 / (SQRT_3 * base_ll.0))
    }
}

// =============================================================================
// Angles
// =============================================================================

/// Angle in degrees. Phasor telemetry and switching thresholds use degrees.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

unit_newtype!(Degrees, "°");

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }
}

/// Angle in radians.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);

unit_newtype!(Radians, "rad");

impl Radians {
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }
}
