//! Phasor measurements and the voltage/current groups that carry them.
//!
//! A group holds one positive-sequence slot and three phase slots. Values are
//! stored in engineering units (kV line-to-neutral for voltages, amperes for
//! currents, degrees for angles) exactly as telemetry delivers them; the
//! inference code asks each group for its positive-sequence value in per-unit.
//!
//! When the positive-sequence slot is not usable but all three phases are, the
//! positive sequence is derived with the symmetrical-component transform
//! `V1 = (Va + a·Vb + a²·Vc) / 3`, `a = 1∠120°`.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::ids::{CurrentFlowId, CurrentInjectionId, MeasurementKey, NodeId};
use crate::units::{Amperes, Degrees, Kilovolts, MegavoltAmperes, PerUnit, Radians};

/// Polar phasor in engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phasor {
    pub magnitude: f64,
    pub angle: Degrees,
}

impl Phasor {
    pub fn new(magnitude: f64, angle: Degrees) -> Self {
        Self { magnitude, angle }
    }

    pub fn from_complex(value: Complex64) -> Self {
        Self {
            magnitude: value.norm(),
            angle: Radians(value.arg()).to_degrees(),
        }
    }

    pub fn to_complex(&self) -> Complex64 {
        Complex64::from_polar(self.magnitude, self.angle.to_radians().value())
    }

    pub fn is_finite(&self) -> bool {
        self.magnitude.is_finite() && self.angle.is_finite()
    }
}

/// Positive-sequence component of a three-phase set.
pub fn positive_sequence_of(a: Phasor, b: Phasor, c: Phasor) -> Phasor {
    let op = Complex64::from_polar(1.0, 120f64.to_radians());
    let v1 = (a.to_complex() + op * b.to_complex() + op * op * c.to_complex()) / 3.0;
    Phasor::from_complex(v1)
}

/// Which phasors make a group count as measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSelection {
    /// A usable positive-sequence value is enough (measured or derived).
    #[default]
    PositiveSequence,
    /// All three phase phasors must be usable.
    ThreePhase,
}

/// One measurement slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhasorMeasurement {
    pub key: MeasurementKey,
    /// Latest value written by ingestion, `None` until the first sample.
    pub value: Option<Phasor>,
    /// Quality flag maintained by ingestion.
    pub include_in_estimator: bool,
}

impl PhasorMeasurement {
    pub fn measured(key: MeasurementKey, value: Phasor) -> Self {
        Self {
            key,
            value: Some(value),
            include_in_estimator: true,
        }
    }

    /// Usable by the estimator: mapped, flagged for inclusion, finite.
    pub fn is_active(&self) -> bool {
        self.include_in_estimator
            && self.key.is_defined()
            && self.value.is_some_and(|v| v.is_finite())
    }

    pub fn active_value(&self) -> Option<Phasor> {
        if self.is_active() {
            self.value
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhasorSet {
    pub positive_sequence: PhasorMeasurement,
    pub phase_a: PhasorMeasurement,
    pub phase_b: PhasorMeasurement,
    pub phase_c: PhasorMeasurement,
}

impl PhasorSet {
    fn phases_active(&self) -> bool {
        self.phase_a.is_active() && self.phase_b.is_active() && self.phase_c.is_active()
    }

    pub fn is_active(&self, selection: PhaseSelection) -> bool {
        match selection {
            PhaseSelection::PositiveSequence => {
                self.positive_sequence.is_active() || self.phases_active()
            }
            PhaseSelection::ThreePhase => self.phases_active(),
        }
    }

    /// Measured positive sequence if usable, else derived from the phases.
    pub fn positive_sequence(&self) -> Option<Phasor> {
        if let Some(v1) = self.positive_sequence.active_value() {
            return Some(v1);
        }
        let a = self.phase_a.active_value()?;
        let b = self.phase_b.active_value()?;
        let c = self.phase_c.active_value()?;
        Some(positive_sequence_of(a, b, c))
    }
}

// ============================================================================
// Voltage
// ============================================================================

fn polar_pu(magnitude: PerUnit, angle: Degrees) -> Complex64 {
    Complex64::from_polar(magnitude.value(), angle.to_radians().value())
}

/// Voltage phasors measured at a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoltagePhasorGroup {
    /// Nominal line-to-line voltage of the node
    pub base_kv: Kilovolts,
    pub phasors: PhasorSet,
}

impl VoltagePhasorGroup {
    pub fn new(base_kv: Kilovolts) -> Self {
        Self {
            base_kv,
            phasors: PhasorSet::default(),
        }
    }

    pub fn is_active(&self, selection: PhaseSelection) -> bool {
        self.phasors.is_active(selection)
    }

    /// Positive-sequence voltage in per-unit, if of estimator quality.
    pub fn positive_sequence_pu(&self) -> Option<Complex64> {
        if !(self.base_kv.is_finite() && self.base_kv.value() > 0.0) {
            return None;
        }
        self.phasors
            .positive_sequence()
            .map(|v| polar_pu(Kilovolts(v.magnitude).to_per_unit(self.base_kv), v.angle))
    }

    /// Write a positive-sequence sample given in per-unit.
    pub fn set_positive_sequence_pu(&mut self, key: MeasurementKey, value_pu: Complex64) {
        let base = self.base_kv.phase_base().value();
        self.phasors.positive_sequence =
            PhasorMeasurement::measured(key, Phasor::from_complex(value_pu * base));
    }
}

// ============================================================================
// Current
// ============================================================================

fn current_to_pu(
    phasors: &PhasorSet,
    base_kv: Kilovolts,
    system_base: MegavoltAmperes,
) -> Option<Complex64> {
    let base = system_base.current_base(base_kv);
    if !(base.is_finite() && base.value() > 0.0) {
        return None;
    }
    phasors
        .positive_sequence()
        .map(|i| polar_pu(Amperes(i.magnitude).to_per_unit(base), i.angle))
}

/// Current measured on a branch, flowing out of `from_node` towards `to_node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentFlowPhasorGroup {
    pub id: CurrentFlowId,
    pub name: String,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub base_kv: Kilovolts,
    pub phasors: PhasorSet,
}

impl CurrentFlowPhasorGroup {
    pub fn is_active(&self, selection: PhaseSelection) -> bool {
        self.phasors.is_active(selection)
    }

    pub fn positive_sequence_pu(&self, system_base: MegavoltAmperes) -> Option<Complex64> {
        current_to_pu(&self.phasors, self.base_kv, system_base)
    }

    pub fn set_positive_sequence_pu(
        &mut self,
        key: MeasurementKey,
        value_pu: Complex64,
        system_base: MegavoltAmperes,
    ) {
        let base = system_base.current_base(self.base_kv).value();
        self.phasors.positive_sequence =
            PhasorMeasurement::measured(key, Phasor::from_complex(value_pu * base));
    }
}

/// Current injected into the network at a single node (generator, load, shunt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentInjectionPhasorGroup {
    pub id: CurrentInjectionId,
    pub name: String,
    pub node: NodeId,
    pub base_kv: Kilovolts,
    pub phasors: PhasorSet,
}

impl CurrentInjectionPhasorGroup {
    pub fn is_active(&self, selection: PhaseSelection) -> bool {
        self.phasors.is_active(selection)
    }

    pub fn positive_sequence_pu(&self, system_base: MegavoltAmperes) -> Option<Complex64> {
        current_to_pu(&self.phasors, self.base_kv, system_base)
    }
}
