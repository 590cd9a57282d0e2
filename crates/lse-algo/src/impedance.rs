//! Real-time series impedance of a transmission line from terminal phasors.
//!
//! With positive-sequence per-unit voltages `Vs`, `Vr` at the From and To
//! ends and currents `Is`, `Ir` measured flowing into the line, the
//! pi-equivalent gives
//! ```text
//! Is + Ir       = (Y/2)·(Vs + Vr)
//! Vr·Is − Vs·Ir = (Vs² − Vr²) / Z
//! ```
//! so with both currents
//! ```text
//! Z = (Vs² − Vr²) / (Vr·Is − Vs·Ir)        Y = 2·(Is + Ir) / (Vs + Vr)
//! ```
//! and with a single current the series drop alone
//! ```text
//! Z = (Vs − Vr) / Is    or    Z = (Vr − Vs) / Ir
//! ```
//! in which case the shunt term keeps its previous value.

use lse_core::{CurrentFlowId, Impedance, NetworkModel, TransmissionLine, TransmissionLineId};
use num_complex::Complex64;
use serde::Serialize;
use tracing::{debug, trace};

/// Denominators smaller than this are treated as singular.
pub const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// What the calculation did for one line in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImpedanceCalculation {
    /// Real-time calculation is switched off for the line
    Disabled,
    /// Terminal voltages or both currents unusable
    InsufficientMeasurements,
    /// Measurements present but the solve was singular; caches untouched
    Degenerate,
    BothEnds,
    FromEnd,
    ToEnd,
}

impl ImpedanceCalculation {
    pub fn succeeded(self) -> bool {
        matches!(
            self,
            ImpedanceCalculation::BothEnds
                | ImpedanceCalculation::FromEnd
                | ImpedanceCalculation::ToEnd
        )
    }
}

/// Per-unit terminal quantities of a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalPhasors {
    pub vs: Complex64,
    pub vr: Complex64,
    pub is: Option<Complex64>,
    pub ir: Option<Complex64>,
}

impl TerminalPhasors {
    /// `None` unless both voltages and at least one current are usable.
    pub fn of(model: &NetworkModel, line: &TransmissionLine) -> Option<Self> {
        let vs = model[line.from_node].voltage.positive_sequence_pu()?;
        let vr = model[line.to_node].voltage.positive_sequence_pu()?;
        let current = |flow: Option<CurrentFlowId>| {
            flow.and_then(|id| model[id].positive_sequence_pu(model.system_base))
        };
        let is = current(line.from_current);
        let ir = current(line.to_current);
        if is.is_none() && ir.is_none() {
            return None;
        }
        Some(Self { vs, vr, is, ir })
    }

    pub fn coverage(&self) -> ImpedanceCalculation {
        match (self.is, self.ir) {
            (Some(_), Some(_)) => ImpedanceCalculation::BothEnds,
            (Some(_), None) => ImpedanceCalculation::FromEnd,
            _ => ImpedanceCalculation::ToEnd,
        }
    }
}

fn checked_div(numerator: Complex64, denominator: Complex64) -> Option<Complex64> {
    if denominator.norm() < DEGENERATE_TOLERANCE {
        return None;
    }
    let q = numerator / denominator;
    (q.re.is_finite() && q.im.is_finite()).then_some(q)
}

/// Solve the line impedance. `None` when a denominator is singular.
pub fn estimate_impedance(terminals: &TerminalPhasors, previous: &Impedance) -> Option<Impedance> {
    let TerminalPhasors { vs, vr, is, ir } = *terminals;
    match (is, ir) {
        (Some(is), Some(ir)) => {
            let z = checked_div(vs * vs - vr * vr, vr * is - vs * ir)?;
            let y = checked_div((is + ir) * 2.0, vs + vr)?;
            Some(Impedance::from_complex(z, y))
        }
        (Some(is), None) => {
            let z = checked_div(vs - vr, is)?;
            Some(Impedance::from_complex(z, previous.shunt_complex()))
        }
        (None, Some(ir)) => {
            let z = checked_div(vr - vs, ir)?;
            Some(Impedance::from_complex(z, previous.shunt_complex()))
        }
        (None, None) => None,
    }
}

pub fn can_perform_real_time_impedance_calculation(
    model: &NetworkModel,
    line: TransmissionLineId,
) -> bool {
    TerminalPhasors::of(model, &model[line]).is_some()
}

/// Run the calculation for one line, updating its real-time caches on success.
pub fn calculate_real_time_impedance(
    model: &mut NetworkModel,
    line_id: TransmissionLineId,
) -> ImpedanceCalculation {
    let line = &model[line_id];
    if !line.real_time_impedance_calculation_enabled {
        return ImpedanceCalculation::Disabled;
    }
    let Some(terminals) = TerminalPhasors::of(model, line) else {
        trace!("{}: insufficient terminal phasors", line.name);
        return ImpedanceCalculation::InsufficientMeasurements;
    };
    let coverage = terminals.coverage();
    let Some(impedance) = estimate_impedance(&terminals, &line.real_time_calculated_impedance)
    else {
        debug!("{}: degenerate impedance solve ({:?})", line.name, coverage);
        return ImpedanceCalculation::Degenerate;
    };

    let line = &mut model[line_id];
    line.previous_real_time_calculated_impedance = line.real_time_calculated_impedance;
    line.real_time_calculated_impedance = impedance;
    trace!("{}: {:?} {}", line.name, coverage, impedance);
    coverage
}

/// Distance between the current and previous calculation exceeds the line's threshold.
pub fn real_time_impedance_has_changed(line: &TransmissionLine) -> bool {
    line.real_time_calculated_impedance
        .distance(&line.previous_real_time_calculated_impedance)
        > line.impedance_change_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use lse_core::model::LineEnd;
    use lse_core::{Kilovolts, MeasurementKey, SeriesBranchKind};

    /// Terminal phasors of a pi-model line with series `z`, total shunt `y`,
    /// driven by the given end voltages.
    fn pi_terminals(z: Complex64, y: Complex64, vs: Complex64, vr: Complex64) -> TerminalPhasors {
        let series = (vs - vr) / z;
        TerminalPhasors {
            vs,
            vr,
            is: Some(series + vs * y / 2.0),
            ir: Some(-series + vr * y / 2.0),
        }
    }

    fn polar(m: f64, deg: f64) -> Complex64 {
        Complex64::from_polar(m, deg.to_radians())
    }

    #[test]
    fn test_both_ends_recovers_pi_model() {
        let z = Complex64::new(0.004, 0.045);
        let y = Complex64::new(0.0, 0.6);
        let t = pi_terminals(z, y, polar(1.03, 0.0), polar(0.99, -6.0));

        let got = estimate_impedance(&t, &Impedance::ZERO).unwrap();
        assert!((got.series_complex() - z).norm() < 1e-10, "got {got}");
        assert!((got.shunt_complex() - y).norm() < 1e-10);
    }

    #[test]
    fn test_single_end_matches_series_drop() {
        let z = Complex64::new(0.002, 0.03);
        let mut t = pi_terminals(z, Complex64::new(0.0, 0.0), polar(1.0, 0.0), polar(0.98, -4.0));
        let previous = Impedance::new(0.0, 0.0, 0.0, 0.25);

        t.ir = None;
        let from = estimate_impedance(&t, &previous).unwrap();
        assert!((from.series_complex() - z).norm() < 1e-10);
        assert!((from.b - 0.25).abs() < 1e-15);

        let ir = -(t.vs - t.vr) / z;
        t.is = None;
        t.ir = Some(ir);
        let to = estimate_impedance(&t, &previous).unwrap();
        assert!((to.series_complex() - z).norm() < 1e-10);
    }

    #[test]
    fn test_degenerate_denominator() {
        let v = polar(1.0, 0.0);
        let t = TerminalPhasors {
            vs: v,
            vr: v,
            is: Some(Complex64::new(0.0, 0.0)),
            ir: None,
        };
        assert_eq!(estimate_impedance(&t, &Impedance::ZERO), None);
    }

    fn metered_line() -> (NetworkModel, TransmissionLineId) {
        let mut model = NetworkModel::new();
        let a = model.add_substation("A");
        let b = model.add_substation("B");
        let na = model.add_substation_node(a, "A1", Kilovolts(345.0));
        let nb = model.add_substation_node(b, "B1", Kilovolts(345.0));
        let line = model.add_transmission_line("A-B", na, nb);
        model.add_series_branch(
            line,
            "seg",
            SeriesBranchKind::LineSegment,
            na,
            nb,
            Impedance::series(0.002, 0.03),
        );
        model.add_line_terminal_current(line, LineEnd::From).unwrap();
        model.link().unwrap();
        (model, line)
    }

    fn write_terminals(model: &mut NetworkModel, line: TransmissionLineId, z: Complex64, angle: f64) {
        let vs = polar(1.0, 0.0);
        let vr = polar(0.98, angle);
        let (from_node, to_node, flow) = {
            let l = &model[line];
            (l.from_node, l.to_node, l.from_current.unwrap())
        };
        model[from_node].voltage.set_positive_sequence_pu(MeasurementKey::new(1), vs);
        model[to_node].voltage.set_positive_sequence_pu(MeasurementKey::new(2), vr);
        let base = model.system_base;
        model[flow].set_positive_sequence_pu(MeasurementKey::new(3), (vs - vr) / z, base);
    }

    #[test]
    fn test_calculation_updates_caches() {
        let (mut model, line) = metered_line();
        assert!(!can_perform_real_time_impedance_calculation(&model, line));
        assert_eq!(
            calculate_real_time_impedance(&mut model, line),
            ImpedanceCalculation::InsufficientMeasurements
        );

        let z1 = Complex64::new(0.002, 0.03);
        write_terminals(&mut model, line, z1, -4.0);
        assert_eq!(
            calculate_real_time_impedance(&mut model, line),
            ImpedanceCalculation::FromEnd
        );
        assert!((model[line].real_time_calculated_impedance.series_complex() - z1).norm() < 1e-9);

        let z2 = Complex64::new(0.002, 0.018);
        write_terminals(&mut model, line, z2, -2.5);
        calculate_real_time_impedance(&mut model, line);
        let l = &model[line];
        assert!((l.previous_real_time_calculated_impedance.series_complex() - z1).norm() < 1e-9);
        assert!((l.real_time_calculated_impedance.series_complex() - z2).norm() < 1e-9);
        assert!(real_time_impedance_has_changed(l));
    }

    #[test]
    fn test_disabled_line_is_untouched() {
        let (mut model, line) = metered_line();
        write_terminals(&mut model, line, Complex64::new(0.002, 0.03), -4.0);
        model[line].real_time_impedance_calculation_enabled = false;
        assert_eq!(
            calculate_real_time_impedance(&mut model, line),
            ImpedanceCalculation::Disabled
        );
        assert!(model[line].real_time_calculated_impedance.is_zero());
    }

    #[test]
    fn test_change_threshold_is_strict() {
        let (mut model, line) = metered_line();
        let l = &mut model[line];
        l.impedance_change_threshold = 0.01;
        l.previous_real_time_calculated_impedance = Impedance::series(0.0, 0.03);
        l.real_time_calculated_impedance = Impedance::series(0.0, 0.035);
        assert!(!real_time_impedance_has_changed(l));
        l.real_time_calculated_impedance = Impedance::series(0.0, 0.045);
        assert!(real_time_impedance_has_changed(l));
    }
}
