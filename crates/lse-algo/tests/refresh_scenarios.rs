//! End-to-end refresh cycles over small hand-built networks.
//!
//! Each test builds a model, writes the measurements a cycle would receive,
//! runs [`NetworkRefresher::refresh`] and checks the switching states, bus
//! observability and line impedances left behind.

mod common;

use common::{base_case, breaker_chain, compensated_grid, drive_line, measure_voltage, KV};
use lse_algo::{ImpedanceCalculation, NetworkRefresher, RefreshContext};
use lse_core::diagnostics::category;
use lse_core::{
    BreakerStatus, EnergizedStatus, EstimatorConfig, InferredState, Kilovolts, LseError,
    MeasurementKey, NetworkModel, NodeId, ObservationState, ObservedBus, Severity,
    SwitchingDeviceState,
};
use num_complex::Complex64;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn context() -> RefreshContext {
    RefreshContext::default()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ============================================================================
// Switching
// ============================================================================

/// A switch with no telemetry, no override and no proxy falls back to its normal state.
#[test]
fn test_unmeasured_switch_takes_normal_state() {
    init_tracing();
    let mut model = NetworkModel::new();
    let s = model.add_substation("S");
    let a = model.add_substation_node(s, "A", Kilovolts(138.0));
    let b = model.add_substation_node(s, "B", Kilovolts(138.0));
    let ds = model.add_switch(s, "DS-1", a, b, SwitchingDeviceState::Open);

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert_eq!(outcome.device_states, vec![(ds, SwitchingDeviceState::Open)]);
    assert_eq!(model[ds].inferred_state(), InferredState::Unknown);
    assert_eq!(outcome.switching.inferred_unknown, 1);
}

/// A valid status word overrides the normal state.
#[test]
fn test_measured_breaker_status_wins_over_normal_state() {
    let mut model = NetworkModel::new();
    let s = model.add_substation("S");
    let a = model.add_substation_node(s, "A", Kilovolts(138.0));
    let b = model.add_substation_node(s, "B", Kilovolts(138.0));
    let mut status = BreakerStatus::new(MeasurementKey::new(7), 3);
    status.receive(0b1000);
    let cb = model.add_breaker(s, "CB-1", a, b, SwitchingDeviceState::Open, Some(status));

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert_eq!(model[cb].actual_state(), SwitchingDeviceState::Closed);
    assert_eq!(outcome.switching.measured, 1);
    assert_eq!(outcome.switching.changed, 1);
}

/// With the proxy enabled the cross-device angle decides the state, and an
/// unknown inference counts as closed.
#[test]
fn test_inferred_state_proxy() {
    let mut model = NetworkModel::new();
    let s = model.add_substation("S");
    let a = model.add_substation_node(s, "A", Kilovolts(138.0));
    let b = model.add_substation_node(s, "B", Kilovolts(138.0));
    let ds = model.add_switch(s, "DS-1", a, b, SwitchingDeviceState::Open);
    model[ds].use_inferred_state_as_actual_proxy = true;
    let refresher = NetworkRefresher::default();

    refresher.refresh(&mut model, &context()).unwrap();
    assert_eq!(model[ds].actual_state(), SwitchingDeviceState::Closed);

    measure_voltage(&mut model, a, 1, Complex64::new(1.0, 0.0));
    measure_voltage(&mut model, b, 2, Complex64::from_polar(1.0, 5f64.to_radians()));
    refresher.refresh(&mut model, &context()).unwrap();
    assert_eq!(model[ds].inferred_state(), InferredState::Open);
    assert_eq!(model[ds].actual_state(), SwitchingDeviceState::Open);

    measure_voltage(&mut model, b, 2, Complex64::from_polar(1.0, 0.5f64.to_radians()));
    refresher.refresh(&mut model, &context()).unwrap();
    assert_eq!(model[ds].inferred_state(), InferredState::Closed);
    assert_eq!(model[ds].actual_state(), SwitchingDeviceState::Closed);
}

/// A closed status word across a 5° angle keeps the breaker closed and is flagged.
#[test]
fn test_status_disagreeing_with_voltages_is_flagged() {
    let mut model = NetworkModel::new();
    let s = model.add_substation("S");
    let a = model.add_substation_node(s, "A", Kilovolts(138.0));
    let b = model.add_substation_node(s, "B", Kilovolts(138.0));
    let mut status = BreakerStatus::new(MeasurementKey::new(7), 0);
    status.receive(1);
    let cb = model.add_breaker(s, "CB-1", a, b, SwitchingDeviceState::Closed, Some(status));
    measure_voltage(&mut model, a, 1, Complex64::new(1.0, 0.0));
    measure_voltage(&mut model, b, 2, Complex64::from_polar(1.0, 5f64.to_radians()));

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert_eq!(model[cb].actual_state(), SwitchingDeviceState::Closed);
    assert_eq!(outcome.switching.disagreements, vec![cb]);
    let flagged: Vec<_> = outcome
        .diagnostics
        .issues
        .iter()
        .filter(|issue| issue.category == category::SWITCHING)
        .collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].severity, Severity::Warning);
    assert_eq!(flagged[0].entity.as_deref(), Some("device CB-1"));
}

/// Pruning opens every device for the cycle without clearing manual overrides.
#[test]
fn test_pruning_mode_opens_everything_and_keeps_manual_override() {
    let mut grid = compensated_grid();
    grid.model[grid.breaker].manually_switch_to(SwitchingDeviceState::Closed);
    let refresher = NetworkRefresher::default();

    let outcome = refresher
        .refresh(&mut grid.model, &context().pruning(true))
        .unwrap();
    assert!(outcome
        .device_states
        .iter()
        .all(|(_, state)| *state == SwitchingDeviceState::Open));
    assert_eq!(
        grid.model[grid.breaker].manual_state(),
        Some(SwitchingDeviceState::Closed)
    );

    refresher.refresh(&mut grid.model, &context()).unwrap();
    assert_eq!(
        grid.model[grid.breaker].actual_state(),
        SwitchingDeviceState::Closed
    );
}

// ============================================================================
// Observability
// ============================================================================

/// One measured node observes the whole bus it belongs to.
#[test]
fn test_single_measurement_observes_bus() {
    let (mut model, s, nodes) = breaker_chain(3);
    measure_voltage(&mut model, nodes[1], 1, Complex64::new(1.0, 0.0));

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert_eq!(outcome.observed_buses, vec![ObservedBus::new(s, nodes.clone())]);
    assert_eq!(model[nodes[1]].observation, ObservationState::DirectlyObserved);
    assert_eq!(model[nodes[0]].observation, ObservationState::IndirectlyObserved);
    assert_eq!(model[nodes[2]].observation, ObservationState::IndirectlyObserved);
    assert!(outcome.unobservable_substations().is_empty());
}

/// An unmeasured bus is dropped whole and reported.
#[test]
fn test_unmeasured_bus_is_dropped() {
    let (mut model, s, nodes) = breaker_chain(2);

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert!(outcome.observed_buses.is_empty());
    for node in &nodes {
        assert_eq!(model[*node].observation, ObservationState::Unobserved);
    }
    assert_eq!(outcome.unobservable_substations(), vec![s]);
    assert_eq!(
        outcome
            .diagnostics
            .in_category(category::OBSERVABILITY)
            .count(),
        1
    );
}

/// Opening a breaker splits the bus so only the measured half survives.
#[test]
fn test_open_breaker_splits_observability() {
    let (mut model, s, nodes) = breaker_chain(3);
    measure_voltage(&mut model, nodes[0], 1, Complex64::new(1.0, 0.0));
    model.devices[1].manually_switch_to(SwitchingDeviceState::Open);

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert_eq!(
        outcome.observed_buses,
        vec![ObservedBus::new(s, vec![nodes[0], nodes[1]])]
    );
    assert_eq!(outcome.substations[0].candidate_buses, 2);
    assert_eq!(model[nodes[2]].observation, ObservationState::Unobserved);
}

/// A measured flow observes the far substation even when that substation
/// is processed first.
#[test]
fn test_flow_observes_across_substations_regardless_of_order() {
    let mut model = NetworkModel::new();
    let downstream = model.add_substation("DOWN");
    let upstream = model.add_substation("UP");
    let d = model.add_substation_node(downstream, "D1", KV);
    let u = model.add_substation_node(upstream, "U1", KV);
    let flow = model.add_current_flow("U1-D1", u, d, KV);
    measure_voltage(&mut model, u, 1, Complex64::new(1.0, 0.0));
    let base = model.system_base;
    model[flow].set_positive_sequence_pu(MeasurementKey::new(2), Complex64::new(0.4, -0.1), base);

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert_eq!(outcome.observed_buses.len(), 2);
    assert_eq!(model[d].observation, ObservationState::IndirectlyObserved);
    assert_eq!(model[u].observation, ObservationState::DirectlyObserved);
}

/// The line's From-end current carries observability into the far substation.
#[test]
fn test_line_terminal_current_observes_far_end() {
    let mut grid = compensated_grid();
    let near = grid.north_nodes[1];
    measure_voltage(&mut grid.model, near, 11, Complex64::new(1.0, 0.0));
    let flow = grid.model[grid.line].from_current.unwrap();
    let base = grid.model.system_base;
    grid.model[flow].set_positive_sequence_pu(MeasurementKey::new(13), Complex64::new(0.8, 0.0), base);

    let outcome = NetworkRefresher::default()
        .refresh(&mut grid.model, &context())
        .unwrap();

    assert_eq!(outcome.observed_buses.len(), 2);
    for node in grid.south_nodes {
        assert_eq!(
            grid.model[node].observation,
            ObservationState::IndirectlyObserved
        );
    }
    assert_eq!(
        outcome.lines[0].calculation,
        ImpedanceCalculation::InsufficientMeasurements
    );
    assert!(outcome.lines[0].compensator_inference.is_none());
}

// ============================================================================
// Line impedance and compensators
// ============================================================================

/// Measurements matching the uncompensated line bypass every compensator.
#[test]
fn test_base_case_impedance_bypasses_all_compensators() {
    init_tracing();
    let mut grid = compensated_grid();
    drive_line(&mut grid.model, grid.line, base_case().series_complex());

    let outcome = NetworkRefresher::default()
        .refresh(&mut grid.model, &context())
        .unwrap();

    let line = &outcome.lines[0];
    assert_eq!(line.calculation, ImpedanceCalculation::FromEnd);
    let inference = line.compensator_inference.as_ref().unwrap();
    assert_eq!(inference.winning_index, 0);
    assert_eq!(inference.candidate_count, 4);
    assert_eq!(inference.inferred_total_impedance, base_case());
    for cap in grid.caps {
        assert_eq!(
            grid.model[cap].compensator_status(),
            Some(EnergizedStatus::Bypassed)
        );
    }
    assert_eq!(grid.model[grid.line].final_impedance, base_case());
    assert_eq!(outcome.observed_buses.len(), 2);
}

/// One energized compensator is picked out and the final impedance includes it.
#[test]
fn test_single_energized_compensator_is_identified() {
    let mut grid = compensated_grid();
    drive_line(&mut grid.model, grid.line, Complex64::new(0.002, 0.05));

    let outcome = NetworkRefresher::default()
        .refresh(&mut grid.model, &context())
        .unwrap();

    assert_eq!(
        outcome.lines[0].compensator_inference.as_ref().unwrap().winning_index,
        1
    );
    assert_eq!(
        grid.model[grid.caps[0]].compensator_status(),
        Some(EnergizedStatus::Energized)
    );
    assert_eq!(
        grid.model[grid.caps[1]].compensator_status(),
        Some(EnergizedStatus::Bypassed)
    );
    let final_impedance = grid.model[grid.line].final_impedance;
    assert!(close(final_impedance.x, 0.05));
    assert!(close(final_impedance.b, 0.4));
}

/// A large move in apparent impedance is flagged, the first calculation is not.
#[test]
fn test_impedance_change_is_reported() {
    let mut grid = compensated_grid();
    let refresher = NetworkRefresher::default();

    drive_line(&mut grid.model, grid.line, base_case().series_complex());
    let first = refresher.refresh(&mut grid.model, &context()).unwrap();
    assert!(first.lines[0].impedance_changed);
    assert_eq!(first.diagnostics.in_category(category::IMPEDANCE).count(), 0);

    drive_line(&mut grid.model, grid.line, Complex64::new(0.002, 0.035));
    let second = refresher.refresh(&mut grid.model, &context()).unwrap();
    assert!(second.lines[0].impedance_changed);
    assert_eq!(second.diagnostics.in_category(category::IMPEDANCE).count(), 1);
    assert_eq!(
        second.lines[0].compensator_inference.as_ref().unwrap().winning_index,
        3
    );

    let third = refresher.refresh(&mut grid.model, &context()).unwrap();
    assert!(!third.lines[0].impedance_changed);
}

/// A zero terminal current keeps the previous impedance and warns.
#[test]
fn test_degenerate_solve_keeps_previous_impedance() {
    let mut grid = compensated_grid();
    drive_line(&mut grid.model, grid.line, base_case().series_complex());
    let flow = grid.model[grid.line].from_current.unwrap();
    let base = grid.model.system_base;
    grid.model[flow].set_positive_sequence_pu(MeasurementKey::new(13), Complex64::new(0.0, 0.0), base);

    let outcome = NetworkRefresher::default()
        .refresh(&mut grid.model, &context())
        .unwrap();

    assert_eq!(outcome.lines[0].calculation, ImpedanceCalculation::Degenerate);
    assert!(outcome.lines[0].compensator_inference.is_none());
    assert!(grid.model[grid.line].real_time_calculated_impedance.is_zero());
    let warning = outcome
        .diagnostics
        .in_category(category::IMPEDANCE)
        .next()
        .unwrap();
    assert_eq!(warning.severity, Severity::Warning);
}

/// Exceeding the compensator bound is an error reported once per line, and
/// leaves statuses untouched.
#[test]
fn test_compensator_limit_reported_once() {
    let mut grid = compensated_grid();
    drive_line(&mut grid.model, grid.line, base_case().series_complex());
    let refresher = NetworkRefresher::default().with_compensator_limit(1);

    let first = refresher.refresh(&mut grid.model, &context()).unwrap();
    assert_eq!(first.diagnostics.error_count(), 1);
    assert!(first.lines[0].compensator_inference.is_none());
    for cap in grid.caps {
        assert_eq!(
            grid.model[cap].compensator_status(),
            Some(EnergizedStatus::Energized)
        );
    }

    let second = refresher.refresh(&mut grid.model, &context()).unwrap();
    assert_eq!(second.diagnostics.error_count(), 0);
}

/// Settings loaded from TOML reach the line and disable inference.
#[test]
fn test_config_disables_compensator_inference() {
    let config = EstimatorConfig::from_toml_str(
        "[impedance]\nseries_compensator_inference_enabled = false\n",
    )
    .unwrap();
    let mut grid = compensated_grid();
    grid.model.apply_config(&config);
    drive_line(&mut grid.model, grid.line, base_case().series_complex());

    let outcome = NetworkRefresher::from_config(&config)
        .refresh(&mut grid.model, &RefreshContext::from_config(&config))
        .unwrap();

    assert_eq!(outcome.lines[0].calculation, ImpedanceCalculation::FromEnd);
    assert!(outcome.lines[0].compensator_inference.is_none());
    let final_impedance = grid.model[grid.line].final_impedance;
    assert!(close(final_impedance.x, 0.035));
}

/// With the calculation disabled nothing is solved and the caches stay empty.
#[test]
fn test_config_disables_real_time_calculation() {
    let config =
        EstimatorConfig::from_toml_str("[impedance]\nreal_time_calculation_enabled = false\n")
            .unwrap();
    let mut grid = compensated_grid();
    grid.model.apply_config(&config);
    drive_line(&mut grid.model, grid.line, base_case().series_complex());

    let outcome = NetworkRefresher::from_config(&config)
        .refresh(&mut grid.model, &context())
        .unwrap();

    assert_eq!(outcome.lines[0].calculation, ImpedanceCalculation::Disabled);
    assert!(!outcome.lines[0].impedance_changed);
    assert!(grid.model[grid.line].real_time_calculated_impedance.is_zero());
}

// ============================================================================
// Cycle behaviour
// ============================================================================

/// Running the same cycle twice gives the same picture.
#[test]
fn test_refresh_is_idempotent() {
    let mut grid = compensated_grid();
    drive_line(&mut grid.model, grid.line, Complex64::new(0.002, 0.045));
    let refresher = NetworkRefresher::default();

    let first = refresher.refresh(&mut grid.model, &context()).unwrap();
    let statuses: Vec<_> = grid
        .caps
        .iter()
        .map(|&c| grid.model[c].compensator_status())
        .collect();
    let observations: Vec<_> = grid.model.nodes.iter().map(|n| n.observation).collect();

    let second = refresher.refresh(&mut grid.model, &context()).unwrap();
    assert_eq!(first.device_states, second.device_states);
    assert_eq!(first.observed_buses, second.observed_buses);
    assert_eq!(
        first.lines[0].final_impedance,
        second.lines[0].final_impedance
    );
    assert_eq!(second.switching.changed, 0);
    let statuses_again: Vec<_> = grid
        .caps
        .iter()
        .map(|&c| grid.model[c].compensator_status())
        .collect();
    assert_eq!(statuses, statuses_again);
    let observations_again: Vec<_> = grid.model.nodes.iter().map(|n| n.observation).collect();
    assert_eq!(observations, observations_again);
}

/// Elements added after linking are picked up by the next refresh.
#[test]
fn test_refresh_relinks_changed_model() {
    let (mut model, s, nodes) = breaker_chain(2);
    let extra = model.add_substation_node(s, "B-extra", Kilovolts(230.0));
    measure_voltage(&mut model, nodes[0], 1, Complex64::new(1.0, 0.0));

    let outcome = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap();

    assert!(model.is_linked());
    assert_eq!(outcome.substations[0].candidate_buses, 2);
    assert!(model[s].nodes.contains(&extra));
}

/// A device pointing at a missing node fails the refresh with a model error.
#[test]
fn test_dangling_reference_fails_refresh() {
    let mut model = NetworkModel::new();
    let s = model.add_substation("S");
    let a = model.add_substation_node(s, "A", Kilovolts(69.0));
    model.add_switch(s, "DS-X", a, NodeId::new(99), SwitchingDeviceState::Closed);

    let err = NetworkRefresher::default()
        .refresh(&mut model, &context())
        .unwrap_err();
    assert!(matches!(err, LseError::Model(_)));
    assert!(err.to_string().contains("node#99"));
}

/// The outcome serializes for downstream consumers.
#[test]
fn test_outcome_serializes_to_json() {
    let mut grid = compensated_grid();
    drive_line(&mut grid.model, grid.line, base_case().series_complex());

    let outcome = NetworkRefresher::default()
        .refresh(&mut grid.model, &context())
        .unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["observed_buses"].as_array().unwrap().len(), 2);
    assert_eq!(json["lines"][0]["calculation"], "FromEnd");
    assert_eq!(json["switching"]["closed"], 2);
    assert!(json["diagnostics"].is_object() || json["diagnostics"].is_array());
}
