//! Per-cycle network refresh.
//!
//! One call runs the whole inference pipeline over a model:
//!
//! 1. link the model if it has changed since the last link
//! 2. resolve every switching device
//! 3. per line: real-time impedance, change check, compensator inference,
//!    final impedance
//! 4. per substation: candidate buses, observability passes, pruning
//!
//! Observability runs passes 1–3 for every substation before running passes
//! 4–5 for any of them, and every node starts the cycle `Unobserved`, so a
//! flow crossing between substations sees this cycle's direct and
//! equipotential observations regardless of substation order.

use lse_core::config::MAX_ENUMERABLE_COMPENSATORS;
use lse_core::diagnostics::category;
use lse_core::{
    Diagnostics, EstimatorConfig, Impedance, LseResult, NetworkModel, ObservationState,
    ObservedBus, PhaseSelection, SubstationId, SwitchingDeviceId, SwitchingDeviceState,
    TopologyBuilder, TransmissionLineId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compensator::{self, CompensatorInference};
use crate::impedance::{self, ImpedanceCalculation};
use crate::observability::{self, ActiveMeasurements};
use crate::switching::{self, SwitchingSummary};
use crate::topology::ConnectivityBuilder;

/// Cycle-wide flags passed into a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshContext {
    /// Every switching device resolves to `Open`
    pub in_pruning_mode: bool,
    pub phase_selection: PhaseSelection,
}

impl RefreshContext {
    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self {
            in_pruning_mode: false,
            phase_selection: config.observability.phase_selection,
        }
    }

    pub fn pruning(mut self, in_pruning_mode: bool) -> Self {
        self.in_pruning_mode = in_pruning_mode;
        self
    }
}

/// Per-line result of a refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRefresh {
    pub line: TransmissionLineId,
    pub calculation: ImpedanceCalculation,
    pub impedance_changed: bool,
    pub compensator_inference: Option<CompensatorInference>,
    pub final_impedance: Impedance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstationObservability {
    pub substation: SubstationId,
    pub candidate_buses: usize,
    pub observed_buses: usize,
}

/// Everything the downstream solver needs from one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    /// Fully observed buses of all substations, in substation order
    pub observed_buses: Vec<ObservedBus>,
    pub substations: Vec<SubstationObservability>,
    pub device_states: Vec<(SwitchingDeviceId, SwitchingDeviceState)>,
    pub switching: SwitchingSummary,
    pub lines: Vec<LineRefresh>,
    pub diagnostics: Diagnostics,
}

impl RefreshOutcome {
    /// Substations that had candidate buses but kept none.
    pub fn unobservable_substations(&self) -> Vec<SubstationId> {
        self.substations
            .iter()
            .filter(|s| s.candidate_buses > 0 && s.observed_buses == 0)
            .map(|s| s.substation)
            .collect()
    }
}

/// Runs refresh cycles with a given topology builder.
#[derive(Debug, Clone)]
pub struct NetworkRefresher<B = ConnectivityBuilder> {
    builder: B,
    compensator_limit: usize,
}

impl Default for NetworkRefresher<ConnectivityBuilder> {
    fn default() -> Self {
        Self::new(ConnectivityBuilder)
    }
}

impl NetworkRefresher<ConnectivityBuilder> {
    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(ConnectivityBuilder)
            .with_compensator_limit(config.impedance.max_series_compensators as usize)
    }
}

impl<B: TopologyBuilder> NetworkRefresher<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            compensator_limit: MAX_ENUMERABLE_COMPENSATORS as usize,
        }
    }

    pub fn with_compensator_limit(mut self, limit: usize) -> Self {
        self.compensator_limit = limit.min(MAX_ENUMERABLE_COMPENSATORS as usize);
        self
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn refresh(
        &self,
        model: &mut NetworkModel,
        context: &RefreshContext,
    ) -> LseResult<RefreshOutcome> {
        if !model.is_linked() {
            model.link()?;
        }
        let mut diagnostics = Diagnostics::new();

        let switching = switching::resolve_switching_devices(model, context.in_pruning_mode);
        debug!(
            "switching: {} closed, {} open, {} changed",
            switching.closed, switching.open, switching.changed
        );
        for &id in &switching.disagreements {
            diagnostics.add_warning_for(
                category::SWITCHING,
                "Breaker status disagrees with the voltages across it",
                &format!("device {}", model[id].name),
            );
        }

        let lines = (0..model.lines.len())
            .map(|i| self.refresh_line(model, TransmissionLineId::new(i), &mut diagnostics))
            .collect();

        let (observed_buses, substations) =
            self.refresh_observability(model, context.phase_selection, &mut diagnostics);

        let device_states = model
            .devices
            .iter()
            .map(|d| (d.id, d.actual_state()))
            .collect();

        info!(
            "refresh: {} observed buses, {} devices open, {}",
            observed_buses.len(),
            switching.open,
            diagnostics.summary()
        );
        Ok(RefreshOutcome {
            observed_buses,
            substations,
            device_states,
            switching,
            lines,
            diagnostics,
        })
    }

    fn refresh_line(
        &self,
        model: &mut NetworkModel,
        line_id: TransmissionLineId,
        diagnostics: &mut Diagnostics,
    ) -> LineRefresh {
        let entity = format!("line {}", model[line_id].name);
        let calculation = impedance::calculate_real_time_impedance(model, line_id);

        if calculation == ImpedanceCalculation::Degenerate {
            diagnostics.add_warning_for(
                category::IMPEDANCE,
                "Terminal phasors give a singular impedance solve; previous value kept",
                &entity,
            );
        }

        let impedance_changed =
            calculation.succeeded() && impedance::real_time_impedance_has_changed(&model[line_id]);
        if impedance_changed && !model[line_id].previous_real_time_calculated_impedance.is_zero() {
            let line = &model[line_id];
            info!(
                "{}: apparent impedance moved from {} to {}",
                line.name,
                line.previous_real_time_calculated_impedance,
                line.real_time_calculated_impedance
            );
            diagnostics.add_warning_for(
                category::IMPEDANCE,
                "Real-time impedance changed beyond threshold; suspected state change",
                &entity,
            );
        }

        let path = self.builder.single_flow_path(model, line_id);
        if path.is_none() {
            debug!("{}: no single flow path", entity);
        }

        let mut compensator_inference = None;
        if model[line_id].series_compensator_status_inference_enabled && calculation.succeeded() {
            if let Some(path) = &path {
                match compensator::infer_series_compensator_status(
                    model,
                    line_id,
                    path,
                    self.compensator_limit,
                ) {
                    Ok(inference) => compensator_inference = Some(inference),
                    Err(err) => {
                        if !model[line_id].compensator_limit_reported {
                            warn!("{}", err);
                            diagnostics.add_error_for(
                                category::COMPENSATOR,
                                &err.to_string(),
                                &entity,
                            );
                            model[line_id].compensator_limit_reported = true;
                        }
                    }
                }
            }
        }

        if let Some(path) = &path {
            compensator::set_final_impedance_values(model, line_id, path);
        }

        LineRefresh {
            line: line_id,
            calculation,
            impedance_changed,
            compensator_inference,
            final_impedance: model[line_id].final_impedance,
        }
    }

    fn refresh_observability(
        &self,
        model: &mut NetworkModel,
        selection: PhaseSelection,
        diagnostics: &mut Diagnostics,
    ) -> (Vec<ObservedBus>, Vec<SubstationObservability>) {
        for node in &mut model.nodes {
            node.observation = ObservationState::Unobserved;
        }
        let view: &NetworkModel = model;
        let active = ActiveMeasurements::collect(view, selection);
        let candidates: Vec<Vec<ObservedBus>> = (0..view.substations.len())
            .map(|i| self.builder.candidate_buses(view, SubstationId::new(i)))
            .collect();

        for buses in &candidates {
            observability::mark_direct_observations(model, buses, &active, selection);
            observability::propagate_equipotential(model, buses);
        }

        let mut observed = Vec::new();
        let mut summaries = Vec::with_capacity(candidates.len());
        for (i, buses) in candidates.into_iter().enumerate() {
            let substation = SubstationId::new(i);
            observability::propagate_through_flows(model, &buses, &active);
            let candidate_buses = buses.len();
            let kept = observability::prune_unobserved(model, buses);

            if candidate_buses > 0 && kept.is_empty() {
                let name = &model[substation].name;
                debug!("{}: no observed buses", name);
                diagnostics.add_warning_for(
                    category::OBSERVABILITY,
                    "No bus in the substation is fully observed",
                    &format!("substation {}", name),
                );
            }
            summaries.push(SubstationObservability {
                substation,
                candidate_buses,
                observed_buses: kept.len(),
            });
            observed.extend(kept);
        }
        (observed, summaries)
    }
}

/// Refresh `model` with the reference topology builder.
pub fn refresh(model: &mut NetworkModel, context: &RefreshContext) -> LseResult<RefreshOutcome> {
    NetworkRefresher::default().refresh(model, context)
}
