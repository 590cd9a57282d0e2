//! Switching device state resolution.
//!
//! Every cycle each breaker and switch gets an inferred state from the
//! voltages on its two terminals and an actual state chosen by strict
//! precedence:
//!
//! 1. pruning mode forces `Open`
//! 2. a manual override holds its state
//! 3. a valid breaker status measurement
//! 4. the inferred state, when the device uses it as a proxy (`Unknown` counts as `Closed`)
//! 5. the normal state
//!
//! Pruning mode does not clear a manual override; the override is back in
//! force on the first cycle outside pruning mode.

use lse_core::{
    CoherencyMethod, Degrees, InferredState, NetworkModel, SwitchingDevice,
    SwitchingDeviceId, SwitchingDeviceState, VoltagePhasorGroup,
};
use serde::Serialize;
use tracing::debug;

use crate::coherency;

/// The voltage groups on either side of a switching device.
#[derive(Debug, Clone, Copy)]
pub struct CrossDevicePhasors<'a> {
    pub from: &'a VoltagePhasorGroup,
    pub to: &'a VoltagePhasorGroup,
}

impl<'a> CrossDevicePhasors<'a> {
    pub fn of(model: &'a NetworkModel, device: &SwitchingDevice) -> Self {
        Self {
            from: &model[device.from_node].voltage,
            to: &model[device.to_node].voltage,
        }
    }

    /// Both terminal voltages are of estimator quality.
    pub fn is_valid(&self) -> bool {
        self.from.positive_sequence_pu().is_some() && self.to.positive_sequence_pu().is_some()
    }

    /// The angle across the device exceeds `threshold`. False when either
    /// side is unusable.
    pub fn is_cross_device_angle_threshold_eclipsed(&self, threshold: Degrees) -> bool {
        matches!(
            coherency::groups_coherent(
                self.from,
                self.to,
                CoherencyMethod::AngleDelta,
                threshold.value()
            ),
            Some(false)
        )
    }
}

/// Inferred state from terminal voltages.
pub fn infer_state(phasors: &CrossDevicePhasors<'_>, threshold: Degrees) -> InferredState {
    if !phasors.is_valid() {
        InferredState::Unknown
    } else if phasors.is_cross_device_angle_threshold_eclipsed(threshold) {
        InferredState::Open
    } else {
        InferredState::Closed
    }
}

/// Actual state by precedence, given this cycle's inferred state.
pub fn resolve_actual_state(
    device: &SwitchingDevice,
    inferred: InferredState,
    in_pruning_mode: bool,
) -> SwitchingDeviceState {
    if in_pruning_mode {
        return SwitchingDeviceState::Open;
    }
    if let Some(manual) = device.manual_state() {
        return manual;
    }
    if let Some(measured) = device.measured_state() {
        return measured;
    }
    if device.use_inferred_state_as_actual_proxy {
        return match inferred {
            InferredState::Open => SwitchingDeviceState::Open,
            InferredState::Closed | InferredState::Unknown => SwitchingDeviceState::Closed,
        };
    }
    device.normal_state
}

/// A valid status word and a definite inference that point different ways.
pub fn status_disagrees_with_inference(device: &SwitchingDevice, inferred: InferredState) -> bool {
    let inferred = match inferred {
        InferredState::Open => SwitchingDeviceState::Open,
        InferredState::Closed => SwitchingDeviceState::Closed,
        InferredState::Unknown => return false,
    };
    device.measured_state().is_some_and(|measured| measured != inferred)
}

/// Counts after resolving every device of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwitchingSummary {
    pub open: usize,
    pub closed: usize,
    pub in_manual: usize,
    pub measured: usize,
    pub inferred_unknown: usize,
    /// Devices whose actual state differs from the previous cycle
    pub changed: usize,
    /// Breakers whose status word contradicts their terminal voltages
    pub disagreements: Vec<SwitchingDeviceId>,
}

/// Resolve inferred and actual state for every device in the model.
pub fn resolve_switching_devices(model: &mut NetworkModel, in_pruning_mode: bool) -> SwitchingSummary {
    let view: &NetworkModel = model;
    let resolutions: Vec<(InferredState, SwitchingDeviceState)> = view
        .devices
        .iter()
        .map(|device| {
            let phasors = CrossDevicePhasors::of(view, device);
            let inferred = infer_state(&phasors, device.cross_device_angle_threshold);
            (inferred, resolve_actual_state(device, inferred, in_pruning_mode))
        })
        .collect();

    let mut summary = SwitchingSummary::default();
    for (device, (inferred, actual)) in model.devices.iter_mut().zip(resolutions) {
        if device.actual_state() != actual {
            summary.changed += 1;
            debug!(
                "{} {:?} -> {:?} (inferred {:?})",
                device.name,
                device.actual_state(),
                actual,
                inferred
            );
        }
        device.record_resolution(inferred, actual);

        match actual {
            SwitchingDeviceState::Open => summary.open += 1,
            SwitchingDeviceState::Closed => summary.closed += 1,
        }
        if device.is_in_manual() {
            summary.in_manual += 1;
        }
        if device.measured_state().is_some() {
            summary.measured += 1;
        }
        if inferred == InferredState::Unknown {
            summary.inferred_unknown += 1;
        }
        if status_disagrees_with_inference(device, inferred) {
            debug!("{} status {:?} but inferred {:?}", device.name, device.measured_state(), inferred);
            summary.disagreements.push(device.id);
        }
    }
    summary
}
