//! Network elements stored in the [`NetworkModel`](crate::model::NetworkModel) arena.

use serde::{Deserialize, Serialize};

use crate::config::CoherencyMethod;
use crate::ids::{
    CurrentFlowId, MeasurementKey, NodeId, SeriesBranchId, SubstationId, SwitchingDeviceId,
    TransmissionLineId,
};
use crate::impedance::Impedance;
use crate::phasor::VoltagePhasorGroup;
use crate::units::Degrees;

// ============================================================================
// Nodes
// ============================================================================

/// Observability of a node for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObservationState {
    #[default]
    Unobserved,
    /// Voltage or current injection measured at the node itself
    DirectlyObserved,
    /// Voltage known through an equipotential connection or a measured flow
    IndirectlyObserved,
}

impl ObservationState {
    pub fn is_observed(self) -> bool {
        !matches!(self, ObservationState::Unobserved)
    }
}

/// Element that owns a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeParent {
    Substation(SubstationId),
    TransmissionLine(TransmissionLineId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent: NodeParent,
    pub voltage: VoltagePhasorGroup,
    pub observation: ObservationState,
}

impl Node {
    pub fn substation(&self) -> Option<SubstationId> {
        match self.parent {
            NodeParent::Substation(id) => Some(id),
            NodeParent::TransmissionLine(_) => None,
        }
    }
}

// ============================================================================
// Switching devices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchingDeviceState {
    Open,
    Closed,
}

impl SwitchingDeviceState {
    pub fn toggled(self) -> Self {
        match self {
            SwitchingDeviceState::Open => SwitchingDeviceState::Closed,
            SwitchingDeviceState::Closed => SwitchingDeviceState::Open,
        }
    }
}

/// State deduced from the voltages on either side of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InferredState {
    Open,
    Closed,
    #[default]
    Unknown,
}

/// Discrete breaker status carried in one bit of a 16-bit digital word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub key: MeasurementKey,
    /// Bit of the word that reads 1 when the breaker is closed
    pub bit_position: u8,
    /// Most recent word, `None` until ingestion delivers one
    pub word: Option<u16>,
}

impl BreakerStatus {
    pub fn new(key: MeasurementKey, bit_position: u8) -> Self {
        Self {
            key,
            bit_position,
            word: None,
        }
    }

    pub fn receive(&mut self, word: u16) {
        self.word = Some(word);
    }

    pub fn is_valid(&self) -> bool {
        self.key.is_defined() && self.word.is_some() && self.bit_position < 16
    }

    /// Decoded state, `None` when the status cannot be trusted.
    pub fn state(&self) -> Option<SwitchingDeviceState> {
        if !self.is_valid() {
            return None;
        }
        let word = self.word?;
        if (word >> self.bit_position) & 1 == 1 {
            Some(SwitchingDeviceState::Closed)
        } else {
            Some(SwitchingDeviceState::Open)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchingDeviceKind {
    Breaker { status: Option<BreakerStatus> },
    Switch,
}

/// Breaker or disconnect switch between two nodes of a substation.
///
/// The resolved state is only written through [`record_resolution`] and the
/// manual-override methods. While an override is in place the resolver
/// leaves [`actual_state`] at the manually chosen value.
///
/// [`record_resolution`]: SwitchingDevice::record_resolution
/// [`actual_state`]: SwitchingDevice::actual_state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchingDevice {
    pub id: SwitchingDeviceId,
    pub name: String,
    pub kind: SwitchingDeviceKind,
    pub substation: SubstationId,
    pub from_node: NodeId,
    pub to_node: NodeId,
    /// Closed-state impedance; zero for ideal devices
    pub impedance: Impedance,
    pub normal_state: SwitchingDeviceState,
    pub cross_device_angle_threshold: Degrees,
    pub use_inferred_state_as_actual_proxy: bool,
    actual_state: SwitchingDeviceState,
    inferred_state: InferredState,
    manual_state: Option<SwitchingDeviceState>,
}

impl SwitchingDevice {
    pub fn new(
        id: SwitchingDeviceId,
        name: impl Into<String>,
        kind: SwitchingDeviceKind,
        substation: SubstationId,
        from_node: NodeId,
        to_node: NodeId,
        normal_state: SwitchingDeviceState,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            substation,
            from_node,
            to_node,
            impedance: Impedance::ZERO,
            normal_state,
            cross_device_angle_threshold: Degrees(2.0),
            use_inferred_state_as_actual_proxy: false,
            actual_state: normal_state,
            inferred_state: InferredState::Unknown,
            manual_state: None,
        }
    }

    pub fn is_breaker(&self) -> bool {
        matches!(self.kind, SwitchingDeviceKind::Breaker { .. })
    }

    pub fn status(&self) -> Option<&BreakerStatus> {
        match &self.kind {
            SwitchingDeviceKind::Breaker { status } => status.as_ref(),
            SwitchingDeviceKind::Switch => None,
        }
    }

    pub fn status_mut(&mut self) -> Option<&mut BreakerStatus> {
        match &mut self.kind {
            SwitchingDeviceKind::Breaker { status } => status.as_mut(),
            SwitchingDeviceKind::Switch => None,
        }
    }

    /// State read from a valid status measurement. Switches have none.
    pub fn measured_state(&self) -> Option<SwitchingDeviceState> {
        self.status().and_then(BreakerStatus::state)
    }

    pub fn actual_state(&self) -> SwitchingDeviceState {
        self.actual_state
    }

    pub fn inferred_state(&self) -> InferredState {
        self.inferred_state
    }

    pub fn manual_state(&self) -> Option<SwitchingDeviceState> {
        self.manual_state
    }

    pub fn is_in_manual(&self) -> bool {
        self.manual_state.is_some()
    }

    pub fn manually_switch_to(&mut self, state: SwitchingDeviceState) {
        self.manual_state = Some(state);
        self.actual_state = state;
    }

    pub fn manually_toggle_actual_state(&mut self) {
        self.manually_switch_to(self.actual_state.toggled());
    }

    pub fn remove_from_manual_and_revert_to_default(&mut self) {
        self.manual_state = None;
        self.actual_state = self.normal_state;
    }

    /// Clear the override but keep the current state until the next resolution.
    pub fn remove_from_manual_and_preserve_state_until_updated(&mut self) {
        self.manual_state = None;
    }

    /// Store the outcome of one resolution cycle.
    pub fn record_resolution(&mut self, inferred: InferredState, actual: SwitchingDeviceState) {
        self.inferred_state = inferred;
        self.actual_state = actual;
    }
}

// ============================================================================
// Series branches and lines
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnergizedStatus {
    #[default]
    Energized,
    Bypassed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesBranchKind {
    LineSegment,
    SeriesCompensator { status: EnergizedStatus },
    Transformer,
}

/// Two-terminal series element belonging to a transmission line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesBranch {
    pub id: SeriesBranchId,
    pub name: String,
    pub line: TransmissionLineId,
    pub kind: SeriesBranchKind,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub impedance: Impedance,
}

impl SeriesBranch {
    pub fn is_series_compensator(&self) -> bool {
        matches!(self.kind, SeriesBranchKind::SeriesCompensator { .. })
    }

    pub fn compensator_status(&self) -> Option<EnergizedStatus> {
        match self.kind {
            SeriesBranchKind::SeriesCompensator { status } => Some(status),
            _ => None,
        }
    }

    /// Returns `false` when the branch is not a compensator.
    pub fn set_compensator_status(&mut self, new_status: EnergizedStatus) -> bool {
        match &mut self.kind {
            SeriesBranchKind::SeriesCompensator { status } => {
                *status = new_status;
                true
            }
            _ => false,
        }
    }
}

/// Transmission line between two substations and its per-cycle impedance caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionLine {
    pub id: TransmissionLineId,
    pub name: String,
    pub from_node: NodeId,
    pub to_node: NodeId,
    /// Current measured at the From end, flowing into the line
    pub from_current: Option<CurrentFlowId>,
    /// Current measured at the To end, flowing into the line
    pub to_current: Option<CurrentFlowId>,
    /// Filled by `NetworkModel::link`
    pub branches: Vec<SeriesBranchId>,

    pub real_time_impedance_calculation_enabled: bool,
    pub series_compensator_status_inference_enabled: bool,
    pub impedance_change_threshold: f64,

    pub real_time_calculated_impedance: Impedance,
    pub previous_real_time_calculated_impedance: Impedance,
    pub inferred_total_impedance: Impedance,
    pub final_impedance: Impedance,
    /// Set once the compensator bound has been reported for this line
    pub compensator_limit_reported: bool,
}

impl TransmissionLine {
    pub fn new(
        id: TransmissionLineId,
        name: impl Into<String>,
        from_node: NodeId,
        to_node: NodeId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_node,
            to_node,
            from_current: None,
            to_current: None,
            branches: Vec::new(),
            real_time_impedance_calculation_enabled: true,
            series_compensator_status_inference_enabled: true,
            impedance_change_threshold: 0.005,
            real_time_calculated_impedance: Impedance::ZERO,
            previous_real_time_calculated_impedance: Impedance::ZERO,
            inferred_total_impedance: Impedance::ZERO,
            final_impedance: Impedance::ZERO,
            compensator_limit_reported: false,
        }
    }
}

// ============================================================================
// Substations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Substation {
    pub id: SubstationId,
    pub name: String,
    /// Filled by `NetworkModel::link`
    pub nodes: Vec<NodeId>,
    /// Filled by `NetworkModel::link`
    pub devices: Vec<SwitchingDeviceId>,
    pub coherency_method: CoherencyMethod,
    pub coherency_threshold: f64,
    pub merge_coherent_nodes: bool,
}

impl Substation {
    pub fn new(id: SubstationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            nodes: Vec::new(),
            devices: Vec::new(),
            coherency_method: CoherencyMethod::AngleDelta,
            coherency_threshold: 0.5,
            merge_coherent_nodes: false,
        }
    }
}
