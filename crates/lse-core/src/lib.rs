//! # lse-core: network model for linear state estimation
//!
//! Data structures shared by the topology and state inference algorithms in
//! `lse-algo`:
//!
//! - [`NetworkModel`]: arena of nodes, switching devices, series branches,
//!   transmission lines, substations and current phasor groups, addressed by
//!   typed ids ([`NodeId`], [`SwitchingDeviceId`], ...)
//! - [`phasor`]: voltage/current phasor groups with per-unit conversion and
//!   symmetrical components
//! - [`Impedance`]: per-unit series impedance and shunt admittance
//! - [`EstimatorConfig`]: TOML configuration of thresholds and feature flags
//! - [`Diagnostics`]: issues collected during validation and refresh
//! - [`TopologyBuilder`]: contract for grouping nodes into buses
//!
//! Telemetry is written into the model by ingestion; the algorithms read the
//! measurement flags and write resolved device states, observability and
//! impedance caches back into the same model.

pub mod config;
pub mod diagnostics;
pub mod element;
pub mod error;
pub mod ids;
pub mod impedance;
pub mod model;
pub mod phasor;
pub mod topology;
pub mod units;

pub use config::{load_estimator_config, CoherencyMethod, EstimatorConfig};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use element::{
    BreakerStatus, EnergizedStatus, InferredState, Node, NodeParent, ObservationState,
    SeriesBranch, SeriesBranchKind, Substation, SwitchingDevice, SwitchingDeviceKind,
    SwitchingDeviceState, TransmissionLine,
};
pub use error::{LseError, LseResult};
pub use ids::{
    CurrentFlowId, CurrentInjectionId, MeasurementKey, NodeId, SeriesBranchId, SubstationId,
    SwitchingDeviceId, TransmissionLineId,
};
pub use impedance::Impedance;
pub use model::{LineEnd, LinkError, ModelStats, NetworkModel};
pub use phasor::{PhaseSelection, Phasor, PhasorMeasurement, VoltagePhasorGroup};
pub use topology::{ObservedBus, TopologyBuilder};
pub use units::{Amperes, Degrees, Kilovolts, MegavoltAmperes, PerUnit, Radians};
