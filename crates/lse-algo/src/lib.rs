//! # lse-algo: topology and state inference for linear state estimation
//!
//! Runs once per measurement cycle over an [`lse_core::NetworkModel`] and
//! reduces it to the consistent bus/branch picture the estimator solves:
//!
//! | Module | Role |
//! |--------|------|
//! | [`coherency`] | Angle / magnitude / total-vector comparison of two voltages |
//! | [`switching`] | Breaker and switch state by precedence, with cross-device inference |
//! | [`impedance`] | Real-time line impedance from terminal phasors |
//! | [`compensator`] | Series compensator in/out status by combinatorial matching |
//! | [`observability`] | Bus observability passes and all-or-nothing pruning |
//! | [`topology`] | Reference [`lse_core::TopologyBuilder`] built on petgraph |
//! | [`refresh`] | The per-cycle pipeline tying the above together |
//!
//! ## Example
//!
//! ```ignore
//! use lse_algo::{NetworkRefresher, RefreshContext};
//! use lse_core::load_estimator_config;
//!
//! let config = load_estimator_config("estimator.toml")?;
//! model.apply_config(&config);
//!
//! let refresher = NetworkRefresher::from_config(&config);
//! let outcome = refresher.refresh(&mut model, &RefreshContext::from_config(&config))?;
//! for bus in &outcome.observed_buses {
//!     println!("{:?}", bus.nodes);
//! }
//! ```

pub mod coherency;
pub mod compensator;
pub mod impedance;
pub mod observability;
pub mod refresh;
pub mod switching;
pub mod topology;

pub use compensator::{CompensatorError, CompensatorInference};
pub use impedance::ImpedanceCalculation;
pub use refresh::{
    refresh, LineRefresh, NetworkRefresher, RefreshContext, RefreshOutcome,
    SubstationObservability,
};
pub use switching::SwitchingSummary;
pub use topology::ConnectivityBuilder;
