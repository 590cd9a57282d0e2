//! Estimator configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```toml
//! [coherency]
//! method = "angle_delta"
//! angle_threshold_deg = 0.5
//!
//! [switching]
//! cross_device_angle_threshold_deg = 2.0
//! use_inferred_state_as_actual_proxy = false
//!
//! [impedance]
//! real_time_calculation_enabled = true
//! series_compensator_inference_enabled = true
//! change_threshold_pu = 0.005
//! max_series_compensators = 20
//!
//! [observability]
//! phase_selection = "positive_sequence"
//!
//! [topology]
//! merge_coherent_nodes = false
//!
//! [base]
//! system_mva = 100.0
//! ```
//!
//! The values are seeded onto the model elements by
//! [`NetworkModel::apply_config`](crate::model::NetworkModel::apply_config);
//! after that each device, line and substation can be tuned individually.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LseError, LseResult};
use crate::phasor::PhaseSelection;

/// Largest number of series compensators whose combinations are enumerated.
pub const MAX_ENUMERABLE_COMPENSATORS: u32 = 20;

/// Metric used to decide whether two voltage phasors are coherent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherencyMethod {
    /// Angle difference in degrees
    #[default]
    AngleDelta,
    /// Difference of per-unit magnitudes
    MagnitudeDelta,
    /// Magnitude of the per-unit complex difference
    TotalVectorDelta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default)]
    pub coherency: CoherencyConfig,
    #[serde(default)]
    pub switching: SwitchingConfig,
    #[serde(default)]
    pub impedance: ImpedanceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub base: BaseConfig,
}

/// Node coherency (used when merging coherent nodes into one bus)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherencyConfig {
    #[serde(default)]
    pub method: CoherencyMethod,
    #[serde(default = "default_angle_threshold")]
    pub angle_threshold_deg: f64,
    #[serde(default = "default_magnitude_threshold")]
    pub magnitude_threshold_pu: f64,
    #[serde(default = "default_total_vector_threshold")]
    pub total_vector_threshold_pu: f64,
}

impl CoherencyConfig {
    /// Threshold belonging to the selected method.
    pub fn threshold(&self) -> f64 {
        match self.method {
            CoherencyMethod::AngleDelta => self.angle_threshold_deg,
            CoherencyMethod::MagnitudeDelta => self.magnitude_threshold_pu,
            CoherencyMethod::TotalVectorDelta => self.total_vector_threshold_pu,
        }
    }
}

impl Default for CoherencyConfig {
    fn default() -> Self {
        Self {
            method: CoherencyMethod::default(),
            angle_threshold_deg: default_angle_threshold(),
            magnitude_threshold_pu: default_magnitude_threshold(),
            total_vector_threshold_pu: default_total_vector_threshold(),
        }
    }
}

fn default_angle_threshold() -> f64 {
    0.5
}

fn default_magnitude_threshold() -> f64 {
    0.01
}

fn default_total_vector_threshold() -> f64 {
    0.01
}

/// Switching-device state inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchingConfig {
    /// Angle across an open device that marks it as inferred open
    #[serde(default = "default_cross_device_threshold")]
    pub cross_device_angle_threshold_deg: f64,
    #[serde(default)]
    pub use_inferred_state_as_actual_proxy: bool,
}

impl Default for SwitchingConfig {
    fn default() -> Self {
        Self {
            cross_device_angle_threshold_deg: default_cross_device_threshold(),
            use_inferred_state_as_actual_proxy: false,
        }
    }
}

fn default_cross_device_threshold() -> f64 {
    2.0
}

/// Real-time line impedance and series compensator inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpedanceConfig {
    #[serde(default = "default_true")]
    pub real_time_calculation_enabled: bool,
    #[serde(default = "default_true")]
    pub series_compensator_inference_enabled: bool,
    #[serde(default = "default_change_threshold")]
    pub change_threshold_pu: f64,
    #[serde(default = "default_max_series_compensators")]
    pub max_series_compensators: u32,
}

impl Default for ImpedanceConfig {
    fn default() -> Self {
        Self {
            real_time_calculation_enabled: true,
            series_compensator_inference_enabled: true,
            change_threshold_pu: default_change_threshold(),
            max_series_compensators: default_max_series_compensators(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_change_threshold() -> f64 {
    0.005
}

fn default_max_series_compensators() -> u32 {
    MAX_ENUMERABLE_COMPENSATORS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub phase_selection: PhaseSelection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Also merge nodes joined by a device whose terminals are coherent
    #[serde(default)]
    pub merge_coherent_nodes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    #[serde(default = "default_system_mva")]
    pub system_mva: f64,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            system_mva: default_system_mva(),
        }
    }
}

fn default_system_mva() -> f64 {
    100.0
}

impl EstimatorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> LseResult<Self> {
        let config: EstimatorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LseResult<()> {
        let non_negative = [
            ("coherency.angle_threshold_deg", self.coherency.angle_threshold_deg),
            ("coherency.magnitude_threshold_pu", self.coherency.magnitude_threshold_pu),
            (
                "coherency.total_vector_threshold_pu",
                self.coherency.total_vector_threshold_pu,
            ),
            (
                "switching.cross_device_angle_threshold_deg",
                self.switching.cross_device_angle_threshold_deg,
            ),
            ("impedance.change_threshold_pu", self.impedance.change_threshold_pu),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(LseError::Config(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        if self.impedance.max_series_compensators > MAX_ENUMERABLE_COMPENSATORS {
            return Err(LseError::Config(format!(
                "impedance.max_series_compensators is {}, at most {} can be enumerated",
                self.impedance.max_series_compensators, MAX_ENUMERABLE_COMPENSATORS
            )));
        }

        if !(self.base.system_mva.is_finite() && self.base.system_mva > 0.0) {
            return Err(LseError::Config(format!(
                "base.system_mva must be positive, got {}",
                self.base.system_mva
            )));
        }
        Ok(())
    }
}

/// Read an estimator configuration file.
pub fn load_estimator_config(path: impl AsRef<Path>) -> Result<EstimatorConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading estimator config {}", path.display()))?;
    let config = EstimatorConfig::from_toml_str(&text)
        .with_context(|| format!("parsing estimator config {}", path.display()))?;
    Ok(config)
}
