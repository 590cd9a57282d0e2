//! Typed indices into the [`NetworkModel`](crate::model::NetworkModel) arena.
//!
//! Each id is the position of its element in the corresponding arena vector,
//! so ids are only meaningful for the model that issued them.

use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }

            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

arena_id!(NodeId, "node");
arena_id!(
    /// Breaker or switch.
    SwitchingDeviceId,
    "device"
);
arena_id!(
    /// Line segment, series compensator or transformer.
    SeriesBranchId,
    "branch"
);
arena_id!(TransmissionLineId, "line");
arena_id!(SubstationId, "substation");
arena_id!(CurrentFlowId, "flow");
arena_id!(CurrentInjectionId, "injection");

/// Key linking a measurement slot to its telemetry source.
///
/// The default key (`0`) means no source has been mapped, and a measurement
/// carrying it is never trusted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MeasurementKey(u64);

impl MeasurementKey {
    pub const UNDEFINED: MeasurementKey = MeasurementKey(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        MeasurementKey(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        *self != Self::UNDEFINED
    }
}
