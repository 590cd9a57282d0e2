//! Bus grouping and flow paths: the contract between the inference core and
//! whatever builds the per-cycle topology.

use serde::Serialize;

use crate::ids::{NodeId, SeriesBranchId, SubstationId, TransmissionLineId};
use crate::model::NetworkModel;

/// Nodes that are electrically one point for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedBus {
    pub substation: SubstationId,
    pub nodes: Vec<NodeId>,
}

impl ObservedBus {
    pub fn new(substation: SubstationId, nodes: Vec<NodeId>) -> Self {
        Self { substation, nodes }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// True when every member node is observed in `model`.
    pub fn is_fully_observed(&self, model: &NetworkModel) -> bool {
        self.nodes
            .iter()
            .all(|&n| model[n].observation.is_observed())
    }
}

/// Supplies candidate buses and line flow paths from the resolved device states.
///
/// Implementations read [`SwitchingDevice::actual_state`] and must not mutate
/// the model.
///
/// [`SwitchingDevice::actual_state`]: crate::element::SwitchingDevice::actual_state
pub trait TopologyBuilder {
    /// Partition of a substation's nodes into candidate buses.
    fn candidate_buses(&self, model: &NetworkModel, substation: SubstationId) -> Vec<ObservedBus>;

    /// Ordered series branches from the line's From node to its To node, or
    /// `None` when no single path exists.
    fn single_flow_path(
        &self,
        model: &NetworkModel,
        line: TransmissionLineId,
    ) -> Option<Vec<SeriesBranchId>>;
}
