//! Bus observability propagation and pruning.
//!
//! For the candidate buses of a substation the passes are:
//!
//! 1. a node with an active voltage group is `DirectlyObserved`, every other
//!    node starts `Unobserved`
//! 2. a node with an active current injection is `DirectlyObserved`
//! 3. every other node of a bus holding a direct node is `IndirectlyObserved`
//! 4. an `Unobserved` node at the far end of an active current flow whose
//!    near end is observed becomes `IndirectlyObserved`; then every non-direct
//!    node of a bus with any observed node becomes `IndirectlyObserved`
//! 5. buses with any `Unobserved` node are dropped
//!
//! Pass 4 is one sweep in bus order then node order and sees the states
//! written earlier in the same sweep.

use lse_core::{
    NetworkModel, NodeId, ObservationState, ObservedBus, PhaseSelection,
};
use std::collections::HashSet;
use tracing::trace;

/// Current phasor groups that are usable this cycle.
#[derive(Debug, Clone, Default)]
pub struct ActiveMeasurements {
    injection_nodes: HashSet<NodeId>,
    /// (from, to) of each active current flow
    flows: Vec<(NodeId, NodeId)>,
}

impl ActiveMeasurements {
    pub fn collect(model: &NetworkModel, selection: PhaseSelection) -> Self {
        Self {
            injection_nodes: model
                .current_injections
                .iter()
                .filter(|g| g.is_active(selection))
                .map(|g| g.node)
                .collect(),
            flows: model
                .current_flows
                .iter()
                .filter(|g| g.is_active(selection))
                .map(|g| (g.from_node, g.to_node))
                .collect(),
        }
    }

    pub fn has_injection_at(&self, node: NodeId) -> bool {
        self.injection_nodes.contains(&node)
    }

    /// Near ends of active flows that arrive at `node`.
    pub fn flow_sources_into(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.flows
            .iter()
            .filter(move |(_, to)| *to == node)
            .map(|(from, _)| *from)
    }
}

/// Passes 1 and 2.
pub fn mark_direct_observations(
    model: &mut NetworkModel,
    buses: &[ObservedBus],
    active: &ActiveMeasurements,
    selection: PhaseSelection,
) {
    for node_id in buses.iter().flat_map(|bus| bus.nodes.iter().copied()) {
        let node = &mut model[node_id];
        node.observation = if node.voltage.is_active(selection) || active.has_injection_at(node_id) {
            ObservationState::DirectlyObserved
        } else {
            ObservationState::Unobserved
        };
    }
}

/// Pass 3.
pub fn propagate_equipotential(model: &mut NetworkModel, buses: &[ObservedBus]) {
    for bus in buses {
        let any_direct = bus
            .nodes
            .iter()
            .any(|&n| model[n].observation == ObservationState::DirectlyObserved);
        if any_direct {
            promote_non_direct(model, bus);
        }
    }
}

fn promote_non_direct(model: &mut NetworkModel, bus: &ObservedBus) {
    for &n in &bus.nodes {
        if model[n].observation != ObservationState::DirectlyObserved {
            model[n].observation = ObservationState::IndirectlyObserved;
        }
    }
}

/// Pass 4.
pub fn propagate_through_flows(
    model: &mut NetworkModel,
    buses: &[ObservedBus],
    active: &ActiveMeasurements,
) {
    for bus in buses {
        for &node in &bus.nodes {
            if model[node].observation != ObservationState::Unobserved {
                continue;
            }
            let fed = active
                .flow_sources_into(node)
                .any(|from| model[from].observation.is_observed());
            if fed {
                trace!("{} observed through a measured flow", model[node].name);
                model[node].observation = ObservationState::IndirectlyObserved;
            }
        }
    }
    for bus in buses {
        if bus.nodes.iter().any(|&n| model[n].observation.is_observed()) {
            promote_non_direct(model, bus);
        }
    }
}

/// Pass 5: keep only fully observed buses.
pub fn prune_unobserved(model: &NetworkModel, buses: Vec<ObservedBus>) -> Vec<ObservedBus> {
    buses
        .into_iter()
        .filter(|bus| bus.is_fully_observed(model))
        .collect()
}

/// All five passes for one substation's candidate buses.
pub fn propagate_substation(
    model: &mut NetworkModel,
    buses: Vec<ObservedBus>,
    active: &ActiveMeasurements,
    selection: PhaseSelection,
) -> Vec<ObservedBus> {
    mark_direct_observations(model, &buses, active, selection);
    propagate_equipotential(model, &buses);
    propagate_through_flows(model, &buses, active);
    prune_unobserved(model, buses)
}
