//! Reference [`TopologyBuilder`] over the resolved switching device states.
//!
//! Candidate buses are the connected components of a substation's nodes when
//! every closed, zero-impedance switching device is treated as a short. With
//! `merge_coherent_nodes` set on the substation, the terminals of any device
//! whose voltages are coherent under the substation's coherency method are
//! merged as well. Components are found with petgraph's `UnionFind`.
//!
//! A line's single flow path is the breadth-first shortest chain of series
//! branches from its From node to its To node.

use lse_core::{
    NetworkModel, NodeId, ObservedBus, SeriesBranchId, SubstationId, SwitchingDeviceState,
    TopologyBuilder, TransmissionLineId,
};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::coherency;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectivityBuilder;

impl ConnectivityBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl TopologyBuilder for ConnectivityBuilder {
    fn candidate_buses(&self, model: &NetworkModel, substation: SubstationId) -> Vec<ObservedBus> {
        let station = &model[substation];
        let local: HashMap<NodeId, usize> = station
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &node)| (node, i))
            .collect();
        let mut components = UnionFind::<usize>::new(station.nodes.len());

        for &device_id in &station.devices {
            let device = &model[device_id];
            let (Some(&from), Some(&to)) = (local.get(&device.from_node), local.get(&device.to_node))
            else {
                continue;
            };
            let shorted = device.actual_state() == SwitchingDeviceState::Closed
                && device.impedance.is_zero();
            let coherent = station.merge_coherent_nodes
                && coherency::groups_coherent(
                    &model[device.from_node].voltage,
                    &model[device.to_node].voltage,
                    station.coherency_method,
                    station.coherency_threshold,
                ) == Some(true);
            if shorted || coherent {
                components.union(from, to);
            }
        }

        // group by representative, ordered by first member
        let mut order: Vec<usize> = Vec::new();
        let mut groups: HashMap<usize, Vec<NodeId>> = HashMap::new();
        for (i, &node) in station.nodes.iter().enumerate() {
            let root = components.find(i);
            groups
                .entry(root)
                .or_insert_with(|| {
                    order.push(root);
                    Vec::new()
                })
                .push(node);
        }
        order
            .into_iter()
            .filter_map(|root| groups.remove(&root))
            .map(|nodes| ObservedBus::new(substation, nodes))
            .collect()
    }

    fn single_flow_path(
        &self,
        model: &NetworkModel,
        line: TransmissionLineId,
    ) -> Option<Vec<SeriesBranchId>> {
        let line = &model[line];
        if line.from_node == line.to_node {
            return Some(Vec::new());
        }

        let mut graph: UnGraph<NodeId, SeriesBranchId> = UnGraph::new_undirected();
        let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
        for &branch_id in &line.branches {
            let branch = &model[branch_id];
            let a = *index
                .entry(branch.from_node)
                .or_insert_with(|| graph.add_node(branch.from_node));
            let b = *index
                .entry(branch.to_node)
                .or_insert_with(|| graph.add_node(branch.to_node));
            graph.add_edge(a, b, branch_id);
        }

        let start = *index.get(&line.from_node)?;
        let goal = *index.get(&line.to_node)?;

        let mut came_from: HashMap<NodeIndex, (NodeIndex, SeriesBranchId)> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if current == goal {
                break;
            }
            for edge in graph.edges(current) {
                let next = if edge.source() == current {
                    edge.target()
                } else {
                    edge.source()
                };
                if visited.insert(next) {
                    came_from.insert(next, (current, *edge.weight()));
                    queue.push_back(next);
                }
            }
        }

        let mut path = Vec::new();
        let mut cursor = goal;
        while cursor != start {
            let (previous, branch) = *came_from.get(&cursor)?;
            path.push(branch);
            cursor = previous;
        }
        path.reverse();
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lse_core::{CoherencyMethod, Impedance, Kilovolts, MeasurementKey, SeriesBranchKind};
    use num_complex::Complex64;

    /// Breaker-and-a-half style: n0 -CB1- n1 -CB2- n2, n3 isolated by an open switch.
    fn station() -> (NetworkModel, SubstationId, Vec<NodeId>) {
        let mut model = NetworkModel::new();
        let s = model.add_substation("S");
        let nodes: Vec<NodeId> = (0..4)
            .map(|i| model.add_substation_node(s, format!("n{i}"), Kilovolts(230.0)))
            .collect();
        model.add_breaker(s, "CB1", nodes[0], nodes[1], SwitchingDeviceState::Closed, None);
        model.add_breaker(s, "CB2", nodes[1], nodes[2], SwitchingDeviceState::Closed, None);
        model.add_switch(s, "DS3", nodes[2], nodes[3], SwitchingDeviceState::Open);
        model.link().unwrap();
        (model, s, nodes)
    }

    #[test]
    fn test_closed_devices_merge_nodes() {
        let (model, s, n) = station();
        let buses = ConnectivityBuilder.candidate_buses(&model, s);
        assert_eq!(
            buses,
            vec![
                ObservedBus::new(s, vec![n[0], n[1], n[2]]),
                ObservedBus::new(s, vec![n[3]]),
            ]
        );
    }

    #[test]
    fn test_open_device_splits_bus() {
        let (mut model, s, n) = station();
        model.devices[1].manually_switch_to(SwitchingDeviceState::Open);
        let buses = ConnectivityBuilder.candidate_buses(&model, s);
        assert_eq!(buses.len(), 3);
        assert_eq!(buses[0].nodes, vec![n[0], n[1]]);
    }

    #[test]
    fn test_device_with_impedance_is_not_a_short() {
        let (mut model, s, _) = station();
        model.devices[0].impedance = Impedance::series(0.0, 0.001);
        assert_eq!(ConnectivityBuilder.candidate_buses(&model, s).len(), 3);
    }

    #[test]
    fn test_coherent_merge() {
        let (mut model, s, n) = station();
        for (i, deg) in [(2usize, 0.0), (3usize, 0.2)] {
            model[n[i]].voltage.set_positive_sequence_pu(
                MeasurementKey::new(i as u64 + 1),
                Complex64::from_polar(1.0, f64::to_radians(deg)),
            );
        }
        assert_eq!(ConnectivityBuilder.candidate_buses(&model, s).len(), 2);

        let station = &mut model[s];
        station.merge_coherent_nodes = true;
        station.coherency_method = CoherencyMethod::AngleDelta;
        station.coherency_threshold = 0.5;
        assert_eq!(ConnectivityBuilder.candidate_buses(&model, s).len(), 1);
    }

    #[test]
    fn test_flow_path_through_compensator() {
        let mut model = NetworkModel::new();
        let a = model.add_substation("A");
        let b = model.add_substation("B");
        let na = model.add_substation_node(a, "A1", Kilovolts(500.0));
        let nb = model.add_substation_node(b, "B1", Kilovolts(500.0));
        let line = model.add_transmission_line("A-B", na, nb);
        let m = model.add_line_node(line, "m", Kilovolts(500.0));
        let stub = model.add_line_node(line, "stub", Kilovolts(500.0));
        // listed out of order, plus a dead-end stub
        let cap = model.add_series_branch(
            line,
            "cap",
            SeriesBranchKind::SeriesCompensator {
                status: lse_core::EnergizedStatus::Energized,
            },
            nb,
            m,
            Impedance::series(0.0, -0.01),
        );
        let spur = model.add_series_branch(
            line,
            "spur",
            SeriesBranchKind::LineSegment,
            m,
            stub,
            Impedance::series(0.0, 0.01),
        );
        let seg = model.add_series_branch(
            line,
            "seg",
            SeriesBranchKind::LineSegment,
            na,
            m,
            Impedance::series(0.0, 0.03),
        );
        model.link().unwrap();

        let path = ConnectivityBuilder.single_flow_path(&model, line).unwrap();
        assert_eq!(path, vec![seg, cap]);
        assert!(!path.contains(&spur));
    }

    #[test]
    fn test_disconnected_line_has_no_path() {
        let mut model = NetworkModel::new();
        let a = model.add_substation("A");
        let na = model.add_substation_node(a, "A1", Kilovolts(500.0));
        let nb = model.add_substation_node(a, "A2", Kilovolts(500.0));
        let line = model.add_transmission_line("gap", na, nb);
        let m = model.add_line_node(line, "m", Kilovolts(500.0));
        model.add_series_branch(
            line,
            "half",
            SeriesBranchKind::LineSegment,
            na,
            m,
            Impedance::series(0.0, 0.03),
        );
        model.link().unwrap();
        assert_eq!(ConnectivityBuilder.single_flow_path(&model, line), None);
    }
}
