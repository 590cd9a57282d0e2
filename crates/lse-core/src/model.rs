//! The network model arena.
//!
//! Elements are appended through the `add_*` methods, which hand back typed
//! ids. Cross references between elements are ids; [`NetworkModel::link`]
//! checks them all and rebuilds the derived membership lists (nodes and
//! devices per substation, branches per line). Element access is by indexing
//! the model with an id: `model[node_id]`.
//!
//! ```
//! use lse_core::model::{LineEnd, NetworkModel};
//! use lse_core::element::{SeriesBranchKind, SwitchingDeviceState};
//! use lse_core::{Impedance, Kilovolts};
//!
//! let mut model = NetworkModel::new();
//! let north = model.add_substation("North");
//! let south = model.add_substation("South");
//! let n1 = model.add_substation_node(north, "N1", Kilovolts(345.0));
//! let n2 = model.add_substation_node(north, "N2", Kilovolts(345.0));
//! let s1 = model.add_substation_node(south, "S1", Kilovolts(345.0));
//! model.add_breaker(north, "CB-1", n1, n2, SwitchingDeviceState::Closed, None);
//!
//! let line = model.add_transmission_line("N-S", n2, s1);
//! model.add_series_branch(line, "seg", SeriesBranchKind::LineSegment, n2, s1,
//!     Impedance::series(0.002, 0.03));
//! model.add_line_terminal_current(line, LineEnd::From).unwrap();
//!
//! model.link().unwrap();
//! assert_eq!(model[north].nodes, vec![n1, n2]);
//! assert_eq!(model[line].branches.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use thiserror::Error;

use crate::config::EstimatorConfig;
use crate::diagnostics::{category, Diagnostics};
use crate::element::{
    BreakerStatus, Node, NodeParent, ObservationState, SeriesBranch, SeriesBranchKind,
    Substation, SwitchingDevice, SwitchingDeviceKind, SwitchingDeviceState, TransmissionLine,
};
use crate::ids::{
    CurrentFlowId, CurrentInjectionId, NodeId, SeriesBranchId, SubstationId, SwitchingDeviceId,
    TransmissionLineId,
};
use crate::impedance::Impedance;
use crate::phasor::{
    CurrentFlowPhasorGroup, CurrentInjectionPhasorGroup, PhasorSet, VoltagePhasorGroup,
};
use crate::units::{Degrees, Kilovolts, MegavoltAmperes};

/// Reference to an element that does not exist in the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("{owner} references missing {node}")]
    DanglingNode { owner: String, node: NodeId },

    #[error("{owner} references missing {substation}")]
    DanglingSubstation {
        owner: String,
        substation: SubstationId,
    },

    #[error("{owner} references missing {line}")]
    DanglingLine {
        owner: String,
        line: TransmissionLineId,
    },

    #[error("{owner} references missing {flow}")]
    DanglingCurrentFlow { owner: String, flow: CurrentFlowId },
}

/// Which end of a transmission line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    From,
    To,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkModel {
    pub nodes: Vec<Node>,
    pub devices: Vec<SwitchingDevice>,
    pub branches: Vec<SeriesBranch>,
    pub lines: Vec<TransmissionLine>,
    pub substations: Vec<Substation>,
    pub current_flows: Vec<CurrentFlowPhasorGroup>,
    pub current_injections: Vec<CurrentInjectionPhasorGroup>,
    /// Three-phase power base for per-unit currents
    pub system_base: MegavoltAmperes,
    #[serde(skip)]
    linked: bool,
}

impl Default for NetworkModel {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkModel {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            devices: Vec::new(),
            branches: Vec::new(),
            lines: Vec::new(),
            substations: Vec::new(),
            current_flows: Vec::new(),
            current_injections: Vec::new(),
            system_base: MegavoltAmperes(100.0),
            linked: false,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    // =========================================================================
    // Building
    // =========================================================================

    pub fn add_substation(&mut self, name: impl Into<String>) -> SubstationId {
        let id = SubstationId::new(self.substations.len());
        self.substations.push(Substation::new(id, name));
        self.linked = false;
        id
    }

    fn push_node(&mut self, parent: NodeParent, name: String, base_kv: Kilovolts) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node {
            id,
            name,
            parent,
            voltage: VoltagePhasorGroup::new(base_kv),
            observation: ObservationState::Unobserved,
        });
        self.linked = false;
        id
    }

    pub fn add_substation_node(
        &mut self,
        substation: SubstationId,
        name: impl Into<String>,
        base_kv: Kilovolts,
    ) -> NodeId {
        self.push_node(NodeParent::Substation(substation), name.into(), base_kv)
    }

    /// Node internal to a line, e.g. between a segment and a compensator.
    pub fn add_line_node(
        &mut self,
        line: TransmissionLineId,
        name: impl Into<String>,
        base_kv: Kilovolts,
    ) -> NodeId {
        self.push_node(NodeParent::TransmissionLine(line), name.into(), base_kv)
    }

    fn push_device(
        &mut self,
        substation: SubstationId,
        name: String,
        kind: SwitchingDeviceKind,
        from_node: NodeId,
        to_node: NodeId,
        normal_state: SwitchingDeviceState,
    ) -> SwitchingDeviceId {
        let id = SwitchingDeviceId::new(self.devices.len());
        self.devices.push(SwitchingDevice::new(
            id,
            name,
            kind,
            substation,
            from_node,
            to_node,
            normal_state,
        ));
        self.linked = false;
        id
    }

    pub fn add_breaker(
        &mut self,
        substation: SubstationId,
        name: impl Into<String>,
        from_node: NodeId,
        to_node: NodeId,
        normal_state: SwitchingDeviceState,
        status: Option<BreakerStatus>,
    ) -> SwitchingDeviceId {
        self.push_device(
            substation,
            name.into(),
            SwitchingDeviceKind::Breaker { status },
            from_node,
            to_node,
            normal_state,
        )
    }

    pub fn add_switch(
        &mut self,
        substation: SubstationId,
        name: impl Into<String>,
        from_node: NodeId,
        to_node: NodeId,
        normal_state: SwitchingDeviceState,
    ) -> SwitchingDeviceId {
        self.push_device(
            substation,
            name.into(),
            SwitchingDeviceKind::Switch,
            from_node,
            to_node,
            normal_state,
        )
    }

    pub fn add_transmission_line(
        &mut self,
        name: impl Into<String>,
        from_node: NodeId,
        to_node: NodeId,
    ) -> TransmissionLineId {
        let id = TransmissionLineId::new(self.lines.len());
        self.lines
            .push(TransmissionLine::new(id, name, from_node, to_node));
        self.linked = false;
        id
    }

    pub fn add_series_branch(
        &mut self,
        line: TransmissionLineId,
        name: impl Into<String>,
        kind: SeriesBranchKind,
        from_node: NodeId,
        to_node: NodeId,
        impedance: Impedance,
    ) -> SeriesBranchId {
        let id = SeriesBranchId::new(self.branches.len());
        self.branches.push(SeriesBranch {
            id,
            name: name.into(),
            line,
            kind,
            from_node,
            to_node,
            impedance,
        });
        self.linked = false;
        id
    }

    pub fn add_current_flow(
        &mut self,
        name: impl Into<String>,
        from_node: NodeId,
        to_node: NodeId,
        base_kv: Kilovolts,
    ) -> CurrentFlowId {
        let id = CurrentFlowId::new(self.current_flows.len());
        self.current_flows.push(CurrentFlowPhasorGroup {
            id,
            name: name.into(),
            from_node,
            to_node,
            base_kv,
            phasors: PhasorSet::default(),
        });
        self.linked = false;
        id
    }

    /// Create the current group measured at one end of a line, flowing into
    /// the line, and attach it to that end.
    pub fn add_line_terminal_current(
        &mut self,
        line: TransmissionLineId,
        end: LineEnd,
    ) -> Result<CurrentFlowId, LinkError> {
        let (name, near, far) = {
            let l = self.lines.get(line.value()).ok_or(LinkError::DanglingLine {
                owner: "terminal current".to_string(),
                line,
            })?;
            match end {
                LineEnd::From => (format!("{} from", l.name), l.from_node, l.to_node),
                LineEnd::To => (format!("{} to", l.name), l.to_node, l.from_node),
            }
        };
        let base_kv = self
            .nodes
            .get(near.value())
            .map(|n| n.voltage.base_kv)
            .ok_or(LinkError::DanglingNode {
                owner: format!("line terminal current {name}"),
                node: near,
            })?;

        let id = self.add_current_flow(name, near, far, base_kv);
        let l = &mut self.lines[line.value()];
        match end {
            LineEnd::From => l.from_current = Some(id),
            LineEnd::To => l.to_current = Some(id),
        }
        Ok(id)
    }

    pub fn add_current_injection(
        &mut self,
        name: impl Into<String>,
        node: NodeId,
        base_kv: Kilovolts,
    ) -> CurrentInjectionId {
        let id = CurrentInjectionId::new(self.current_injections.len());
        self.current_injections.push(CurrentInjectionPhasorGroup {
            id,
            name: name.into(),
            node,
            base_kv,
            phasors: PhasorSet::default(),
        });
        self.linked = false;
        id
    }

    // =========================================================================
    // Linking and configuration
    // =========================================================================

    fn check_node(&self, owner: impl FnOnce() -> String, node: NodeId) -> Result<(), LinkError> {
        if node.value() < self.nodes.len() {
            Ok(())
        } else {
            Err(LinkError::DanglingNode {
                owner: owner(),
                node,
            })
        }
    }

    /// Validate every id reference and rebuild membership lists.
    pub fn link(&mut self) -> Result<(), LinkError> {
        for node in &self.nodes {
            match node.parent {
                NodeParent::Substation(substation) if substation.value() >= self.substations.len() => {
                    return Err(LinkError::DanglingSubstation {
                        owner: format!("node {}", node.name),
                        substation,
                    });
                }
                NodeParent::TransmissionLine(line) if line.value() >= self.lines.len() => {
                    return Err(LinkError::DanglingLine {
                        owner: format!("node {}", node.name),
                        line,
                    });
                }
                _ => {}
            }
        }

        for device in &self.devices {
            if device.substation.value() >= self.substations.len() {
                return Err(LinkError::DanglingSubstation {
                    owner: format!("device {}", device.name),
                    substation: device.substation,
                });
            }
            for node in [device.from_node, device.to_node] {
                self.check_node(|| format!("device {}", device.name), node)?;
            }
        }

        for branch in &self.branches {
            if branch.line.value() >= self.lines.len() {
                return Err(LinkError::DanglingLine {
                    owner: format!("branch {}", branch.name),
                    line: branch.line,
                });
            }
            for node in [branch.from_node, branch.to_node] {
                self.check_node(|| format!("branch {}", branch.name), node)?;
            }
        }

        for line in &self.lines {
            for node in [line.from_node, line.to_node] {
                self.check_node(|| format!("line {}", line.name), node)?;
            }
            for flow in [line.from_current, line.to_current].into_iter().flatten() {
                if flow.value() >= self.current_flows.len() {
                    return Err(LinkError::DanglingCurrentFlow {
                        owner: format!("line {}", line.name),
                        flow,
                    });
                }
            }
        }

        for flow in &self.current_flows {
            for node in [flow.from_node, flow.to_node] {
                self.check_node(|| format!("current flow {}", flow.name), node)?;
            }
        }
        for injection in &self.current_injections {
            self.check_node(
                || format!("current injection {}", injection.name),
                injection.node,
            )?;
        }

        for substation in &mut self.substations {
            substation.nodes.clear();
            substation.devices.clear();
        }
        for line in &mut self.lines {
            line.branches.clear();
        }
        for node in &self.nodes {
            if let NodeParent::Substation(substation) = node.parent {
                self.substations[substation.value()].nodes.push(node.id);
            }
        }
        for device in &self.devices {
            self.substations[device.substation.value()]
                .devices
                .push(device.id);
        }
        for branch in &self.branches {
            self.lines[branch.line.value()].branches.push(branch.id);
        }

        self.linked = true;
        Ok(())
    }

    /// Seed per-element settings from the estimator configuration.
    pub fn apply_config(&mut self, config: &EstimatorConfig) {
        self.system_base = MegavoltAmperes(config.base.system_mva);

        for device in &mut self.devices {
            device.cross_device_angle_threshold =
                Degrees(config.switching.cross_device_angle_threshold_deg);
            device.use_inferred_state_as_actual_proxy =
                config.switching.use_inferred_state_as_actual_proxy;
        }
        for line in &mut self.lines {
            line.real_time_impedance_calculation_enabled =
                config.impedance.real_time_calculation_enabled;
            line.series_compensator_status_inference_enabled =
                config.impedance.series_compensator_inference_enabled;
            line.impedance_change_threshold = config.impedance.change_threshold_pu;
        }
        for substation in &mut self.substations {
            substation.coherency_method = config.coherency.method;
            substation.coherency_threshold = config.coherency.threshold();
            substation.merge_coherent_nodes = config.topology.merge_coherent_nodes;
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats {
            num_nodes: self.nodes.len(),
            num_devices: self.devices.len(),
            num_branches: self.branches.len(),
            num_lines: self.lines.len(),
            num_substations: self.substations.len(),
            num_current_flows: self.current_flows.len(),
            num_current_injections: self.current_injections.len(),
            ..ModelStats::default()
        };
        stats.num_breakers = self.devices.iter().filter(|d| d.is_breaker()).count();
        stats.num_series_compensators = self
            .branches
            .iter()
            .filter(|b| b.is_series_compensator())
            .count();
        stats
    }

    /// Report structural issues that do not prevent linking but will leave
    /// parts of the network permanently unresolvable.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.nodes.is_empty() {
            diag.add_error(category::STRUCTURE, "Model has no nodes");
            return;
        }

        let mut populated = vec![false; self.substations.len()];
        for node in &self.nodes {
            if let Some(s) = node.substation() {
                if let Some(flag) = populated.get_mut(s.value()) {
                    *flag = true;
                }
            }
        }
        for (substation, has_nodes) in self.substations.iter().zip(populated) {
            if !has_nodes {
                diag.add_warning_for(
                    category::STRUCTURE,
                    "Substation has no nodes",
                    &format!("substation {}", substation.name),
                );
            }
        }

        for device in &self.devices {
            if device.from_node == device.to_node {
                diag.add_error_for(
                    category::STRUCTURE,
                    "Switching device connects a node to itself",
                    &format!("device {}", device.name),
                );
            }
        }

        for line in &self.lines {
            let entity = format!("line {}", line.name);
            if line.from_current.is_none() && line.to_current.is_none() {
                diag.add_warning_for(
                    category::IMPEDANCE,
                    "Line has no terminal current measurement; real-time impedance cannot be calculated",
                    &entity,
                );
            }
            if !self.branches.iter().any(|b| b.line == line.id) {
                diag.add_warning_for(category::STRUCTURE, "Line has no series branches", &entity);
            }
        }
    }
}

macro_rules! arena_index {
    ($id:ty => $element:ty, $field:ident) => {
        impl Index<$id> for NetworkModel {
            type Output = $element;
            fn index(&self, id: $id) -> &$element {
                &self.$field[id.value()]
            }
        }

        impl IndexMut<$id> for NetworkModel {
            fn index_mut(&mut self, id: $id) -> &mut $element {
                &mut self.$field[id.value()]
            }
        }
    };
}

arena_index!(NodeId => Node, nodes);
arena_index!(SwitchingDeviceId => SwitchingDevice, devices);
arena_index!(SeriesBranchId => SeriesBranch, branches);
arena_index!(TransmissionLineId => TransmissionLine, lines);
arena_index!(SubstationId => Substation, substations);
arena_index!(CurrentFlowId => CurrentFlowPhasorGroup, current_flows);
arena_index!(CurrentInjectionId => CurrentInjectionPhasorGroup, current_injections);

/// Element counts of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub num_nodes: usize,
    pub num_devices: usize,
    pub num_breakers: usize,
    pub num_branches: usize,
    pub num_series_compensators: usize,
    pub num_lines: usize,
    pub num_substations: usize,
    pub num_current_flows: usize,
    pub num_current_injections: usize,
}

impl std::fmt::Display for ModelStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nodes, {} substations, {} devices ({} breakers), {} lines, {} branches ({} compensators)",
            self.num_nodes,
            self.num_substations,
            self.num_devices,
            self.num_breakers,
            self.num_lines,
            self.num_branches,
            self.num_series_compensators
        )
    }
}
