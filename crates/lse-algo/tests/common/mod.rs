//! Shared fixtures for the lse-algo integration tests.

#![allow(dead_code)]

use lse_core::model::LineEnd;
use lse_core::{
    Degrees, EnergizedStatus, Impedance, Kilovolts, MeasurementKey, NetworkModel, NodeId,
    SeriesBranchId, SeriesBranchKind, SubstationId, SwitchingDeviceId, SwitchingDeviceState,
    TransmissionLineId,
};
use num_complex::Complex64;

/// Two substations joined by a series-compensated 500 kV line.
///
/// ```text
///  NORTH                                                     SOUTH
///  n1 -CB-N- n2 ==seg1== m1 ==cap1== m2 ==seg2== m3 ==cap2== s1 -DS-S- s2
/// ```
pub struct CompensatedGrid {
    pub model: NetworkModel,
    pub north: SubstationId,
    pub south: SubstationId,
    pub north_nodes: [NodeId; 2],
    pub south_nodes: [NodeId; 2],
    pub breaker: SwitchingDeviceId,
    pub switch: SwitchingDeviceId,
    pub line: TransmissionLineId,
    pub segments: [SeriesBranchId; 2],
    pub caps: [SeriesBranchId; 2],
}

pub const KV: Kilovolts = Kilovolts(500.0);

/// Sum of both segments with both compensators bypassed.
pub fn base_case() -> Impedance {
    Impedance::new(0.002, 0.06, 0.0, 0.4)
}

pub fn compensated_grid() -> CompensatedGrid {
    let mut model = NetworkModel::new();
    let north = model.add_substation("NORTH");
    let south = model.add_substation("SOUTH");
    let n1 = model.add_substation_node(north, "N1", KV);
    let n2 = model.add_substation_node(north, "N2", KV);
    let s1 = model.add_substation_node(south, "S1", KV);
    let s2 = model.add_substation_node(south, "S2", KV);
    let breaker = model.add_breaker(north, "CB-N", n1, n2, SwitchingDeviceState::Closed, None);
    let switch = model.add_switch(south, "DS-S", s1, s2, SwitchingDeviceState::Closed);

    let line = model.add_transmission_line("NORTH-SOUTH", n2, s1);
    let m1 = model.add_line_node(line, "M1", KV);
    let m2 = model.add_line_node(line, "M2", KV);
    let m3 = model.add_line_node(line, "M3", KV);
    let segment = Impedance::new(0.001, 0.03, 0.0, 0.2);
    let cap = |status| SeriesBranchKind::SeriesCompensator { status };
    let seg1 = model.add_series_branch(line, "seg1", SeriesBranchKind::LineSegment, n2, m1, segment);
    let cap1 = model.add_series_branch(
        line,
        "cap1",
        cap(EnergizedStatus::Energized),
        m1,
        m2,
        Impedance::series(0.0, -0.01),
    );
    let seg2 = model.add_series_branch(line, "seg2", SeriesBranchKind::LineSegment, m2, m3, segment);
    let cap2 = model.add_series_branch(
        line,
        "cap2",
        cap(EnergizedStatus::Energized),
        m3,
        s1,
        Impedance::series(0.0, -0.015),
    );
    model
        .add_line_terminal_current(line, LineEnd::From)
        .expect("line exists");
    model.link().expect("fixture links");

    CompensatedGrid {
        model,
        north,
        south,
        north_nodes: [n1, n2],
        south_nodes: [s1, s2],
        breaker,
        switch,
        line,
        segments: [seg1, seg2],
        caps: [cap1, cap2],
    }
}

pub fn measure_voltage(model: &mut NetworkModel, node: NodeId, key: u64, value: Complex64) {
    model[node]
        .voltage
        .set_positive_sequence_pu(MeasurementKey::new(key), value);
}

/// Write terminal voltages and the From-end current consistent with a
/// series impedance `z` and no shunt.
pub fn drive_line(model: &mut NetworkModel, line: TransmissionLineId, z: Complex64) {
    let vs = Complex64::new(1.0, 0.0);
    let is = Complex64::from_polar(0.8, Degrees(-10.0).to_radians().value());
    let vr = vs - z * is;

    let (from, to, flow) = {
        let l = &model[line];
        (l.from_node, l.to_node, l.from_current.expect("from-end current"))
    };
    measure_voltage(model, from, 11, vs);
    measure_voltage(model, to, 12, vr);
    let base = model.system_base;
    model[flow].set_positive_sequence_pu(MeasurementKey::new(13), is, base);
}

/// A substation of `n` nodes chained by closed breakers, no status telemetry.
pub fn breaker_chain(n: usize) -> (NetworkModel, SubstationId, Vec<NodeId>) {
    let mut model = NetworkModel::new();
    let s = model.add_substation("CHAIN");
    let nodes: Vec<NodeId> = (0..n)
        .map(|i| model.add_substation_node(s, format!("B{i}"), Kilovolts(230.0)))
        .collect();
    for pair in nodes.windows(2) {
        model.add_breaker(
            s,
            format!("CB-{}-{}", pair[0], pair[1]),
            pair[0],
            pair[1],
            SwitchingDeviceState::Closed,
            None,
        );
    }
    model.link().expect("fixture links");
    (model, s, nodes)
}
