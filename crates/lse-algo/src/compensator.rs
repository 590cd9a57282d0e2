//! Series compensator status inference.
//!
//! A line's flow path holds line segments and `n` series compensators, each
//! either in service or bypassed. Every in/out combination is a candidate
//! total impedance:
//! ```text
//! candidate(i) = base + Σ { Z_k : bit k of i is set },   0 ≤ i < 2^n
//! ```
//! where `base` is the sum of the segments. The candidate closest to the
//! real-time calculated impedance wins (the lowest index on ties) and its bits
//! become the compensator statuses.
//!
//! Transformers on a path are not part of either sum.

use lse_core::config::MAX_ENUMERABLE_COMPENSATORS;
use lse_core::{
    EnergizedStatus, Impedance, NetworkModel, SeriesBranchId, SeriesBranchKind,
    TransmissionLineId,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompensatorError {
    #[error("Line {line} has {count} series compensators on its flow path, at most {limit} can be enumerated")]
    TooManyCompensators {
        line: String,
        count: usize,
        limit: usize,
    },
}

/// Segment sum and compensator impedances along a flow path, in path order.
///
/// Holds at most [`MAX_ENUMERABLE_COMPENSATORS`] compensators, so every
/// candidate index fits in a `u32` bitmask.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPathImpedances {
    base_case: Impedance,
    compensators: Vec<(SeriesBranchId, Impedance)>,
}

impl FlowPathImpedances {
    /// Split `path` into the base case and its compensators.
    ///
    /// `limit` is capped at [`MAX_ENUMERABLE_COMPENSATORS`].
    pub fn of(
        model: &NetworkModel,
        line_id: TransmissionLineId,
        path: &[SeriesBranchId],
        limit: usize,
    ) -> Result<Self, CompensatorError> {
        let limit = limit.min(MAX_ENUMERABLE_COMPENSATORS as usize);
        let mut base_case = Impedance::ZERO;
        let mut compensators = Vec::new();
        for &id in path {
            let branch = &model[id];
            match branch.kind {
                SeriesBranchKind::LineSegment => base_case += branch.impedance,
                SeriesBranchKind::SeriesCompensator { .. } => {
                    compensators.push((id, branch.impedance))
                }
                SeriesBranchKind::Transformer => {}
            }
        }
        if compensators.len() > limit {
            return Err(CompensatorError::TooManyCompensators {
                line: model[line_id].name.clone(),
                count: compensators.len(),
                limit,
            });
        }
        Ok(Self {
            base_case,
            compensators,
        })
    }

    pub fn base_case(&self) -> Impedance {
        self.base_case
    }

    pub fn compensators(&self) -> &[(SeriesBranchId, Impedance)] {
        &self.compensators
    }

    pub fn candidate_count(&self) -> usize {
        1usize << self.compensators.len()
    }

    pub fn candidate(&self, index: u32) -> Impedance {
        self.compensators
            .iter()
            .enumerate()
            .filter(|(k, _)| index >> k & 1 == 1)
            .fold(self.base_case, |total, (_, (_, z))| total + *z)
    }

    /// All `2^n` candidates in index order.
    pub fn candidates(&self) -> impl Iterator<Item = (u32, Impedance)> + '_ {
        (0..self.candidate_count() as u32).map(move |i| (i, self.candidate(i)))
    }

    /// Index and distance of the candidate closest to `target`.
    pub fn closest_to(&self, target: &Impedance) -> (u32, f64) {
        let mut best = (0u32, f64::INFINITY);
        for (index, candidate) in self.candidates() {
            let distance = candidate.distance(target);
            if distance < best.1 {
                best = (index, distance);
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompensatorInference {
    pub winning_index: u32,
    pub candidate_count: usize,
    pub distance: f64,
    pub inferred_total_impedance: Impedance,
}

/// Enumerate compensator combinations on `path` and assign the winning statuses.
///
/// `limit` is capped at [`MAX_ENUMERABLE_COMPENSATORS`]. On error nothing in
/// the model is changed.
pub fn infer_series_compensator_status(
    model: &mut NetworkModel,
    line_id: TransmissionLineId,
    path: &[SeriesBranchId],
    limit: usize,
) -> Result<CompensatorInference, CompensatorError> {
    let impedances = FlowPathImpedances::of(model, line_id, path, limit)?;

    let target = model[line_id].real_time_calculated_impedance;
    let (winning_index, distance) = impedances.closest_to(&target);
    let inferred = impedances.candidate(winning_index);
    trace!(
        "{}: candidate {} of {} at distance {:.6}",
        model[line_id].name,
        winning_index,
        impedances.candidate_count(),
        distance
    );

    let on_path: Vec<SeriesBranchId> = impedances.compensators.iter().map(|(id, _)| *id).collect();
    for (k, id) in on_path.iter().enumerate() {
        let status = if winning_index >> k & 1 == 1 {
            EnergizedStatus::Energized
        } else {
            EnergizedStatus::Bypassed
        };
        model[*id].set_compensator_status(status);
    }

    let off_path: Vec<SeriesBranchId> = model[line_id]
        .branches
        .iter()
        .copied()
        .filter(|id| model[*id].is_series_compensator() && !on_path.contains(id))
        .collect();
    for id in off_path {
        debug!("{} is off the flow path, bypassing", model[id].name);
        model[id].set_compensator_status(EnergizedStatus::Bypassed);
    }

    model[line_id].inferred_total_impedance = inferred;
    Ok(CompensatorInference {
        winning_index,
        candidate_count: impedances.candidate_count(),
        distance,
        inferred_total_impedance: inferred,
    })
}

/// Sum the segments and energized compensators on `path` into the line's final impedance.
pub fn set_final_impedance_values(
    model: &mut NetworkModel,
    line_id: TransmissionLineId,
    path: &[SeriesBranchId],
) -> Impedance {
    let view: &NetworkModel = model;
    let total: Impedance = path
        .iter()
        .map(|&id| &view[id])
        .filter(|branch| match branch.kind {
            SeriesBranchKind::LineSegment => true,
            SeriesBranchKind::SeriesCompensator { status } => status == EnergizedStatus::Energized,
            SeriesBranchKind::Transformer => false,
        })
        .map(|branch| branch.impedance)
        .sum();
    model[line_id].final_impedance = total;
    total
}
