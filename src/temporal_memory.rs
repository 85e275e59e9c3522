//! Temporal Memory — two-timestep sequence memory with distal
//! (optionally basal/apical) prediction, bursting, and anomaly scoring.
//!
//! The state-machine shape (shadow previous state, cache segment
//! activity, activate, learn, recompute predictions) generalizes the
//! teacher's `SequenceLearner`/`ContextLearner` staging
//! (`examples/jacobeverist-gcf-core-rust/src/blocks/sequence_learner.rs`),
//! but the learning and winner-selection rules below follow the full
//! HTM two-timestep algorithm rather than the teacher's single-context
//! simplification.

use crate::error::{CoreError, Result};
use crate::sdr::Sdr;
use crate::segment::{SegmentKind, SegmentManager};
use serde::{Deserialize, Serialize};

/// Temporal Memory configuration. Defaults mirror the normative values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TmConfig {
    pub column_count: usize,
    pub cells_per_column: usize,
    pub activation_threshold: u32,
    pub min_threshold: u32,
    pub max_new_synapse_count: usize,
    pub max_segments_per_cell: usize,
    pub max_synapses_per_segment: usize,
    pub initial_permanence: f32,
    pub connected_threshold: f32,
    pub perm_inc: f32,
    pub perm_dec: f32,
    pub predicted_decrement: f32,
    pub prune_threshold: f32,
    pub cleanup_interval: u32,
    pub min_viable: usize,
    pub basal_size: Option<usize>,
    pub apical_size: Option<usize>,
}

impl Default for TmConfig {
    fn default() -> Self {
        Self {
            column_count: 2048,
            cells_per_column: 32,
            activation_threshold: 13,
            min_threshold: 10,
            max_new_synapse_count: 20,
            max_segments_per_cell: 128,
            max_synapses_per_segment: 64,
            initial_permanence: 0.21,
            connected_threshold: 0.5,
            perm_inc: 0.1,
            perm_dec: 0.1,
            predicted_decrement: 0.01,
            prune_threshold: 0.01,
            cleanup_interval: 1000,
            min_viable: 3,
            basal_size: None,
            apical_size: None,
        }
    }
}

/// Output of one `TemporalMemory::compute` step.
#[derive(Clone, Debug)]
pub struct TmOutput {
    pub active: Sdr,
    pub winners: Sdr,
    pub predicted: Sdr,
    pub anomaly: f64,
    pub bursting_count: u32,
    pub predicted_active_count: u32,
}

/// Two-timestep sequence memory over `column_count * cells_per_column` cells.
pub struct TemporalMemory {
    config: TmConfig,
    num_cells: usize,
    distal: Vec<SegmentManager>,
    basal: Option<Vec<SegmentManager>>,
    apical: Option<Vec<SegmentManager>>,

    active: Sdr,
    winner: Sdr,
    predictive: Sdr,
    prev_active: Sdr,
    prev_winner: Sdr,
    prev_predictive: Sdr,
    last_basal: Option<Sdr>,
    last_apical: Option<Sdr>,

    step: u32,
}

fn cell_column(cell: u32, cells_per_column: usize) -> usize {
    (cell as usize) / cells_per_column
}

impl TemporalMemory {
    pub fn new(config: TmConfig) -> Result<Self> {
        if config.cells_per_column == 0 {
            return Err(CoreError::InvalidArgument(
                "cells_per_column must be > 0".into(),
            ));
        }
        let num_cells = config.column_count * config.cells_per_column;
        let distal = (0..num_cells)
            .map(|c| {
                SegmentManager::new(
                    c as u32,
                    SegmentKind::Distal,
                    config.max_segments_per_cell,
                    config.max_synapses_per_segment,
                )
            })
            .collect();
        let basal = config.basal_size.map(|_| {
            (0..num_cells)
                .map(|c| {
                    SegmentManager::new(
                        c as u32,
                        SegmentKind::Basal,
                        config.max_segments_per_cell,
                        config.max_synapses_per_segment,
                    )
                })
                .collect()
        });
        let apical = config.apical_size.map(|_| {
            (0..num_cells)
                .map(|c| {
                    SegmentManager::new(
                        c as u32,
                        SegmentKind::Apical,
                        config.max_segments_per_cell,
                        config.max_synapses_per_segment,
                    )
                })
                .collect()
        });

        Ok(Self {
            active: Sdr::empty(num_cells),
            winner: Sdr::empty(num_cells),
            predictive: Sdr::empty(num_cells),
            prev_active: Sdr::empty(num_cells),
            prev_winner: Sdr::empty(num_cells),
            prev_predictive: Sdr::empty(num_cells),
            last_basal: None,
            last_apical: None,
            num_cells,
            distal,
            basal,
            apical,
            config,
            step: 0,
        })
    }

    pub fn config(&self) -> &TmConfig {
        &self.config
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Sequence reset: clears transient active/winner/predictive state
    /// (and the basal/apical shadow), preserving all learned synapses.
    pub fn reset(&mut self) {
        self.active = Sdr::empty(self.num_cells);
        self.winner = Sdr::empty(self.num_cells);
        self.predictive = Sdr::empty(self.num_cells);
        self.prev_active = Sdr::empty(self.num_cells);
        self.prev_winner = Sdr::empty(self.num_cells);
        self.prev_predictive = Sdr::empty(self.num_cells);
        self.last_basal = None;
        self.last_apical = None;
    }

    /// One compute step. `active_columns` has size `column_count`.
    /// `basal`/`apical`, if configured, must have the configured widths.
    pub fn compute(
        &mut self,
        active_columns: &Sdr,
        basal: Option<&Sdr>,
        apical: Option<&Sdr>,
        learn: bool,
    ) -> Result<TmOutput> {
        if active_columns.size() != self.config.column_count {
            return Err(CoreError::ShapeMismatch {
                expected: self.config.column_count,
                actual: active_columns.size(),
            });
        }
        if let (Some(b), Some(expected)) = (basal, self.config.basal_size) {
            if b.size() != expected {
                return Err(CoreError::ShapeMismatch {
                    expected,
                    actual: b.size(),
                });
            }
        }
        if let (Some(a), Some(expected)) = (apical, self.config.apical_size) {
            if a.size() != expected {
                return Err(CoreError::ShapeMismatch {
                    expected,
                    actual: a.size(),
                });
            }
        }

        // 1. Shadow previous state.
        self.prev_active = self.active.clone();
        self.prev_winner = self.winner.clone();
        self.prev_predictive = self.predictive.clone();
        let prev_basal = self.last_basal.clone();
        let prev_apical = self.last_apical.clone();

        // 2. Build segment caches against prev_active.
        let mut active_cache: Vec<Vec<usize>> = vec![Vec::new(); self.num_cells];
        let mut matching_cache: Vec<Vec<usize>> = vec![Vec::new(); self.num_cells];
        for cell in 0..self.num_cells {
            let mgr = &self.distal[cell];
            for (idx, seg) in mgr.segments().iter().enumerate() {
                let conn = seg.compute_activity(&self.prev_active, self.config.connected_threshold);
                if conn >= self.config.activation_threshold {
                    active_cache[cell].push(idx);
                }
                let pot = seg.compute_potential_activity(&self.prev_active);
                if pot >= self.config.min_threshold {
                    matching_cache[cell].push(idx);
                }
            }
        }

        // 3. Predicted cells/columns (against prev_active).
        let predicted_cells: Vec<u32> = (0..self.num_cells)
            .filter(|&c| !active_cache[c].is_empty())
            .map(|c| c as u32)
            .collect();
        let mut predicted_columns = vec![false; self.config.column_count];
        for &cell in &predicted_cells {
            predicted_columns[cell_column(cell, self.config.cells_per_column)] = true;
        }

        // 4. Activate cells.
        let mut new_active: Vec<u32> = Vec::new();
        let mut new_winner: Vec<u32> = Vec::new();
        let mut bursting_count = 0u32;
        let mut predicted_active_count = 0u32;

        for &col in active_columns.active() {
            let col = col as usize;
            if predicted_columns[col] {
                predicted_active_count += 1;
                let mut cells_here: Vec<u32> = Vec::new();
                for &cell in &predicted_cells {
                    if cell_column(cell, self.config.cells_per_column) == col {
                        new_active.push(cell);
                        cells_here.push(cell);
                    }
                }
                // Four-tier winner preference among predicted cells: prefer
                // apical-depolarized AND basal-supported, then either one,
                // then predicted-only. All predicted cells stay active
                // regardless of tier; only tier affects who wins.
                let mut best_tier = -1i32;
                let mut winners_here: Vec<u32> = Vec::new();
                for &cell in &cells_here {
                    let basal_ok = self.basal_active_for(cell as usize, basal);
                    let apical_ok = self.apical_active_for(cell as usize, apical);
                    let tier = if basal_ok && apical_ok {
                        3
                    } else if basal_ok || apical_ok {
                        2
                    } else {
                        1
                    };
                    if tier > best_tier {
                        best_tier = tier;
                        winners_here.clear();
                        winners_here.push(cell);
                    } else if tier == best_tier {
                        winners_here.push(cell);
                    }
                }
                new_winner.extend(winners_here);
            } else {
                bursting_count += 1;
                let base = col * self.config.cells_per_column;
                for local in 0..self.config.cells_per_column {
                    new_active.push((base + local) as u32);
                }
                let winner_cell = self.select_burst_winner(
                    base,
                    &matching_cache,
                    basal,
                    apical,
                );
                new_winner.push(winner_cell as u32);
            }
        }

        self.active = Sdr::new(self.num_cells, &new_active);
        self.winner = Sdr::new(self.num_cells, &new_winner);

        // 5. Anomaly.
        let active_col_count = active_columns.num_active() as f64;
        let anomaly = if active_col_count > 0.0 {
            1.0 - (predicted_active_count as f64 / active_col_count)
        } else {
            0.0
        };

        // 6. Learn.
        if learn {
            let winner_cells: Vec<u32> = self.winner.active().to_vec();
            let prev_active_snapshot = self.prev_active.clone();
            let prev_winner_snapshot = self.prev_winner.clone();
            for &cell in &winner_cells {
                let cell = cell as usize;
                self.learn_on_cell(
                    cell,
                    &active_cache[cell],
                    &matching_cache[cell],
                    SegmentTarget::Distal,
                    &prev_active_snapshot,
                    &prev_winner_snapshot,
                );
            }
            if self.basal.is_some() {
                if let Some(prev) = prev_basal.as_ref() {
                    for &cell in &winner_cells {
                        self.learn_modulatory(cell as usize, SegmentTarget::Basal, prev);
                    }
                }
            }
            if self.apical.is_some() {
                if let Some(prev) = prev_apical.as_ref() {
                    for &cell in &winner_cells {
                        self.learn_modulatory(cell as usize, SegmentTarget::Apical, prev);
                    }
                }
            }

            // Punish incorrect predictions.
            let prev_predictive_cells: Vec<u32> = self.prev_predictive.active().to_vec();
            for cell in prev_predictive_cells {
                let cell_u = cell as usize;
                let col = cell_column(cell, self.config.cells_per_column);
                if !active_columns.contains(col as u32) {
                    for &seg_idx in &active_cache[cell_u] {
                        self.distal[cell_u].segments_mut()[seg_idx]
                            .punish_synapses(&self.prev_active, self.config.predicted_decrement);
                    }
                }
            }
        }

        // 7. Recompute predictive set against the NEW active set.
        let mut new_predictive = Vec::new();
        for cell in 0..self.num_cells {
            let has_active = self.distal[cell].segments().iter().any(|seg| {
                seg.compute_activity(&self.active, self.config.connected_threshold)
                    >= self.config.activation_threshold
            });
            if has_active {
                new_predictive.push(cell as u32);
            }
        }
        self.predictive = Sdr::new(self.num_cells, &new_predictive);

        // Shadow basal/apical for next step's learning.
        self.last_basal = basal.cloned();
        self.last_apical = apical.cloned();

        self.step += 1;
        if self.step % self.config.cleanup_interval.max(1) == 0 {
            self.maintain();
        }

        Ok(TmOutput {
            active: self.active.clone(),
            winners: self.winner.clone(),
            predicted: self.predictive.clone(),
            anomaly,
            bursting_count,
            predicted_active_count,
        })
    }

    fn select_burst_winner(
        &self,
        base: usize,
        matching_cache: &[Vec<usize>],
        basal: Option<&Sdr>,
        apical: Option<&Sdr>,
    ) -> usize {
        let cells_per_column = self.config.cells_per_column;
        let mut best: Option<(i64, u32, usize, usize)> = None; // (mod_score, matching_pot, seg_count asc via negation, cell)
        for local in 0..cells_per_column {
            let cell = base + local;
            let mod_score = self.modulatory_score(cell, basal, apical);
            let matching_pot = matching_cache[cell]
                .iter()
                .map(|&idx| {
                    self.distal[cell].segments()[idx].compute_potential_activity(&self.prev_active)
                })
                .max()
                .unwrap_or(0);
            let seg_count = self.distal[cell].num_segments();
            let key = (mod_score, matching_pot, usize::MAX - seg_count, cell);
            if best.map(|b| key > b).unwrap_or(true) {
                best = Some(key);
            }
        }
        best.map(|(_, _, _, cell)| cell).unwrap_or(base)
    }

    /// Whether `cell` has a basal segment actively depolarized by `basal`.
    fn basal_active_for(&self, cell: usize, basal: Option<&Sdr>) -> bool {
        match (self.basal.as_ref(), basal) {
            (Some(mgrs), Some(input)) => mgrs[cell].segments().iter().any(|s| {
                s.compute_activity(input, self.config.connected_threshold)
                    >= self.config.activation_threshold
            }),
            _ => false,
        }
    }

    /// Whether `cell` has an apical segment actively depolarized by `apical`.
    fn apical_active_for(&self, cell: usize, apical: Option<&Sdr>) -> bool {
        match (self.apical.as_ref(), apical) {
            (Some(mgrs), Some(input)) => mgrs[cell].segments().iter().any(|s| {
                s.compute_activity(input, self.config.connected_threshold)
                    >= self.config.activation_threshold
            }),
            _ => false,
        }
    }

    fn modulatory_score(&self, cell: usize, basal: Option<&Sdr>, apical: Option<&Sdr>) -> i64 {
        let mut score = 0i64;
        if let (Some(mgrs), Some(input)) = (self.basal.as_ref(), basal) {
            score += mgrs[cell]
                .segments()
                .iter()
                .filter(|s| {
                    s.compute_activity(input, self.config.connected_threshold)
                        >= self.config.activation_threshold
                })
                .count() as i64;
        }
        if let (Some(mgrs), Some(input)) = (self.apical.as_ref(), apical) {
            score += mgrs[cell]
                .segments()
                .iter()
                .filter(|s| {
                    s.compute_activity(input, self.config.connected_threshold)
                        >= self.config.activation_threshold
                })
                .count() as i64;
        }
        score
    }

    fn learn_on_cell(
        &mut self,
        cell: usize,
        active_segs: &[usize],
        matching_segs: &[usize],
        _target: SegmentTarget,
        prev_active: &Sdr,
        prev_winner: &Sdr,
    ) {
        let created_at = self.step;
        let cfg = &self.config;
        if !active_segs.is_empty() {
            for &idx in active_segs {
                let seg = &mut self.distal[cell].segments_mut()[idx];
                seg.adapt_synapses(prev_active, cfg.perm_inc, cfg.perm_dec);
                seg.last_activated = created_at;
                let remaining = cfg.max_new_synapse_count.saturating_sub(seg.num_synapses());
                seg.add_synapses(
                    prev_winner.active().iter().copied(),
                    remaining,
                    cfg.max_synapses_per_segment,
                    cfg.initial_permanence,
                    created_at,
                );
            }
        } else if !matching_segs.is_empty() {
            let best_idx = *matching_segs
                .iter()
                .max_by_key(|&&idx| {
                    self.distal[cell].segments()[idx].compute_potential_activity(prev_active)
                })
                .unwrap();
            let seg = &mut self.distal[cell].segments_mut()[best_idx];
            seg.adapt_synapses(prev_active, cfg.perm_inc, cfg.perm_dec);
            seg.last_activated = created_at;
            let remaining = cfg.max_new_synapse_count.saturating_sub(seg.num_synapses());
            seg.add_synapses(
                prev_winner.active().iter().copied(),
                remaining,
                cfg.max_synapses_per_segment,
                cfg.initial_permanence,
                created_at,
            );
        } else if !prev_winner.active().is_empty() {
            let seg_idx = self.distal[cell].create_segment(created_at);
            let seg = &mut self.distal[cell].segments_mut()[seg_idx];
            seg.add_synapses(
                prev_winner.active().iter().copied(),
                cfg.max_new_synapse_count,
                cfg.max_synapses_per_segment,
                cfg.initial_permanence,
                created_at,
            );
        }
    }

    fn learn_modulatory(&mut self, cell: usize, target: SegmentTarget, prev_input: &Sdr) {
        let created_at = self.step;
        let cfg = &self.config;
        let mgrs = match target {
            SegmentTarget::Basal => self.basal.as_mut().unwrap(),
            SegmentTarget::Apical => self.apical.as_mut().unwrap(),
            SegmentTarget::Distal => unreachable!(),
        };
        let active_idx: Vec<usize> = mgrs[cell]
            .segments()
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.compute_activity(prev_input, cfg.connected_threshold) >= cfg.activation_threshold
            })
            .map(|(i, _)| i)
            .collect();
        if !active_idx.is_empty() {
            for idx in active_idx {
                let seg = &mut mgrs[cell].segments_mut()[idx];
                seg.adapt_synapses(prev_input, cfg.perm_inc, cfg.perm_dec);
                seg.last_activated = created_at;
            }
        } else if !prev_input.active().is_empty() {
            let seg_idx = mgrs[cell].create_segment(created_at);
            let seg = &mut mgrs[cell].segments_mut()[seg_idx];
            seg.add_synapses(
                prev_input.active().iter().copied(),
                cfg.max_new_synapse_count,
                cfg.max_synapses_per_segment,
                cfg.initial_permanence,
                created_at,
            );
        }
    }

    /// Capture learned segments and the two-timestep shadow state for
    /// persistence.
    pub fn snapshot(&self) -> crate::persist::TmState {
        crate::persist::TmState {
            config: self.config.clone(),
            distal: self.distal.iter().map(|m| m.segments().to_vec()).collect(),
            basal: self
                .basal
                .as_ref()
                .map(|mgrs| mgrs.iter().map(|m| m.segments().to_vec()).collect()),
            apical: self
                .apical
                .as_ref()
                .map(|mgrs| mgrs.iter().map(|m| m.segments().to_vec()).collect()),
            active: self.active.clone(),
            winner: self.winner.clone(),
            predictive: self.predictive.clone(),
            prev_active: self.prev_active.clone(),
            prev_winner: self.prev_winner.clone(),
            prev_predictive: self.prev_predictive.clone(),
            last_basal: self.last_basal.clone(),
            last_apical: self.last_apical.clone(),
            step: self.step,
        }
    }

    /// Rebuild a temporal memory from a snapshot, restoring learned
    /// segments and in-flight sequence state.
    pub fn restore(state: crate::persist::TmState) -> Result<Self> {
        let mut tm = Self::new(state.config)?;
        let (max_seg, max_syn) = (
            tm.config.max_segments_per_cell,
            tm.config.max_synapses_per_segment,
        );
        for (cell, segs) in state.distal.into_iter().enumerate() {
            tm.distal[cell] = SegmentManager::from_parts(cell as u32, SegmentKind::Distal, max_seg, max_syn, segs);
        }
        if let (Some(mgrs), Some(saved)) = (tm.basal.as_mut(), state.basal) {
            for (cell, segs) in saved.into_iter().enumerate() {
                mgrs[cell] = SegmentManager::from_parts(cell as u32, SegmentKind::Basal, max_seg, max_syn, segs);
            }
        }
        if let (Some(mgrs), Some(saved)) = (tm.apical.as_mut(), state.apical) {
            for (cell, segs) in saved.into_iter().enumerate() {
                mgrs[cell] = SegmentManager::from_parts(cell as u32, SegmentKind::Apical, max_seg, max_syn, segs);
            }
        }
        tm.active = state.active;
        tm.winner = state.winner;
        tm.predictive = state.predictive;
        tm.prev_active = state.prev_active;
        tm.prev_winner = state.prev_winner;
        tm.prev_predictive = state.prev_predictive;
        tm.last_basal = state.last_basal;
        tm.last_apical = state.last_apical;
        tm.step = state.step;
        Ok(tm)
    }

    /// Periodic per-cell segment maintenance across all configured segment roles.
    pub fn maintain(&mut self) {
        let (pt, mv) = (self.config.prune_threshold, self.config.min_viable);
        for mgr in self.distal.iter_mut() {
            mgr.maintain(pt, mv);
        }
        if let Some(mgrs) = self.basal.as_mut() {
            for mgr in mgrs.iter_mut() {
                mgr.maintain(pt, mv);
            }
        }
        if let Some(mgrs) = self.apical.as_mut() {
            for mgr in mgrs.iter_mut() {
                mgr.maintain(pt, mv);
            }
        }
        tracing::trace!(step = self.step, "temporal memory maintenance");
    }
}

#[derive(Clone, Copy, Debug)]
enum SegmentTarget {
    Distal,
    Basal,
    Apical,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns_sdr(column_count: usize, active: &[u32]) -> Sdr {
        Sdr::new(column_count, active)
    }

    #[test]
    fn test_empty_input_no_panic() {
        let cfg = TmConfig {
            column_count: 64,
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg).unwrap();
        let empty = Sdr::empty(64);
        let out = tm.compute(&empty, None, None, true).unwrap();
        assert_eq!(out.anomaly, 0.0);
        assert_eq!(out.active.num_active(), 0);
    }

    #[test]
    fn test_shape_mismatch() {
        let cfg = TmConfig {
            column_count: 64,
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg).unwrap();
        let bad = Sdr::new(10, &[1]);
        assert!(matches!(
            tm.compute(&bad, None, None, true),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_first_presentation_is_full_burst() {
        let cfg = TmConfig {
            column_count: 64,
            cells_per_column: 4,
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg.clone()).unwrap();
        let cols = columns_sdr(64, &[1, 2, 3]);
        let out = tm.compute(&cols, None, None, true).unwrap();
        assert_eq!(out.bursting_count, 3);
        assert_eq!(out.active.num_active(), 3 * cfg.cells_per_column);
        assert_eq!(out.winners.num_active(), 3);
    }

    #[test]
    fn test_sequence_learning_reduces_anomaly() {
        let cfg = TmConfig {
            column_count: 64,
            cells_per_column: 8,
            activation_threshold: 2,
            min_threshold: 1,
            max_new_synapse_count: 8,
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg).unwrap();
        let a = columns_sdr(64, &[1, 2, 3, 4]);
        let b = columns_sdr(64, &[10, 11, 12, 13]);
        let c = columns_sdr(64, &[20, 21, 22, 23]);
        let sequence = [&a, &b, &c];

        let mut last_b_anomaly = 1.0;
        for pass in 0..40 {
            for (i, cols) in sequence.iter().enumerate() {
                let out = tm.compute(cols, None, None, true).unwrap();
                if pass == 39 && i == 1 {
                    last_b_anomaly = out.anomaly;
                }
            }
        }
        assert!(last_b_anomaly < 1.0);
    }

    #[test]
    fn test_segment_bounds_respected() {
        let cfg = TmConfig {
            column_count: 16,
            cells_per_column: 4,
            max_segments_per_cell: 4,
            max_synapses_per_segment: 8,
            activation_threshold: 2,
            min_threshold: 1,
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg.clone()).unwrap();
        for step in 0..200u32 {
            let col = (step % 16) as u32;
            let cols = columns_sdr(16, &[col]);
            tm.compute(&cols, None, None, true).unwrap();
        }
        for mgr in tm.distal.iter() {
            assert!(mgr.num_segments() <= cfg.max_segments_per_cell);
            for seg in mgr.segments() {
                assert!(seg.num_synapses() <= cfg.max_synapses_per_segment);
            }
        }
    }

    #[test]
    fn test_reset_clears_transient_state() {
        let cfg = TmConfig {
            column_count: 32,
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg).unwrap();
        let cols = columns_sdr(32, &[1, 2, 3]);
        tm.compute(&cols, None, None, true).unwrap();
        tm.reset();
        assert_eq!(tm.active.num_active(), 0);
        assert_eq!(tm.predictive.num_active(), 0);
        // Idempotent.
        tm.reset();
        assert_eq!(tm.active.num_active(), 0);
    }

    #[test]
    fn predicted_column_winner_prefers_basal_and_apical_support() {
        let cfg = TmConfig {
            column_count: 1,
            cells_per_column: 3,
            activation_threshold: 1,
            min_threshold: 1,
            connected_threshold: 0.2,
            basal_size: Some(8),
            apical_size: Some(8),
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg).unwrap();

        // Every cell gets a distal segment that activates whenever cell 0
        // was active at the previous step, so all three end up predicted.
        for cell in 0..3usize {
            let seg_idx = tm.distal[cell].create_segment(0);
            tm.distal[cell].segments_mut()[seg_idx].add_synapses(std::iter::once(0u32), 1, 8, 0.9, 0);
        }
        // Cell 1: basal support only.
        let basal_mgrs = tm.basal.as_mut().unwrap();
        let seg_idx = basal_mgrs[1].create_segment(0);
        basal_mgrs[1].segments_mut()[seg_idx].add_synapses(std::iter::once(5u32), 1, 8, 0.9, 0);
        // Cell 2: both basal and apical support.
        let seg_idx = basal_mgrs[2].create_segment(0);
        basal_mgrs[2].segments_mut()[seg_idx].add_synapses(std::iter::once(5u32), 1, 8, 0.9, 0);
        let apical_mgrs = tm.apical.as_mut().unwrap();
        let seg_idx = apical_mgrs[2].create_segment(0);
        apical_mgrs[2].segments_mut()[seg_idx].add_synapses(std::iter::once(6u32), 1, 8, 0.9, 0);

        // First step bursts (nothing predicted yet) and leaves cell 0 active,
        // which is exactly what every distal segment above targets.
        tm.compute(&Sdr::new(1, &[0]), None, None, false).unwrap();

        let basal = Sdr::new(8, &[5]);
        let apical = Sdr::new(8, &[6]);
        let out = tm
            .compute(&Sdr::new(1, &[0]), Some(&basal), Some(&apical), false)
            .unwrap();

        // All three predicted cells stay active...
        assert_eq!(out.active.num_active(), 3);
        // ...but only the cell with both basal and apical support wins.
        assert_eq!(out.winners.active(), &[2]);
    }

    #[test]
    fn test_basal_modulation_does_not_panic() {
        let cfg = TmConfig {
            column_count: 32,
            cells_per_column: 4,
            basal_size: Some(50),
            ..Default::default()
        };
        let mut tm = TemporalMemory::new(cfg).unwrap();
        let cols = columns_sdr(32, &[1, 2]);
        let basal = Sdr::new(50, &[5, 6, 7]);
        let out = tm.compute(&cols, Some(&basal), None, true).unwrap();
        assert!(out.active.num_active() > 0);
    }
}
