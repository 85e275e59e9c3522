//! Synapse / DendriteSegment / SegmentManager — the permanence-based
//! Hebbian substrate shared by every dendrite role (proximal, distal,
//! apical, basal).
//!
//! This generalizes the teacher's `BlockMemory` dendrite/receptor model
//! (`examples/jacobeverist-gcf-core-rust/src/block_memory.rs`): the
//! teacher gives every dendrite a *fixed* array of receptors with a
//! `u8` permanence on `[0,99]`; this spec needs an `f32` permanence on
//! `[0,1]`, a *growable* synapse list per segment, and a *bounded list
//! of segments* per cell with LRU eviction rather than one dendrite per
//! statelet. `compute_activity`/`adapt_synapses`/`punish_synapses` below
//! are the direct generalization of the teacher's `overlap`/`learn`/
//! `punish`.

use crate::sdr::Sdr;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Synaptic connectivity threshold default.
pub const DEFAULT_CONNECTED_THRESHOLD: f32 = 0.5;

fn clamp_permanence(p: f32) -> f32 {
    p.clamp(0.0, 1.0)
}

/// A single synapse: a presynaptic source index and its permanence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Synapse {
    pub presynaptic_index: u32,
    pub permanence: f32,
    pub created_at: u32,
}

impl Synapse {
    pub fn new(presynaptic_index: u32, permanence: f32, created_at: u32) -> Self {
        Self {
            presynaptic_index,
            permanence: clamp_permanence(permanence),
            created_at,
        }
    }

    #[inline]
    pub fn is_connected(&self, connected_threshold: f32) -> bool {
        self.permanence >= connected_threshold
    }

    #[inline]
    fn bump(&mut self, delta: f32) {
        self.permanence = clamp_permanence(self.permanence + delta);
    }
}

/// The four dendrite roles a `DendriteSegment` can serve. The structure
/// is identical across roles; only where it attaches and what signal it
/// consumes differs (callers are responsible for feeding the right
/// presynaptic active set).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    Proximal,
    Distal,
    Apical,
    Basal,
}

/// A dendrite branch: a bounded, duplicate-free (by presynaptic index)
/// list of synapses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DendriteSegment {
    pub cell_index: u32,
    pub created_at: u32,
    pub last_activated: u32,
    pub kind: SegmentKind,
    synapses: Vec<Synapse>,
}

impl DendriteSegment {
    pub fn new(cell_index: u32, created_at: u32, kind: SegmentKind) -> Self {
        Self {
            cell_index,
            created_at,
            last_activated: created_at,
            kind,
            synapses: Vec::new(),
        }
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    /// Connected activity: count of synapses whose permanence is
    /// connected and whose source is in `active`.
    pub fn compute_activity(&self, active: &Sdr, connected_threshold: f32) -> u32 {
        self.synapses
            .iter()
            .filter(|s| s.is_connected(connected_threshold) && active.contains(s.presynaptic_index))
            .count() as u32
    }

    /// Potential activity: count of any synapse (regardless of
    /// permanence) whose source is in `active`.
    pub fn compute_potential_activity(&self, active: &Sdr) -> u32 {
        self.synapses
            .iter()
            .filter(|s| active.contains(s.presynaptic_index))
            .count() as u32
    }

    /// Hebbian update: increment synapses whose source is active,
    /// decrement the rest.
    pub fn adapt_synapses(&mut self, active: &Sdr, inc: f32, dec: f32) {
        for s in self.synapses.iter_mut() {
            if active.contains(s.presynaptic_index) {
                s.bump(inc);
            } else {
                s.bump(-dec);
            }
        }
    }

    /// Increment synapses whose source is in `reward`, decrement those
    /// whose source is in `punish`; synapses connected to neither are
    /// left untouched. Used by the column pooler, where decay is scoped
    /// to the feedforward set rather than applied everywhere.
    pub fn adapt_distinct(&mut self, reward: &Sdr, punish: &Sdr, inc: f32, dec: f32) {
        for s in self.synapses.iter_mut() {
            if reward.contains(s.presynaptic_index) {
                s.bump(inc);
            } else if punish.contains(s.presynaptic_index) {
                s.bump(-dec);
            }
        }
    }

    /// Decrement only the synapses whose source is active (used to
    /// punish an incorrect prediction).
    pub fn punish_synapses(&mut self, active: &Sdr, dec: f32) {
        for s in self.synapses.iter_mut() {
            if active.contains(s.presynaptic_index) {
                s.bump(-dec);
            }
        }
    }

    /// Grow new synapses from `candidates`, skipping sources already
    /// present, clipping the segment to `max_synapses` by discarding the
    /// lowest-permanence entries first.
    pub fn add_synapses(
        &mut self,
        candidates: impl Iterator<Item = u32>,
        max_new: usize,
        max_synapses: usize,
        init_perm: f32,
        created_at: u32,
    ) {
        let existing: std::collections::HashSet<u32> =
            self.synapses.iter().map(|s| s.presynaptic_index).collect();
        let mut added = 0;
        for src in candidates {
            if added >= max_new {
                break;
            }
            if existing.contains(&src) {
                continue;
            }
            self.synapses
                .push(Synapse::new(src, init_perm, created_at));
            added += 1;
        }
        if self.synapses.len() > max_synapses {
            self.synapses
                .sort_by(|a, b| b.permanence.partial_cmp(&a.permanence).unwrap_or(Ordering::Equal));
            self.synapses.truncate(max_synapses);
            self.synapses.sort_by_key(|s| s.presynaptic_index);
        }
    }

    /// Clamp-increment every permanence (SP's dead-column rescue).
    pub fn bump_all_permanences(&mut self, delta: f32) {
        for s in self.synapses.iter_mut() {
            s.bump(delta);
        }
    }

    /// Remove synapses below `prune_threshold`. Returns surviving count.
    pub fn prune(&mut self, prune_threshold: f32) -> usize {
        self.synapses.retain(|s| s.permanence >= prune_threshold);
        self.synapses.len()
    }
}

/// Bounded list of segments for one cell, with LRU eviction and
/// periodic maintenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentManager {
    pub cell_index: u32,
    kind: SegmentKind,
    max_segments_per_cell: usize,
    max_synapses_per_segment: usize,
    segments: Vec<DendriteSegment>,
}

impl SegmentManager {
    pub fn new(
        cell_index: u32,
        kind: SegmentKind,
        max_segments_per_cell: usize,
        max_synapses_per_segment: usize,
    ) -> Self {
        Self {
            cell_index,
            kind,
            max_segments_per_cell,
            max_synapses_per_segment,
            segments: Vec::new(),
        }
    }

    pub fn segments(&self) -> &[DendriteSegment] {
        &self.segments
    }

    /// Rebuild a manager directly from persisted segments, bypassing the
    /// LRU-eviction path `create_segment` would otherwise apply.
    pub fn from_parts(
        cell_index: u32,
        kind: SegmentKind,
        max_segments_per_cell: usize,
        max_synapses_per_segment: usize,
        segments: Vec<DendriteSegment>,
    ) -> Self {
        Self {
            cell_index,
            kind,
            max_segments_per_cell,
            max_synapses_per_segment,
            segments,
        }
    }

    pub fn segments_mut(&mut self) -> &mut [DendriteSegment] {
        &mut self.segments
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn max_synapses_per_segment(&self) -> usize {
        self.max_synapses_per_segment
    }

    /// Create a new segment, evicting the least-recently-activated one
    /// if at capacity.
    pub fn create_segment(&mut self, created_at: u32) -> usize {
        if self.segments.len() >= self.max_segments_per_cell {
            let evict_idx = self
                .segments
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.last_activated)
                .map(|(i, _)| i)
                .unwrap();
            self.segments.remove(evict_idx);
            tracing::trace!(cell = self.cell_index, "evicted LRU segment at capacity");
        }
        self.segments
            .push(DendriteSegment::new(self.cell_index, created_at, self.kind));
        self.segments.len() - 1
    }

    /// Prune sub-threshold synapses in every segment; remove segments
    /// whose surviving synapse count drops below `min_viable`. Returns
    /// `(segments_removed, synapses_pruned)` — maintenance is infallible
    /// and reports counts, never errors.
    pub fn maintain(&mut self, prune_threshold: f32, min_viable: usize) -> (usize, usize) {
        let mut synapses_pruned = 0usize;
        for seg in self.segments.iter_mut() {
            let before = seg.num_synapses();
            seg.prune(prune_threshold);
            synapses_pruned += before - seg.num_synapses();
        }
        let before = self.segments.len();
        self.segments.retain(|s| s.num_synapses() >= min_viable);
        let segments_removed = before - self.segments.len();
        if segments_removed > 0 {
            tracing::trace!(
                cell = self.cell_index,
                segments_removed,
                synapses_pruned,
                "segment maintenance"
            );
        }
        (segments_removed, synapses_pruned)
    }
}
