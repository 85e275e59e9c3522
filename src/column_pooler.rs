//! Column Pooler — the L2/3 object layer. Produces a stable sparse
//! object representation with inertia, born-connected one-shot
//! learning, and lateral narrowing driven by peer votes.
//!
//! Grounded in the same permanence substrate the teacher's
//! `BlockMemory` established (`examples/jacobeverist-gcf-core-rust/src/block_memory.rs`),
//! but the candidate-selection priority tiers (feedforward+lateral,
//! inertia, feedforward-only, random seed) and apical promotion below
//! have no teacher analogue and are built directly from this module's
//! own contract.

use crate::error::{CoreError, Result};
use crate::sdr::Sdr;
use crate::segment::{DendriteSegment, SegmentKind};
use crate::utils::shuffle;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column Pooler configuration. Defaults mirror the normative values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CpConfig {
    pub cell_count: usize,
    pub sdr_size: usize,
    pub initial_proximal_permanence: f32,
    pub connected_proximal: f32,
    pub prox_inc: f32,
    pub prox_dec: f32,
    pub sample_size_proximal: usize,
    pub min_threshold_proximal: u32,
    pub initial_distal_permanence: f32,
    pub distal_activation_threshold: u32,
    pub inertia_factor: f64,
    pub agreement_threshold: f64,
    pub min_narrowed_size: usize,
    pub max_segments_per_cell: usize,
    pub max_synapses_per_segment: usize,
    pub seed: u64,
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            cell_count: 4096,
            sdr_size: 40,
            initial_proximal_permanence: 0.6,
            connected_proximal: 0.5,
            prox_inc: 0.1,
            prox_dec: 0.001,
            sample_size_proximal: 20,
            min_threshold_proximal: 10,
            initial_distal_permanence: 0.6,
            distal_activation_threshold: 13,
            inertia_factor: 1.0,
            agreement_threshold: 0.5,
            min_narrowed_size: 20,
            max_segments_per_cell: 16,
            max_synapses_per_segment: 128,
            seed: 42,
        }
    }
}

/// Output of one `ColumnPooler::compute` call.
#[derive(Clone, Debug)]
pub struct CpOutput {
    pub representation: Sdr,
    pub overlap_prev: usize,
    pub ff_activated: usize,
    pub inertia_retained: usize,
    pub is_novel: bool,
}

struct RankedCell {
    cell: usize,
    lateral_count: u32,
    ff_overlap: u32,
    apical: bool,
}

/// Stable object-layer representation over `cell_count` cells.
pub struct ColumnPooler {
    config: CpConfig,
    proximal: Vec<DendriteSegment>,
    internal_distal: Vec<DendriteSegment>,
    lateral: Vec<HashMap<usize, DendriteSegment>>,
    apical: Vec<DendriteSegment>,
    active_cells: Sdr,
    prev_active_cells: Sdr,
    rng: StdRng,
    step: u32,
}

impl ColumnPooler {
    pub fn new(config: CpConfig) -> Result<Self> {
        if config.sdr_size == 0 || config.sdr_size > config.cell_count {
            return Err(CoreError::InvalidArgument(format!(
                "sdr_size must be in (0, cell_count], got {} / {}",
                config.sdr_size, config.cell_count
            )));
        }
        let proximal = (0..config.cell_count)
            .map(|c| DendriteSegment::new(c as u32, 0, SegmentKind::Proximal))
            .collect();
        let internal_distal = (0..config.cell_count)
            .map(|c| DendriteSegment::new(c as u32, 0, SegmentKind::Distal))
            .collect();
        let apical = (0..config.cell_count)
            .map(|c| DendriteSegment::new(c as u32, 0, SegmentKind::Apical))
            .collect();
        let lateral = (0..config.cell_count).map(|_| HashMap::new()).collect();

        Ok(Self {
            active_cells: Sdr::empty(config.cell_count),
            prev_active_cells: Sdr::empty(config.cell_count),
            rng: StdRng::seed_from_u64(config.seed),
            proximal,
            internal_distal,
            lateral,
            apical,
            step: 0,
            config,
        })
    }

    pub fn config(&self) -> &CpConfig {
        &self.config
    }

    pub fn representation(&self) -> &Sdr {
        &self.active_cells
    }

    /// Capture learned segments, active/previous sets, and RNG stream
    /// for persistence.
    pub fn snapshot(&self) -> crate::persist::CpState {
        crate::persist::CpState {
            config: self.config.clone(),
            proximal: self.proximal.clone(),
            internal_distal: self.internal_distal.clone(),
            apical: self.apical.clone(),
            lateral: self
                .lateral
                .iter()
                .map(|peers| peers.iter().map(|(k, v)| (*k, v.clone())).collect())
                .collect(),
            active_cells: self.active_cells.clone(),
            prev_active_cells: self.prev_active_cells.clone(),
            rng: self.rng.clone(),
            step: self.step,
        }
    }

    /// Rebuild a column pooler from a snapshot; subsequent `compute`
    /// calls pick up exactly where the snapshotted instance would have.
    pub fn restore(state: crate::persist::CpState) -> Result<Self> {
        let mut cp = Self::new(state.config)?;
        cp.proximal = state.proximal;
        cp.internal_distal = state.internal_distal;
        cp.apical = state.apical;
        cp.lateral = state
            .lateral
            .into_iter()
            .map(|peers| peers.into_iter().collect())
            .collect();
        cp.active_cells = state.active_cells;
        cp.prev_active_cells = state.prev_active_cells;
        cp.rng = state.rng;
        cp.step = state.step;
        Ok(cp)
    }

    /// Object reset: clears both activation sets. Per spec, inertia must
    /// not survive across unrelated objects.
    pub fn reset(&mut self) {
        self.active_cells = Sdr::empty(self.config.cell_count);
        self.prev_active_cells = Sdr::empty(self.config.cell_count);
    }

    pub fn compute(
        &mut self,
        feedforward: &Sdr,
        growth_candidates: &Sdr,
        lateral_inputs: Option<&[(usize, Sdr)]>,
        apical: Option<&Sdr>,
        learn: bool,
    ) -> Result<CpOutput> {
        let n = self.config.cell_count;

        let ff_overlap: Vec<u32> = self
            .proximal
            .iter()
            .map(|seg| seg.compute_activity(feedforward, self.config.connected_proximal))
            .collect();
        let ff_supported: Vec<bool> = ff_overlap
            .iter()
            .map(|&o| o >= self.config.min_threshold_proximal)
            .collect();

        let internal_active: Vec<bool> = self
            .internal_distal
            .iter()
            .map(|seg| {
                seg.compute_activity(&self.prev_active_cells, self.config.connected_proximal)
                    >= self.config.distal_activation_threshold
            })
            .collect();

        let mut lateral_count = vec![0u32; n];
        for cell in 0..n {
            if internal_active[cell] {
                lateral_count[cell] += 1;
            }
        }
        if let Some(peers) = lateral_inputs {
            for cell in 0..n {
                for (peer_id, peer_active) in peers {
                    if let Some(seg) = self.lateral[cell].get(peer_id) {
                        if seg.compute_activity(peer_active, self.config.connected_proximal)
                            >= self.config.distal_activation_threshold
                        {
                            lateral_count[cell] += 1;
                        }
                    }
                }
            }
        }

        let apical_support: Vec<bool> = (0..n)
            .map(|cell| {
                apical
                    .map(|a| {
                        self.apical[cell].compute_activity(a, self.config.connected_proximal)
                            >= self.config.distal_activation_threshold
                    })
                    .unwrap_or(false)
            })
            .collect();

        let mut chosen: Vec<usize> = Vec::with_capacity(self.config.sdr_size);
        let mut chosen_set = vec![false; n];

        // P1: feedforward-supported AND >=1 active lateral segment.
        let mut p1: Vec<RankedCell> = (0..n)
            .filter(|&c| ff_supported[c] && lateral_count[c] > 0)
            .map(|c| RankedCell {
                cell: c,
                lateral_count: lateral_count[c],
                ff_overlap: ff_overlap[c],
                apical: apical_support[c],
            })
            .collect();
        p1.sort_by(|a, b| {
            (b.apical, b.lateral_count, b.ff_overlap).cmp(&(a.apical, a.lateral_count, a.ff_overlap))
        });
        for r in p1 {
            if chosen.len() >= self.config.sdr_size {
                break;
            }
            chosen.push(r.cell);
            chosen_set[r.cell] = true;
        }
        let p1_count = chosen.len();

        // P2: inertia carry, capped.
        if chosen.len() < self.config.sdr_size {
            let cap = ((self.config.sdr_size as f64) * self.config.inertia_factor).floor() as usize;
            let mut p2: Vec<RankedCell> = self
                .prev_active_cells
                .active()
                .iter()
                .map(|&c| c as usize)
                .filter(|&c| !chosen_set[c] && (lateral_count[c] > 0 || ff_supported[c]))
                .map(|c| RankedCell {
                    cell: c,
                    lateral_count: lateral_count[c],
                    ff_overlap: ff_overlap[c],
                    apical: apical_support[c],
                })
                .collect();
            p2.sort_by(|a, b| {
                (b.apical, b.lateral_count, b.ff_overlap)
                    .cmp(&(a.apical, a.lateral_count, a.ff_overlap))
            });
            p2.truncate(cap);
            for r in p2 {
                if chosen.len() >= self.config.sdr_size {
                    break;
                }
                chosen.push(r.cell);
                chosen_set[r.cell] = true;
            }
        }
        let p2_count = chosen.len() - p1_count;

        // P3: feedforward-only, descending overlap.
        if chosen.len() < self.config.sdr_size {
            let mut p3: Vec<RankedCell> = (0..n)
                .filter(|&c| !chosen_set[c] && ff_supported[c])
                .map(|c| RankedCell {
                    cell: c,
                    lateral_count: lateral_count[c],
                    ff_overlap: ff_overlap[c],
                    apical: apical_support[c],
                })
                .collect();
            p3.sort_by(|a, b| (b.apical, b.ff_overlap).cmp(&(a.apical, a.ff_overlap)));
            for r in p3 {
                if chosen.len() >= self.config.sdr_size {
                    break;
                }
                chosen.push(r.cell);
                chosen_set[r.cell] = true;
            }
        }
        let p3_count = chosen.len() - p1_count - p2_count;

        // P4: random fill.
        if chosen.len() < self.config.sdr_size {
            let mut remaining: Vec<u32> = (0..n as u32).filter(|&c| !chosen_set[c as usize]).collect();
            let rlen = remaining.len();
            shuffle(&mut remaining, rlen, &mut self.rng);
            for c in remaining {
                if chosen.len() >= self.config.sdr_size {
                    break;
                }
                chosen.push(c as usize);
                chosen_set[c as usize] = true;
            }
        }

        let is_novel = p1_count == 0 && p2_count == 0 && p3_count == 0;

        let new_active = Sdr::new(n, &chosen.iter().map(|&c| c as u32).collect::<Vec<u32>>());
        let overlap_prev = Sdr::overlap(&new_active, &self.prev_active_cells)?;
        let ff_activated = chosen.iter().filter(|&&c| ff_supported[c]).count();
        let inertia_retained = p2_count;

        if learn {
            let ff_minus_growth = Sdr::except(feedforward, growth_candidates)?;
            let created_at = self.step;
            for &cell in &chosen {
                let seg = &mut self.proximal[cell];
                seg.adapt_distinct(
                    growth_candidates,
                    &ff_minus_growth,
                    self.config.prox_inc,
                    self.config.prox_dec,
                );
                seg.add_synapses(
                    growth_candidates.active().iter().copied(),
                    self.config.sample_size_proximal,
                    self.config.max_synapses_per_segment,
                    self.config.initial_proximal_permanence,
                    created_at,
                );

                let dseg = &mut self.internal_distal[cell];
                dseg.adapt_synapses(&self.prev_active_cells, self.config.prox_inc, 0.0);
                dseg.add_synapses(
                    self.prev_active_cells.active().iter().copied(),
                    self.config.sample_size_proximal,
                    self.config.max_synapses_per_segment,
                    self.config.initial_distal_permanence,
                    created_at,
                );

                if let Some(peers) = lateral_inputs {
                    for (peer_id, peer_active) in peers {
                        let lseg = self.lateral[cell].entry(*peer_id).or_insert_with(|| {
                            DendriteSegment::new(cell as u32, created_at, SegmentKind::Distal)
                        });
                        lseg.adapt_synapses(peer_active, self.config.prox_inc, 0.0);
                        lseg.add_synapses(
                            peer_active.active().iter().copied(),
                            self.config.sample_size_proximal,
                            self.config.max_synapses_per_segment,
                            self.config.initial_distal_permanence,
                            created_at,
                        );
                    }
                }
            }
        }

        self.prev_active_cells = self.active_cells.clone();
        self.active_cells = new_active.clone();
        self.step += 1;

        if is_novel {
            tracing::trace!(step = self.step, "column pooler seeded a novel object");
        }

        Ok(CpOutput {
            representation: new_active,
            overlap_prev,
            ff_activated,
            inertia_retained,
            is_novel,
        })
    }

    /// Lateral narrowing: intersect the current active set with cells
    /// supported by a qualifying fraction of peer votes. Does not rerun
    /// proximal input or learn.
    pub fn apply_lateral_narrowing(&mut self, peer_active_sets: &[(usize, Sdr)]) -> Result<Sdr> {
        let n_peers = peer_active_sets.len();
        let needed = ((n_peers as f64) * self.config.agreement_threshold).ceil() as usize;

        let mut support: HashMap<usize, usize> = HashMap::new();
        for &cell in self.active_cells.active() {
            let cell = cell as usize;
            let mut count = 0;
            for (peer_id, peer_active) in peer_active_sets {
                if let Some(seg) = self.lateral[cell].get(peer_id) {
                    if seg.compute_activity(peer_active, self.config.connected_proximal)
                        >= self.config.distal_activation_threshold
                    {
                        count += 1;
                    }
                }
            }
            support.insert(cell, count);
        }

        let mut survivors: Vec<usize> = support
            .iter()
            .filter(|&(_, &count)| count >= needed.max(1).min(n_peers.max(1)))
            .map(|(&cell, _)| cell)
            .collect();

        if survivors.len() < self.config.min_narrowed_size {
            let mut ranked: Vec<(usize, usize)> = support.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            survivors = ranked
                .into_iter()
                .take(self.config.min_narrowed_size.min(self.active_cells.num_active()))
                .map(|(cell, _)| cell)
                .collect();
        }

        let narrowed = Sdr::new(
            self.config.cell_count,
            &survivors.iter().map(|&c| c as u32).collect::<Vec<u32>>(),
        );
        self.prev_active_cells = self.active_cells.clone();
        self.active_cells = narrowed.clone();
        Ok(narrowed)
    }
}
