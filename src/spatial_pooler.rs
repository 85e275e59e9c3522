//! Spatial Pooler — proximal inhibition, boosting, duty cycles, and
//! dead-column rescue over a topographic potential pool.
//!
//! Generalizes the teacher's `PatternPooler`/`BlockMemory::init_pooled`
//! (`examples/jacobeverist-gcf-core-rust/src/block_memory.rs`): the
//! teacher already subsamples a random potential pool per dendrite and
//! seeds permanences near threshold; this module adds a topographic
//! (rather than purely random) potential pool, global/local inhibition,
//! and the boost/duty-cycle homeostasis loop the teacher's pooler omits.

use crate::error::{CoreError, Result};
use crate::sdr::Sdr;
use crate::segment::{DendriteSegment, SegmentKind};
use crate::utils::{shuffle, shuffle_indices};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Inhibition strategy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Inhibition {
    /// Global top-k winners across all columns.
    Global,
    /// Column `c` wins against only the columns within `radius` of it
    /// (topographic, wrap-around 1D distance).
    Local { radius: usize },
}

/// Spatial Pooler configuration. Defaults mirror the normative values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpConfig {
    pub input_size: usize,
    pub column_count: usize,
    pub potential_radius: usize,
    pub potential_pct: f64,
    pub target_sparsity: f64,
    pub connected_threshold: f32,
    pub perm_inc: f32,
    pub perm_dec: f32,
    pub stimulus_threshold: u32,
    pub inhibition: Inhibition,
    pub boost_strength: f64,
    pub min_pct_overlap_duty_cycles: f64,
    pub duty_cycle_period: u32,
    pub seed: u64,
}

impl Default for SpConfig {
    fn default() -> Self {
        Self {
            input_size: 400,
            column_count: 2048,
            potential_radius: 200,
            potential_pct: 0.85,
            target_sparsity: 0.02,
            connected_threshold: 0.5,
            perm_inc: 0.05,
            perm_dec: 0.008,
            stimulus_threshold: 3,
            inhibition: Inhibition::Global,
            boost_strength: 3.0,
            min_pct_overlap_duty_cycles: 0.001,
            duty_cycle_period: 1000,
            seed: 42,
        }
    }
}

/// Wrap-around distance between two positions on a ring of size `n`.
fn wrap_distance(a: usize, b: usize, n: usize) -> usize {
    let d = if a > b { a - b } else { b - a };
    d.min(n - d)
}

/// Topographic center of column `c` mapped onto `[0, input_size)`.
fn topographic_center(c: usize, column_count: usize, input_size: usize) -> usize {
    ((c as u128 * input_size as u128) / column_count.max(1) as u128) as usize
}

/// Competitive spatial pooling over a proximal potential pool.
pub struct SpatialPooler {
    config: SpConfig,
    proximal: Vec<DendriteSegment>,
    active_duty_cycle: Vec<f64>,
    overlap_duty_cycle: Vec<f64>,
    boost_factor: Vec<f64>,
    neighborhoods: Vec<Vec<usize>>,
    rng: StdRng,
    step: u32,
}

const BOOST_FLOOR: f64 = 0.01;

impl SpatialPooler {
    pub fn new(config: SpConfig) -> Result<Self> {
        if config.target_sparsity <= 0.0 || config.target_sparsity > 1.0 {
            return Err(CoreError::InvalidArgument(format!(
                "target_sparsity must be in (0,1], got {}",
                config.target_sparsity
            )));
        }
        if config.boost_strength < 0.0 {
            return Err(CoreError::InvalidArgument(
                "boost_strength must be >= 0".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut proximal = Vec::with_capacity(config.column_count);

        for c in 0..config.column_count {
            let center = topographic_center(c, config.column_count, config.input_size);
            let mut pool: Vec<u32> = (0..config.input_size as u32)
                .filter(|&i| {
                    wrap_distance(i as usize, center, config.input_size) <= config.potential_radius
                })
                .collect();
            shuffle(&mut pool, pool.len(), &mut rng);
            let pool_size = ((pool.len() as f64) * config.potential_pct).round() as usize;
            pool.truncate(pool_size.max(1));

            let mut seg = DendriteSegment::new(c as u32, 0, SegmentKind::Proximal);
            let lo = (config.connected_threshold - 0.1).max(0.0);
            let hi = (config.connected_threshold + 0.1).min(1.0);
            let max_syn = pool.len();
            for &src in &pool {
                let perm = rng.gen_range(lo..=hi);
                seg.add_synapses(std::iter::once(src), 1, max_syn.max(1), perm, 0);
            }
            proximal.push(seg);
        }

        let neighborhoods = match config.inhibition {
            Inhibition::Global => Vec::new(),
            Inhibition::Local { radius } => (0..config.column_count)
                .map(|c| {
                    (0..config.column_count)
                        .filter(|&other| {
                            other != c
                                && wrap_distance(c, other, config.column_count) <= radius
                        })
                        .collect()
                })
                .collect(),
        };

        Ok(Self {
            active_duty_cycle: vec![0.0; config.column_count],
            overlap_duty_cycle: vec![0.0; config.column_count],
            boost_factor: vec![1.0; config.column_count],
            neighborhoods,
            proximal,
            config,
            rng,
            step: 0,
        })
    }

    pub fn config(&self) -> &SpConfig {
        &self.config
    }

    pub fn active_duty_cycle(&self) -> &[f64] {
        &self.active_duty_cycle
    }

    pub fn overlap_duty_cycle(&self) -> &[f64] {
        &self.overlap_duty_cycle
    }

    pub fn boost_factor(&self) -> &[f64] {
        &self.boost_factor
    }

    /// Capture learned proximal segments, homeostasis counters, and RNG
    /// stream for persistence.
    pub fn snapshot(&self) -> crate::persist::SpState {
        crate::persist::SpState {
            config: self.config.clone(),
            proximal: self.proximal.clone(),
            active_duty_cycle: self.active_duty_cycle.clone(),
            overlap_duty_cycle: self.overlap_duty_cycle.clone(),
            boost_factor: self.boost_factor.clone(),
            rng: self.rng.clone(),
            step: self.step,
        }
    }

    /// Rebuild a pooler from a snapshot; subsequent `compute` calls pick
    /// up exactly where the snapshotted instance would have.
    pub fn restore(state: crate::persist::SpState) -> Result<Self> {
        let mut sp = Self::new(state.config)?;
        sp.proximal = state.proximal;
        sp.active_duty_cycle = state.active_duty_cycle;
        sp.overlap_duty_cycle = state.overlap_duty_cycle;
        sp.boost_factor = state.boost_factor;
        sp.rng = state.rng;
        sp.step = state.step;
        Ok(sp)
    }

    /// One compute step: input SDR of `input_size` -> active-columns SDR
    /// of `column_count` at (approximately) `target_sparsity`.
    pub fn compute(&mut self, input: &Sdr, learn: bool) -> Result<Sdr> {
        if input.size() != self.config.input_size {
            return Err(CoreError::ShapeMismatch {
                expected: self.config.input_size,
                actual: input.size(),
            });
        }

        let raw_overlap: Vec<u32> = self
            .proximal
            .iter()
            .map(|seg| seg.compute_activity(input, self.config.connected_threshold))
            .collect();

        let overlap: Vec<u32> = raw_overlap
            .iter()
            .map(|&o| if o < self.config.stimulus_threshold { 0 } else { o })
            .collect();

        let boosted: Vec<f64> = overlap
            .iter()
            .zip(self.boost_factor.iter())
            .map(|(&o, &b)| o as f64 * b)
            .collect();

        let active_columns = match self.config.inhibition {
            Inhibition::Global => self.inhibit_global(&boosted),
            Inhibition::Local { .. } => self.inhibit_local(&boosted),
        };

        let active = Sdr::new(
            self.config.column_count,
            &active_columns.iter().map(|&c| c as u32).collect::<Vec<u32>>(),
        );

        if learn {
            for &c in &active_columns {
                self.proximal[c].adapt_synapses(input, self.config.perm_inc, self.config.perm_dec);
            }
            self.update_homeostasis(&active_columns, &raw_overlap);
        }

        self.step += 1;
        Ok(active)
    }

    fn inhibit_global(&mut self, boosted: &[f64]) -> Vec<usize> {
        let k = ((self.config.column_count as f64) * self.config.target_sparsity).ceil() as usize;
        let mut order: Vec<usize> = (0..self.config.column_count).collect();
        shuffle_indices(&mut order, &mut self.rng);
        order.sort_by(|&a, &b| {
            boosted[b]
                .partial_cmp(&boosted[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(k.min(order.len()));
        order.sort_unstable();
        order
    }

    fn inhibit_local(&self, boosted: &[f64]) -> Vec<usize> {
        let mut active = Vec::new();
        for c in 0..self.config.column_count {
            let neighbors = &self.neighborhoods[c];
            if neighbors.is_empty() {
                if boosted[c] > 0.0 {
                    active.push(c);
                }
                continue;
            }
            let winners_needed =
                ((neighbors.len() as f64) * self.config.target_sparsity).ceil() as usize;
            let greater = neighbors.iter().filter(|&&n| boosted[n] > boosted[c]).count();
            if greater < winners_needed.max(1) && boosted[c] > 0.0 {
                active.push(c);
            }
        }
        active
    }

    fn update_homeostasis(&mut self, active_columns: &[usize], raw_overlap: &[u32]) {
        let period = self.config.duty_cycle_period.max(1) as f64;
        let alpha = (period - 1.0) / period;
        let is_active: Vec<bool> = {
            let mut v = vec![false; self.config.column_count];
            for &c in active_columns {
                v[c] = true;
            }
            v
        };

        for c in 0..self.config.column_count {
            let active_ind = if is_active[c] { 1.0 } else { 0.0 };
            let overlap_ind = if raw_overlap[c] > 0 { 1.0 } else { 0.0 };
            self.active_duty_cycle[c] = alpha * self.active_duty_cycle[c] + (1.0 - alpha) * active_ind;
            self.overlap_duty_cycle[c] =
                alpha * self.overlap_duty_cycle[c] + (1.0 - alpha) * overlap_ind;
        }

        for c in 0..self.config.column_count {
            let target_duty = match self.config.inhibition {
                Inhibition::Global => self.config.target_sparsity,
                Inhibition::Local { .. } => {
                    let neighbors = &self.neighborhoods[c];
                    if neighbors.is_empty() {
                        self.config.target_sparsity
                    } else {
                        neighbors.iter().map(|&n| self.active_duty_cycle[n]).sum::<f64>()
                            / neighbors.len() as f64
                    }
                }
            }
            .max(BOOST_FLOOR);

            self.boost_factor[c] = (self.config.boost_strength
                * -(self.active_duty_cycle[c] - target_duty)
                / target_duty)
                .exp();
        }

        for c in 0..self.config.column_count {
            if self.overlap_duty_cycle[c] < self.config.min_pct_overlap_duty_cycles {
                self.proximal[c].bump_all_permanences(0.1 * self.config.connected_threshold);
                tracing::trace!(column = c, "boost rescue of dead column");
            }
        }
    }
}
