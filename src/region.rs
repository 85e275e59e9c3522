//! Cortical region: a population of independent columns sensing the
//! same object, voting to a shared consensus via lateral narrowing.
//!
//! Phase 1 (per-column compute) has no shared mutable state across
//! columns, so it parallelizes the way the teacher's batch blocks
//! parallelize independent rows — here with `rayon` rather than the
//! teacher's single-threaded block graph, since this system explicitly
//! calls for cross-column parallelism where the teacher never had more
//! than one block executing at a time.

use crate::cortical_column::{ColumnOutput, CorticalColumn, SensoryInput};
use crate::error::Result;
use crate::sdr::Sdr;
use rayon::prelude::*;

/// Region configuration. Defaults mirror the normative values.
#[derive(Clone, Copy, Debug)]
pub struct RegionConfig {
    pub vote_threshold: f64,
    pub convergence_threshold: f64,
    pub max_voting_iterations: u32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            vote_threshold: 0.3,
            convergence_threshold: 0.7,
            max_voting_iterations: 10,
        }
    }
}

/// Output of one `CorticalRegion::process`/`settle` call.
#[derive(Clone, Debug)]
pub struct RegionOutput {
    pub column_outputs: Vec<ColumnOutput>,
    pub consensus: Sdr,
    pub converged: bool,
    pub iterations: u32,
}

/// A population of columns sensing the same object in parallel.
pub struct CorticalRegion {
    config: RegionConfig,
    columns: Vec<CorticalColumn>,
    object_size: usize,
    pending_apical: Option<Sdr>,
    last_outputs: Vec<ColumnOutput>,
}

impl CorticalRegion {
    pub fn new(config: RegionConfig, columns: Vec<CorticalColumn>, object_size: usize) -> Self {
        Self {
            config,
            columns,
            object_size,
            pending_apical: None,
            last_outputs: Vec::new(),
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn receive_hierarchical_feedback(&mut self, feedback: &Sdr) {
        self.pending_apical = Some(feedback.clone());
    }

    pub fn reset(&mut self) {
        for col in self.columns.iter_mut() {
            col.reset();
        }
        self.pending_apical = None;
        self.last_outputs.clear();
    }

    /// Sensory samples, one per column (same length as `columns`).
    pub fn process(&mut self, sensory: &[SensoryInput], learn: bool) -> Result<RegionOutput> {
        if let Some(feedback) = self.pending_apical.take() {
            for col in self.columns.iter_mut() {
                col.receive_apical(&feedback);
            }
        }

        let outputs: Vec<Result<ColumnOutput>> = self
            .columns
            .par_iter_mut()
            .zip(sensory.par_iter())
            .map(|(col, input)| col.compute(input, learn))
            .collect();
        self.last_outputs = outputs.into_iter().collect::<Result<Vec<_>>>()?;

        self.vote_to_convergence()
    }

    /// Repeats only the voting loop with the current column states —
    /// no new sensory input, no column recompute.
    pub fn settle(&mut self) -> Result<RegionOutput> {
        self.vote_to_convergence()
    }

    fn vote_to_convergence(&mut self) -> Result<RegionOutput> {
        let n_columns = self.columns.len();
        let mut converged = false;
        let mut iterations = 0u32;
        let mut consensus = self.compute_consensus();

        for _ in 0..self.config.max_voting_iterations {
            iterations += 1;
            let peers: Vec<(usize, Sdr)> = self
                .columns
                .iter()
                .enumerate()
                .map(|(i, col)| (i, col.object_sdr().clone()))
                .collect();

            for col in self.columns.iter_mut() {
                col.apply_lateral_narrowing(&peers)?;
            }

            consensus = self.compute_consensus();
            converged = self.mean_pairwise_match()? >= self.config.convergence_threshold;
            if converged {
                break;
            }
        }

        if !converged {
            tracing::trace!(iterations, n_columns, "region failed to converge");
        } else {
            tracing::trace!(iterations, "region converged");
        }

        // Feed each column the rest of the region's converged object-SDRs
        // as next-call lateral input, so lateral-distal segments actually
        // grow/adapt against peer activity instead of only ever being
        // read by `apply_lateral_narrowing`.
        let final_peers: Vec<(usize, Sdr)> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| (i, col.object_sdr().clone()))
            .collect();
        for (i, col) in self.columns.iter_mut().enumerate() {
            let peers_for_col: Vec<(usize, Sdr)> = final_peers
                .iter()
                .filter(|(peer_id, _)| *peer_id != i)
                .cloned()
                .collect();
            col.receive_lateral(&peers_for_col);
        }

        // Real per-column activations/predictions/anomaly come from the
        // last Phase-1 compute; only `object_sdr` is refreshed here, since
        // voting can narrow it without re-running SP/TM.
        let column_outputs = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let mut out = self.last_outputs.get(i).cloned().unwrap_or_else(|| ColumnOutput {
                    active_columns: Sdr::empty(1),
                    tm_active: Sdr::empty(1),
                    tm_winners: Sdr::empty(1),
                    tm_predicted: Sdr::empty(1),
                    anomaly: 0.0,
                    object_sdr: Sdr::empty(1),
                    is_novel: false,
                });
                out.object_sdr = col.object_sdr().clone();
                out
            })
            .collect();

        Ok(RegionOutput {
            column_outputs,
            consensus,
            converged,
            iterations,
        })
    }

    /// Bits supported by `>= vote_threshold * N_columns` columns,
    /// capped at `object_size` by support count.
    fn compute_consensus(&self) -> Sdr {
        let n_columns = self.columns.len().max(1) as f64;
        let needed = (self.config.vote_threshold * n_columns).ceil() as usize;

        let mut support = vec![0usize; self.object_size];
        for col in &self.columns {
            for &bit in col.object_sdr().active() {
                if (bit as usize) < self.object_size {
                    support[bit as usize] += 1;
                }
            }
        }

        let mut candidates: Vec<(usize, usize)> = support
            .into_iter()
            .enumerate()
            .filter(|&(_, count)| count >= needed.max(1))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.truncate(self.object_size);

        let active: Vec<u32> = candidates.into_iter().map(|(bit, _)| bit as u32).collect();
        Sdr::new(self.object_size, &active)
    }

    fn mean_pairwise_match(&self) -> Result<f64> {
        let n = self.columns.len();
        if n < 2 {
            return Ok(1.0);
        }
        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                total += Sdr::match_score(self.columns[i].object_sdr(), self.columns[j].object_sdr())?;
                pairs += 1;
            }
        }
        Ok(total / pairs as f64)
    }
}
