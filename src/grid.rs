//! Grid cell module and displacement module — hexagonal periodic
//! location representation, path integration, and landmark anchoring.
//!
//! Nothing in the teacher repo models continuous geometry; this module
//! is built directly from the spatial contract in this system's design
//! (hexagonal axial coordinates, toroidal wrap, Gaussian activation
//! bumps), using the same `Sdr`/`rand::rngs::StdRng` building blocks the
//! rest of the crate is built from.

use crate::error::{CoreError, Result};
use crate::sdr::Sdr;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Grid cell module configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    pub module_size: usize,
    pub scale: f64,
    pub orientation: f64,
    pub sigma_noise: f64,
    pub sigma_bump: f64,
    pub active_count: usize,
    pub anchor_overlap_threshold: f64,
    pub clear_anchors_on_reset: bool,
    pub seed: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            module_size: 40,
            scale: 1.0,
            orientation: 0.0,
            sigma_noise: 0.05,
            sigma_bump: 1.2,
            active_count: 10,
            anchor_overlap_threshold: 0.5,
            clear_anchors_on_reset: false,
            seed: 42,
        }
    }
}

fn wrap(x: f64, n: f64) -> f64 {
    x.rem_euclid(n)
}

/// Toroidal axial displacement with minimal absolute magnitude.
fn wrapped_delta(d: f64, n: f64) -> f64 {
    let d = d.rem_euclid(n);
    if d > n / 2.0 {
        d - n
    } else {
        d
    }
}

/// Squared hex distance in axial coordinates: `d^2 = 3(dq^2 + dq*dr + dr^2)`.
fn hex_dist2(dq: f64, dr: f64) -> f64 {
    3.0 * (dq * dq + dq * dr + dr * dr)
}

fn index_to_axial(idx: usize, module_size: usize) -> (f64, f64) {
    ((idx / module_size) as f64, (idx % module_size) as f64)
}

/// Render a Gaussian activation bump of `active_count` cells centered at
/// `(center_q, center_r)` on a `module_size x module_size` toroidal lattice.
fn gaussian_bump_sdr(module_size: usize, center_q: f64, center_r: f64, sigma_bump: f64, active_count: usize) -> Sdr {
    let n = module_size * module_size;
    let mut scored: Vec<(f64, u32)> = (0..n)
        .map(|idx| {
            let (q, r) = index_to_axial(idx, module_size);
            let dq = wrapped_delta(q - center_q, module_size as f64);
            let dr = wrapped_delta(r - center_r, module_size as f64);
            let d2 = hex_dist2(dq, dr);
            let activation = (-d2 / (2.0 * sigma_bump * sigma_bump)).exp();
            (activation, idx as u32)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(active_count);
    let active: Vec<u32> = scored.into_iter().map(|(_, idx)| idx).collect();
    Sdr::new(n, &active)
}

/// Circular-mean centroid of an SDR's active hex cells on the torus.
fn circular_mean_centroid(sdr: &Sdr, module_size: usize) -> (f64, f64) {
    if sdr.num_active() == 0 {
        return (0.0, 0.0);
    }
    let n = module_size as f64;
    let (mut sq_sin, mut sq_cos, mut sr_sin, mut sr_cos) = (0.0, 0.0, 0.0, 0.0);
    for &idx in sdr.active() {
        let (q, r) = index_to_axial(idx as usize, module_size);
        let theta_q = 2.0 * PI * q / n;
        let theta_r = 2.0 * PI * r / n;
        sq_sin += theta_q.sin();
        sq_cos += theta_q.cos();
        sr_sin += theta_r.sin();
        sr_cos += theta_r.cos();
    }
    let mean_q = wrap(sq_sin.atan2(sq_cos) / (2.0 * PI) * n, n);
    let mean_r = wrap(sr_sin.atan2(sr_cos) / (2.0 * PI) * n, n);
    (mean_q, mean_r)
}

/// A single grid-cell module: continuous axial position, path
/// integration with noise, and sensory anchoring.
pub struct GridCellModule {
    config: GridConfig,
    q: f64,
    r: f64,
    rot_cos: f64,
    rot_sin: f64,
    anchors: Vec<(Sdr, f64, f64)>,
    rng: StdRng,
}

impl GridCellModule {
    pub fn new(config: GridConfig) -> Result<Self> {
        if config.module_size == 0 {
            return Err(CoreError::InvalidArgument("module_size must be > 0".into()));
        }
        if config.scale <= 0.0 {
            return Err(CoreError::InvalidArgument("scale must be > 0".into()));
        }
        Ok(Self {
            rot_cos: config.orientation.cos(),
            rot_sin: config.orientation.sin(),
            q: 0.0,
            r: 0.0,
            anchors: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
        })
    }

    pub fn position(&self) -> (f64, f64) {
        (self.q, self.r)
    }

    /// Path-integrate a motor displacement `(dx, dy)`.
    pub fn move_by(&mut self, dx: f64, dy: f64) {
        let xp = dx * self.rot_cos + dy * self.rot_sin;
        let yp = -dx * self.rot_sin + dy * self.rot_cos;
        let (xp, yp) = (xp / self.config.scale, yp / self.config.scale);

        let noise = Normal::new(0.0, self.config.sigma_noise).unwrap();
        let dq = xp + noise.sample(&mut self.rng);
        let dr = yp + noise.sample(&mut self.rng);

        self.q = wrap(self.q + dq, self.config.module_size as f64);
        self.r = wrap(self.r + dr, self.config.module_size as f64);
    }

    /// Current location as a Gaussian-bump SDR of size `module_size^2`.
    pub fn current_location(&self) -> Sdr {
        gaussian_bump_sdr(
            self.config.module_size,
            self.q,
            self.r,
            self.config.sigma_bump,
            self.config.active_count,
        )
    }

    /// Snap position to a matching anchor, or append a new one.
    /// Returns `true` if an existing anchor matched.
    pub fn anchor(&mut self, sensory_sdr: &Sdr) -> Result<bool> {
        let mut best: Option<(f64, usize)> = None;
        for (i, (pattern, _, _)) in self.anchors.iter().enumerate() {
            let score = Sdr::match_score(sensory_sdr, pattern)?;
            if score >= self.config.anchor_overlap_threshold
                && best.map(|(b, _)| score > b).unwrap_or(true)
            {
                best = Some((score, i));
            }
        }
        if let Some((_, i)) = best {
            let (_, q, r) = self.anchors[i];
            self.q = q;
            self.r = r;
            Ok(true)
        } else {
            self.anchors.push((sensory_sdr.clone(), self.q, self.r));
            Ok(false)
        }
    }

    /// Object reset: position returns to the origin. Anchor memory is
    /// cleared only if `clear_anchors_on_reset` is configured.
    pub fn reset(&mut self) {
        self.q = 0.0;
        self.r = 0.0;
        if self.config.clear_anchors_on_reset {
            self.anchors.clear();
        }
    }

    pub fn num_anchors(&self) -> usize {
        self.anchors.len()
    }

    /// Capture position, anchor memory, and the path-integration RNG
    /// stream for persistence.
    pub fn snapshot(&self) -> crate::persist::GridState {
        crate::persist::GridState {
            config: self.config.clone(),
            position: (self.q, self.r),
            anchors: self.anchors.clone(),
            rng: self.rng.clone(),
        }
    }

    /// Rebuild a grid module from a snapshot; subsequent `move_by` calls
    /// draw noise exactly as the snapshotted instance would have.
    pub fn restore(state: crate::persist::GridState) -> Result<Self> {
        let mut g = Self::new(state.config)?;
        g.q = state.position.0;
        g.r = state.position.1;
        g.anchors = state.anchors;
        g.rng = state.rng;
        Ok(g)
    }
}

/// Displacement module configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplacementConfig {
    pub module_size: usize,
    pub sigma_bump: f64,
    pub active_count: usize,
    pub predict_overlap_threshold: f64,
}

impl Default for DisplacementConfig {
    fn default() -> Self {
        Self {
            module_size: 40,
            sigma_bump: 1.2,
            active_count: 10,
            predict_overlap_threshold: 0.2,
        }
    }
}

/// A predicted target location, ranked by source-overlap confidence.
#[derive(Clone, Debug)]
pub struct PredictedTarget {
    pub target: Sdr,
    pub displacement: Sdr,
    pub confidence: f64,
}

/// Unordered `(source, displacement, target)` association list keyed by
/// SDR overlap.
pub struct DisplacementModule {
    config: DisplacementConfig,
    associations: Vec<(Sdr, Sdr, Sdr)>,
}

impl DisplacementModule {
    pub fn new(config: DisplacementConfig) -> Self {
        Self {
            config,
            associations: Vec::new(),
        }
    }

    pub fn num_associations(&self) -> usize {
        self.associations.len()
    }

    /// Learn a `src -> tgt` displacement; the displacement SDR encodes
    /// the circular-mean centroid difference, wrapped toroidally.
    pub fn learn(&mut self, src: &Sdr, tgt: &Sdr) {
        let (sq, sr) = circular_mean_centroid(src, self.config.module_size);
        let (tq, tr) = circular_mean_centroid(tgt, self.config.module_size);
        let n = self.config.module_size as f64;
        let dq = wrap(tq - sq, n);
        let dr = wrap(tr - sr, n);
        let disp = gaussian_bump_sdr(
            self.config.module_size,
            dq,
            dr,
            self.config.sigma_bump,
            self.config.active_count,
        );
        self.associations.push((src.clone(), disp, tgt.clone()));
    }

    /// All entries whose source overlaps `current` above threshold,
    /// ranked by overlap. The predicted target is the stored one, never
    /// recomputed.
    pub fn predict_targets(&self, current: &Sdr) -> Result<Vec<PredictedTarget>> {
        let mut out = Vec::new();
        for (src, disp, tgt) in &self.associations {
            let score = Sdr::match_score(current, src)?;
            if score >= self.config.predict_overlap_threshold {
                out.push(PredictedTarget {
                    target: tgt.clone(),
                    displacement: disp.clone(),
                    confidence: score,
                });
            }
        }
        out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(out)
    }

    pub fn reset(&mut self) {
        self.associations.clear();
    }

    /// Capture the learned association list for persistence.
    pub fn snapshot(&self) -> crate::persist::DisplacementState {
        crate::persist::DisplacementState {
            config: self.config.clone(),
            associations: self.associations.clone(),
        }
    }

    /// Rebuild a displacement module from a snapshot.
    pub fn restore(state: crate::persist::DisplacementState) -> Self {
        Self {
            config: state.config,
            associations: state.associations,
        }
    }
}
