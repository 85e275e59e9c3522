//! Cortical column orchestration: L6 (grid modules) -> L4 (SP+TM) ->
//! L2/3 (CP), with the one-step apical delay that keeps the L2/3<->L4
//! loop acyclic.
//!
//! The teacher has no multi-block pipeline of this shape; the fixed
//! `shadow -> cache -> activate -> anomaly -> learn -> predict ->
//! maintain` staging each sub-component already follows is what is
//! being composed here, one level up, per this system's own contract.

use crate::column_pooler::{ColumnPooler, CpConfig};
use crate::error::Result;
use crate::grid::{GridCellModule, GridConfig};
use crate::sdr::Sdr;
use crate::spatial_pooler::{SpConfig, SpatialPooler};
use crate::temporal_memory::{TemporalMemory, TmConfig};

/// One sensory sample: a feature SDR plus a motor displacement.
#[derive(Clone, Debug)]
pub struct SensoryInput {
    pub feature: Sdr,
    pub dx: f64,
    pub dy: f64,
}

/// Output of one `CorticalColumn::compute` call.
#[derive(Clone, Debug)]
pub struct ColumnOutput {
    pub active_columns: Sdr,
    pub tm_active: Sdr,
    pub tm_winners: Sdr,
    pub tm_predicted: Sdr,
    pub anomaly: f64,
    pub object_sdr: Sdr,
    pub is_novel: bool,
}

/// Full top-level configuration for one column.
#[derive(Clone, Debug)]
pub struct CorticalColumnConfig {
    pub sp: SpConfig,
    pub tm: TmConfig,
    pub cp: CpConfig,
    pub grid_modules: Vec<GridConfig>,
}

fn concat_sdrs(parts: &[Sdr]) -> Sdr {
    let total: usize = parts.iter().map(|s| s.size()).sum();
    let mut active = Vec::new();
    let mut offset = 0u32;
    for p in parts {
        for &bit in p.active() {
            active.push(bit + offset);
        }
        offset += p.size() as u32;
    }
    Sdr::new(total, &active)
}

/// Orchestrates one column's L6/L4/L2-3 pipeline.
pub struct CorticalColumn {
    grid_modules: Vec<GridCellModule>,
    sp: SpatialPooler,
    tm: TemporalMemory,
    cp: ColumnPooler,
    prev_l23: Sdr,
    pending_apical: Option<Sdr>,
    pending_lateral: Option<Vec<(usize, Sdr)>>,
}

impl CorticalColumn {
    pub fn new(config: CorticalColumnConfig) -> Result<Self> {
        let location_size: usize = config.grid_modules.iter().map(|g| g.module_size * g.module_size).sum();
        let mut tm_config = config.tm.clone();
        tm_config.basal_size = Some(location_size);
        tm_config.apical_size = Some(config.cp.cell_count);

        let grid_modules = config
            .grid_modules
            .into_iter()
            .map(GridCellModule::new)
            .collect::<Result<Vec<_>>>()?;

        let sp = SpatialPooler::new(config.sp)?;
        let tm = TemporalMemory::new(tm_config)?;
        let cp_cell_count = config.cp.cell_count;
        let cp = ColumnPooler::new(config.cp)?;

        Ok(Self {
            grid_modules,
            sp,
            tm,
            cp,
            prev_l23: Sdr::empty(cp_cell_count),
            pending_apical: None,
            pending_lateral: None,
        })
    }

    /// Current concatenated location SDR across all grid modules.
    pub fn location(&self) -> Sdr {
        let parts: Vec<Sdr> = self.grid_modules.iter().map(|g| g.current_location()).collect();
        concat_sdrs(&parts)
    }

    /// Queue hierarchical/regional apical feedback for the column
    /// pooler's next compute call.
    pub fn receive_apical(&mut self, feedback: &Sdr) {
        self.pending_apical = Some(feedback.clone());
    }

    /// Queue peer object-SDRs (from the last completed voting round) for
    /// the column pooler's next compute call, so lateral-distal segments
    /// actually grow/adapt against real peer activity instead of only
    /// being read by `apply_lateral_narrowing`.
    pub fn receive_lateral(&mut self, peers: &[(usize, Sdr)]) {
        self.pending_lateral = Some(peers.to_vec());
    }

    pub fn compute(&mut self, input: &SensoryInput, learn: bool) -> Result<ColumnOutput> {
        for module in self.grid_modules.iter_mut() {
            module.move_by(input.dx, input.dy);
            module.anchor(&input.feature)?;
        }
        let location = self.location();

        let active_columns = self.sp.compute(&input.feature, learn)?;
        let tm_out = self
            .tm
            .compute(&active_columns, Some(&location), Some(&self.prev_l23), learn)?;
        let lateral = self.pending_lateral.take();
        let cp_out = self.cp.compute(
            &tm_out.active,
            &tm_out.winners,
            lateral.as_deref(),
            self.pending_apical.as_ref(),
            learn,
        )?;

        self.prev_l23 = cp_out.representation.clone();

        Ok(ColumnOutput {
            active_columns,
            tm_active: tm_out.active,
            tm_winners: tm_out.winners,
            tm_predicted: tm_out.predicted,
            anomaly: tm_out.anomaly,
            object_sdr: cp_out.representation,
            is_novel: cp_out.is_novel,
        })
    }

    /// Voting-loop-only entrypoint: routes directly into the column
    /// pooler without touching L4/L6 or advancing TM state.
    pub fn apply_lateral_narrowing(&mut self, peers: &[(usize, Sdr)]) -> Result<Sdr> {
        self.cp.apply_lateral_narrowing(peers)
    }

    pub fn object_sdr(&self) -> &Sdr {
        self.cp.representation()
    }

    /// Capture every sub-component's learned state plus the one-step
    /// apical/lateral feedback already queued but not yet consumed.
    pub fn snapshot(&self) -> crate::persist::ColumnSnapshot {
        crate::persist::ColumnSnapshot {
            sp: self.sp.snapshot(),
            tm: self.tm.snapshot(),
            cp: self.cp.snapshot(),
            grid_modules: self.grid_modules.iter().map(|g| g.snapshot()).collect(),
            prev_l23: self.prev_l23.clone(),
            pending_apical: self.pending_apical.clone(),
            pending_lateral: self.pending_lateral.clone(),
        }
    }

    /// Rebuild a column from a snapshot; its next `compute` call picks
    /// up exactly where the snapshotted instance would have.
    pub fn restore(state: crate::persist::ColumnSnapshot) -> Result<Self> {
        let sp = SpatialPooler::restore(state.sp)?;
        let tm = TemporalMemory::restore(state.tm)?;
        let cp = ColumnPooler::restore(state.cp)?;
        let grid_modules = state
            .grid_modules
            .into_iter()
            .map(GridCellModule::restore)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            grid_modules,
            sp,
            tm,
            cp,
            prev_l23: state.prev_l23,
            pending_apical: state.pending_apical,
            pending_lateral: state.pending_lateral,
        })
    }

    /// Object reset: clears CP active sets, resets grid positions to
    /// the object origin, and clears queued apical feedback.
    pub fn reset(&mut self) {
        self.cp.reset();
        for module in self.grid_modules.iter_mut() {
            module.reset();
        }
        self.tm.reset();
        self.pending_apical = None;
        self.pending_lateral = None;
        self.prev_l23 = Sdr::empty(self.prev_l23.size());
    }
}

impl std::fmt::Debug for CorticalColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorticalColumn")
            .field("object_sdr_active", &self.cp.representation().num_active())
            .finish()
    }
}
