//! Neocortex: a stack of regions, settling apical feedback top-down
//! after one bottom-up sweep — the hierarchy-level half of the
//! one-step-delay trick that keeps region/region cycles acyclic.

use crate::cortical_column::SensoryInput;
use crate::error::Result;
use crate::region::{CorticalRegion, RegionOutput};

/// Hierarchy configuration.
#[derive(Clone, Copy, Debug)]
pub struct HierarchyConfig {
    pub max_settling_iterations: u32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_settling_iterations: 5,
        }
    }
}

/// Output of one `Neocortex::process` call, one entry per level,
/// bottom-up.
#[derive(Clone, Debug)]
pub struct NeocortexOutput {
    pub levels: Vec<RegionOutput>,
    pub converged: bool,
    pub settling_iterations: u32,
}

/// A bottom-up stack of regions.
pub struct Neocortex {
    config: HierarchyConfig,
    levels: Vec<CorticalRegion>,
}

impl Neocortex {
    pub fn new(config: HierarchyConfig, levels: Vec<CorticalRegion>) -> Self {
        Self { config, levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn reset(&mut self) {
        for level in self.levels.iter_mut() {
            level.reset();
        }
    }

    /// `inputs` holds one sensory batch per level, bottom-up.
    pub fn process(&mut self, inputs: &[Vec<SensoryInput>], learn: bool) -> Result<NeocortexOutput> {
        let mut levels_out = Vec::with_capacity(self.levels.len());
        for (level, sensory) in self.levels.iter_mut().zip(inputs.iter()) {
            levels_out.push(level.process(sensory, learn)?);
        }

        let mut converged = levels_out.iter().all(|out| out.converged);
        let mut settling_iterations = 0u32;

        while !converged && settling_iterations < self.config.max_settling_iterations {
            settling_iterations += 1;

            for i in 0..self.levels.len().saturating_sub(1) {
                let feedback = levels_out[i + 1].consensus.clone();
                self.levels[i].receive_hierarchical_feedback(&feedback);
            }

            for (i, level) in self.levels.iter_mut().enumerate() {
                levels_out[i] = level.settle()?;
            }

            converged = levels_out.iter().all(|out| out.converged);
        }

        if converged {
            tracing::trace!(settling_iterations, "neocortex converged");
        } else {
            tracing::trace!(settling_iterations, "neocortex hit max settling iterations");
        }

        Ok(NeocortexOutput {
            levels: levels_out,
            converged,
            settling_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_pooler::CpConfig;
    use crate::cortical_column::{CorticalColumn, CorticalColumnConfig};
    use crate::grid::GridConfig;
    use crate::region::RegionConfig;
    use crate::sdr::Sdr;
    use crate::spatial_pooler::SpConfig;
    use crate::temporal_memory::TmConfig;

    fn small_column(seed: u64) -> CorticalColumn {
        let config = CorticalColumnConfig {
            sp: SpConfig {
                input_size: 100,
                column_count: 64,
                potential_radius: 50,
                seed,
                ..Default::default()
            },
            tm: TmConfig {
                column_count: 64,
                cells_per_column: 4,
                activation_threshold: 2,
                min_threshold: 1,
                ..Default::default()
            },
            cp: CpConfig {
                cell_count: 256,
                sdr_size: 16,
                seed,
                ..Default::default()
            },
            grid_modules: vec![GridConfig {
                module_size: 10,
                seed,
                ..Default::default()
            }],
        };
        CorticalColumn::new(config).unwrap()
    }

    fn feature(bits: &[u32]) -> Sdr {
        Sdr::new(100, bits)
    }

    fn one_level_region(n: u64) -> CorticalRegion {
        let columns: Vec<CorticalColumn> = (0..2).map(|i| small_column(n * 10 + i)).collect();
        CorticalRegion::new(RegionConfig::default(), columns, 256)
    }

    fn single_column_region(n: u64) -> CorticalRegion {
        let columns: Vec<CorticalColumn> = vec![small_column(n)];
        CorticalRegion::new(RegionConfig::default(), columns, 256)
    }

    #[test]
    fn test_two_level_process_converges_or_settles() {
        let l0 = one_level_region(1);
        let l1 = one_level_region(2);
        let mut cortex = Neocortex::new(HierarchyConfig::default(), vec![l0, l1]);

        let sensory = |seed: u32| {
            vec![
                SensoryInput { feature: feature(&[1, 2, 3]), dx: 0.0, dy: 0.0 },
                SensoryInput { feature: feature(&[1 + seed, 2 + seed, 3 + seed]), dx: 0.0, dy: 0.0 },
            ]
        };
        let inputs = vec![sensory(0), sensory(0)];
        let out = cortex.process(&inputs, true).unwrap();
        assert_eq!(out.levels.len(), 2);
        assert!(out.settling_iterations <= HierarchyConfig::default().max_settling_iterations);
    }

    #[test]
    fn test_reset_propagates_to_all_levels() {
        let l0 = one_level_region(3);
        let mut cortex = Neocortex::new(HierarchyConfig::default(), vec![l0]);
        let inputs = vec![vec![
            SensoryInput { feature: feature(&[1, 2]), dx: 0.0, dy: 0.0 },
            SensoryInput { feature: feature(&[1, 2]), dx: 0.0, dy: 0.0 },
        ]];
        cortex.process(&inputs, true).unwrap();
        cortex.reset();
        assert_eq!(cortex.num_levels(), 1);
    }

    #[test]
    fn test_single_level_converges_in_one_pass() {
        let l0 = single_column_region(4);
        let mut cortex = Neocortex::new(HierarchyConfig::default(), vec![l0]);
        let inputs = vec![vec![SensoryInput { feature: feature(&[1, 2]), dx: 0.0, dy: 0.0 }]];
        let out = cortex.process(&inputs, true).unwrap();
        assert_eq!(out.settling_iterations, 0);
        assert!(out.converged);
    }
}
