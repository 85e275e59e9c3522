//! corticore - Hierarchical Temporal Memory / Thousand-Brains cortical engine
//!
//! corticore models cortical computation with **sparse distributed
//! representations** (SDRs): vectors where a small fixed fraction of
//! bits are active at once. Permanence-based Hebbian synapses connect
//! sources to dendrite segments, dendrite segments drive spatial pooling
//! and temporal memory, and grid cells anchor those representations to a
//! consistent reference frame. Cortical columns combine these layers and
//! vote with their neighbors inside a region; regions compose into a
//! hierarchy.
//!
//! # Architecture
//!
//! - **Sdr**: sparse-primary, dense-lazy binary pattern with set algebra
//! - **Synapse / DendriteSegment / SegmentManager**: the shared permanence
//!   substrate for every dendrite role (proximal, distal, apical, basal)
//! - **SpatialPooler**: competitive inhibition + boosting over a
//!   proximal potential pool
//! - **TemporalMemory**: two-timestep sequence memory with bursting and
//!   anomaly scoring
//! - **ColumnPooler**: stable object-layer representations with inertia
//! - **GridCellModule / DisplacementModule**: path integration and
//!   reference-frame anchoring
//! - **CorticalColumn / CorticalRegion / Neocortex**: orchestration,
//!   voting, and hierarchical feedback
//!
//! # Example
//!
//! ```
//! use corticore::Sdr;
//!
//! let a = Sdr::new(1024, &[10, 20, 30]);
//! let b = Sdr::new(1024, &[20, 30, 40]);
//! assert_eq!(Sdr::overlap(&a, &b).unwrap(), 2);
//! ```

pub mod column_pooler;
pub mod cortical_column;
pub mod error;
pub mod grid;
pub mod hierarchy;
pub mod persist;
pub mod region;
pub mod sdr;
pub mod segment;
pub mod spatial_pooler;
pub mod temporal_memory;
pub mod utils;

pub use column_pooler::{ColumnPooler, CpConfig};
pub use cortical_column::CorticalColumn;
pub use error::{CoreError, Result};
pub use grid::{DisplacementModule, GridCellModule, GridConfig};
pub use hierarchy::{HierarchyConfig, Neocortex};
pub use region::{CorticalRegion, RegionConfig};
pub use sdr::Sdr;
pub use segment::{DendriteSegment, SegmentKind, SegmentManager, Synapse};
pub use spatial_pooler::{SpConfig, SpatialPooler};
pub use temporal_memory::{TemporalMemory, TmConfig};

/// Crate version string, as reported by Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_sdr_reexport_works() {
        let a = Sdr::new(64, &[1, 2, 3]);
        assert_eq!(a.num_active(), 3);
    }
}
