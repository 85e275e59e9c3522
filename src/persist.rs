//! Persisted state: versioned snapshots of configuration plus learned
//! state (synapses, duty cycles, boost factors, grid anchors,
//! displacement associations) — never transient per-step caches.
//!
//! Grounded in the teacher's save/load contract
//! (`examples/jacobeverist-gcf-core-rust/src/block_memory.rs` round-trips
//! `BlockMemory` through `bincode`), generalized to a single envelope
//! covering every learned component plus an FNV-1a checksum over the
//! payload, since this system's persisted state spans multiple
//! components rather than one block.

use crate::column_pooler::CpConfig;
use crate::error::{CoreError, Result};
use crate::grid::{DisplacementConfig, GridConfig};
use crate::sdr::Sdr;
use crate::segment::DendriteSegment;
use crate::spatial_pooler::SpConfig;
use crate::temporal_memory::TmConfig;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

const MAGIC: u32 = 0xC0_57_1C_0E;
const FORMAT_VERSION: u32 = 1;

/// FNV-1a over raw bytes, used to detect truncated or corrupted payloads.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Learned spatial pooler state worth persisting beyond configuration:
/// per-column proximal segments, homeostasis counters, and the RNG
/// stream driving tie-break shuffles, so a restored pooler's next
/// compute call picks the same winners a continued original would.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpState {
    pub config: SpConfig,
    pub proximal: Vec<DendriteSegment>,
    pub active_duty_cycle: Vec<f64>,
    pub overlap_duty_cycle: Vec<f64>,
    pub boost_factor: Vec<f64>,
    pub rng: StdRng,
    pub step: u32,
}

/// Learned temporal memory state: distal (and optional basal/apical)
/// segments per cell, plus the two-timestep active/winner/predictive
/// shadow state a mid-sequence restore needs to continue correctly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TmState {
    pub config: TmConfig,
    pub distal: Vec<Vec<DendriteSegment>>,
    pub basal: Option<Vec<Vec<DendriteSegment>>>,
    pub apical: Option<Vec<Vec<DendriteSegment>>>,
    pub active: Sdr,
    pub winner: Sdr,
    pub predictive: Sdr,
    pub prev_active: Sdr,
    pub prev_winner: Sdr,
    pub prev_predictive: Sdr,
    pub last_basal: Option<Sdr>,
    pub last_apical: Option<Sdr>,
    pub step: u32,
}

/// Learned column pooler state: proximal/internal-distal/apical
/// segments plus the peer-keyed lateral bundles, the current/previous
/// active sets driving inertia, and the RNG stream behind random fill.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CpState {
    pub config: CpConfig,
    pub proximal: Vec<DendriteSegment>,
    pub internal_distal: Vec<DendriteSegment>,
    pub apical: Vec<DendriteSegment>,
    pub lateral: Vec<Vec<(usize, DendriteSegment)>>,
    pub active_cells: Sdr,
    pub prev_active_cells: Sdr,
    pub rng: StdRng,
    pub step: u32,
}

/// Learned grid module state: continuous position, anchor memory, and
/// the RNG stream behind path-integration noise.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridState {
    pub config: GridConfig,
    pub position: (f64, f64),
    pub anchors: Vec<(Sdr, f64, f64)>,
    pub rng: StdRng,
}

/// Learned displacement module state: the association list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplacementState {
    pub config: DisplacementConfig,
    pub associations: Vec<(Sdr, Sdr, Sdr)>,
}

/// Full snapshot of one cortical column's learned state, including the
/// one-step-delayed apical/lateral feedback queued but not yet consumed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    pub sp: SpState,
    pub tm: TmState,
    pub cp: CpState,
    pub grid_modules: Vec<GridState>,
    pub prev_l23: Sdr,
    pub pending_apical: Option<Sdr>,
    pub pending_lateral: Option<Vec<(usize, Sdr)>>,
}

/// On-disk envelope: magic + version + checksum wrapping an opaque
/// `bincode` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Envelope {
    magic: u32,
    version: u32,
    checksum: u64,
    payload: Vec<u8>,
}

/// Serialize `value` into a checksummed, versioned byte buffer.
pub fn save<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value)?;
    let checksum = fnv1a(&payload);
    let envelope = Envelope {
        magic: MAGIC,
        version: FORMAT_VERSION,
        checksum,
        payload,
    };
    Ok(bincode::serialize(&envelope)?)
}

/// Deserialize and verify a buffer produced by `save`.
pub fn load<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    let envelope: Envelope = bincode::deserialize(bytes)?;
    if envelope.magic != MAGIC {
        return Err(CoreError::StateCorruption(format!(
            "bad magic: expected {:#x}, got {:#x}",
            MAGIC, envelope.magic
        )));
    }
    if envelope.version != FORMAT_VERSION {
        return Err(CoreError::StateCorruption(format!(
            "unsupported format version {}",
            envelope.version
        )));
    }
    let actual = fnv1a(&envelope.payload);
    if actual != envelope.checksum {
        return Err(CoreError::StateCorruption(format!(
            "checksum mismatch: expected {:#x}, got {:#x}",
            envelope.checksum, actual
        )));
    }
    Ok(bincode::deserialize(&envelope.payload)?)
}
