//! SDR — Sparse Distributed Representation with dual sparse/dense storage.
//!
//! A `Sdr` is a fixed-width binary vector carrying a small, ordered,
//! duplicate-free set of active bit indices (the "sparse" view) and a
//! lazily materialized dense bitvector cache (the "dense" view) used for
//! word-level overlap computation once the active set grows past the
//! point where a sorted-merge intersection stops winning.
//!
//! Every operation below produces a new `Sdr`; none mutate in place and
//! none alias another instance's dense cache (each cache is recomputed
//! independently the first time it is needed). This mirrors the
//! teacher's `BitArray`/`BlockMemory::d_conns` split — a sparse
//! description plus a dense bitvector maintained alongside it for fast
//! word-wise AND/popcount — generalized so the dense side is optional
//! and computed on demand rather than always kept in sync.

use crate::error::{CoreError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Bits per dense cache word.
const BITS_PER_WORD: usize = 64;

/// Below this active-set size, overlap uses sorted-merge intersection
/// instead of materializing the dense cache.
const SMALL_SET_THRESHOLD: usize = 64;

#[inline]
const fn word_count(size: usize) -> usize {
    (size + BITS_PER_WORD - 1) / BITS_PER_WORD
}

/// A Sparse Distributed Representation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sdr {
    size: usize,
    active: Vec<u32>,
    #[serde(skip)]
    dense_cache: RefCell<Option<Vec<u64>>>,
}

impl PartialEq for Sdr {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.active == other.active
    }
}
impl Eq for Sdr {}

impl Sdr {
    /// Construct an SDR of `size` bits with the given active indices.
    /// Out-of-range indices are dropped; duplicates are collapsed; the
    /// result is sorted ascending.
    pub fn new(size: usize, active_bits: &[u32]) -> Self {
        let mut active: Vec<u32> = active_bits
            .iter()
            .copied()
            .filter(|&i| (i as usize) < size)
            .collect();
        active.sort_unstable();
        active.dedup();
        Self {
            size,
            active,
            dense_cache: RefCell::new(None),
        }
    }

    /// Construct an empty SDR of `size` bits.
    pub fn empty(size: usize) -> Self {
        Self::new(size, &[])
    }

    /// Construct from a dense `0`/`1` byte-per-bit slice. `size = bits.len()`.
    pub fn from_dense(bits: &[u8]) -> Self {
        let active: Vec<u32> = bits
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| if b != 0 { Some(i as u32) } else { None })
            .collect();
        Self::new(bits.len(), &active)
    }

    /// Construct from a packed little-endian bitvector of `ceil(size/64)` words.
    pub fn from_bitvector(size: usize, words: &[u64]) -> Self {
        let mut active = Vec::new();
        for (w, &word) in words.iter().enumerate() {
            let mut bits = word;
            while bits != 0 {
                let b = bits.trailing_zeros() as usize;
                let idx = w * BITS_PER_WORD + b;
                if idx < size {
                    active.push(idx as u32);
                }
                bits &= bits - 1;
            }
        }
        Self {
            size,
            active,
            dense_cache: RefCell::new(None),
        }
    }

    /// Materialize (or return the cached) packed bitvector of `ceil(size/64)` words.
    pub fn to_bitvector(&self) -> Vec<u64> {
        self.ensure_dense();
        self.dense_cache.borrow().clone().unwrap()
    }

    fn ensure_dense(&self) {
        let mut cache = self.dense_cache.borrow_mut();
        if cache.is_none() {
            let mut words = vec![0u64; word_count(self.size)];
            for &i in &self.active {
                let i = i as usize;
                words[i / BITS_PER_WORD] |= 1u64 << (i % BITS_PER_WORD);
            }
            *cache = Some(words);
        }
    }

    /// Total bit width.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sorted, duplicate-free active indices.
    #[inline]
    pub fn active(&self) -> &[u32] {
        &self.active
    }

    /// Number of active bits, `|a|`.
    #[inline]
    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    /// Is this index active?
    pub fn contains(&self, idx: u32) -> bool {
        self.active.binary_search(&idx).is_ok()
    }

    fn check_same_size(&self, other: &Sdr) -> Result<()> {
        if self.size != other.size {
            return Err(CoreError::ShapeMismatch {
                expected: self.size,
                actual: other.size,
            });
        }
        Ok(())
    }

    /// Count of shared active bits between `a` and `b`.
    pub fn overlap(a: &Sdr, b: &Sdr) -> Result<usize> {
        a.check_same_size(b)?;

        if a.active.len() < SMALL_SET_THRESHOLD && b.active.len() < SMALL_SET_THRESHOLD {
            // Sorted-merge intersection count.
            let (mut i, mut j) = (0, 0);
            let mut count = 0;
            while i < a.active.len() && j < b.active.len() {
                match a.active[i].cmp(&b.active[j]) {
                    std::cmp::Ordering::Less => i += 1,
                    std::cmp::Ordering::Greater => j += 1,
                    std::cmp::Ordering::Equal => {
                        count += 1;
                        i += 1;
                        j += 1;
                    }
                }
            }
            Ok(count)
        } else {
            a.ensure_dense();
            b.ensure_dense();
            let aw = a.dense_cache.borrow();
            let bw = b.dense_cache.borrow();
            let (aw, bw) = (aw.as_ref().unwrap(), bw.as_ref().unwrap());
            let count: u32 = aw
                .iter()
                .zip(bw.iter())
                .map(|(&x, &y)| (x & y).count_ones())
                .sum();
            Ok(count as usize)
        }
    }

    /// `overlap(a,b) / |a|`, or 0 when `|a| == 0`.
    pub fn match_score(a: &Sdr, b: &Sdr) -> Result<f64> {
        let ov = Self::overlap(a, b)? as f64;
        if a.active.is_empty() {
            Ok(0.0)
        } else {
            Ok(ov / a.active.len() as f64)
        }
    }

    /// `overlap(a,b) / (|a| + |b| - overlap(a,b))`, or 0 when the denominator is 0.
    pub fn jaccard(a: &Sdr, b: &Sdr) -> Result<f64> {
        let ov = Self::overlap(a, b)?;
        let denom = a.active.len() + b.active.len() - ov;
        if denom == 0 {
            Ok(0.0)
        } else {
            Ok(ov as f64 / denom as f64)
        }
    }

    fn merge_bitwise(a: &Sdr, b: &Sdr, op: impl Fn(u64, u64) -> u64) -> Sdr {
        a.ensure_dense();
        b.ensure_dense();
        let aw = a.dense_cache.borrow();
        let bw = b.dense_cache.borrow();
        let (aw, bw) = (aw.as_ref().unwrap(), bw.as_ref().unwrap());
        let words: Vec<u64> = aw.iter().zip(bw.iter()).map(|(&x, &y)| op(x, y)).collect();
        Sdr::from_bitvector(a.size, &words)
    }

    /// Set union.
    pub fn union(a: &Sdr, b: &Sdr) -> Result<Sdr> {
        a.check_same_size(b)?;
        Ok(Self::merge_bitwise(a, b, |x, y| x | y))
    }

    /// Set intersection.
    pub fn intersect(a: &Sdr, b: &Sdr) -> Result<Sdr> {
        a.check_same_size(b)?;
        Ok(Self::merge_bitwise(a, b, |x, y| x & y))
    }

    /// `a` minus `b` (set difference).
    pub fn except(a: &Sdr, b: &Sdr) -> Result<Sdr> {
        a.check_same_size(b)?;
        Ok(Self::merge_bitwise(a, b, |x, y| x & !y))
    }

    /// Symmetric difference (bits active in exactly one of `a`, `b`).
    pub fn symmetric_difference(a: &Sdr, b: &Sdr) -> Result<Sdr> {
        a.check_same_size(b)?;
        Ok(Self::merge_bitwise(a, b, |x, y| x ^ y))
    }

    /// Remove `floor(|a|*fraction)` random active bits and add that many
    /// random new bits that weren't active. The result has the same `|a|`.
    pub fn add_noise<R: Rng>(&self, fraction: f64, rng: &mut R) -> Result<Sdr> {
        if fraction < 0.0 {
            return Err(CoreError::InvalidArgument(format!(
                "add_noise fraction must be >= 0, got {}",
                fraction
            )));
        }
        let n_flip = ((self.active.len() as f64) * fraction).floor() as usize;
        let mut active = self.active.clone();
        crate::utils::shuffle(&mut active, active.len(), rng);
        active.truncate(active.len().saturating_sub(n_flip));

        let mut active_set: std::collections::HashSet<u32> = active.iter().copied().collect();
        let mut added = 0;
        // Deterministic-ish rejection sampling over the complement set.
        let mut attempts = 0;
        let max_attempts = (self.size.max(1)) * 4 + 16;
        while added < n_flip && attempts < max_attempts {
            attempts += 1;
            let candidate = rng.gen_range(0..self.size.max(1)) as u32;
            if (candidate as usize) < self.size && !active_set.contains(&candidate) {
                active_set.insert(candidate);
                added += 1;
            }
        }
        let active: Vec<u32> = active_set.into_iter().collect();
        Ok(Sdr::new(self.size, &active))
    }

    /// Uniform random `k`-subset of the active bits.
    pub fn subsample<R: Rng>(&self, k: usize, rng: &mut R) -> Result<Sdr> {
        let mut active = self.active.clone();
        crate::utils::shuffle(&mut active, active.len(), rng);
        active.truncate(k);
        Ok(Sdr::new(self.size, &active))
    }

    /// Deterministic per-bit hash projection into `[0, new_size)`. Duplicates collapse.
    pub fn project(&self, new_size: usize, seed: u64) -> Sdr {
        let active: Vec<u32> = self
            .active
            .iter()
            .map(|&i| (hash_index(i, seed) % new_size.max(1) as u64) as u32)
            .collect();
        Sdr::new(new_size, &active)
    }

    /// Keep the first `k` sorted indices when `|a| > k` (deterministic).
    pub fn enforce_sparsity(&self, k: usize) -> Sdr {
        if self.active.len() <= k {
            self.clone()
        } else {
            Sdr::new(self.size, &self.active[..k])
        }
    }

    /// Union of `a` and `b`, then `enforce_sparsity(k)`. When more than `k`
    /// bits would survive, prefer the intersection first, then fill from
    /// the union (so bits both inputs agree on are kept over bits either
    /// input alone contributed).
    pub fn union_capped(a: &Sdr, b: &Sdr, k: usize) -> Result<Sdr> {
        a.check_same_size(b)?;
        let inter = Self::intersect(a, b)?;
        if inter.active.len() >= k {
            return Ok(Sdr::new(a.size, &inter.active[..k]));
        }
        let uni = Self::union(a, b)?;
        if uni.active.len() <= k {
            return Ok(uni);
        }
        let mut chosen = inter.active.clone();
        let inter_set: std::collections::HashSet<u32> = inter.active.iter().copied().collect();
        for &i in &uni.active {
            if chosen.len() >= k {
                break;
            }
            if !inter_set.contains(&i) {
                chosen.push(i);
            }
        }
        chosen.sort_unstable();
        Ok(Sdr::new(a.size, &chosen))
    }
}

/// Deterministic per-bit hash used by `project`. A fixed-output,
/// seed-mixed splitmix64-style finalizer — not a general hashing
/// dependency, just a reproducible scramble of `(index, seed)`.
fn hash_index(index: u32, seed: u64) -> u64 {
    let mut z = (index as u64) ^ seed.wrapping_mul(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_drops_out_of_range_and_dedups() {
        let s = Sdr::new(10, &[1, 1, 5, 20, 3]);
        assert_eq!(s.active(), &[1u32, 3, 5]);
    }

    #[test]
    fn test_from_bitvector_roundtrip() {
        let a = Sdr::new(130, &[0, 63, 64, 129]);
        let words = a.to_bitvector();
        let b = Sdr::from_bitvector(130, &words);
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlap_symmetric_and_bounded() {
        let a = Sdr::new(100, &[1, 2, 3, 4, 5]);
        let b = Sdr::new(100, &[3, 4, 5, 6, 7]);
        let ov_ab = Sdr::overlap(&a, &b).unwrap();
        let ov_ba = Sdr::overlap(&b, &a).unwrap();
        assert_eq!(ov_ab, ov_ba);
        assert_eq!(ov_ab, 3);
        assert!(ov_ab <= a.num_active().min(b.num_active()));
    }

    #[test]
    fn test_overlap_large_sets_matches_small_path() {
        let active_a: Vec<u32> = (0..200).step_by(2).collect();
        let active_b: Vec<u32> = (0..200).step_by(3).collect();
        let a = Sdr::new(200, &active_a);
        let b = Sdr::new(200, &active_b);
        // Force dense path (>= SMALL_SET_THRESHOLD active bits).
        let dense_ov = Sdr::overlap(&a, &b).unwrap();

        // Compute expected via plain set intersection.
        let sa: std::collections::HashSet<u32> = active_a.into_iter().collect();
        let sb: std::collections::HashSet<u32> = active_b.into_iter().collect();
        let expected = sa.intersection(&sb).count();
        assert_eq!(dense_ov, expected);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Sdr::new(10, &[1]);
        let b = Sdr::new(20, &[1]);
        assert!(matches!(
            Sdr::overlap(&a, &b),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_union_intersect_cardinality_identity() {
        let a = Sdr::new(50, &[1, 2, 3, 4]);
        let b = Sdr::new(50, &[3, 4, 5, 6]);
        let union = Sdr::union(&a, &b).unwrap();
        let inter = Sdr::intersect(&a, &b).unwrap();
        assert_eq!(
            union.num_active() + inter.num_active(),
            a.num_active() + b.num_active()
        );
        // intersect subset of union
        for &i in inter.active() {
            assert!(union.contains(i));
        }
    }

    #[test]
    fn test_except_and_symmetric_difference() {
        let a = Sdr::new(50, &[1, 2, 3]);
        let b = Sdr::new(50, &[2, 3, 4]);
        let diff = Sdr::except(&a, &b).unwrap();
        assert_eq!(diff.active(), &[1u32]);
        let symm = Sdr::symmetric_difference(&a, &b).unwrap();
        assert_eq!(symm.active(), &[1u32, 4]);
    }

    #[test]
    fn test_add_noise_preserves_cardinality() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Sdr::new(1000, &(0..40).collect::<Vec<u32>>());
        let noisy = a.add_noise(0.25, &mut rng).unwrap();
        assert_eq!(noisy.num_active(), a.num_active());
    }

    #[test]
    fn test_subsample_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = Sdr::new(100, &(0..40).collect::<Vec<u32>>());
        let sub = a.subsample(10, &mut rng).unwrap();
        assert_eq!(sub.num_active(), 10);
        for &i in sub.active() {
            assert!(a.contains(i));
        }
    }

    #[test]
    fn test_enforce_sparsity() {
        let a = Sdr::new(100, &(0..40).collect::<Vec<u32>>());
        let capped = a.enforce_sparsity(10);
        assert_eq!(capped.num_active(), 10);
        assert_eq!(capped.active(), &a.active()[..10]);
    }

    #[test]
    fn test_union_capped_prefers_intersection() {
        let a = Sdr::new(100, &[1, 2, 3, 4, 5]);
        let b = Sdr::new(100, &[3, 4, 5, 6, 7]);
        let capped = Sdr::union_capped(&a, &b, 3).unwrap();
        assert_eq!(capped.num_active(), 3);
        // All three bits must come from the intersection {3,4,5}.
        for &i in capped.active() {
            assert!([3u32, 4, 5].contains(&i));
        }
    }

    #[test]
    fn test_project_deterministic() {
        let a = Sdr::new(100, &[1, 2, 3]);
        let p1 = a.project(50, 42);
        let p2 = a.project(50, 42);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_single_cell_sdr() {
        let a = Sdr::new(1, &[0]);
        let b = Sdr::new(1, &[0]);
        assert_eq!(Sdr::overlap(&a, &b).unwrap(), 1);
        let u = Sdr::union(&a, &b).unwrap();
        assert_eq!(u.active(), &[0u32]);
    }

    #[test]
    fn test_empty_input_no_panic() {
        let a = Sdr::empty(100);
        let b = Sdr::empty(100);
        assert_eq!(Sdr::overlap(&a, &b).unwrap(), 0);
        assert_eq!(Sdr::match_score(&a, &b).unwrap(), 0.0);
        assert_eq!(Sdr::jaccard(&a, &b).unwrap(), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn prop_overlap_within_bounds(
            size in 10usize..200,
            a_bits in proptest::collection::vec(0u32..200, 0..50),
            b_bits in proptest::collection::vec(0u32..200, 0..50),
        ) {
            let a = Sdr::new(size, &a_bits);
            let b = Sdr::new(size, &b_bits);
            let ov = Sdr::overlap(&a, &b).unwrap();
            proptest::prop_assert!(ov <= a.num_active().min(b.num_active()));
            proptest::prop_assert_eq!(ov, Sdr::overlap(&b, &a).unwrap());
        }
    }
}
