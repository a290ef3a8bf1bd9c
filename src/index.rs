//! Block-size bucketed index over a [`SignatureStore`].
//!
//! CTPH signatures are only comparable when their block sizes are equal or one
//! is double the other, so a query only touches the buckets for `B`, `2B` and
//! (for even `B`) `B/2`.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::signature::Signature;
use crate::store::{SignatureId, SignatureStore};

/// Candidate lookup by block size.
///
/// The index holds identifiers only; the store owns the signatures. Within a
/// bucket, identifiers behave like a set keyed by signature value: inserting a
/// signature equal to one already present is a no-op.
#[derive(Debug, Default)]
pub struct SignatureIndex {
    buckets: HashMap<u64, Vec<SignatureId>>,
    // Signature value hash -> indexed ids with that hash, for constant-time dedup.
    by_value: HashMap<u64, Vec<SignatureId>>,
    hasher: RandomState,
    len: usize,
}

impl SignatureIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `id` under its block size.
    ///
    /// Returns `false` if an equal signature is already indexed (the store still
    /// owns the new entry; it just won't be returned as a candidate).
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to `store`.
    pub fn insert(&mut self, store: &SignatureStore, id: SignatureId) -> bool {
        let sig = &store[id];
        let same_hash = self.by_value.entry(self.hasher.hash_one(sig)).or_default();
        if same_hash.iter().any(|&other| store[other] == *sig) {
            return false;
        }
        same_hash.push(id);
        self.buckets.entry(sig.block_size()).or_default().push(id);
        self.len += 1;
        true
    }

    /// Identifiers comparable with `signature`, in ascending order.
    pub fn candidates_for(&self, signature: &Signature) -> Vec<SignatureId> {
        let mut out: Vec<SignatureId> = compatible_block_sizes(signature.block_size())
            .into_iter()
            .flatten()
            .filter_map(|bs| self.buckets.get(&bs))
            .flat_map(|bucket| bucket.iter().copied())
            .collect();
        out.sort_unstable();
        out
    }

    /// Identifiers stored under exactly `block_size`.
    pub fn bucket(&self, block_size: u64) -> &[SignatureId] {
        self.buckets
            .get(&block_size)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every indexed identifier, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = SignatureId> + '_ {
        self.buckets.values().flat_map(|bucket| bucket.iter().copied())
    }

    /// Number of indexed identifiers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every bucket.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.by_value.clear();
        self.len = 0;
    }
}

/// Block sizes `B`, `2B` and `B/2` (only for even `B`). Absent entries are
/// `None`, either because `2B` overflows or `B` is odd.
pub(crate) fn compatible_block_sizes(block_size: u64) -> [Option<u64>; 3] {
    let half = (block_size % 2 == 0).then_some(block_size / 2);
    [Some(block_size), block_size.checked_mul(2), half]
}
