//! Arena owning every [`Signature`] created during a run.
//!
//! Other components refer to signatures by [`SignatureId`] only.

use std::fmt;
use std::ops::Index;

use crate::signature::Signature;

/// Stable identifier of a signature inside a [`SignatureStore`].
///
/// Identifiers are assigned in insertion order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignatureId(pub(crate) usize);

impl SignatureId {
    /// Position of this signature in insertion order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SignatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owner of all signatures.
///
/// The store never deduplicates: equal signatures with different filenames are
/// kept as distinct entries.
#[derive(Debug, Default)]
pub struct SignatureStore {
    signatures: Vec<Signature>,
}

impl SignatureStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `signature` and return its identifier.
    pub fn insert(&mut self, signature: Signature) -> SignatureId {
        let id = SignatureId(self.signatures.len());
        self.signatures.push(signature);
        id
    }

    /// Get the signature for `id`, if it belongs to this store.
    pub fn get(&self, id: SignatureId) -> Option<&Signature> {
        self.signatures.get(id.0)
    }

    /// Iterate over `(id, signature)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SignatureId, &Signature)> + '_ {
        self.signatures
            .iter()
            .enumerate()
            .map(|(i, sig)| (SignatureId(i), sig))
    }

    /// All identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = SignatureId> {
        (0..self.signatures.len()).map(SignatureId)
    }

    /// Identifiers of signatures loaded from `provenance`.
    pub fn ids_from(&self, provenance: &str) -> Vec<SignatureId> {
        self.iter()
            .filter(|(_, sig)| sig.provenance() == Some(provenance))
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of stored signatures.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Drop every signature. Previously issued identifiers become dangling.
    pub fn clear(&mut self) {
        self.signatures.clear();
    }
}

impl Index<SignatureId> for SignatureStore {
    type Output = Signature;

    fn index(&self, id: SignatureId) -> &Signature {
        &self.signatures[id.0]
    }
}
