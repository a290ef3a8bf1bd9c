//! Pairwise scoring, threshold matching and known-hash loading.
//!
//! [`MatchEngine`] owns the [`SignatureStore`] and [`SignatureIndex`] for a run.
//! Loading fills both; queries score only the block-size-compatible candidates
//! the index returns.
//!
//! ```rust
//! use ctphir::{MatchEngine, Options};
//!
//! let known = "ssdeep,1.1--blocksize:hash:hash,filename\n\
//!              3:abcdefgh:ijkl,\"a.bin\"\n\
//!              3:abcdefgX:ijkl,\"b.bin\"\n";
//!
//! let mut engine = MatchEngine::new(Options::default().with_threshold(50));
//! let report = engine.load(known.as_bytes(), "known.txt").unwrap();
//! assert_eq!(report.loaded.len(), 2);
//! assert!(report.diagnostics.is_empty());
//!
//! let pairs = engine.match_all();
//! assert_eq!(pairs.len(), 1);
//! ```

use std::collections::BTreeSet;
use std::io::BufRead;

use rayon::prelude::*;

use crate::config::Options;
use crate::distance::score_strings;
use crate::error::{LoadError, ParseError};
use crate::index::SignatureIndex;
use crate::signature::{FuzzyHasher, Signature};
use crate::store::{SignatureId, SignatureStore};
use crate::strings::{basename, chop_line};

/// Current known-hash file header.
pub const HEADER_V1_1: &str = "ssdeep,1.1--blocksize:hash:hash,filename";

/// Older known-hash file header, still accepted on load.
pub const HEADER_V1_0: &str = "ssdeep,1.0--blocksize:hash:hash,filename";

/// Header written in front of known-hash records.
pub const OUTPUT_HEADER: &str = HEADER_V1_1;

/// True if `line` is a known-hash file header.
pub fn is_header(line: &str) -> bool {
    line == HEADER_V1_1 || line == HEADER_V1_0
}

/// Similarity of two signatures in `0..=100`.
///
/// Equal block sizes compare `sig1` with `sig1`. When one block size is double
/// the other, the hash both sides computed at the larger block size is compared.
/// Any other combination scores 0 without computing a distance.
pub fn compare(a: &Signature, b: &Signature) -> u8 {
    let (ba, bb) = (a.block_size(), b.block_size());
    if ba == bb {
        score_strings(a.sig1(), b.sig1())
    } else if bb.checked_mul(2) == Some(ba) {
        score_strings(a.sig1(), b.sig2())
    } else if ba.checked_mul(2) == Some(bb) {
        score_strings(a.sig2(), b.sig1())
    } else {
        0
    }
}

/// Sort by score descending, then identifier ascending.
pub fn sort_matches(matches: &mut [(SignatureId, u8)]) {
    matches.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Sort pair results by score descending, then by both identifiers.
pub fn sort_pairs(pairs: &mut [(SignatureId, SignatureId, u8)]) {
    pairs.sort_unstable_by(|a, b| {
        b.2.cmp(&a.2)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });
}

/// Score `signature` against its index candidates and keep `score >= threshold`.
///
/// Results are sorted with [`sort_matches`].
///
/// # Panics
///
/// Panics if `index` holds identifiers that do not belong to `store`.
pub fn find_matches(
    store: &SignatureStore,
    index: &SignatureIndex,
    signature: &Signature,
    threshold: u8,
) -> Vec<(SignatureId, u8)> {
    let candidates = index.candidates_for(signature);
    tracing::trace!(
        signature = %signature,
        candidates = candidates.len(),
        "scoring candidates"
    );
    let mut out: Vec<(SignatureId, u8)> = candidates
        .into_iter()
        .map(|id| (id, compare(signature, &store[id])))
        .filter(|&(_, score)| score >= threshold)
        .collect();
    sort_matches(&mut out);
    out
}

/// Score every pair and keep those with `score >= threshold`.
///
/// Pairs are scored independently, on the rayon pool when `parallel` is set.
/// The output keeps the input order.
///
/// # Panics
///
/// Panics if any identifier does not belong to `store`.
pub fn score_pairs(
    store: &SignatureStore,
    pairs: &[(SignatureId, SignatureId)],
    threshold: u8,
    parallel: bool,
) -> Vec<(SignatureId, SignatureId, u8)> {
    let score = |&(a, b): &(SignatureId, SignatureId)| {
        let s = compare(&store[a], &store[b]);
        (s >= threshold).then_some((a, b, s))
    };
    if parallel {
        pairs.par_iter().filter_map(score).collect()
    } else {
        pairs.iter().filter_map(score).collect()
    }
}

/// All-pairs comparison between two collections, filtered by `threshold`.
///
/// Sorted with [`sort_pairs`].
///
/// # Panics
///
/// Panics if any identifier does not belong to `store`.
pub fn compare_unknown(
    store: &SignatureStore,
    signatures_a: &[SignatureId],
    signatures_b: &[SignatureId],
    threshold: u8,
    parallel: bool,
) -> Vec<(SignatureId, SignatureId, u8)> {
    let pairs: Vec<(SignatureId, SignatureId)> = signatures_a
        .iter()
        .flat_map(|&a| signatures_b.iter().map(move |&b| (a, b)))
        .collect();
    let mut out = score_pairs(store, &pairs, threshold, parallel);
    sort_pairs(&mut out);
    out
}

/// A malformed line skipped during [`MatchEngine::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiagnostic {
    /// 1-based line number.
    pub line: usize,
    /// Why the line was rejected.
    pub error: ParseError,
}

/// Outcome of loading one known-hash stream.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Identifiers of every stored signature, in line order.
    pub loaded: Vec<SignatureId>,
    /// Lines that failed to parse.
    pub diagnostics: Vec<LineDiagnostic>,
    /// Loaded signatures equal to one already indexed (stored, not re-indexed).
    pub duplicates: usize,
    /// True if the first line was a header.
    pub header: bool,
}

/// Known-hash matching over an owned store and index.
#[derive(Debug, Default)]
pub struct MatchEngine {
    options: Options,
    store: SignatureStore,
    index: SignatureIndex,
}

impl MatchEngine {
    /// Create an empty engine.
    pub fn new(options: Options) -> Self {
        Self {
            options,
            store: SignatureStore::new(),
            index: SignatureIndex::new(),
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The signature arena.
    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    /// The block-size index.
    pub fn index(&self) -> &SignatureIndex {
        &self.index
    }

    /// Store and index an already parsed signature.
    ///
    /// Returns the identifier and whether it was added to the index.
    pub fn insert(&mut self, signature: Signature) -> (SignatureId, bool) {
        let id = self.store.insert(signature);
        let indexed = self.index.insert(&self.store, id);
        (id, indexed)
    }

    /// Parse one signature line and insert it.
    ///
    /// With `barename` set, a supplied `filename` is reduced to its final component.
    pub fn add(
        &mut self,
        text: &str,
        filename: Option<&str>,
        provenance: Option<&str>,
    ) -> Result<SignatureId, ParseError> {
        let filename = filename.map(|f| self.prepare_filename(f));
        let signature = Signature::parse(text, filename, provenance)?;
        Ok(self.insert(signature).0)
    }

    /// Read a known-hash stream, one record per line.
    ///
    /// A header on the first line is skipped. Blank lines are ignored. Malformed
    /// lines are recorded in the report and skipped. Only a failing reader
    /// aborts the load; signatures stored before the failure stay stored.
    pub fn load<R: BufRead>(
        &mut self,
        mut reader: R,
        provenance: &str,
    ) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| LoadError::StreamFailure {
                    line: line_no,
                    source,
                })?;
            if n == 0 {
                break;
            }
            line_no += 1;

            let line = match std::str::from_utf8(&buf) {
                Ok(s) => chop_line(s),
                Err(_) => {
                    report.reject(line_no, ParseError::InvalidFormat("line is not valid UTF-8"));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            if line_no == 1 && is_header(line) {
                report.header = true;
                continue;
            }

            match Signature::parse(line, None, Some(provenance)) {
                Ok(signature) => {
                    let (id, indexed) = self.insert(signature);
                    report.loaded.push(id);
                    if !indexed {
                        report.duplicates += 1;
                    }
                }
                Err(error) => report.reject(line_no, error),
            }
        }

        tracing::info!(
            provenance,
            lines = line_no,
            loaded = report.loaded.len(),
            skipped = report.diagnostics.len(),
            duplicates = report.duplicates,
            "loaded known hashes"
        );
        Ok(report)
    }

    /// Index matches for `signature` with `score >= threshold`.
    pub fn match_signature(&self, signature: &Signature, threshold: u8) -> Vec<(SignatureId, u8)> {
        find_matches(&self.store, &self.index, signature, threshold)
    }

    /// Index matches for a stored signature at the configured threshold,
    /// excluding the signature itself.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this engine.
    pub fn matches_for(&self, id: SignatureId) -> Vec<(SignatureId, u8)> {
        let mut out = self.match_signature(&self.store[id], self.options.threshold);
        out.retain(|&(other, _)| other != id);
        out
    }

    /// Hash `bytes` and match the result against the index without storing it.
    pub fn hash_and_match<H: FuzzyHasher + ?Sized>(
        &self,
        hasher: &H,
        bytes: &[u8],
        filename: &str,
    ) -> Result<(Signature, Vec<(SignatureId, u8)>), ParseError> {
        let signature = Signature::compute(hasher, bytes, self.prepare_filename(filename))?;
        let matches = self.match_signature(&signature, self.options.threshold);
        Ok((signature, matches))
    }

    /// Every unordered pair of indexed signatures that match at the configured
    /// threshold, each reported once with the smaller identifier first.
    ///
    /// Signatures stored as value duplicates of an indexed one take no part;
    /// the indexed copy stands for them.
    pub fn match_all(&self) -> Vec<(SignatureId, SignatureId, u8)> {
        let mut pairs = BTreeSet::new();
        for id in self.index.ids() {
            for other in self.index.candidates_for(&self.store[id]) {
                if other != id {
                    pairs.insert((id.min(other), id.max(other)));
                }
            }
        }
        let pairs: Vec<_> = pairs.into_iter().collect();
        let mut out = score_pairs(
            &self.store,
            &pairs,
            self.options.threshold,
            self.options.parallel,
        );
        sort_pairs(&mut out);
        out
    }

    /// All-pairs comparison of two groups of stored signatures at the
    /// configured threshold.
    ///
    /// # Panics
    ///
    /// Panics if any identifier was not issued by this engine.
    pub fn compare_unknown(
        &self,
        signatures_a: &[SignatureId],
        signatures_b: &[SignatureId],
    ) -> Vec<(SignatureId, SignatureId, u8)> {
        compare_unknown(
            &self.store,
            signatures_a,
            signatures_b,
            self.options.threshold,
            self.options.parallel,
        )
    }

    /// Drop every stored and indexed signature.
    pub fn reset(&mut self) {
        self.index.clear();
        self.store.clear();
    }

    fn prepare_filename<'a>(&self, filename: &'a str) -> &'a str {
        if self.options.barename {
            basename(filename)
        } else {
            filename
        }
    }
}

impl LoadReport {
    fn reject(&mut self, line: usize, error: ParseError) {
        tracing::debug!(line, %error, "skipping malformed known-hash line");
        self.diagnostics.push(LineDiagnostic { line, error });
    }
}
