//! `ctphir`: fuzzy (CTPH) signature matching and clustering.
//!
//! This crate works on already computed context-triggered piecewise hashes:
//! - parse and format `blocksize:sig1:sig2,"filename"` records
//! - index known signatures by block size for candidate lookup
//! - score signature pairs and apply a match threshold
//! - group transitively similar signatures into clusters
//!
//! Computing the rolling hash itself is left to a [`FuzzyHasher`]
//! implementation. Walking the filesystem and printing results belong elsewhere.

#![warn(missing_docs)]

pub mod cluster;
pub mod config;
pub mod distance;
pub mod error;
pub mod index;
pub mod matching;
pub mod signature;
pub mod store;
pub mod strings;

pub use cluster::{Cluster, ClusterEngine, ClusterId};
pub use config::Options;
pub use distance::{edit_distance, score_strings};
pub use error::{ConfigError, LoadError, ParseError};
pub use index::SignatureIndex;
pub use matching::{compare, compare_unknown, find_matches, LineDiagnostic, LoadReport, MatchEngine};
pub use signature::{FuzzyHasher, Signature};
pub use store::{SignatureId, SignatureStore};
