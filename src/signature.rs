//! Parsed CTPH signatures.
//!
//! A signature line has the shape
//!
//! ```text
//! blocksize:sig1:sig2[,"filename"]
//! ```
//!
//! where `sig1` was computed with `blocksize` and `sig2` with `blocksize * 2`.
//! The filename field is optional when the caller already knows the filename
//! (e.g. the file was just hashed) and mandatory otherwise.
//!
//! ```rust
//! use ctphir::Signature;
//!
//! let sig = Signature::parse("12288:abc:def,\"bar.txt\"", None, None).unwrap();
//! assert_eq!(sig.block_size(), 12288);
//! assert_eq!(sig.filename(), "bar.txt");
//! assert_eq!(sig.to_string(), "12288:abc:def");
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ParseError;

/// The rolling-hash engine that turns file bytes into signature text.
///
/// Implementations return `blocksize:sig1:sig2` without a filename field.
pub trait FuzzyHasher {
    /// Compute the signature text for `bytes`.
    fn compute_signature(&self, bytes: &[u8]) -> String;
}

/// One fuzzy hash plus the name of the file it describes.
///
/// Equality and hashing consider only the raw `blocksize:sig1:sig2` text and the
/// provenance. Two identical hashes of differently named files are equal.
#[derive(Debug, Clone)]
pub struct Signature {
    raw: String,
    block_size: u64,
    sig1: String,
    sig2: String,
    filename: String,
    provenance: Option<String>,
}

impl Signature {
    /// Parse a signature line.
    ///
    /// `filename`, when given, takes precedence over an embedded filename field and
    /// the field is not inspected at all. Without it, the line must end in a
    /// `,"filename"` field whose closing quote is the final character.
    /// Escaped quotes inside the filename are kept verbatim.
    pub fn parse(
        text: &str,
        filename: Option<&str>,
        provenance: Option<&str>,
    ) -> Result<Self, ParseError> {
        let (block_text, rest) = text
            .split_once(':')
            .ok_or(ParseError::InvalidFormat("missing block size separator"))?;
        let (sig1, rest) = rest
            .split_once(':')
            .ok_or(ParseError::InvalidFormat("missing second signature separator"))?;
        let (sig2, field) = match rest.split_once(',') {
            Some((sig2, field)) => (sig2, Some(field)),
            None => (rest, None),
        };
        let block_size = parse_block_size(block_text)?;

        let filename = match (filename, field) {
            (Some(external), _) => external.to_owned(),
            (None, Some(field)) => parse_filename_field(field)?.to_owned(),
            (None, None) => return Err(ParseError::InvalidFormat("missing filename")),
        };

        // sig1 and sig2 are sub-slices of `text`, so the raw signature is the prefix
        // ending where sig2 ends.
        let raw_len = block_text.len() + sig1.len() + sig2.len() + 2;
        Ok(Self {
            raw: text[..raw_len].to_owned(),
            block_size,
            sig1: sig1.to_owned(),
            sig2: sig2.to_owned(),
            filename,
            provenance: provenance.map(str::to_owned),
        })
    }

    /// Hash `bytes` with `hasher` and parse the result under `filename`.
    pub fn compute<H: FuzzyHasher + ?Sized>(
        hasher: &H,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Self, ParseError> {
        let text = hasher.compute_signature(bytes);
        Self::parse(&text, Some(filename), None)
    }

    /// The `blocksize:sig1:sig2` text, never including a filename.
    pub fn raw_signature(&self) -> &str {
        &self.raw
    }

    /// Block size used for `sig1`.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Hash computed with [`Self::block_size`].
    pub fn sig1(&self) -> &str {
        &self.sig1
    }

    /// Hash computed with twice [`Self::block_size`].
    pub fn sig2(&self) -> &str {
        &self.sig2
    }

    /// Name of the file this signature describes.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Known-hash file this signature was loaded from, if any.
    pub fn provenance(&self) -> Option<&str> {
        self.provenance.as_deref()
    }

    /// True if this signature was loaded from a known-hash file.
    pub fn has_provenance(&self) -> bool {
        self.provenance.is_some()
    }

    /// Known-hash file record: `blocksize:sig1:sig2,"filename"`.
    ///
    /// Quotes inside the filename are written as-is.
    pub fn to_record(&self) -> String {
        format!("{},\"{}\"", self.raw, self.filename)
    }
}

fn parse_block_size(text: &str) -> Result<u64, ParseError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidFormat("block size is not a decimal number"));
    }
    if text.len() > 1 && text.starts_with('0') {
        return Err(ParseError::InvalidFormat("block size has leading zeros"));
    }
    match text.parse::<u64>() {
        Ok(0) => Err(ParseError::InvalidFormat("block size is zero")),
        Ok(n) => Ok(n),
        Err(_) => Err(ParseError::InvalidFormat("block size out of range")),
    }
}

/// `field` is everything after the comma that ends `sig2`.
fn parse_filename_field(field: &str) -> Result<&str, ParseError> {
    let quoted = field
        .strip_prefix('"')
        .ok_or(ParseError::InvalidFormat("filename field is not quoted"))?;
    quoted
        .strip_suffix('"')
        .ok_or(ParseError::UnterminatedQuote)
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.provenance == other.provenance
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
        self.provenance.hash(state);
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Signature {
    type Err = ParseError;

    /// Parse a full record; the filename field is required.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, None, None)
    }
}
