//! Matching and clustering options.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distance::MAX_SCORE;
use crate::error::ConfigError;

/// Default minimum score for a match.
pub const DEFAULT_THRESHOLD: u8 = 1;

/// Options consumed by [`crate::MatchEngine`] and [`crate::ClusterEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Minimum score (inclusive) for two signatures to match.
    pub threshold: u8,

    /// Store only the final path component of externally supplied filenames.
    pub barename: bool,

    /// Score independent pairs on the rayon thread pool.
    pub parallel: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            barename: false,
            parallel: true,
        }
    }
}

impl Options {
    /// Parse options from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold > MAX_SCORE {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    /// Same options with a different threshold.
    pub fn with_threshold(self, threshold: u8) -> Self {
        Self { threshold, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let o = Options::default();
        assert_eq!(o.threshold, DEFAULT_THRESHOLD);
        assert!(!o.barename);
        assert!(o.parallel);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let o = Options::from_toml_str("threshold = 40\n").unwrap();
        assert_eq!(o.threshold, 40);
        assert!(o.parallel);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(matches!(
            Options::from_toml_str("threshold = 101"),
            Err(ConfigError::InvalidThreshold(101))
        ));
        assert!(matches!(
            Options::from_toml_str("threshold = \"high\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "barename = true\nparallel = false").unwrap();
        let o = Options::load_from(file.path()).unwrap();
        assert!(o.barename);
        assert!(!o.parallel);
        assert_eq!(o.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Options::load_from(dir.path().join("nope.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
