//! # Pipeline configuration
//!
//! This module defines [`PipelineConfig`], the validated configuration structure passed to
//! the store and the batcher at construction. It replaces any process-wide mutable defaults:
//! the grouping-key column names and the batching knobs are explicit values, checked once,
//! before any store access.
//!
//! ## Example
//!
//! ```toml
//! # stacking.toml
//! independent = ["telescope", "camera", "instrument"]
//! nstack = 4
//! maxseq = 12
//! max_gap_seconds = 1800
//! ```
//!
//! ```rust
//! use nightstack::config::PipelineConfig;
//!
//! let config = PipelineConfig::new(vec![
//!     "telescope".into(),
//!     "camera".into(),
//!     "instrument".into(),
//! ]);
//! assert!(config.validate().is_ok());
//! ```

use camino::Utf8Path;
use chrono::TimeDelta;
use serde::Deserialize;
use std::collections::HashSet;

use crate::constants::{MAXSEQ, MAX_BURST_GAP_SECONDS, NSTACK};
use crate::nightstack_errors::NightstackError;

/// Configuration of one processing run.
///
/// Fields
/// -----------------
/// * `independent` - ordered grouping-key column names ("independent columns"); every
///   segmentation and batching decision happens within one partition of these columns.
/// * `nstack` - number of exposures combined into a single stack group.
/// * `maxseq` - longest burst still eligible for stacking; longer bursts pass through.
/// * `max_gap_seconds` - maximum gap between consecutive exposures of one burst.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub independent: Vec<String>,
    #[serde(default = "default_nstack")]
    pub nstack: usize,
    #[serde(default = "default_maxseq")]
    pub maxseq: usize,
    #[serde(default = "default_max_gap_seconds")]
    pub max_gap_seconds: i64,
}

fn default_nstack() -> usize {
    NSTACK
}

fn default_maxseq() -> usize {
    MAXSEQ
}

fn default_max_gap_seconds() -> i64 {
    MAX_BURST_GAP_SECONDS
}

impl PipelineConfig {
    /// Build a configuration with the default batching knobs.
    pub fn new(independent: Vec<String>) -> Self {
        PipelineConfig {
            independent,
            nstack: NSTACK,
            maxseq: MAXSEQ,
            max_gap_seconds: MAX_BURST_GAP_SECONDS,
        }
    }

    /// Load and validate a configuration from a TOML file.
    ///
    /// Arguments
    /// ---------
    /// * `path`: path to the TOML configuration file.
    ///
    /// Return
    /// ------
    /// * The validated [`PipelineConfig`], or the first configuration error found.
    pub fn from_toml_file(path: &Utf8Path) -> Result<Self, NightstackError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before any store access.
    ///
    /// A missing or empty grouping-key column list is a configuration error, not a
    /// runtime condition to recover from.
    pub fn validate(&self) -> Result<(), NightstackError> {
        if self.independent.is_empty() {
            return Err(NightstackError::InvalidConfiguration(
                "independent columns list is empty".to_string(),
            ));
        }
        let unique: HashSet<&str> = self.independent.iter().map(String::as_str).collect();
        if unique.len() != self.independent.len() {
            return Err(NightstackError::InvalidConfiguration(
                "independent columns list contains duplicates".to_string(),
            ));
        }
        for column in &self.independent {
            if column.is_empty()
                || !column
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(NightstackError::InvalidConfiguration(format!(
                    "invalid independent column name: {column:?}"
                )));
            }
        }
        if self.nstack < 2 {
            return Err(NightstackError::InvalidConfiguration(format!(
                "nstack must be at least 2, got {}",
                self.nstack
            )));
        }
        if self.maxseq < self.nstack {
            return Err(NightstackError::InvalidConfiguration(format!(
                "maxseq ({}) must be at least nstack ({})",
                self.maxseq, self.nstack
            )));
        }
        if self.max_gap_seconds <= 0 {
            return Err(NightstackError::InvalidConfiguration(format!(
                "max_gap_seconds must be positive, got {}",
                self.max_gap_seconds
            )));
        }
        Ok(())
    }

    /// Maximum burst gap as a time delta.
    pub fn max_gap(&self) -> TimeDelta {
        TimeDelta::seconds(self.max_gap_seconds)
    }
}

#[cfg(test)]
mod test_config {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new(vec!["telescope".into()]);
        assert_eq!(config.nstack, 4);
        assert_eq!(config.maxseq, 12);
        assert_eq!(config.max_gap(), TimeDelta::minutes(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_with_defaults() {
        let config: PipelineConfig =
            toml::from_str(r#"independent = ["telescope", "camera", "instrument"]"#).unwrap();
        assert_eq!(config.independent.len(), 3);
        assert_eq!(config.nstack, 4);
        assert_eq!(config.maxseq, 12);
        assert_eq!(config.max_gap_seconds, 1800);
    }

    #[test]
    fn test_toml_overrides() {
        let config: PipelineConfig = toml::from_str(
            r#"
independent = ["telescope"]
nstack = 3
maxseq = 9
max_gap_seconds = 600
"#,
        )
        .unwrap();
        assert_eq!(config.nstack, 3);
        assert_eq!(config.maxseq, 9);
        assert_eq!(config.max_gap(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_empty_independent_rejected() {
        let config = PipelineConfig::new(vec![]);
        assert!(matches!(
            config.validate(),
            Err(NightstackError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_duplicate_independent_rejected() {
        let config = PipelineConfig::new(vec!["telescope".into(), "telescope".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_column_name_rejected() {
        let config = PipelineConfig::new(vec!["telescope; drop table".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_chunk_sizes_rejected() {
        let mut config = PipelineConfig::new(vec!["telescope".into()]);
        config.nstack = 1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new(vec!["telescope".into()]);
        config.maxseq = 2;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new(vec!["telescope".into()]);
        config.max_gap_seconds = 0;
        assert!(config.validate().is_err());
    }
}
