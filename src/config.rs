use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

pub const DEFAULT_OVERLAP_WEIGHT: f64 = 0.6;
pub const DEFAULT_FUZZY_WEIGHT: f64 = 0.4;
/// A top candidate must score strictly above this to count as a match.
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.25;
/// Matched rows scoring below this are flagged for review.
pub const DEFAULT_REVIEW_FLOOR: f64 = 0.5;
pub const DEFAULT_MAX_CANDIDATES: usize = 3;
pub const DEFAULT_ANALYSIS_ATTEMPTS: u32 = 2;

const WEIGHT_EPSILON: f64 = 1e-9;

/// Root configuration for a reconciliation run, usually loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub normalization: NormalizationConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub overlap_weight: f64,
    pub fuzzy_weight: f64,
    pub fuzzy_algorithm: FuzzyAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub confidence_floor: f64,
    pub review_floor: f64,
    pub max_candidates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Added on top of the analyzer defaults and the forms of "liber".
    pub extra_stopwords: Vec<String>,
    /// Tab-separated `form<TAB>lemma` file for the built-in analyzer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexicon_path: Option<PathBuf>,
    /// Total attempts for a title whose analysis fails transiently.
    pub analysis_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub parallel: bool,
    /// Abort the batch on the first unparseable author payload instead of
    /// flagging the record.
    pub strict_payloads: bool,
}

/// Character-level metric applied to the token-sorted raw titles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyAlgorithm {
    #[default]
    Levenshtein,
    JaroWinkler,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            overlap_weight: DEFAULT_OVERLAP_WEIGHT,
            fuzzy_weight: DEFAULT_FUZZY_WEIGHT,
            fuzzy_algorithm: FuzzyAlgorithm::default(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            review_floor: DEFAULT_REVIEW_FLOOR,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            extra_stopwords: Vec::new(),
            lexicon_path: None,
            analysis_attempts: DEFAULT_ANALYSIS_ATTEMPTS,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            strict_payloads: false,
        }
    }
}

impl ReconcileConfig {
    /// Load and validate a config file. Missing sections and keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let scoring = &self.scoring;
        check_unit("scoring.overlap_weight", scoring.overlap_weight)?;
        check_unit("scoring.fuzzy_weight", scoring.fuzzy_weight)?;
        let total = scoring.overlap_weight + scoring.fuzzy_weight;
        if (total - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ReconcileError::InvalidConfig(format!(
                "scoring weights must sum to 1.0, got {total}"
            )));
        }

        let selection = &self.selection;
        check_unit("selection.confidence_floor", selection.confidence_floor)?;
        check_unit("selection.review_floor", selection.review_floor)?;
        if selection.review_floor < selection.confidence_floor {
            return Err(ReconcileError::InvalidConfig(format!(
                "selection.review_floor ({}) is below selection.confidence_floor ({})",
                selection.review_floor, selection.confidence_floor
            )));
        }
        if selection.max_candidates == 0 {
            return Err(ReconcileError::InvalidConfig(
                "selection.max_candidates must be at least 1".to_string(),
            ));
        }

        if self.normalization.analysis_attempts == 0 {
            return Err(ReconcileError::InvalidConfig(
                "normalization.analysis_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ReconcileError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReconcileConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.scoring.overlap_weight - 0.6).abs() < 1e-12);
        assert!((config.selection.confidence_floor - 0.25).abs() < 1e-12);
        assert_eq!(config.selection.max_candidates, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReconcileConfig::from_toml_str(
            r#"
            [selection]
            max_candidates = 5

            [scoring]
            fuzzy_algorithm = "jaro_winkler"
            "#,
        )
        .unwrap();

        assert_eq!(config.selection.max_candidates, 5);
        assert!((config.selection.review_floor - 0.5).abs() < 1e-12);
        assert_eq!(config.scoring.fuzzy_algorithm, FuzzyAlgorithm::JaroWinkler);
        assert!(config.runtime.parallel);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let result = ReconcileConfig::from_toml_str(
            r#"
            [scoring]
            overlap_weight = 0.7
            fuzzy_weight = 0.4
            "#,
        );
        assert!(matches!(result, Err(ReconcileError::InvalidConfig(_))));
    }

    #[test]
    fn test_review_floor_below_confidence_floor_rejected() {
        let mut config = ReconcileConfig::default();
        config.selection.review_floor = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = ReconcileConfig::default();
        config.normalization.analysis_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_algorithm_is_parse_error() {
        let result = ReconcileConfig::from_toml_str(
            r#"
            [scoring]
            fuzzy_algorithm = "soundex"
            "#,
        );
        assert!(matches!(result, Err(ReconcileError::TomlParse(_))));
    }
}
