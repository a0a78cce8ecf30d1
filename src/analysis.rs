//! Linguistic analysis capability used by the normalizer.
//!
//! The normalizer only relies on the [`Analyzer`] contract: for a lowercased
//! text, return its tokens annotated with a lemma and stopword, punctuation and
//! alphabetic flags. [`LexiconAnalyzer`] is the bundled rule-based
//! implementation; a statistical model can be plugged in through the trait.

use std::path::Path;

use ahash::{AHashMap, AHashSet};
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::NormalizationConfig;
use crate::error::{ReconcileError, Result};

/// Latin function words treated as stopwords by [`LexiconAnalyzer`].
pub const LATIN_STOPWORDS: &[&str] = &[
    "ab", "ac", "ad", "adhuc", "aliqui", "aliquis", "an", "ante", "apud", "at", "atque", "aut",
    "autem", "cum", "cur", "de", "deinde", "dum", "ego", "enim", "ergo", "es", "est", "et",
    "etiam", "etsi", "ex", "fio", "haud", "hic", "iam", "idem", "igitur", "ille", "in", "infra",
    "inter", "interim", "ipse", "is", "ita", "magis", "modo", "mox", "nam", "ne", "nec", "necque",
    "neque", "nisi", "non", "nos", "o", "ob", "per", "possum", "post", "pro", "quae", "quam",
    "quare", "qui", "quia", "quicumque", "quidem", "quilibet", "quis", "quisnam", "quisquam",
    "quisque", "quisquis", "quo", "quoniam", "sed", "si", "sic", "sive", "sub", "sui", "sum",
    "super", "suus", "tam", "tamen", "trans", "tu", "tum", "ubi", "uel", "uero", "unus", "ut",
];

/// A token as reported by the analysis capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedToken {
    pub surface: String,
    pub lemma: String,
    pub is_stopword: bool,
    pub is_punct: bool,
    pub is_alpha: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Worth retrying, e.g. a timeout in a remote model.
    #[error("transient analysis failure: {0}")]
    Transient(String),

    #[error("analysis failed: {0}")]
    Failed(String),
}

/// Lemmatizer and token tagger.
///
/// Implementations must be deterministic for a fixed input: catalog titles are
/// analyzed once and their lemmas cached for the whole run.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, lowercased_text: &str) -> std::result::Result<Vec<AnnotatedToken>, AnalysisError>;

    /// Stopwords the analyzer flags on its own.
    fn default_stopwords(&self) -> &AHashSet<String>;
}

/// Rule-based analyzer: Unicode word segmentation plus a form to lemma lexicon.
///
/// Forms missing from the lexicon are their own lemma.
#[derive(Debug, Clone)]
pub struct LexiconAnalyzer {
    lexicon: AHashMap<String, String>,
    stopwords: AHashSet<String>,
}

impl Default for LexiconAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconAnalyzer {
    pub fn new() -> Self {
        Self {
            lexicon: AHashMap::new(),
            stopwords: LATIN_STOPWORDS.iter().map(|w| (*w).to_string()).collect(),
        }
    }

    /// Default stopwords plus the lexicon file named in the config, if any.
    pub fn from_config(config: &NormalizationConfig) -> Result<Self> {
        match &config.lexicon_path {
            Some(path) => Self::new().load_lexicon(path),
            None => Ok(Self::new()),
        }
    }

    /// Add `(form, lemma)` pairs; both sides are lowercased.
    pub fn with_lexicon<I, F, L>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (F, L)>,
        F: AsRef<str>,
        L: AsRef<str>,
    {
        for (form, lemma) in entries {
            self.lexicon
                .insert(form.as_ref().to_lowercase(), lemma.as_ref().to_lowercase());
        }
        self
    }

    /// Load a headerless tab-separated `form<TAB>lemma` file.
    pub fn load_lexicon(self, path: &Path) -> Result<Self> {
        let dataset_err = |source: csv::Error| ReconcileError::Dataset {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(path)
            .map_err(dataset_err)?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.map_err(dataset_err)?;
            match (record.get(0), record.get(1)) {
                (Some(form), Some(lemma)) if !form.trim().is_empty() && !lemma.trim().is_empty() => {
                    entries.push((form.trim().to_string(), lemma.trim().to_string()));
                }
                _ => {
                    tracing::debug!(line = ?record.position().map(|p| p.line()), "skipping lexicon row");
                }
            }
        }

        tracing::info!(path = %path.display(), entries = entries.len(), "loaded lexicon");
        Ok(self.with_lexicon(entries))
    }

    pub fn lexicon_len(&self) -> usize {
        self.lexicon.len()
    }

    /// Warn when no lexicon is loaded: every form is then its own lemma and
    /// inflected titles only meet their catalog entry through fuzzy scoring.
    /// Returns whether the warning fired.
    pub fn warn_if_no_lexicon(&self) -> bool {
        if !self.lexicon.is_empty() {
            return false;
        }
        tracing::warn!("no lemma lexicon loaded, inflected forms will not be collapsed");
        true
    }

    fn lemma_of(&self, surface: &str) -> String {
        self.lexicon
            .get(surface)
            .cloned()
            .unwrap_or_else(|| surface.to_string())
    }
}

impl Analyzer for LexiconAnalyzer {
    fn analyze(&self, lowercased_text: &str) -> std::result::Result<Vec<AnnotatedToken>, AnalysisError> {
        let tokens = lowercased_text
            .split_word_bounds()
            .filter(|segment| !segment.chars().all(char::is_whitespace))
            .map(|surface| AnnotatedToken {
                lemma: self.lemma_of(surface),
                is_stopword: self.stopwords.contains(surface),
                is_punct: !surface.chars().any(char::is_alphanumeric),
                is_alpha: surface.chars().all(char::is_alphabetic),
                surface: surface.to_string(),
            })
            .collect();
        Ok(tokens)
    }

    fn default_stopwords(&self) -> &AHashSet<String> {
        &self.stopwords
    }
}
