use ahash::AHashSet;

use crate::analysis::{AnalysisError, Analyzer};
use crate::config::NormalizationConfig;

/// Inflected forms of "liber". Present in nearly every catalog title, so they
/// carry no signal for telling works apart.
pub const BOOK_FORMS: &[&str] = &[
    "liber", "libri", "libro", "librum", "libros", "librorum", "libris",
];

/// Stopwords applied on top of whatever the analyzer flags itself.
///
/// Built once per run and shared read-only by every normalization call.
#[derive(Debug, Clone, Default)]
pub struct StopwordSet {
    words: AHashSet<String>,
}

impl StopwordSet {
    /// Union of the analyzer's defaults, [`BOOK_FORMS`] and `extra`.
    pub fn build<A: Analyzer + ?Sized>(analyzer: &A, extra: &[String]) -> Self {
        let mut words = analyzer.default_stopwords().clone();
        words.extend(BOOK_FORMS.iter().map(|w| (*w).to_string()));
        words.extend(extra.iter().map(|w| w.to_lowercase()));
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Turns a title into its ordered content lemmas.
pub struct Normalizer<A: Analyzer> {
    analyzer: A,
    stopwords: StopwordSet,
    attempts: u32,
}

impl<A: Analyzer> Normalizer<A> {
    pub fn new(analyzer: A, config: &NormalizationConfig) -> Self {
        let stopwords = StopwordSet::build(&analyzer, &config.extra_stopwords);
        tracing::debug!(stopwords = stopwords.len(), "built stopword set");
        Self {
            analyzer,
            stopwords,
            attempts: config.analysis_attempts.max(1),
        }
    }

    pub fn stopwords(&self) -> &StopwordSet {
        &self.stopwords
    }

    /// Lemmas of the alphabetic, non-stopword, non-punctuation tokens of `text`.
    ///
    /// Analysis failures degrade to an empty sequence.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        self.try_normalize(text).unwrap_or_else(|err| {
            tracing::warn!(text, error = %err, "analysis failed, using empty token sequence");
            Vec::new()
        })
    }

    /// Like [`Normalizer::normalize`] but reports analysis failures.
    ///
    /// Transient failures are retried until the configured attempts run out.
    pub fn try_normalize(&self, text: &str) -> Result<Vec<String>, AnalysisError> {
        let lowered = text.to_lowercase();
        if lowered.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 1;
        let tokens = loop {
            match self.analyzer.analyze(&lowered) {
                Ok(tokens) => break tokens,
                Err(AnalysisError::Transient(reason)) if attempt < self.attempts => {
                    tracing::debug!(text, attempt, reason = %reason, "retrying transient analysis failure");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        Ok(tokens
            .into_iter()
            .filter(|token| {
                !token.is_stopword
                    && !token.is_punct
                    && token.is_alpha
                    && !self.stopwords.contains(&token.surface)
            })
            .map(|token| token.lemma)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnnotatedToken, LexiconAnalyzer};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn normalizer() -> Normalizer<LexiconAnalyzer> {
        let analyzer = LexiconAnalyzer::new().with_lexicon([
            ("aeneidos", "aeneis"),
            ("sententiarum", "sententia"),
        ]);
        Normalizer::new(analyzer, &NormalizationConfig::default())
    }

    /// Fails transiently a fixed number of times before answering.
    struct FlakyAnalyzer {
        failures_left: AtomicU32,
        permanent: bool,
        stopwords: AHashSet<String>,
    }

    impl FlakyAnalyzer {
        fn new(failures: u32, permanent: bool) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                permanent,
                stopwords: AHashSet::new(),
            }
        }
    }

    impl Analyzer for FlakyAnalyzer {
        fn analyze(&self, text: &str) -> Result<Vec<AnnotatedToken>, AnalysisError> {
            if self.permanent {
                return Err(AnalysisError::Failed("model crashed".to_string()));
            }
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(AnalysisError::Transient("timeout".to_string()));
            }
            Ok(text
                .split_whitespace()
                .map(|w| AnnotatedToken {
                    surface: w.to_string(),
                    lemma: w.to_string(),
                    is_stopword: false,
                    is_punct: false,
                    is_alpha: true,
                })
                .collect())
        }

        fn default_stopwords(&self) -> &AHashSet<String> {
            &self.stopwords
        }
    }

    #[test]
    fn test_normalize_filters_and_lemmatizes() {
        let tokens = normalizer().normalize("Petri Lombardi Libri IV Sententiarum");
        assert_eq!(tokens, vec!["petri", "lombardi", "iv", "sententia"]);
    }

    #[test]
    fn test_book_forms_are_stopwords() {
        let normalizer = normalizer();
        for form in BOOK_FORMS {
            assert!(normalizer.stopwords().contains(form));
        }
        assert_eq!(normalizer.normalize("Aeneidos Libri XII"), vec!["aeneis", "xii"]);
        assert!(normalizer.normalize("LIBER LIBRORUM").is_empty());
    }

    #[test]
    fn test_stopword_union() {
        let config = NormalizationConfig {
            extra_stopwords: vec!["Opera".to_string()],
            ..Default::default()
        };
        let normalizer = Normalizer::new(LexiconAnalyzer::new(), &config);
        assert!(normalizer.stopwords().contains("et"));
        assert!(normalizer.stopwords().contains("libris"));
        assert!(normalizer.stopwords().contains("opera"));
        assert_eq!(normalizer.normalize("Opera omnia et fragmenta"), vec!["omnia", "fragmenta"]);
    }

    #[test]
    fn test_drops_numbers_and_punctuation() {
        let tokens = normalizer().normalize("Confessiones, 1550 (editio princeps)!");
        assert_eq!(tokens, vec!["confessiones", "editio", "princeps"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalizer().normalize("").is_empty());
        assert!(normalizer().normalize("  ").is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = normalizer();
        let title = "De consolatione philosophiae libri quinque";
        assert_eq!(normalizer.normalize(title), normalizer.normalize(title));
    }

    #[test]
    fn test_transient_failure_retried() {
        let normalizer = Normalizer::new(FlakyAnalyzer::new(1, false), &NormalizationConfig::default());
        assert_eq!(normalizer.try_normalize("aeneis").unwrap(), vec!["aeneis"]);
    }

    #[test]
    fn test_transient_failure_exhausts_attempts() {
        let normalizer = Normalizer::new(FlakyAnalyzer::new(5, false), &NormalizationConfig::default());
        assert!(matches!(
            normalizer.try_normalize("aeneis"),
            Err(AnalysisError::Transient(_))
        ));
    }

    #[test]
    fn test_permanent_failure_degrades_to_empty() {
        let normalizer = Normalizer::new(FlakyAnalyzer::new(0, true), &NormalizationConfig::default());
        assert!(normalizer.try_normalize("aeneis").is_err());
        assert!(normalizer.normalize("aeneis").is_empty());
    }
}
