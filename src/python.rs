use std::collections::HashMap;
use std::path::PathBuf;

use ahash::AHashSet;
use pyo3::exceptions::{PyIOError, PyTimeoutError, PyValueError};
use pyo3::prelude::*;

use crate::analysis::{AnalysisError, Analyzer, AnnotatedToken, LexiconAnalyzer, LATIN_STOPWORDS};
use crate::catalog::{AuthorRow, WorkRow};
use crate::config::{FuzzyAlgorithm, ReconcileConfig};
use crate::error::ReconcileError;
use crate::io::{reconcile_files, RunPaths};
use crate::reconcile::{OutputDecision, RawRecord, ReconcileReport, Reconciler, RunSummary};
use crate::segment;
use crate::similarity;

impl From<ReconcileError> for PyErr {
    fn from(err: ReconcileError) -> Self {
        match &err {
            ReconcileError::Dataset { .. } | ReconcileError::Output { .. } | ReconcileError::Io(_) => {
                PyIOError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// A harvested record: dict with `author`, `title` and `url` (may be None).
#[derive(Debug, FromPyObject)]
#[pyo3(from_item_all)]
struct RecordData {
    author: String,
    title: String,
    url: Option<String>,
}

impl From<RecordData> for RawRecord {
    fn from(data: RecordData) -> Self {
        Self {
            author: data.author,
            title: data.title,
            url: data.url.unwrap_or_default(),
        }
    }
}

#[derive(Debug, FromPyObject)]
#[pyo3(from_item_all)]
struct AuthorData {
    author: String,
    author_payload: String,
}

#[derive(Debug, FromPyObject)]
#[pyo3(from_item_all)]
struct WorkData {
    author_id: String,
    work_id: String,
    title: String,
}

/// One decision row, returned as a dict
#[derive(Clone, Debug, IntoPyObject)]
struct DecisionData {
    author: String,
    title: String,
    url: String,
    author_id: Option<String>,
    matched_title: Option<String>,
    matched_work_id: Option<String>,
    confidence_score: Option<f64>,
    flagged_for_review: bool,
}

impl From<OutputDecision> for DecisionData {
    fn from(decision: OutputDecision) -> Self {
        Self {
            author: decision.author,
            title: decision.title,
            url: decision.url,
            author_id: decision.author_id,
            matched_title: decision.matched_title,
            matched_work_id: decision.matched_work_id,
            confidence_score: decision.confidence_score,
            flagged_for_review: decision.flagged_for_review,
        }
    }
}

#[derive(Clone, Debug, IntoPyObject)]
struct SummaryData {
    records: usize,
    decisions: usize,
    matched: usize,
    no_confident_match: usize,
    no_candidates: usize,
    unknown_author: usize,
    malformed_payload: usize,
    degraded_analysis: usize,
    flagged_rows: usize,
}

impl From<RunSummary> for SummaryData {
    fn from(summary: RunSummary) -> Self {
        Self {
            records: summary.records,
            decisions: summary.decisions,
            matched: summary.matched,
            no_confident_match: summary.no_confident_match,
            no_candidates: summary.no_candidates,
            unknown_author: summary.unknown_author,
            malformed_payload: summary.malformed_payload,
            degraded_analysis: summary.degraded_analysis,
            flagged_rows: summary.flagged_rows,
        }
    }
}

/// Analyzer backed by a Python callable.
///
/// The callable takes the lowercased text and returns a list of
/// `(surface, lemma, is_stopword, is_punct, is_alpha)` tuples. A
/// `TimeoutError` raised by it counts as a transient failure.
struct PyAnalyzer {
    callable: Py<PyAny>,
    stopwords: AHashSet<String>,
}

impl Analyzer for PyAnalyzer {
    fn analyze(&self, lowercased_text: &str) -> Result<Vec<AnnotatedToken>, AnalysisError> {
        Python::with_gil(|py| {
            let result = self
                .callable
                .call1(py, (lowercased_text,))
                .map_err(|err| {
                    if err.is_instance_of::<PyTimeoutError>(py) {
                        AnalysisError::Transient(err.to_string())
                    } else {
                        AnalysisError::Failed(err.to_string())
                    }
                })?;
            let tokens: Vec<(String, String, bool, bool, bool)> = result
                .extract(py)
                .map_err(|err| AnalysisError::Failed(err.to_string()))?;

            Ok(tokens
                .into_iter()
                .map(|(surface, lemma, is_stopword, is_punct, is_alpha)| AnnotatedToken {
                    surface,
                    lemma,
                    is_stopword,
                    is_punct,
                    is_alpha,
                })
                .collect())
        })
    }

    fn default_stopwords(&self) -> &AHashSet<String> {
        &self.stopwords
    }
}

fn parse_algorithm(name: &str) -> PyResult<FuzzyAlgorithm> {
    match name {
        "levenshtein" => Ok(FuzzyAlgorithm::Levenshtein),
        "jaro_winkler" => Ok(FuzzyAlgorithm::JaroWinkler),
        other => Err(PyValueError::new_err(format!("unknown fuzzy algorithm: {other}"))),
    }
}

fn run_batch<A: Analyzer>(
    analyzer: A,
    config: &ReconcileConfig,
    records: &[RawRecord],
    authors: Vec<AuthorRow>,
    works: Vec<WorkRow>,
) -> crate::Result<ReconcileReport> {
    Reconciler::new(analyzer, config, authors, works)?.reconcile_all(records)
}

/// Primary title segment of a raw title
#[pyfunction]
fn extract_primary_title(raw_title: &str) -> String {
    segment::extract_primary_title(raw_title).to_string()
}

/// Token sort ratio for Python: returns float 0.0-100.0
#[pyfunction]
#[pyo3(name = "token_sort_ratio", signature = (s1, s2, algorithm = "levenshtein"))]
fn py_token_sort_ratio(s1: &str, s2: &str, algorithm: &str) -> PyResult<f64> {
    Ok(similarity::token_sort_ratio(s1, s2, parse_algorithm(algorithm)?))
}

#[pyfunction]
fn jaccard_similarity(a: Vec<String>, b: Vec<String>) -> f64 {
    similarity::jaccard(&a, &b)
}

/// Reconcile in-memory rows. Returns `(decisions, summary)`.
///
/// Without `analyzer` the built-in lexicon analyzer is used, extended with
/// `lexicon` (form to lemma). The GIL is released while the batch runs.
#[pyfunction]
#[pyo3(signature = (records, authors, works, config_toml = None, analyzer = None, lexicon = None, analyzer_stopwords = None))]
#[allow(clippy::too_many_arguments)]
fn reconcile_batch(
    py: Python<'_>,
    records: Vec<RecordData>,
    authors: Vec<AuthorData>,
    works: Vec<WorkData>,
    config_toml: Option<&str>,
    analyzer: Option<Py<PyAny>>,
    lexicon: Option<HashMap<String, String>>,
    analyzer_stopwords: Option<Vec<String>>,
) -> PyResult<(Vec<DecisionData>, SummaryData)> {
    let config = match config_toml {
        Some(text) => ReconcileConfig::from_toml_str(text)?,
        None => ReconcileConfig::default(),
    };
    let records: Vec<RawRecord> = records.into_iter().map(RawRecord::from).collect();
    let authors: Vec<AuthorRow> = authors
        .into_iter()
        .map(|a| AuthorRow {
            author: a.author,
            author_payload: a.author_payload,
        })
        .collect();
    let works: Vec<WorkRow> = works
        .into_iter()
        .map(|w| WorkRow {
            author_id: w.author_id,
            work_id: w.work_id,
            title: w.title,
        })
        .collect();

    let report = match analyzer {
        Some(callable) => {
            let stopwords: AHashSet<String> = match analyzer_stopwords {
                Some(words) => words.into_iter().map(|w| w.to_lowercase()).collect(),
                None => LATIN_STOPWORDS.iter().map(|w| (*w).to_string()).collect(),
            };
            let analyzer = PyAnalyzer {
                callable,
                stopwords,
            };
            py.allow_threads(move || run_batch(analyzer, &config, &records, authors, works))?
        }
        None => {
            let mut analyzer = LexiconAnalyzer::from_config(&config.normalization)?;
            if let Some(entries) = lexicon {
                analyzer = analyzer.with_lexicon(entries);
            }
            analyzer.warn_if_no_lexicon();
            py.allow_threads(move || run_batch(analyzer, &config, &records, authors, works))?
        }
    };

    let decisions = report.decisions.into_iter().map(DecisionData::from).collect();
    Ok((decisions, report.summary.into()))
}

/// Reconcile CSV files and write the decision table to `output`.
#[pyfunction]
#[pyo3(name = "reconcile_files", signature = (records, authors, works, output, config_path = None))]
fn py_reconcile_files(
    py: Python<'_>,
    records: PathBuf,
    authors: PathBuf,
    works: PathBuf,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> PyResult<SummaryData> {
    let config = match config_path {
        Some(path) => ReconcileConfig::load(&path)?,
        None => ReconcileConfig::default(),
    };

    let summary = py.allow_threads(move || {
        let paths = RunPaths {
            records: &records,
            authors: &authors,
            works: &works,
            output: &output,
        };
        reconcile_files(&paths, &config)
    })?;
    Ok(summary.into())
}

/// A Python module implemented in Rust.
#[pymodule]
fn _rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(extract_primary_title, m)?)?;
    m.add_function(wrap_pyfunction!(py_token_sort_ratio, m)?)?;
    m.add_function(wrap_pyfunction!(jaccard_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(reconcile_batch, m)?)?;
    m.add_function(wrap_pyfunction!(py_reconcile_files, m)?)?;
    Ok(())
}
