//! CSV datasets in, decision table out.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::analysis::LexiconAnalyzer;
use crate::catalog::{AuthorRow, WorkRow};
use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::reconcile::{OutputDecision, RawRecord, Reconciler, RunSummary};

/// Column order of the output artifact.
pub const OUTPUT_COLUMNS: [&str; 8] = [
    "author",
    "title",
    "url",
    "author_id",
    "matched_title",
    "matched_work_id",
    "confidence_score",
    "flagged_for_review",
];

/// Read every row of a headed CSV file. Any unreadable file or row is fatal.
pub fn load_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let dataset_err = |source: csv::Error| ReconcileError::Dataset {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(dataset_err)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()
        .map_err(dataset_err)?;

    tracing::info!(path = %path.display(), rows = rows.len(), "loaded dataset");
    Ok(rows)
}

pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    load_csv(path)
}

pub fn load_authors(path: &Path) -> Result<Vec<AuthorRow>> {
    load_csv(path)
}

pub fn load_works(path: &Path) -> Result<Vec<WorkRow>> {
    load_csv(path)
}

/// All three input tables, loaded before any record is processed.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub records: Vec<RawRecord>,
    pub authors: Vec<AuthorRow>,
    pub works: Vec<WorkRow>,
}

impl Datasets {
    pub fn load(records: &Path, authors: &Path, works: &Path) -> Result<Self> {
        Ok(Self {
            records: load_records(records)?,
            authors: load_authors(authors)?,
            works: load_works(works)?,
        })
    }
}

#[derive(Serialize)]
struct OutputRow<'a> {
    author: &'a str,
    title: &'a str,
    url: &'a str,
    author_id: &'a str,
    matched_title: &'a str,
    matched_work_id: &'a str,
    confidence_score: String,
    flagged_for_review: &'static str,
}

impl<'a> From<&'a OutputDecision> for OutputRow<'a> {
    fn from(decision: &'a OutputDecision) -> Self {
        Self {
            author: &decision.author,
            title: &decision.title,
            url: &decision.url,
            author_id: decision.author_id.as_deref().unwrap_or_default(),
            matched_title: decision.matched_title.as_deref().unwrap_or_default(),
            matched_work_id: decision.matched_work_id.as_deref().unwrap_or_default(),
            confidence_score: decision
                .confidence_score
                .map(|score| format!("{score:.3}"))
                .unwrap_or_default(),
            flagged_for_review: if decision.flagged_for_review {
                "True"
            } else {
                "False"
            },
        }
    }
}

/// Write decisions as CSV: missing values are empty cells, scores carry three
/// decimals, flags are `True`/`False`.
pub fn write_decisions_to<W: Write>(writer: W, decisions: &[OutputDecision]) -> std::result::Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if decisions.is_empty() {
        csv_writer.write_record(OUTPUT_COLUMNS)?;
    }
    for decision in decisions {
        csv_writer.serialize(OutputRow::from(decision))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the decision table to `path`.
///
/// Rows are staged in a sibling temporary file that replaces `path` only once
/// every row is written, so a failed write leaves any previous output intact.
pub fn write_decisions(path: &Path, decisions: &[OutputDecision]) -> Result<()> {
    let output_err = |source: csv::Error| ReconcileError::Output {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let staged = tempfile::NamedTempFile::new_in(dir).map_err(|err| output_err(err.into()))?;
    write_decisions_to(std::io::BufWriter::new(staged.as_file()), decisions).map_err(output_err)?;
    staged
        .persist(path)
        .map_err(|err| output_err(err.error.into()))?;
    tracing::info!(path = %path.display(), rows = decisions.len(), "wrote decisions");
    Ok(())
}

/// Paths of one file-based run.
#[derive(Debug, Clone)]
pub struct RunPaths<'a> {
    pub records: &'a Path,
    pub authors: &'a Path,
    pub works: &'a Path,
    pub output: &'a Path,
}

/// Load all inputs, reconcile with the built-in analyzer and write the output.
///
/// Nothing is written unless every input loads and the whole batch succeeds.
pub fn reconcile_files(paths: &RunPaths<'_>, config: &ReconcileConfig) -> Result<RunSummary> {
    config.validate()?;
    let analyzer = LexiconAnalyzer::from_config(&config.normalization)?;
    analyzer.warn_if_no_lexicon();
    let datasets = Datasets::load(paths.records, paths.authors, paths.works)?;

    let reconciler = Reconciler::new(analyzer, config, datasets.authors, datasets.works)?;
    let report = reconciler.reconcile_all(&datasets.records)?;
    write_decisions(paths.output, &report.decisions)?;
    Ok(report.summary)
}
