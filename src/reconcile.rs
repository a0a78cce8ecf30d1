use rayon::prelude::*;
use serde::Deserialize;

use crate::analysis::Analyzer;
use crate::catalog::{AuthorIndex, AuthorLookup, AuthorRow, WorkCatalog, WorkRow};
use crate::config::{ReconcileConfig, RuntimeConfig};
use crate::error::{ReconcileError, Result};
use crate::normalize::Normalizer;
use crate::rank::{CandidateRanker, MatchOutcome, SelectedCandidate, SelectionPolicy};
use crate::segment::extract_primary_title;
use crate::similarity::SimilarityScorer;

/// One harvested title to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    pub author: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// One output row. A record yields one row, or up to the candidate cutoff
/// when it matched.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecision {
    pub author: String,
    pub title: String,
    pub url: String,
    pub author_id: Option<String>,
    pub matched_title: Option<String>,
    pub matched_work_id: Option<String>,
    pub confidence_score: Option<f64>,
    pub flagged_for_review: bool,
}

impl OutputDecision {
    /// Row without a matched work, always flagged.
    fn unmatched(record: &RawRecord, author_id: Option<&str>) -> Self {
        Self {
            author: record.author.clone(),
            title: record.title.clone(),
            url: record.url.clone(),
            author_id: author_id.map(str::to_string),
            matched_title: None,
            matched_work_id: None,
            confidence_score: None,
            flagged_for_review: true,
        }
    }

    /// `force_review` flags the row regardless of its score.
    fn matched(record: &RawRecord, author_id: &str, selected: SelectedCandidate, force_review: bool) -> Self {
        Self {
            author: record.author.clone(),
            title: record.title.clone(),
            url: record.url.clone(),
            author_id: Some(author_id.to_string()),
            matched_title: Some(selected.candidate.candidate_title),
            matched_work_id: Some(selected.candidate.work_id),
            confidence_score: Some(selected.candidate.score),
            flagged_for_review: selected.flagged_for_review || force_review,
        }
    }
}

/// How a single record was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    UnknownAuthor,
    MalformedPayload,
    NoCandidates,
    NoConfidentMatch,
    Matched,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordResolution {
    pub status: RecordStatus,
    /// The query title could not be analyzed and was scored on fuzzy similarity alone.
    pub degraded_analysis: bool,
    pub decisions: Vec<OutputDecision>,
}

/// Per-outcome counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub decisions: usize,
    pub matched: usize,
    pub no_confident_match: usize,
    pub no_candidates: usize,
    pub unknown_author: usize,
    pub malformed_payload: usize,
    pub degraded_analysis: usize,
    pub flagged_rows: usize,
}

impl RunSummary {
    fn record(&mut self, resolution: &RecordResolution) {
        self.records += 1;
        self.decisions += resolution.decisions.len();
        self.flagged_rows += resolution
            .decisions
            .iter()
            .filter(|d| d.flagged_for_review)
            .count();
        if resolution.degraded_analysis {
            self.degraded_analysis += 1;
        }
        match resolution.status {
            RecordStatus::Matched => self.matched += 1,
            RecordStatus::NoConfidentMatch => self.no_confident_match += 1,
            RecordStatus::NoCandidates => self.no_candidates += 1,
            RecordStatus::UnknownAuthor => self.unknown_author += 1,
            RecordStatus::MalformedPayload => self.malformed_payload += 1,
        }
    }
}

/// Decision rows in input order, plus the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub decisions: Vec<OutputDecision>,
    pub summary: RunSummary,
}

/// Holds the read-only state of a run and resolves records against it.
pub struct Reconciler<A: Analyzer> {
    normalizer: Normalizer<A>,
    catalog: WorkCatalog,
    authors: AuthorIndex,
    ranker: CandidateRanker,
    runtime: RuntimeConfig,
}

impl<A: Analyzer> Reconciler<A> {
    /// Validate the config, then normalize the catalog and decode the author
    /// table once.
    pub fn new(
        analyzer: A,
        config: &ReconcileConfig,
        author_rows: Vec<AuthorRow>,
        work_rows: Vec<WorkRow>,
    ) -> Result<Self> {
        config.validate()?;
        let normalizer = Normalizer::new(analyzer, &config.normalization);
        let catalog = WorkCatalog::build(work_rows, &normalizer)?;
        let authors = AuthorIndex::build(author_rows);
        Ok(Self::from_parts(normalizer, catalog, authors, config))
    }

    pub fn from_parts(
        normalizer: Normalizer<A>,
        catalog: WorkCatalog,
        authors: AuthorIndex,
        config: &ReconcileConfig,
    ) -> Self {
        let ranker = CandidateRanker::new(
            SimilarityScorer::from_config(&config.scoring),
            SelectionPolicy::from_config(&config.selection),
        );
        Self {
            normalizer,
            catalog,
            authors,
            ranker,
            runtime: config.runtime.clone(),
        }
    }

    pub fn catalog(&self) -> &WorkCatalog {
        &self.catalog
    }

    pub fn normalizer(&self) -> &Normalizer<A> {
        &self.normalizer
    }

    /// Resolve one record. Only a malformed payload in strict mode is an error.
    pub fn reconcile_record(&self, record: &RawRecord) -> Result<RecordResolution> {
        let author_id = match self.authors.lookup(&record.author) {
            AuthorLookup::Resolved(author_id) => author_id,
            AuthorLookup::Unknown => {
                tracing::debug!(author = %record.author, "author not in inference table");
                return Ok(single(record, None, RecordStatus::UnknownAuthor));
            }
            AuthorLookup::Malformed(err) => {
                if self.runtime.strict_payloads {
                    return Err(ReconcileError::MalformedPayload {
                        author: record.author.clone(),
                        source: err.clone(),
                    });
                }
                tracing::debug!(author = %record.author, error = %err, "flagging record with malformed payload");
                return Ok(single(record, None, RecordStatus::MalformedPayload));
            }
        };

        let candidates = self.catalog.candidates(author_id);
        if candidates.is_empty() {
            tracing::debug!(author_id, "no works on file for author");
            return Ok(single(record, Some(author_id), RecordStatus::NoCandidates));
        }

        let query_raw = extract_primary_title(&record.title);
        let (query_tokens, degraded_analysis) = match self.normalizer.try_normalize(query_raw) {
            Ok(tokens) => (tokens, false),
            Err(err) => {
                tracing::warn!(title = %record.title, error = %err, "query analysis failed, scoring on fuzzy similarity only");
                (Vec::new(), true)
            }
        };

        let outcome = self
            .ranker
            .rank_and_select(&query_tokens, query_raw, candidates);

        let resolution = match outcome {
            MatchOutcome::NoCandidates => single(record, Some(author_id), RecordStatus::NoCandidates),
            MatchOutcome::NoConfidentMatch { best } => {
                tracing::debug!(
                    title = %record.title,
                    best_work = %best.work_id,
                    best_score = best.score,
                    "no confident match"
                );
                single(record, Some(author_id), RecordStatus::NoConfidentMatch)
            }
            MatchOutcome::Matched(selected) => RecordResolution {
                status: RecordStatus::Matched,
                degraded_analysis,
                decisions: selected
                    .into_iter()
                    .map(|s| OutputDecision::matched(record, author_id, s, degraded_analysis))
                    .collect(),
            },
        };

        Ok(RecordResolution {
            degraded_analysis,
            ..resolution
        })
    }

    /// Resolve every record, preserving input order even when run in parallel.
    pub fn reconcile_all(&self, records: &[RawRecord]) -> Result<ReconcileReport> {
        let resolutions: Vec<RecordResolution> = if self.runtime.parallel {
            records
                .par_iter()
                .map(|record| self.reconcile_record(record))
                .collect::<Result<_>>()?
        } else {
            records
                .iter()
                .map(|record| self.reconcile_record(record))
                .collect::<Result<_>>()?
        };

        let mut summary = RunSummary::default();
        let mut decisions = Vec::with_capacity(resolutions.len());
        for resolution in resolutions {
            summary.record(&resolution);
            decisions.extend(resolution.decisions);
        }

        tracing::info!(
            records = summary.records,
            rows = summary.decisions,
            matched = summary.matched,
            no_confident_match = summary.no_confident_match,
            no_candidates = summary.no_candidates,
            unknown_author = summary.unknown_author,
            malformed_payload = summary.malformed_payload,
            degraded_analysis = summary.degraded_analysis,
            flagged = summary.flagged_rows,
            "reconciliation finished"
        );

        Ok(ReconcileReport { decisions, summary })
    }
}

fn single(record: &RawRecord, author_id: Option<&str>, status: RecordStatus) -> RecordResolution {
    RecordResolution {
        status,
        degraded_analysis: false,
        decisions: vec![OutputDecision::unmatched(record, author_id)],
    }
}
