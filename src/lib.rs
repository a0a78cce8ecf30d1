//! Reconciles harvested titles of historical works against a catalog of
//! canonical works.
//!
//! Each record's author is resolved through the classifier payload table,
//! then the record's title is scored against that author's works with a
//! blend of lemma overlap and fuzzy string similarity. Records yield one
//! decision row, or up to the candidate cutoff when they matched.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod error;
pub mod io;
pub mod normalize;
pub mod payload;
pub mod rank;
pub mod reconcile;
pub mod segment;
pub mod similarity;

#[cfg(feature = "python")]
mod python;

pub use analysis::{AnalysisError, Analyzer, AnnotatedToken, LexiconAnalyzer};
pub use catalog::{AuthorIndex, AuthorLookup, AuthorRow, WorkCatalog, WorkRecord, WorkRow};
pub use config::{FuzzyAlgorithm, ReconcileConfig};
pub use error::{ReconcileError, Result};
pub use io::{reconcile_files, write_decisions, Datasets, RunPaths};
pub use normalize::Normalizer;
pub use payload::{AuthorPayload, PayloadError};
pub use rank::{CandidateRanker, MatchOutcome, ScoredCandidate, SelectionPolicy};
pub use reconcile::{OutputDecision, RawRecord, ReconcileReport, Reconciler, RecordStatus, RunSummary};
pub use segment::extract_primary_title;
pub use similarity::{jaccard, token_sort_ratio, SimilarityScorer};
