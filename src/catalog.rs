//! Read-only lookup tables built once before any record is processed.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::Deserialize;

use crate::analysis::Analyzer;
use crate::error::{ReconcileError, Result};
use crate::normalize::Normalizer;
use crate::payload::{AuthorPayload, PayloadError};
use crate::segment::extract_primary_title;

/// One row of the work catalog as loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkRow {
    pub author_id: String,
    pub work_id: String,
    pub title: String,
}

/// One row of the author-inference table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorRow {
    pub author: String,
    #[serde(alias = "encoded_author_payload", alias = "inferred_author")]
    pub author_payload: String,
}

/// A canonical work with its title tokens cached.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRecord {
    pub author_id: String,
    pub work_id: String,
    /// Full catalog title, reported in output rows.
    pub title: String,
    /// Segmented title used for fuzzy comparison.
    pub primary_title: String,
    pub normalized_tokens: Vec<String>,
}

impl WorkRecord {
    pub fn new<A: Analyzer>(row: WorkRow, normalizer: &Normalizer<A>) -> Self {
        let primary_title = extract_primary_title(&row.title).to_string();
        let normalized_tokens = normalizer.normalize(&primary_title);
        Self {
            author_id: row.author_id,
            work_id: row.work_id,
            title: row.title,
            primary_title,
            normalized_tokens,
        }
    }
}

/// All works, indexed by author id. Records are never mutated after
/// construction, so their cached tokens stay in sync with their titles.
#[derive(Debug, Clone, Default)]
pub struct WorkCatalog {
    works: Vec<WorkRecord>,
    by_author: AHashMap<String, Vec<usize>>,
}

impl WorkCatalog {
    /// Normalize every title once and build the author index.
    ///
    /// Fails on a repeated `work_id`.
    pub fn build<A: Analyzer>(rows: Vec<WorkRow>, normalizer: &Normalizer<A>) -> Result<Self> {
        let works: Vec<WorkRecord> = rows
            .into_par_iter()
            .map(|row| WorkRecord::new(row, normalizer))
            .collect();
        Self::from_records(works)
    }

    /// Index records whose tokens are already cached.
    pub fn from_records(works: Vec<WorkRecord>) -> Result<Self> {
        let mut seen: AHashMap<&str, usize> = AHashMap::with_capacity(works.len());
        let mut by_author: AHashMap<String, Vec<usize>> = AHashMap::new();

        for (idx, work) in works.iter().enumerate() {
            if seen.insert(work.work_id.as_str(), idx).is_some() {
                return Err(ReconcileError::DuplicateWorkId(work.work_id.clone()));
            }
            by_author
                .entry(work.author_id.clone())
                .or_default()
                .push(idx);
        }

        tracing::info!(
            works = works.len(),
            authors = by_author.len(),
            "built work catalog"
        );
        Ok(Self { works, by_author })
    }

    /// Works attributed to `author_id`, in catalog order.
    pub fn candidates(&self, author_id: &str) -> Vec<&WorkRecord> {
        self.by_author
            .get(author_id)
            .map(|indices| indices.iter().map(|&idx| &self.works[idx]).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.works.len()
    }

    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkRecord> {
        self.works.iter()
    }
}

/// Result of looking an author surface form up in the inference table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthorLookup<'a> {
    /// No row for this surface form, or the classifier reported no author.
    Unknown,
    Malformed(&'a PayloadError),
    Resolved(&'a str),
}

/// Surface author string to decoded author id.
#[derive(Debug, Clone, Default)]
pub struct AuthorIndex {
    entries: AHashMap<String, std::result::Result<Option<String>, PayloadError>>,
}

impl AuthorIndex {
    /// Decode every payload once. The first row for a surface form wins.
    pub fn build(rows: Vec<AuthorRow>) -> Self {
        let mut entries = AHashMap::with_capacity(rows.len());
        let mut malformed = 0usize;

        for row in rows {
            if entries.contains_key(&row.author) {
                tracing::warn!(author = %row.author, "ignoring repeated author row");
                continue;
            }
            let decoded = AuthorPayload::decode(&row.author_payload).map(|p| p.author_id);
            if let Err(err) = &decoded {
                malformed += 1;
                tracing::warn!(author = %row.author, error = %err, "malformed author payload");
            }
            entries.insert(row.author, decoded);
        }

        tracing::info!(authors = entries.len(), malformed, "built author index");
        Self { entries }
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, author: &str) -> AuthorLookup<'_> {
        match self.entries.get(author) {
            None | Some(Ok(None)) => AuthorLookup::Unknown,
            Some(Ok(Some(author_id))) => AuthorLookup::Resolved(author_id),
            Some(Err(err)) => AuthorLookup::Malformed(err),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
