use crate::catalog::WorkRecord;
use crate::config::SelectionConfig;
use crate::similarity::SimilarityScorer;

/// A candidate work scored against one query title.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    pub work_id: String,
    pub candidate_title: String,
    pub score: f64,
    pub overlap_score: f64,
    pub fuzzy_score: f64,
}

/// A candidate kept by the selection policy.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedCandidate {
    pub candidate: ScoredCandidate,
    pub flagged_for_review: bool,
}

/// Terminal outcome of matching one query against its pool.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    /// The author has no works on file.
    NoCandidates,
    /// Nothing scored above the confidence floor; `best` is the top scorer.
    NoConfidentMatch { best: ScoredCandidate },
    /// Top candidates in rank order, never more than the configured cutoff.
    Matched(Vec<SelectedCandidate>),
}

/// Threshold policy applied to a ranked pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionPolicy {
    pub confidence_floor: f64,
    pub review_floor: f64,
    pub max_candidates: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default())
    }
}

impl SelectionPolicy {
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            confidence_floor: config.confidence_floor,
            review_floor: config.review_floor,
            max_candidates: config.max_candidates,
        }
    }

    /// Strictly above the floor; a score equal to it does not qualify.
    pub fn is_confident(&self, score: f64) -> bool {
        score > self.confidence_floor
    }

    pub fn needs_review(&self, score: f64) -> bool {
        score < self.review_floor
    }

    /// Decide on a pool already sorted by [`CandidateRanker::rank`].
    pub fn select(&self, ranked: Vec<ScoredCandidate>) -> MatchOutcome {
        let Some(top) = ranked.first() else {
            return MatchOutcome::NoCandidates;
        };

        if !self.is_confident(top.score) {
            return MatchOutcome::NoConfidentMatch { best: top.clone() };
        }

        MatchOutcome::Matched(
            ranked
                .into_iter()
                .take(self.max_candidates)
                .map(|candidate| SelectedCandidate {
                    flagged_for_review: self.needs_review(candidate.score),
                    candidate,
                })
                .collect(),
        )
    }
}

/// Scores a candidate pool and applies the selection policy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CandidateRanker {
    scorer: SimilarityScorer,
    policy: SelectionPolicy,
}

impl CandidateRanker {
    pub fn new(scorer: SimilarityScorer, policy: SelectionPolicy) -> Self {
        Self { scorer, policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Score every candidate, highest first. Equal scores keep pool order.
    pub fn rank<'a, I>(&self, query_tokens: &[String], query_raw: &str, candidates: I) -> Vec<ScoredCandidate>
    where
        I: IntoIterator<Item = &'a WorkRecord>,
    {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|work| {
                let breakdown = self.scorer.breakdown(
                    query_tokens,
                    query_raw,
                    &work.normalized_tokens,
                    &work.primary_title,
                );
                ScoredCandidate {
                    work_id: work.work_id.clone(),
                    candidate_title: work.title.clone(),
                    score: breakdown.combined,
                    overlap_score: breakdown.overlap,
                    fuzzy_score: breakdown.fuzzy,
                }
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    pub fn rank_and_select<'a, I>(&self, query_tokens: &[String], query_raw: &str, candidates: I) -> MatchOutcome
    where
        I: IntoIterator<Item = &'a WorkRecord>,
    {
        self.policy
            .select(self.rank(query_tokens, query_raw, candidates))
    }
}
