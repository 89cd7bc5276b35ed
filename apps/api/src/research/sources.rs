//! Source bookkeeping between search and extraction: URL deduplication,
//! candidate ranking, score assembly and top-N selection.
//!
//! Everything here sorts explicitly, so the order in which concurrent
//! searches finished never leaks into the result.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::search::SearchResult;

use super::types::{RawSourceScore, ScoredSource};

/// Characters of page content shown to the scoring model per candidate.
const CANDIDATE_SNIPPET_CHARS: usize = 300;

/// Union of all query results keyed by URL, keeping the highest-scored copy
/// of each page. Sorted by provider score, best first.
pub fn dedup_by_url(batches: Vec<Vec<SearchResult>>) -> Vec<SearchResult> {
    let mut by_url: HashMap<String, SearchResult> = HashMap::new();
    for result in batches.into_iter().flatten() {
        let key = result.url.trim().trim_end_matches('/').to_string();
        if key.is_empty() {
            continue;
        }
        match by_url.get(&key) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                by_url.insert(key, result);
            }
        }
    }
    let mut merged: Vec<SearchResult> = by_url.into_values().collect();
    merged.sort_by(by_provider_score);
    merged
}

/// The `max` best results by provider relevance.
pub fn rank_candidates(mut results: Vec<SearchResult>, max: usize) -> Vec<SearchResult> {
    results.sort_by(by_provider_score);
    results.truncate(max);
    results
}

fn by_provider_score(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.url.cmp(&b.url))
}

/// Numbered candidate list for the scoring prompt.
pub fn render_candidates(candidates: &[SearchResult]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let snippet: String = c.content.chars().take(CANDIDATE_SNIPPET_CHARS).collect();
            format!(
                "[{i}] {}\nURL: {}\nPublished: {}\n{}",
                c.title,
                c.url,
                c.published_date.as_deref().unwrap_or("unknown"),
                snippet.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Result of matching model scores back onto the candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    pub scored: Vec<ScoredSource>,
    /// Candidates the model never scored; excluded from selection.
    pub unscored: usize,
    /// Scores whose index was not a whole number, referenced no candidate,
    /// or repeated one already scored.
    pub discarded: usize,
}

pub fn apply_scores(candidates: &[SearchResult], scores: &[RawSourceScore]) -> ScoringOutcome {
    let mut slots: Vec<Option<ScoredSource>> = vec![None; candidates.len()];
    let mut discarded = 0;

    for score in scores {
        let Some(index) = score.position() else {
            discarded += 1;
            continue;
        };
        let (Some(candidate), Some(slot)) = (candidates.get(index), slots.get_mut(index)) else {
            discarded += 1;
            continue;
        };
        if slot.is_some() {
            discarded += 1;
            continue;
        }
        *slot = Some(ScoredSource::new(
            &candidate.url,
            &candidate.title,
            score.recency,
            score.authority,
            score.relevance,
        ));
    }

    let unscored = slots.iter().filter(|s| s.is_none()).count();
    ScoringOutcome {
        scored: slots.into_iter().flatten().collect(),
        unscored,
        discarded,
    }
}

/// The `top_n` sources by overall score; ties go to the earlier URL.
pub fn select_top(mut scored: Vec<ScoredSource>, top_n: usize) -> Vec<ScoredSource> {
    scored.sort_by(|a, b| {
        b.overall
            .partial_cmp(&a.overall)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
    scored.truncate(top_n);
    scored
}
