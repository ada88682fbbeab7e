//! Due-word selection and wordbook filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{TrackedWord, WordbookFilter};

/// Select the words due at `now`, earliest-due first.
///
/// A word is due when `next_review_date <= now`. Ties keep input order.
pub fn select_due(words: &[TrackedWord], now: DateTime<Utc>) -> Vec<TrackedWord> {
    let mut due: Vec<TrackedWord> = words.iter().filter(|w| w.is_due(now)).cloned().collect();
    // sort_by_key is stable
    due.sort_by_key(|w| w.next_review_date);
    due
}

/// Number of words due at `now`.
pub fn count_due(words: &[TrackedWord], now: DateTime<Utc>) -> usize {
    words.iter().filter(|w| w.is_due(now)).count()
}

/// Apply a wordbook filter, preserving input order.
pub fn filter_words<'a>(
    words: &'a [TrackedWord],
    filter: WordbookFilter,
    now: DateTime<Utc>,
) -> Vec<&'a TrackedWord> {
    words
        .iter()
        .filter(|w| match filter {
            WordbookFilter::All => true,
            WordbookFilter::Due => w.is_due(now),
            WordbookFilter::Mastered => w.mastery_level.is_mastered(),
        })
        .collect()
}

/// Counts shown on the wordbook tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WordbookSummary {
    pub total: usize,
    pub due: usize,
    pub mastered: usize,
    pub favorited: usize,
}

impl WordbookSummary {
    pub fn compute(words: &[TrackedWord], now: DateTime<Utc>) -> Self {
        Self {
            total: words.len(),
            due: count_due(words, now),
            mastered: words.iter().filter(|w| w.mastery_level.is_mastered()).count(),
            favorited: words.iter().filter(|w| w.is_favorited).count(),
        }
    }
}
