//! Forgetting-curve scheduling.
//!
//! Each successful recall moves a word one mastery level up and pushes its
//! next review further out; each failure drops it one level and pulls the
//! review back in.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MasteryLevel, Recall, ReviewUpdate, TrackedWord};

/// Review interval in days, indexed by mastery level.
pub const INTERVAL_DAYS: [i64; 6] = [1, 2, 4, 7, 15, 30];

/// Interval used if a level ever falls outside the table.
pub const FALLBACK_INTERVAL_DAYS: i64 = 30;

/// Result of scheduling one recall outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReview {
    pub new_mastery: MasteryLevel,
    pub next_review_date: DateTime<Utc>,
}

/// Days until the next review for a word at `level`.
pub fn interval_days(level: MasteryLevel) -> i64 {
    let idx = level.get() as usize;
    debug_assert!(idx < INTERVAL_DAYS.len(), "mastery level {idx} outside interval table");
    INTERVAL_DAYS
        .get(idx)
        .copied()
        .unwrap_or(FALLBACK_INTERVAL_DAYS)
}

/// Compute the new mastery level and due date for a recall outcome.
///
/// Pure and deterministic: `now` is supplied by the caller.
pub fn compute_next_review(
    current: MasteryLevel,
    recall: Recall,
    now: DateTime<Utc>,
) -> ScheduledReview {
    let new_mastery = match recall {
        Recall::Remembered => current.raised(),
        Recall::Forgotten => current.lowered(),
    };

    ScheduledReview {
        new_mastery,
        next_review_date: now + Duration::days(interval_days(new_mastery)),
    }
}

/// Build the full persisted update for reviewing `word` at `now`.
///
/// The review count is incremented here and sent as a literal value.
pub fn review_update(word: &TrackedWord, recall: Recall, now: DateTime<Utc>) -> ReviewUpdate {
    let scheduled = compute_next_review(word.mastery_level, recall, now);
    ReviewUpdate {
        mastery_level: scheduled.new_mastery,
        next_review_date: scheduled.next_review_date,
        last_reviewed_at: now,
        review_count: word.review_count.saturating_add(1),
    }
}
