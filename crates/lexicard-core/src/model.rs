//! Core data model types for lexicard.
//!
//! A `TrackedWord` is a user's learning state for one vocabulary entry. The
//! entry itself (`WordEntry`) is owned by the word catalog and carried along
//! read-only.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a tracking record. Distinct from the word's own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(pub Uuid);

impl TrackingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TrackingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identifier of the user who owns a set of tracking records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A vocabulary entry from the word catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub id: Uuid,
    pub word: String,
    #[serde(default)]
    pub phonetic: String,
    pub definition: String,
    #[serde(default)]
    pub part_of_speech: String,
    #[serde(default)]
    pub difficulty_level: String,
}

/// Recall strength of a tracked word, always within `0..=5`.
///
/// Out-of-range inputs are clamped on construction, so a `MasteryLevel`
/// can be used as an index into the interval table without checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct MasteryLevel(u8);

impl MasteryLevel {
    pub const MIN: MasteryLevel = MasteryLevel(0);
    pub const MAX: MasteryLevel = MasteryLevel(5);

    /// Create a mastery level, clamping into `0..=5`.
    pub fn new(level: i64) -> Self {
        Self(level.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// One level up, saturating at 5.
    pub fn raised(self) -> Self {
        Self(self.0.saturating_add(1).min(Self::MAX.0))
    }

    /// One level down, saturating at 0.
    pub fn lowered(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    pub fn is_mastered(self) -> bool {
        self >= Self::MAX
    }
}

impl From<i64> for MasteryLevel {
    fn from(level: i64) -> Self {
        Self::new(level)
    }
}

impl From<MasteryLevel> for u8 {
    fn from(level: MasteryLevel) -> Self {
        level.0
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX.0)
    }
}

/// Outcome of a single recall attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recall {
    /// The user remembered the definition ("Good").
    Remembered,
    /// The user did not remember it ("Again").
    Forgotten,
}

impl fmt::Display for Recall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recall::Remembered => write!(f, "good"),
            Recall::Forgotten => write!(f, "again"),
        }
    }
}

impl FromStr for Recall {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "y" | "yes" | "g" | "good" | "remembered" => Ok(Recall::Remembered),
            "n" | "no" | "a" | "again" | "forgotten" => Ok(Recall::Forgotten),
            other => Err(format!("unknown recall outcome: {other}")),
        }
    }
}

/// A user's learning state for one word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedWord {
    /// Tracking record id.
    pub id: TrackingId,
    /// Owning user.
    pub user_id: UserId,
    /// Denormalized catalog entry.
    pub word: WordEntry,
    pub mastery_level: MasteryLevel,
    /// The word is due once this instant has been reached.
    pub next_review_date: DateTime<Utc>,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_favorited: bool,
}

impl TrackedWord {
    /// Start tracking `word` for `user_id`. The first review falls due
    /// `first_review_after` from `now`.
    pub fn new(
        user_id: UserId,
        word: WordEntry,
        now: DateTime<Utc>,
        first_review_after: Duration,
    ) -> Self {
        Self {
            id: TrackingId::new(),
            user_id,
            word,
            mastery_level: MasteryLevel::MIN,
            next_review_date: now + first_review_after,
            last_reviewed_at: None,
            review_count: 0,
            is_favorited: false,
        }
    }

    /// Whether this word is due for review at `now` (inclusive).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }

    /// Apply a committed review update to this record.
    pub fn apply(&mut self, update: &ReviewUpdate) {
        self.mastery_level = update.mastery_level;
        self.next_review_date = update.next_review_date;
        self.last_reviewed_at = Some(update.last_reviewed_at);
        self.review_count = update.review_count;
    }
}

/// The persisted fields written after a review outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub mastery_level: MasteryLevel,
    pub next_review_date: DateTime<Utc>,
    pub last_reviewed_at: DateTime<Utc>,
    pub review_count: u32,
}

/// Which slice of the wordbook to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordbookFilter {
    #[default]
    All,
    Due,
    Mastered,
}

impl fmt::Display for WordbookFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordbookFilter::All => write!(f, "all"),
            WordbookFilter::Due => write!(f, "due"),
            WordbookFilter::Mastered => write!(f, "mastered"),
        }
    }
}

impl FromStr for WordbookFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(WordbookFilter::All),
            "due" | "review" => Ok(WordbookFilter::Due),
            "mastered" => Ok(WordbookFilter::Mastered),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}
