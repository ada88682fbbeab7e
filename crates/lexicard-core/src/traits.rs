//! Trait definitions for the persistence collaborator.
//!
//! Implemented by the `lexicard-store` crate.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{ReviewUpdate, TrackedWord, TrackingId, UserId, WordEntry};

/// A store holding each user's tracked words.
///
/// Every operation is scoped: reads only return records owned by `user`,
/// and writes address exactly one record by its tracking id.
#[async_trait]
pub trait WordStore: Send + Sync {
    /// Human-readable backend name (e.g. "rest").
    fn name(&self) -> &str;

    /// Words with `next_review_date <= now`, ascending by `next_review_date`.
    async fn fetch_due(&self, user: &UserId, now: DateTime<Utc>)
        -> Result<Vec<TrackedWord>, StoreError>;

    /// Number of words with `next_review_date <= now`.
    async fn count_due(&self, user: &UserId, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Persist a review outcome against one tracking record.
    async fn update_review(&self, id: &TrackingId, update: &ReviewUpdate)
        -> Result<(), StoreError>;

    /// All of the user's words, ascending by `next_review_date`.
    async fn list_words(&self, user: &UserId) -> Result<Vec<TrackedWord>, StoreError>;

    /// Start tracking a catalog word for `user`.
    async fn add_word(
        &self,
        user: &UserId,
        word: &WordEntry,
        now: DateTime<Utc>,
        first_review_after: Duration,
    ) -> Result<TrackedWord, StoreError>;

    /// Set the favorite flag on one of `user`'s tracking records.
    ///
    /// A record owned by someone else is reported as `NotFound`.
    async fn set_favorited(
        &self,
        user: &UserId,
        id: &TrackingId,
        favorited: bool,
    ) -> Result<(), StoreError>;

    /// Stop tracking one of `user`'s words.
    async fn remove_word(&self, user: &UserId, id: &TrackingId) -> Result<(), StoreError>;
}

/// Notification that a user's tracked words changed.
///
/// Opaque to consumers: it only means "re-fetch".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreChange {
    Inserted(TrackingId),
    Updated(TrackingId),
    Deleted(TrackingId),
}

impl StoreChange {
    pub fn tracking_id(&self) -> &TrackingId {
        match self {
            StoreChange::Inserted(id) | StoreChange::Updated(id) | StoreChange::Deleted(id) => id,
        }
    }
}
