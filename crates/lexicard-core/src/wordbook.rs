//! A user's word collection: adding, listing, favoriting, removing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::WordbookError;
use crate::model::{TrackedWord, TrackingId, UserId, WordEntry, WordbookFilter};
use crate::selector::{filter_words, WordbookSummary};
use crate::traits::WordStore;

/// Default delay before a newly added word is first due.
pub const DEFAULT_FIRST_REVIEW_AFTER_HOURS: i64 = 24;

/// Wordbook operations scoped to the active user.
pub struct Wordbook {
    store: Arc<dyn WordStore>,
    user: Option<UserId>,
    first_review_after: Duration,
}

impl Wordbook {
    pub fn new(store: Arc<dyn WordStore>, user: Option<UserId>) -> Self {
        Self {
            store,
            user,
            first_review_after: Duration::hours(DEFAULT_FIRST_REVIEW_AFTER_HOURS),
        }
    }

    pub fn with_first_review_after(mut self, delay: Duration) -> Self {
        self.first_review_after = delay;
        self
    }

    fn user(&self) -> Result<&UserId, WordbookError> {
        self.user.as_ref().ok_or(WordbookError::NotAuthenticated)
    }

    /// Save a catalog word to the collection, first due after the configured delay.
    pub async fn add(
        &self,
        word: &WordEntry,
        now: DateTime<Utc>,
    ) -> Result<TrackedWord, WordbookError> {
        let user = self.user()?;
        let tracked = self
            .store
            .add_word(user, word, now, self.first_review_after)
            .await?;
        tracing::info!(id = %tracked.id, word = %word.word, "word saved to collection");
        Ok(tracked)
    }

    /// The user's words matching `filter`, ascending by next review date.
    pub async fn list(
        &self,
        filter: WordbookFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrackedWord>, WordbookError> {
        let words = self.store.list_words(self.user()?).await?;
        Ok(filter_words(&words, filter, now)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> Result<WordbookSummary, WordbookError> {
        let words = self.store.list_words(self.user()?).await?;
        Ok(WordbookSummary::compute(&words, now))
    }

    /// Flip the favorite flag. Returns the new value.
    pub async fn toggle_favorite(
        &self,
        id: &TrackingId,
        current: bool,
    ) -> Result<bool, WordbookError> {
        let user = self.user()?;
        self.store.set_favorited(user, id, !current).await?;
        Ok(!current)
    }

    pub async fn remove(&self, id: &TrackingId) -> Result<(), WordbookError> {
        let user = self.user()?;
        self.store.remove_word(user, id).await?;
        tracing::info!(%id, "word removed from collection");
        Ok(())
    }
}
