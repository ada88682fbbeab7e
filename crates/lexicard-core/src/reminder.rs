//! Passive "words due for review" reminder.

use chrono::Utc;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::model::UserId;
use crate::traits::{StoreChange, WordStore};

/// Tracks the number of due words for one user.
#[derive(Debug, Clone)]
pub struct ReviewReminder {
    user: UserId,
    count: usize,
}

impl ReviewReminder {
    pub fn new(user: UserId) -> Self {
        Self { user, count: 0 }
    }

    /// Last successfully fetched due count.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The reminder is hidden when nothing is due.
    pub fn should_display(&self) -> bool {
        self.count > 0
    }

    /// Re-fetch the due count as of now. On failure the previous count is kept.
    pub async fn refresh(&mut self, store: &dyn WordStore) -> Result<usize, StoreError> {
        match store.count_due(&self.user, Utc::now()).await {
            Ok(count) => {
                self.count = count;
                Ok(count)
            }
            Err(e) => {
                tracing::error!(user = %self.user, "failed to fetch review count: {e}");
                Err(e)
            }
        }
    }

    /// Refresh once, then again on every change notification until the
    /// channel closes. Returns the final count.
    pub async fn watch(
        &mut self,
        store: &dyn WordStore,
        mut changes: broadcast::Receiver<StoreChange>,
    ) -> usize {
        let _ = self.refresh(store).await;
        loop {
            match changes.recv().await {
                Ok(change) => {
                    tracing::debug!(id = %change.tracking_id(), "store changed, refreshing review count");
                    let _ = self.refresh(store).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "review reminder lagged behind change feed");
                    let _ = self.refresh(store).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self.count
    }
}
