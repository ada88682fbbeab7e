//! Review session controller.
//!
//! Walks the queue of due words one at a time:
//!
//! ```text
//! Loading ──▶ Empty
//!    │
//!    ├──────▶ Failed
//!    ▼
//! Presenting ──reveal──▶ Revealed ──outcome──▶ Presenting (next word)
//!                                    │
//!                                    └───────▶ Complete (queue exhausted)
//! ```
//!
//! An outcome is only applied after the store has accepted the write. A
//! failed write leaves the session in `Revealed` on the same word so the
//! same outcome can be submitted again.
//!
//! `submit` takes `&mut self`, so a second outcome cannot be submitted for
//! the same session while one is in flight.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::ReviewError;
use crate::model::{Recall, ReviewUpdate, TrackedWord, UserId};
use crate::scheduler::review_update;
use crate::traits::WordStore;

/// Delay between finishing the last word and leaving the review flow.
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_secs(2);

/// Where a session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Due words have not been fetched yet.
    Loading,
    /// Nothing was due. Terminal.
    Empty,
    /// Showing the current word with its definition hidden.
    Presenting,
    /// Showing the current word with its definition; awaiting an outcome.
    Revealed,
    /// Every queued word has been reviewed. Terminal.
    Complete,
    /// The initial fetch failed.
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Empty => "empty",
            SessionState::Presenting => "presenting",
            SessionState::Revealed => "revealed",
            SessionState::Complete => "complete",
            SessionState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Empty | SessionState::Complete)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a review session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait after completion before navigating away.
    pub completion_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            completion_delay: DEFAULT_COMPLETION_DELAY,
        }
    }
}

/// Hooks for the surface hosting a session.
pub trait SessionObserver: Send + Sync {
    fn on_loaded(&self, due: usize);
    fn on_outcome_saved(&self, word: &TrackedWord, recall: Recall, update: &ReviewUpdate);
    fn on_error(&self, error: &ReviewError);
    fn on_complete(&self, summary: &SessionSummary);
    /// Fired once, `completion_delay` after `on_complete`.
    fn on_navigate_away(&self);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_loaded(&self, _: usize) {}
    fn on_outcome_saved(&self, _: &TrackedWord, _: Recall, _: &ReviewUpdate) {}
    fn on_error(&self, _: &ReviewError) {}
    fn on_complete(&self, _: &SessionSummary) {}
    fn on_navigate_away(&self) {}
}

/// What the user sees for the current word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCard<'a> {
    pub word: &'a str,
    pub phonetic: &'a str,
    /// `None` until revealed.
    pub definition: Option<&'a str>,
    /// `None` until revealed.
    pub part_of_speech: Option<&'a str>,
    /// 1-based position in the queue.
    pub position: usize,
    pub total: usize,
}

/// Tally of committed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub reviewed: usize,
    pub remembered: usize,
    pub forgotten: usize,
}

impl SessionSummary {
    fn record(&mut self, recall: Recall) {
        self.reviewed += 1;
        match recall {
            Recall::Remembered => self.remembered += 1,
            Recall::Forgotten => self.forgotten += 1,
        }
    }
}

/// A single pass through the due-word queue.
pub struct ReviewSession {
    store: Arc<dyn WordStore>,
    observer: Arc<dyn SessionObserver>,
    config: SessionConfig,
    queue: Vec<TrackedWord>,
    cursor: usize,
    state: SessionState,
    last_error: Option<String>,
    summary: SessionSummary,
    redirect: Option<JoinHandle<()>>,
}

impl ReviewSession {
    pub fn new(
        store: Arc<dyn WordStore>,
        observer: Arc<dyn SessionObserver>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            observer,
            config,
            queue: Vec::new(),
            cursor: 0,
            state: SessionState::Loading,
            last_error: None,
            summary: SessionSummary::default(),
            redirect: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recent surfaced error, cleared by the next successful step.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// The full queue as loaded, with committed updates applied to
    /// already-reviewed words.
    pub fn queue(&self) -> &[TrackedWord] {
        &self.queue
    }

    /// Index of the current word.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Words not yet reviewed, current word first.
    pub fn remaining(&self) -> &[TrackedWord] {
        match self.state {
            SessionState::Presenting | SessionState::Revealed => &self.queue[self.cursor..],
            _ => &[],
        }
    }

    pub fn current(&self) -> Option<&TrackedWord> {
        match self.state {
            SessionState::Presenting | SessionState::Revealed => self.queue.get(self.cursor),
            _ => None,
        }
    }

    /// Whether an outcome can be submitted right now.
    pub fn accepts_outcome(&self) -> bool {
        self.state == SessionState::Revealed
    }

    /// The current card, with the definition hidden until revealed.
    pub fn card(&self) -> Option<ReviewCard<'_>> {
        let word = self.current()?;
        let revealed = self.state == SessionState::Revealed;
        Some(ReviewCard {
            word: &word.word.word,
            phonetic: &word.word.phonetic,
            definition: revealed.then_some(word.word.definition.as_str()),
            part_of_speech: revealed.then_some(word.word.part_of_speech.as_str()),
            position: self.cursor + 1,
            total: self.queue.len(),
        })
    }

    /// Fetch the words due at `now` and enter `Presenting` or `Empty`.
    ///
    /// Allowed from `Loading`, and from `Failed` to retry a failed fetch.
    pub async fn load(
        &mut self,
        user: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> Result<SessionState, ReviewError> {
        if !matches!(self.state, SessionState::Loading | SessionState::Failed) {
            return Err(self.invalid("load"));
        }

        let Some(user) = user else {
            return Err(self.fail(ReviewError::NotAuthenticated));
        };

        let words = match self.store.fetch_due(user, now).await {
            Ok(words) => words,
            Err(e) => return Err(self.fail(ReviewError::FetchFailure(e))),
        };

        tracing::info!(user = %user, due = words.len(), store = self.store.name(), "review session loaded");
        self.observer.on_loaded(words.len());
        self.last_error = None;
        self.queue = words;
        self.cursor = 0;
        self.state = if self.queue.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Presenting
        };
        Ok(self.state)
    }

    /// Show the current word's definition.
    pub fn reveal(&mut self) -> Result<(), ReviewError> {
        if self.state != SessionState::Presenting {
            return Err(self.invalid("reveal"));
        }
        self.state = SessionState::Revealed;
        Ok(())
    }

    /// Record a recall outcome for the current word and advance.
    ///
    /// On a store failure the session stays on the same word in `Revealed`
    /// and nothing is applied locally.
    pub async fn submit(
        &mut self,
        recall: Recall,
        now: DateTime<Utc>,
    ) -> Result<SessionState, ReviewError> {
        if self.state != SessionState::Revealed {
            return Err(self.invalid("submit an outcome"));
        }

        let word = &self.queue[self.cursor];
        let tracking_id = word.id;
        let update = review_update(word, recall, now);

        if let Err(source) = self.store.update_review(&tracking_id, &update).await {
            let err = ReviewError::UpdateFailure {
                tracking_id,
                source,
            };
            tracing::error!(cursor = self.cursor, "{err}");
            self.last_error = Some(err.to_string());
            self.observer.on_error(&err);
            return Err(err);
        }

        let word = &mut self.queue[self.cursor];
        word.apply(&update);
        self.observer.on_outcome_saved(word, recall, &update);
        self.summary.record(recall);
        self.last_error = None;

        if self.cursor + 1 < self.queue.len() {
            self.cursor += 1;
            self.state = SessionState::Presenting;
            tracing::debug!(cursor = self.cursor, "advanced to next word");
        } else {
            self.state = SessionState::Complete;
            tracing::info!(
                reviewed = self.summary.reviewed,
                remembered = self.summary.remembered,
                "review session complete"
            );
            self.observer.on_complete(&self.summary);
            self.schedule_navigation();
        }

        Ok(self.state)
    }

    /// Wait for the post-completion navigation to fire, if one is pending.
    pub async fn finish(&mut self) {
        if let Some(handle) = self.redirect.take() {
            if let Err(e) = handle.await {
                tracing::warn!("completion redirect task failed: {e}");
            }
        }
    }

    fn schedule_navigation(&mut self) {
        let observer = Arc::clone(&self.observer);
        let delay = self.config.completion_delay;
        self.redirect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            observer.on_navigate_away();
        }));
    }

    fn fail(&mut self, err: ReviewError) -> ReviewError {
        tracing::error!("{err}");
        self.queue.clear();
        self.cursor = 0;
        self.state = SessionState::Failed;
        self.last_error = Some(err.to_string());
        self.observer.on_error(&err);
        err
    }

    fn invalid(&self, action: &'static str) -> ReviewError {
        ReviewError::InvalidAction {
            action,
            state: self.state.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};

    use crate::error::StoreError;
    use crate::model::fixtures::{tracked, user};
    use crate::model::{MasteryLevel, TrackingId, WordEntry};

    /// Store returning a fixed due list and scripted update results.
    struct ScriptedStore {
        due: Result<Vec<TrackedWord>, StoreError>,
        update_results: Mutex<VecDeque<Result<(), StoreError>>>,
        updates: Mutex<Vec<(TrackingId, ReviewUpdate)>>,
    }

    impl ScriptedStore {
        fn with_due(words: Vec<TrackedWord>) -> Self {
            Self {
                due: Ok(words),
                update_results: Mutex::new(VecDeque::new()),
                updates: Mutex::new(Vec::new()),
            }
        }

        fn failing_fetch(err: StoreError) -> Self {
            Self {
                due: Err(err),
                update_results: Mutex::new(VecDeque::new()),
                updates: Mutex::new(Vec::new()),
            }
        }

        fn then_update(self, result: Result<(), StoreError>) -> Self {
            self.update_results.lock().unwrap().push_back(result);
            self
        }

        fn updates(&self) -> Vec<(TrackingId, ReviewUpdate)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WordStore for ScriptedStore {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_due(
            &self,
            _: &UserId,
            _: DateTime<Utc>,
        ) -> Result<Vec<TrackedWord>, StoreError> {
            self.due.clone()
        }

        async fn count_due(&self, _: &UserId, _: DateTime<Utc>) -> Result<usize, StoreError> {
            self.due.as_ref().map(Vec::len).map_err(Clone::clone)
        }

        async fn update_review(
            &self,
            id: &TrackingId,
            update: &ReviewUpdate,
        ) -> Result<(), StoreError> {
            let result = self
                .update_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()));
            if result.is_ok() {
                self.updates.lock().unwrap().push((*id, update.clone()));
            }
            result
        }

        async fn list_words(&self, _: &UserId) -> Result<Vec<TrackedWord>, StoreError> {
            unimplemented!()
        }

        async fn add_word(
            &self,
            _: &UserId,
            _: &WordEntry,
            _: DateTime<Utc>,
            _: ChronoDuration,
        ) -> Result<TrackedWord, StoreError> {
            unimplemented!()
        }

        async fn set_favorited(
            &self,
            _: &UserId,
            _: &TrackingId,
            _: bool,
        ) -> Result<(), StoreError> {
            unimplemented!()
        }

        async fn remove_word(&self, _: &UserId, _: &TrackingId) -> Result<(), StoreError> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl SessionObserver for RecordingObserver {
        fn on_loaded(&self, due: usize) {
            self.push(format!("loaded:{due}"));
        }
        fn on_outcome_saved(&self, word: &TrackedWord, recall: Recall, _: &ReviewUpdate) {
            self.push(format!("saved:{}:{recall}", word.word.word));
        }
        fn on_error(&self, _: &ReviewError) {
            self.push("error".into());
        }
        fn on_complete(&self, summary: &SessionSummary) {
            self.push(format!("complete:{}", summary.reviewed));
        }
        fn on_navigate_away(&self) {
            self.push("navigate".into());
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn three_due() -> Vec<TrackedWord> {
        vec![
            tracked("alpha", 0, now() - ChronoDuration::days(3)),
            tracked("beta", 2, now() - ChronoDuration::days(2)),
            tracked("gamma", 5, now() - ChronoDuration::days(1)),
        ]
    }

    fn session(store: Arc<ScriptedStore>, observer: Arc<RecordingObserver>) -> ReviewSession {
        ReviewSession::new(
            store,
            observer,
            SessionConfig {
                completion_delay: Duration::from_millis(2000),
            },
        )
    }

    #[tokio::test]
    async fn empty_queue_is_caught_up() {
        let store = Arc::new(ScriptedStore::with_due(vec![]));
        let observer = Arc::new(RecordingObserver::default());
        let mut s = session(store, observer.clone());

        let state = s.load(Some(&user()), now()).await.unwrap();
        assert_eq!(state, SessionState::Empty);
        assert!(s.current().is_none());
        assert!(s.last_error().is_none());
        assert!(s.reveal().is_err());
        assert_eq!(observer.events(), ["loaded:0"]);
    }

    #[tokio::test]
    async fn fetch_failure_is_distinct_from_empty() {
        let store = Arc::new(ScriptedStore::failing_fetch(StoreError::Timeout(30)));
        let observer = Arc::new(RecordingObserver::default());
        let mut s = session(store, observer.clone());

        let err = s.load(Some(&user()), now()).await.unwrap_err();
        assert!(matches!(err, ReviewError::FetchFailure(_)));
        assert_eq!(s.state(), SessionState::Failed);
        assert!(s.last_error().unwrap().contains("timed out"));
        assert_eq!(observer.events(), ["error"]);
    }

    #[tokio::test]
    async fn missing_user_is_not_authenticated() {
        let store = Arc::new(ScriptedStore::with_due(three_due()));
        let mut s = session(store, Arc::new(RecordingObserver::default()));

        let err = s.load(None, now()).await.unwrap_err();
        assert!(matches!(err, ReviewError::NotAuthenticated));
        assert!(s.queue().is_empty());
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn definition_hidden_until_revealed() {
        let store = Arc::new(ScriptedStore::with_due(three_due()));
        let mut s = session(store, Arc::new(RecordingObserver::default()));
        s.load(Some(&user()), now()).await.unwrap();

        let card = s.card().unwrap();
        assert_eq!(card.word, "alpha");
        assert_eq!(card.definition, None);
        assert_eq!((card.position, card.total), (1, 3));
        assert!(!s.accepts_outcome());

        s.reveal().unwrap();
        let card = s.card().unwrap();
        assert_eq!(card.definition, Some("definition of alpha"));
        assert!(s.accepts_outcome());
    }

    #[tokio::test]
    async fn outcome_requires_reveal() {
        let store = Arc::new(ScriptedStore::with_due(three_due()));
        let mut s = session(store.clone(), Arc::new(RecordingObserver::default()));
        s.load(Some(&user()), now()).await.unwrap();

        let err = s.submit(Recall::Remembered, now()).await.unwrap_err();
        assert!(matches!(
            err,
            ReviewError::InvalidAction {
                state: "presenting",
                ..
            }
        ));
        assert!(store.updates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn full_pass_visits_each_word_once() {
        let words = three_due();
        let ids: Vec<_> = words.iter().map(|w| w.id).collect();
        let store = Arc::new(ScriptedStore::with_due(words));
        let observer = Arc::new(RecordingObserver::default());
        let mut s = session(store.clone(), observer.clone());
        s.load(Some(&user()), now()).await.unwrap();

        let mut visited = Vec::new();
        for recall in [Recall::Remembered, Recall::Forgotten, Recall::Remembered] {
            visited.push(s.cursor());
            s.reveal().unwrap();
            s.submit(recall, now()).await.unwrap();
        }

        assert_eq!(visited, [0, 1, 2]);
        assert_eq!(s.state(), SessionState::Complete);

        let updates = store.updates();
        assert_eq!(updates.len(), 3);
        let written: Vec<_> = updates.iter().map(|(id, _)| *id).collect();
        assert_eq!(written, ids);
        assert_eq!(updates[0].1.mastery_level, MasteryLevel::new(1));
        assert_eq!(updates[1].1.mastery_level, MasteryLevel::new(1));
        assert_eq!(updates[2].1.mastery_level, MasteryLevel::new(5));
        assert!(updates.iter().all(|(_, u)| u.review_count == 1));

        assert_eq!(
            s.summary(),
            SessionSummary {
                reviewed: 3,
                remembered: 2,
                forgotten: 1
            }
        );
        assert!(observer.events().contains(&"complete:3".to_string()));
        assert!(!observer.events().contains(&"navigate".to_string()));

        s.finish().await;
        assert_eq!(observer.events().last().unwrap(), "navigate");
    }

    #[tokio::test]
    async fn advancing_keeps_remaining_words_untouched() {
        let words = three_due();
        let untouched = words[1..].to_vec();
        let store = Arc::new(ScriptedStore::with_due(words));
        let mut s = session(store, Arc::new(RecordingObserver::default()));
        s.load(Some(&user()), now()).await.unwrap();

        s.reveal().unwrap();
        let state = s.submit(Recall::Remembered, now()).await.unwrap();

        assert_eq!(state, SessionState::Presenting);
        assert_eq!(s.remaining(), untouched.as_slice());
        assert_eq!(s.card().unwrap().definition, None);
        assert_eq!(s.queue()[0].review_count, 1);
    }

    #[tokio::test]
    async fn failed_update_does_not_advance_and_retry_succeeds() {
        let words = three_due();
        let second = words[1].clone();
        let store = Arc::new(
            ScriptedStore::with_due(words)
                .then_update(Ok(()))
                .then_update(Err(StoreError::Network("connection reset".into()))),
        );
        let observer = Arc::new(RecordingObserver::default());
        let mut s = session(store.clone(), observer.clone());
        s.load(Some(&user()), now()).await.unwrap();

        s.reveal().unwrap();
        s.submit(Recall::Remembered, now()).await.unwrap();
        s.reveal().unwrap();

        let err = s.submit(Recall::Forgotten, now()).await.unwrap_err();
        assert!(matches!(err, ReviewError::UpdateFailure { tracking_id, .. } if tracking_id == second.id));
        assert_eq!(s.state(), SessionState::Revealed);
        assert_eq!(s.cursor(), 1);
        assert_eq!(s.current().unwrap(), &second);
        assert!(s.last_error().unwrap().contains("connection reset"));
        assert_eq!(store.updates().len(), 1);

        let state = s.submit(Recall::Forgotten, now()).await.unwrap();
        assert_eq!(state, SessionState::Presenting);
        assert_eq!(s.cursor(), 2);
        assert!(s.last_error().is_none());

        let updates = store.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].0, second.id);
        assert_eq!(updates[1].1.review_count, second.review_count + 1);
        assert_eq!(
            observer.events(),
            ["loaded:3", "saved:alpha:good", "error", "saved:beta:again"]
        );
    }

    #[tokio::test]
    async fn load_twice_is_rejected() {
        let store = Arc::new(ScriptedStore::with_due(three_due()));
        let mut s = session(store, Arc::new(RecordingObserver::default()));
        s.load(Some(&user()), now()).await.unwrap();
        assert!(s.load(Some(&user()), now()).await.is_err());
        assert_eq!(s.state(), SessionState::Presenting);
    }
}
