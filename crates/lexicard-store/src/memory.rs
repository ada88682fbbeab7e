//! In-process word store.
//!
//! Backs the local file-based store used by the CLI and doubles as a test
//! store: it records update calls, can be told to fail, and publishes a
//! change notification on every mutation.
//!
//! A store with a backing file writes every mutation through to disk before
//! applying it in memory. A failed write leaves the store unchanged.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use lexicard_core::error::StoreError;
use lexicard_core::model::{ReviewUpdate, TrackedWord, TrackingId, UserId, WordEntry};
use lexicard_core::selector::{count_due, select_due};
use lexicard_core::traits::{StoreChange, WordStore};

const CHANGE_CHANNEL_CAPACITY: usize = 64;
const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of a memory store.
#[derive(Debug, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    words: Vec<TrackedWord>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    words: &'a [TrackedWord],
}

fn write_snapshot(path: &Path, words: &[TrackedWord]) -> Result<()> {
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        words,
    };
    let json = serde_json::to_string_pretty(&snapshot).context("failed to serialize word store")?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write word store to {}", path.display()))?;
    Ok(())
}

/// A word store held entirely in memory, optionally written through to a file.
pub struct MemoryStore {
    words: Mutex<Vec<TrackedWord>>,
    backing: Option<PathBuf>,
    changes: broadcast::Sender<StoreChange>,
    fetch_failure: Mutex<Option<StoreError>>,
    update_failures: Mutex<VecDeque<StoreError>>,
    update_calls: AtomicU32,
    last_update: Mutex<Option<(TrackingId, ReviewUpdate)>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_words(Vec::new())
    }

    /// Create a store pre-populated with `words`.
    pub fn with_words(words: Vec<TrackedWord>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            words: Mutex::new(words),
            backing: None,
            changes,
            fetch_failure: Mutex::new(None),
            update_failures: Mutex::new(VecDeque::new()),
            update_calls: AtomicU32::new(0),
            last_update: Mutex::new(None),
        }
    }

    /// Write every later mutation through to `path`.
    pub fn with_backing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backing = Some(path.into());
        self
    }

    /// Open the file-backed store at `path`. A missing file yields an empty
    /// store that creates the file on its first mutation.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::load_json(path)?.with_backing_file(path))
    }

    /// Load a store from a JSON snapshot. A missing file yields an empty store.
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read word store from {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse word store {}", path.display()))?;
        anyhow::ensure!(
            snapshot.version == SNAPSHOT_VERSION,
            "unsupported word store version {} in {}",
            snapshot.version,
            path.display()
        );
        Ok(Self::with_words(snapshot.words))
    }

    /// Save all words as a JSON snapshot.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        write_snapshot(path, &self.snapshot())
    }

    /// A copy of every stored word, across all users.
    pub fn snapshot(&self) -> Vec<TrackedWord> {
        self.words
            .lock()
            .map(|w| w.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Make every due-word fetch fail with `error` (or succeed again with `None`).
    pub fn set_fetch_failure(&self, error: Option<StoreError>) {
        if let Ok(mut slot) = self.fetch_failure.lock() {
            *slot = error;
        }
    }

    /// Make the next review update fail with `error`. Calls queue up.
    pub fn fail_next_update(&self, error: StoreError) {
        if let Ok(mut queue) = self.update_failures.lock() {
            queue.push_back(error);
        }
    }

    /// Number of `update_review` calls, including failed ones.
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::Relaxed)
    }

    /// The last successfully applied review update.
    pub fn last_update(&self) -> Option<(TrackingId, ReviewUpdate)> {
        self.last_update.lock().ok().and_then(|u| u.clone())
    }

    fn lock_words(&self) -> Result<MutexGuard<'_, Vec<TrackedWord>>, StoreError> {
        self.words
            .lock()
            .map_err(|_| StoreError::Backend("word store lock poisoned".into()))
    }

    fn owned_by(&self, user: &UserId) -> Result<Vec<TrackedWord>, StoreError> {
        let words = self.lock_words()?;
        Ok(words.iter().filter(|w| w.user_id == *user).cloned().collect())
    }

    /// Apply `change` to a draft of the word list, write the draft to the
    /// backing file if there is one, then make it current.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut Vec<TrackedWord>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut words = self.lock_words()?;
        let mut draft = words.clone();
        let out = change(&mut draft)?;
        if let Some(path) = &self.backing {
            write_snapshot(path, &draft).map_err(|e| {
                tracing::error!(path = %path.display(), "failed to save word store: {e:#}");
                StoreError::Backend(format!("{e:#}"))
            })?;
        }
        *words = draft;
        Ok(out)
    }

    fn check_fetch_failure(&self) -> Result<(), StoreError> {
        match self.fetch_failure.lock() {
            Ok(slot) => slot.clone().map_or(Ok(()), Err),
            Err(_) => Err(StoreError::Backend("word store lock poisoned".into())),
        }
    }

    fn notify(&self, change: StoreChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }
}

fn owned_mut<'a>(
    words: &'a mut [TrackedWord],
    user: &UserId,
    id: &TrackingId,
) -> Result<&'a mut TrackedWord, StoreError> {
    words
        .iter_mut()
        .find(|w| w.id == *id && w.user_id == *user)
        .ok_or(StoreError::NotFound(*id))
}

#[async_trait]
impl WordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_due(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrackedWord>, StoreError> {
        self.check_fetch_failure()?;
        Ok(select_due(&self.owned_by(user)?, now))
    }

    async fn count_due(&self, user: &UserId, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.check_fetch_failure()?;
        Ok(count_due(&self.owned_by(user)?, now))
    }

    async fn update_review(
        &self,
        id: &TrackingId,
        update: &ReviewUpdate,
    ) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);

        let injected = self
            .update_failures
            .lock()
            .map_err(|_| StoreError::Backend("word store lock poisoned".into()))?
            .pop_front();
        if let Some(err) = injected {
            return Err(err);
        }

        self.commit(|words| {
            let word = words
                .iter_mut()
                .find(|w| w.id == *id)
                .ok_or(StoreError::NotFound(*id))?;
            word.apply(update);
            Ok(())
        })?;

        if let Ok(mut last) = self.last_update.lock() {
            *last = Some((*id, update.clone()));
        }
        self.notify(StoreChange::Updated(*id));
        Ok(())
    }

    async fn list_words(&self, user: &UserId) -> Result<Vec<TrackedWord>, StoreError> {
        let mut words = self.owned_by(user)?;
        words.sort_by_key(|w| w.next_review_date);
        Ok(words)
    }

    async fn add_word(
        &self,
        user: &UserId,
        word: &WordEntry,
        now: DateTime<Utc>,
        first_review_after: Duration,
    ) -> Result<TrackedWord, StoreError> {
        let tracked = self.commit(|words| {
            if words
                .iter()
                .any(|w| w.user_id == *user && w.word.id == word.id)
            {
                return Err(StoreError::Conflict(word.word.clone()));
            }
            let tracked = TrackedWord::new(*user, word.clone(), now, first_review_after);
            words.push(tracked.clone());
            Ok(tracked)
        })?;
        self.notify(StoreChange::Inserted(tracked.id));
        Ok(tracked)
    }

    async fn set_favorited(
        &self,
        user: &UserId,
        id: &TrackingId,
        favorited: bool,
    ) -> Result<(), StoreError> {
        self.commit(|words| {
            owned_mut(words, user, id)?.is_favorited = favorited;
            Ok(())
        })?;
        self.notify(StoreChange::Updated(*id));
        Ok(())
    }

    async fn remove_word(&self, user: &UserId, id: &TrackingId) -> Result<(), StoreError> {
        self.commit(|words| {
            let before = words.len();
            words.retain(|w| !(w.id == *id && w.user_id == *user));
            if words.len() == before {
                return Err(StoreError::NotFound(*id));
            }
            Ok(())
        })?;
        self.notify(StoreChange::Deleted(*id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;
    use lexicard_core::model::{MasteryLevel, Recall, WordbookFilter};
    use lexicard_core::reminder::ReviewReminder;
    use lexicard_core::session::{NoopObserver, ReviewSession, SessionConfig, SessionState};
    use lexicard_core::wordbook::Wordbook;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn alice() -> UserId {
        UserId(Uuid::from_u128(0xa11ce))
    }

    fn bob() -> UserId {
        UserId(Uuid::from_u128(0xb0b))
    }

    fn entry(word: &str) -> WordEntry {
        WordEntry {
            id: Uuid::new_v4(),
            word: word.into(),
            phonetic: String::new(),
            definition: format!("meaning of {word}"),
            part_of_speech: "adjective".into(),
            difficulty_level: "intermediate".into(),
        }
    }

    fn due_word(user: UserId, word: &str, days_ago: i64) -> TrackedWord {
        TrackedWord::new(user, entry(word), now() - Duration::days(days_ago), Duration::zero())
    }

    #[tokio::test]
    async fn reads_are_scoped_to_owner() {
        let store = MemoryStore::with_words(vec![
            due_word(alice(), "ephemeral", 2),
            due_word(bob(), "laconic", 3),
        ]);

        let due = store.fetch_due(&alice(), now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].word.word, "ephemeral");
        assert_eq!(store.count_due(&bob(), now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn add_rejects_duplicate_word() {
        let store = MemoryStore::new();
        let word = entry("quixotic");
        store
            .add_word(&alice(), &word, now(), Duration::hours(24))
            .await
            .unwrap();

        let err = store
            .add_word(&alice(), &word, now(), Duration::hours(24))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // A different user may track the same word.
        store
            .add_word(&bob(), &word, now(), Duration::hours(24))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_targets_tracking_id_only() {
        let first = due_word(alice(), "candid", 1);
        let second = due_word(alice(), "stoic", 1);
        let store = MemoryStore::with_words(vec![first.clone(), second.clone()]);

        let update = ReviewUpdate {
            mastery_level: MasteryLevel::new(1),
            next_review_date: now() + Duration::days(2),
            last_reviewed_at: now(),
            review_count: 1,
        };
        store.update_review(&first.id, &update).await.unwrap();

        let words = store.snapshot();
        assert_eq!(words[0].review_count, 1);
        assert_eq!(words[1], second);
        assert_eq!(store.last_update().unwrap().0, first.id);

        let missing = TrackingId(first.word.id);
        assert!(matches!(
            store.update_review(&missing, &update).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn favorite_and_remove() {
        let store = Arc::new(MemoryStore::new());
        let book = Wordbook::new(store.clone(), Some(alice()));
        let tracked = book.add(&entry("verbose"), now()).await.unwrap();

        assert!(book.toggle_favorite(&tracked.id, false).await.unwrap());
        assert!(store.snapshot()[0].is_favorited);
        assert_eq!(book.summary(now()).await.unwrap().favorited, 1);

        book.remove(&tracked.id).await.unwrap();
        assert!(store.snapshot().is_empty());
        assert!(book.remove(&tracked.id).await.is_err());
    }

    #[tokio::test]
    async fn wordbook_cannot_touch_another_users_word() {
        let bobs = due_word(bob(), "laconic", 1);
        let store = Arc::new(MemoryStore::with_words(vec![bobs.clone()]));
        let alice_book = Wordbook::new(store.clone(), Some(alice()));

        let err = alice_book.toggle_favorite(&bobs.id, false).await.unwrap_err();
        assert!(matches!(
            err,
            lexicard_core::error::WordbookError::Store(StoreError::NotFound(_))
        ));
        let err = alice_book.remove(&bobs.id).await.unwrap_err();
        assert!(matches!(
            err,
            lexicard_core::error::WordbookError::Store(StoreError::NotFound(_))
        ));

        assert_eq!(store.snapshot(), vec![bobs.clone()]);
        let bob_book = Wordbook::new(store.clone(), Some(bob()));
        assert!(bob_book.toggle_favorite(&bobs.id, false).await.unwrap());
        bob_book.remove(&bobs.id).await.unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn wordbook_without_user_is_rejected() {
        let book = Wordbook::new(Arc::new(MemoryStore::new()), None);
        let err = book.list(WordbookFilter::All, now()).await.unwrap_err();
        assert!(matches!(
            err,
            lexicard_core::error::WordbookError::NotAuthenticated
        ));
    }

    #[tokio::test]
    async fn new_words_are_not_due_for_a_day() {
        let store = Arc::new(MemoryStore::new());
        let book = Wordbook::new(store.clone(), Some(alice()));
        book.add(&entry("arcane"), now()).await.unwrap();

        assert_eq!(store.count_due(&alice(), now()).await.unwrap(), 0);
        let tomorrow = now() + Duration::hours(24);
        assert_eq!(store.count_due(&alice(), tomorrow).await.unwrap(), 1);
        let due = book.list(WordbookFilter::Due, tomorrow).await.unwrap();
        assert_eq!(due[0].mastery_level, MasteryLevel::MIN);
    }

    #[tokio::test]
    async fn session_against_memory_store_with_injected_failure() {
        let store = Arc::new(MemoryStore::with_words(vec![
            due_word(alice(), "one", 3),
            due_word(alice(), "two", 2),
            due_word(alice(), "three", 1),
        ]));
        store.fail_next_update(StoreError::Timeout(5));

        let mut session = ReviewSession::new(
            store.clone(),
            Arc::new(NoopObserver),
            SessionConfig::default(),
        );
        session.load(Some(&alice()), now()).await.unwrap();

        session.reveal().unwrap();
        assert!(session.submit(Recall::Remembered, now()).await.is_err());
        assert_eq!(session.cursor(), 0);
        assert_eq!(store.snapshot()[0].review_count, 0);

        session.submit(Recall::Remembered, now()).await.unwrap();
        session.reveal().unwrap();
        session.submit(Recall::Forgotten, now()).await.unwrap();
        session.reveal().unwrap();
        let state = session.submit(Recall::Remembered, now()).await.unwrap();
        assert_eq!(state, SessionState::Complete);

        assert_eq!(store.update_calls(), 4);
        let words = store.snapshot();
        assert!(words.iter().all(|w| w.review_count == 1));
        assert_eq!(words[0].next_review_date, now() + Duration::days(2));
        assert_eq!(words[1].next_review_date, now() + Duration::days(1));
        assert_eq!(store.count_due(&alice(), now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_in_session() {
        let store = Arc::new(MemoryStore::new());
        store.set_fetch_failure(Some(StoreError::Network("offline".into())));
        let mut session =
            ReviewSession::new(store.clone(), Arc::new(NoopObserver), SessionConfig::default());

        assert!(session.load(Some(&alice()), now()).await.is_err());
        assert_eq!(session.state(), SessionState::Failed);

        store.set_fetch_failure(None);
        assert_eq!(
            session.load(Some(&alice()), now()).await.unwrap(),
            SessionState::Empty
        );
    }

    #[tokio::test]
    async fn mutations_publish_changes() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();
        let tracked = store
            .add_word(&alice(), &entry("terse"), now(), Duration::hours(24))
            .await
            .unwrap();
        store.set_favorited(&alice(), &tracked.id, true).await.unwrap();
        store.remove_word(&alice(), &tracked.id).await.unwrap();

        assert_eq!(changes.recv().await.unwrap(), StoreChange::Inserted(tracked.id));
        assert_eq!(changes.recv().await.unwrap(), StoreChange::Updated(tracked.id));
        assert_eq!(changes.recv().await.unwrap(), StoreChange::Deleted(tracked.id));
    }

    #[tokio::test]
    async fn reminder_refetches_on_change() {
        let word = due_word(alice(), "terse", 1);
        let store = Arc::new(MemoryStore::with_words(vec![word.clone()]));
        let (tx, rx) = broadcast::channel(8);

        let watcher_store = store.clone();
        let handle = tokio::spawn(async move {
            let mut reminder = ReviewReminder::new(alice());
            let count = reminder.watch(watcher_store.as_ref(), rx).await;
            (count, reminder.should_display())
        });
        tokio::task::yield_now().await;

        store.remove_word(&alice(), &word.id).await.unwrap();
        tx.send(StoreChange::Deleted(word.id)).unwrap();
        drop(tx);

        let (count, display) = handle.await.unwrap();
        assert_eq!(count, 0);
        assert!(!display);
    }

    #[tokio::test]
    async fn reminder_keeps_last_count_on_error() {
        let store = MemoryStore::with_words(vec![due_word(alice(), "brisk", 1)]);
        let mut reminder = ReviewReminder::new(alice());
        reminder.refresh(&store).await.unwrap();

        store.set_fetch_failure(Some(StoreError::Timeout(1)));
        assert!(reminder.refresh(&store).await.is_err());
        assert_eq!(reminder.count(), 1);
    }

    #[test]
    fn snapshot_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");

        let missing = MemoryStore::load_json(&path).unwrap();
        assert!(missing.snapshot().is_empty());

        let store = MemoryStore::with_words(vec![due_word(alice(), "pithy", 1)]);
        store.save_json(&path).unwrap();

        let loaded = MemoryStore::load_json(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[tokio::test]
    async fn failed_write_through_leaves_session_on_same_word() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("words.json");

        let store = Arc::new(
            MemoryStore::with_words(vec![due_word(alice(), "one", 2), due_word(alice(), "two", 1)])
                .with_backing_file(&path),
        );
        let mut session =
            ReviewSession::new(store.clone(), Arc::new(NoopObserver), SessionConfig::default());
        session.load(Some(&alice()), now()).await.unwrap();
        session.reveal().unwrap();

        let err = session.submit(Recall::Remembered, now()).await.unwrap_err();
        assert!(matches!(
            err,
            lexicard_core::error::ReviewError::UpdateFailure {
                source: StoreError::Backend(_),
                ..
            }
        ));
        assert!(err.is_recoverable());
        assert_eq!(session.state(), SessionState::Revealed);
        assert_eq!(session.cursor(), 0);
        assert!(store.snapshot().iter().all(|w| w.review_count == 0));

        std::fs::remove_file(&blocker).unwrap();
        let state = session.submit(Recall::Remembered, now()).await.unwrap();
        assert_eq!(state, SessionState::Presenting);

        let on_disk = MemoryStore::load_json(&path).unwrap().snapshot();
        assert_eq!(on_disk, store.snapshot());
        assert_eq!(on_disk[0].review_count, 1);
        assert_eq!(on_disk[1].review_count, 0);
    }

    #[tokio::test]
    async fn opened_store_writes_mutations_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");

        let store = MemoryStore::open(&path).unwrap();
        let tracked = store
            .add_word(&alice(), &entry("lucid"), now(), Duration::hours(24))
            .await
            .unwrap();
        store.set_favorited(&alice(), &tracked.id, true).await.unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        let words = reopened.list_words(&alice()).await.unwrap();
        assert_eq!(words.len(), 1);
        assert!(words[0].is_favorited);

        reopened.remove_word(&alice(), &tracked.id).await.unwrap();
        assert!(MemoryStore::load_json(&path).unwrap().snapshot().is_empty());
    }
}
