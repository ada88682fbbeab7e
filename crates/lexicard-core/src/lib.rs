//! lexicard-core: Spaced-repetition scheduling and review sessions.
//!
//! This crate defines the tracked-word data model, the forgetting-curve
//! scheduler, due-word selection, and the review session controller that
//! the rest of lexicard builds on.

pub mod error;
pub mod model;
pub mod reminder;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod traits;
pub mod wordbook;

pub use error::{ReviewError, StoreError, WordbookError};
pub use model::{MasteryLevel, Recall, ReviewUpdate, TrackedWord, TrackingId, UserId, WordEntry};
pub use scheduler::{compute_next_review, ScheduledReview};
pub use session::{ReviewSession, SessionConfig, SessionObserver, SessionState};
pub use traits::{StoreChange, WordStore};
