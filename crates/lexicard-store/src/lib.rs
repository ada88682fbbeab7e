//! lexicard-store: Word store backends.
//!
//! Implements the `WordStore` trait for an in-process store (persisted as a
//! local JSON file) and for a hosted PostgREST-style backend, plus the
//! configuration layer that picks between them.

pub mod config;
pub mod memory;
pub mod rest;

pub use config::{create_store, load_config, LexicardConfig, StoreConfig};
pub use memory::MemoryStore;
pub use rest::RestStore;
