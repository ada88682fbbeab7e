//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use lexicard_core::traits::WordStore;
use lexicard_store::{create_store, LexicardConfig};

pub mod add;
pub mod due;
pub mod favorite;
pub mod init;
pub mod list;
pub mod remove;
pub mod review;

/// Load configuration and open the configured store.
pub(crate) fn open(config_path: Option<PathBuf>) -> Result<(LexicardConfig, Arc<dyn WordStore>)> {
    let config = lexicard_store::config::load_config_from(config_path.as_deref())?;
    tracing::debug!(store = ?config.store, "opening word store");
    let store = create_store(&config.store)?;
    Ok((config, store))
}
