//! The `lexicard remove` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use lexicard_core::model::TrackingId;
use lexicard_core::wordbook::Wordbook;

pub async fn execute(config_path: Option<PathBuf>, id: String) -> Result<()> {
    let id: TrackingId = id
        .parse()
        .with_context(|| format!("invalid tracking id: {id}"))?;

    let (config, store) = super::open(config_path)?;
    let book = Wordbook::new(store, config.user());

    book.remove(&id)
        .await
        .with_context(|| format!("failed to remove word {id}"))?;

    println!("Word removed from your collection");
    Ok(())
}
