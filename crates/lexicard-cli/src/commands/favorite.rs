//! The `lexicard favorite` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use lexicard_core::model::{TrackingId, WordbookFilter};
use lexicard_core::wordbook::Wordbook;

pub async fn execute(config_path: Option<PathBuf>, id: String) -> Result<()> {
    let id: TrackingId = id
        .parse()
        .with_context(|| format!("invalid tracking id: {id}"))?;

    let (config, store) = super::open(config_path)?;
    let book = Wordbook::new(store, config.user());

    let words = book.list(WordbookFilter::All, Utc::now()).await?;
    let word = words
        .iter()
        .find(|w| w.id == id)
        .with_context(|| format!("no saved word with id {id}"))?;

    let favorited = book.toggle_favorite(&id, word.is_favorited).await?;

    if favorited {
        println!("Favorited '{}'", word.word.word);
    } else {
        println!("Unfavorited '{}'", word.word.word);
    }

    Ok(())
}
