//! The `lexicard add` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use lexicard_core::model::WordEntry;
use lexicard_core::wordbook::Wordbook;

pub async fn execute(
    config_path: Option<PathBuf>,
    word: String,
    definition: String,
    phonetic: String,
    part_of_speech: String,
    difficulty: String,
) -> Result<()> {
    anyhow::ensure!(!word.trim().is_empty(), "word must not be empty");
    anyhow::ensure!(!definition.trim().is_empty(), "definition must not be empty");

    let (config, store) = super::open(config_path)?;
    let book = Wordbook::new(store, config.user())
        .with_first_review_after(config.new_word_delay()?);

    let entry = WordEntry {
        id: Uuid::new_v4(),
        word: word.trim().to_string(),
        phonetic,
        definition,
        part_of_speech,
        difficulty_level: difficulty,
    };

    let tracked = book.add(&entry, Utc::now()).await?;

    println!("Saved '{}' to your collection ({})", entry.word, tracked.id);
    println!(
        "First review: {}",
        tracked.next_review_date.format("%Y-%m-%d %H:%M UTC")
    );

    Ok(())
}
