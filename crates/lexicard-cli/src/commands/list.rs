//! The `lexicard list` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};

use lexicard_core::model::WordbookFilter;
use lexicard_core::wordbook::Wordbook;

pub async fn execute(config_path: Option<PathBuf>, filter: String) -> Result<()> {
    let filter: WordbookFilter = filter.parse().map_err(anyhow::Error::msg)?;

    let (config, store) = super::open(config_path)?;
    let book = Wordbook::new(store, config.user());
    let now = Utc::now();

    let summary = book.summary(now).await?;
    println!(
        "All ({})  Review ({})  Mastered ({})",
        summary.total, summary.due, summary.mastered
    );

    let words = book.list(filter, now).await?;
    if words.is_empty() {
        match filter {
            WordbookFilter::All => println!("No words saved yet. Add one with `lexicard add`."),
            WordbookFilter::Due => println!("No words to review at the moment."),
            WordbookFilter::Mastered => println!("No mastered words yet. Keep practicing!"),
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Id",
        "Word",
        "Definition",
        "Mastery",
        "Reviews",
        "Next review",
        "",
    ]);

    for word in &words {
        table.add_row(vec![
            Cell::new(word.id),
            Cell::new(&word.word.word),
            Cell::new(&word.word.definition),
            Cell::new(word.mastery_level),
            Cell::new(word.review_count),
            Cell::new(word.next_review_date.format("%Y-%m-%d")),
            Cell::new(if word.is_favorited { "*" } else { "" }),
        ]);
    }

    println!("{table}");
    Ok(())
}
