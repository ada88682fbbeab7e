//! The `lexicard review` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use lexicard_core::error::ReviewError;
use lexicard_core::model::{Recall, ReviewUpdate, TrackedWord};
use lexicard_core::session::{ReviewSession, SessionObserver, SessionState, SessionSummary};

/// Console session observer.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_loaded(&self, due: usize) {
        if due > 0 {
            println!("{due} words due for review\n");
        }
    }

    fn on_outcome_saved(&self, word: &TrackedWord, recall: Recall, update: &ReviewUpdate) {
        println!(
            "  {} -> {} (mastery {}, next review {})\n",
            word.word.word,
            recall,
            update.mastery_level,
            update.next_review_date.format("%Y-%m-%d"),
        );
    }

    fn on_error(&self, error: &ReviewError) {
        eprintln!("  ERROR: {error}");
    }

    fn on_complete(&self, summary: &SessionSummary) {
        println!(
            "Review complete! {} reviewed ({} good, {} again). You've reviewed all words for now.",
            summary.reviewed, summary.remembered, summary.forgotten
        );
    }

    fn on_navigate_away(&self) {
        println!("Returning to wordbook.");
    }
}

enum Input {
    Line(String),
    Quit,
}

async fn read_input<R>(lines: &mut tokio::io::Lines<R>) -> Result<Input>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match lines.next_line().await? {
        Some(line) if line.trim().eq_ignore_ascii_case("q") => Ok(Input::Quit),
        Some(line) => Ok(Input::Line(line)),
        None => Ok(Input::Quit),
    }
}

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (config, store) = super::open(config_path)?;
    let user = config.user();

    let mut session = ReviewSession::new(
        store,
        Arc::new(ConsoleObserver),
        config.session_config(),
    );

    if session.load(user.as_ref(), Utc::now()).await? == SessionState::Empty {
        println!("No words to review. You're all caught up! Check back later for more reviews.");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match session.state() {
            SessionState::Presenting => {
                let Some(card) = session.card() else { break };
                println!("[{} / {}] {}  {}", card.position, card.total, card.word, card.phonetic);
                println!("Press Enter to show the definition (q to quit)");
                match read_input(&mut lines).await? {
                    Input::Quit => break,
                    Input::Line(_) => session.reveal()?,
                }
            }
            SessionState::Revealed => {
                if let Some(card) = session.card() {
                    if let Some(pos) = card.part_of_speech.filter(|p| !p.is_empty()) {
                        println!("  ({pos})");
                    }
                    println!("  {}", card.definition.unwrap_or_default());
                }
                println!("Did you remember it? [g]ood / [a]gain (q to quit)");

                let recall = loop {
                    match read_input(&mut lines).await? {
                        Input::Quit => return Ok(()),
                        Input::Line(line) => match line.parse::<Recall>() {
                            Ok(recall) => break recall,
                            Err(_) => println!("Please answer g (good) or a (again)"),
                        },
                    }
                };

                match session.submit(recall, Utc::now()).await {
                    Ok(_) => {}
                    Err(e) if e.is_recoverable() => {
                        eprintln!("Failed to update progress, try again.");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            SessionState::Complete => {
                session.finish().await;
                break;
            }
            _ => break,
        }
    }

    Ok(())
}
