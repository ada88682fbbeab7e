//! The `lexicard due` command.

use std::path::PathBuf;

use anyhow::Result;

use lexicard_core::error::ReviewError;
use lexicard_core::reminder::ReviewReminder;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (config, store) = super::open(config_path)?;
    let user = config.user().ok_or(ReviewError::NotAuthenticated)?;

    let mut reminder = ReviewReminder::new(user);
    reminder.refresh(store.as_ref()).await?;

    if reminder.should_display() {
        println!("{} words due for review", reminder.count());
        println!("Keep your memory fresh! Run `lexicard review` to start.");
    } else {
        println!("No words due for review.");
    }

    Ok(())
}
