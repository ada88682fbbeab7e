//! The `lexicard init` command.

use anyhow::Result;
use uuid::Uuid;

pub fn execute() -> Result<()> {
    let path = std::path::Path::new("lexicard.toml");
    if path.exists() {
        println!("lexicard.toml already exists, skipping.");
        return Ok(());
    }

    let user_id = Uuid::new_v4();
    std::fs::write(path, sample_config(user_id))?;
    println!("Created lexicard.toml (user {user_id})");

    println!("\nNext steps:");
    println!("  1. Save a word: lexicard add --word serendipity --definition \"a happy accident\"");
    println!("  2. See what's due: lexicard due");
    println!("  3. Review: lexicard review");

    Ok(())
}

fn sample_config(user_id: Uuid) -> String {
    format!(
        r#"# lexicard configuration

user_id = "{user_id}"

completion_delay_ms = 2000
new_word_delay_hours = 24

[store]
type = "local"
path = "./lexicard-data.json"

# To use a hosted backend instead:
# [store]
# type = "rest"
# base_url = "https://your-project.supabase.co"
# api_key = "${{LEXICARD_API_KEY}}"
# access_token = "${{LEXICARD_ACCESS_TOKEN}}"
"#
    )
}
