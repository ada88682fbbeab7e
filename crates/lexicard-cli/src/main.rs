//! lexicard CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lexicard", version, about = "Spaced-repetition vocabulary trainer")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review the words that are due now
    Review,

    /// Show how many words are due for review
    Due,

    /// List saved words
    List {
        /// Which words to show: all, due, mastered
        #[arg(long, default_value = "all")]
        filter: String,
    },

    /// Save a word to your collection
    Add {
        /// The word itself
        #[arg(long)]
        word: String,

        /// Its definition
        #[arg(long)]
        definition: String,

        /// Phonetic spelling
        #[arg(long, default_value = "")]
        phonetic: String,

        /// Part of speech (noun, verb, ...)
        #[arg(long, default_value = "")]
        part_of_speech: String,

        /// Difficulty label (beginner, intermediate, advanced)
        #[arg(long, default_value = "")]
        difficulty: String,
    },

    /// Toggle the favorite flag on a saved word
    Favorite {
        /// Tracking id shown by `lexicard list`
        id: String,
    },

    /// Remove a word from your collection
    Remove {
        /// Tracking id shown by `lexicard list`
        id: String,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lexicard=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Review => commands::review::execute(config).await,
        Commands::Due => commands::due::execute(config).await,
        Commands::List { filter } => commands::list::execute(config, filter).await,
        Commands::Add {
            word,
            definition,
            phonetic,
            part_of_speech,
            difficulty,
        } => {
            commands::add::execute(
                config,
                word,
                definition,
                phonetic,
                part_of_speech,
                difficulty,
            )
            .await
        }
        Commands::Favorite { id } => commands::favorite::execute(config, id).await,
        Commands::Remove { id } => commands::remove::execute(config, id).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
