//! Shotform CLI — score shooting form from recorded pose streams.
//!
//! Usage:
//!   shotform score <POSES>           Replay a pose stream and print the final score
//!   shotform config init             Write the default scoring config
//!   shotform config validate <FILE>  Check a scoring config

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "shotform",
    about = "Basketball shooting form scoring from pose keypoints",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded pose stream (JSONL) and print the final score
    Score {
        /// Path to the pose stream
        poses: PathBuf,

        /// Scoring config file (defaults are used if missing or invalid)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Video frame width in pixels
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Video frame height in pixels
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Maximum processed frames per second
        #[arg(long)]
        rate: Option<u32>,

        /// Number of frame scores in the live window
        #[arg(long)]
        window: Option<usize>,

        /// Lock the score after this many processed frames
        #[arg(long)]
        lock_after: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage scoring config files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default scoring config
    Init {
        /// Output file
        #[arg(short, long, default_value = "score-config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a scoring config file
    Validate {
        /// Config file to check
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = shotform_common::config::AppConfig::load();

    // Initialize logging
    let mut logging = app_config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    shotform_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Score {
            poses,
            config,
            width,
            height,
            rate,
            window,
            lock_after,
            json,
        } => {
            let options = commands::score::ScoreOptions {
                poses,
                config,
                geometry: width.zip(height),
                rate,
                window,
                lock_after,
                json,
            };
            commands::score::run(options, &app_config.analysis).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { output, force } => commands::config::init(output, force),
            ConfigAction::Validate { path } => commands::config::validate(path),
        },
    }
}
