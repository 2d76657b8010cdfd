//! practica CLI — administrative commands for the question bank and exam replicas.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "practica",
    version,
    about = "Practice-test assembly and official exam replay tooling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where to read the question bank from.
#[derive(Args)]
struct SourceArgs {
    /// Read a bank file or directory instead of the database
    #[arg(long)]
    bank: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

impl From<SourceArgs> for commands::Source {
    fn from(args: SourceArgs) -> Self {
        Self {
            bank: args.bank,
            database: args.database,
            config: args.config,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Dry-run the allocation for a position (exit 2 on shortfall)
    Plan {
        /// Position id
        position: String,

        /// Number of questions requested
        count: usize,

        /// Restrict to these topics (repeatable)
        #[arg(long = "topic")]
        topics: Vec<String>,

        /// Restrict to these blocks (repeatable)
        #[arg(long = "block")]
        blocks: Vec<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Check an official exam against the current question bank (exit 2 if broken)
    Replay {
        /// Exam id
        exam_id: String,

        /// Exam part; omit to check every part
        part: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Import a bank file or directory into the database
    Import {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,

        /// SQLite database path (overrides the config file)
        #[arg(long)]
        database: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate bank TOML files
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Create starter config and sample bank
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "practica=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan {
            position,
            count,
            topics,
            blocks,
            format,
            source,
        } => commands::plan::execute(source.into(), position, count, topics, blocks, format).await,
        Commands::Replay {
            exam_id,
            part,
            format,
            source,
        } => commands::replay::execute(source.into(), exam_id, part, format).await,
        Commands::Import {
            bank,
            database,
            config,
        } => commands::import::execute(bank, database, config),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
