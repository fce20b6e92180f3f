use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Check character backstories against their source stories", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split story texts into word-window chunks
    Chunk {
        /// Directory or .zip archive of .txt story files (file stem = story id)
        #[arg(long)]
        books: PathBuf,

        /// Chunk CSV to write
        #[arg(long)]
        out: PathBuf,

        /// Words per chunk (default: from config, 350)
        #[arg(long)]
        words: Option<usize>,

        /// Config file (default: ./canon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Split backstories into claims and write one claims CSV per backstory
    Claims {
        /// Backstory CSV (id/story_id, content)
        #[arg(long)]
        backstories: PathBuf,

        /// Directory for <story_id>_claims.csv files
        #[arg(long)]
        out_dir: PathBuf,

        /// Config file (default: ./canon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Retrieve evidence and decide a verdict for every backstory
    Run {
        /// Chunk CSV written by `canon chunk`
        #[arg(long)]
        chunks: PathBuf,

        /// Backstory CSV (id/story_id, content)
        #[arg(long)]
        backstories: PathBuf,

        /// Config file (default: ./canon.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use the deterministic hashing embedder instead of ONNX
        #[arg(long)]
        stub: bool,

        /// Evidence chunks per claim
        #[arg(long)]
        top_k: Option<usize>,

        /// Worker threads (0 = one per core)
        #[arg(long)]
        threads: Option<usize>,

        /// Results CSV to append to
        #[arg(long)]
        results: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-run verdicts over saved retrieval audit files
    Decide {
        /// Audit CSV files or directories containing them
        #[arg(long, required = true, num_args = 1..)]
        evidence: Vec<PathBuf>,

        /// Config file (default: ./canon.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output verdicts as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // --verbose wins over RUST_LOG; otherwise RUST_LOG or info
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Chunk {
            books,
            out,
            words,
            config,
        } => {
            commands::chunk::execute(&books, &out, words, config.as_deref())?;
        }
        Commands::Claims {
            backstories,
            out_dir,
            config,
        } => {
            commands::claims::execute(&backstories, &out_dir, config.as_deref())?;
        }
        Commands::Run {
            chunks,
            backstories,
            config,
            stub,
            top_k,
            threads,
            results,
            json,
        } => {
            commands::run::execute(commands::run::RunOptions {
                chunks,
                backstories,
                config,
                stub,
                top_k,
                threads,
                results,
                json,
            })?;
        }
        Commands::Decide {
            evidence,
            config,
            json,
        } => {
            commands::decide::execute(&evidence, config.as_deref(), json)?;
        }
    }

    Ok(())
}
