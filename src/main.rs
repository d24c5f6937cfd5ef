use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use silda::{merge_checkpoints, BatchScheduler, Checkpoint, Corpus, Resume, RunConfig};

/// Sentiment-aware LDA via batched, resumable collapsed Gibbs sampling.
#[derive(Parser)]
#[command(name = "silda", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the batch sampler over a preprocessed corpus
    Run {
        /// Document-word count table (one document per line)
        #[arg(long)]
        word_counts: PathBuf,

        /// Per-document ratings, one per line
        #[arg(long)]
        ratings: PathBuf,

        /// Per-document user labels, one per line
        #[arg(long)]
        users: PathBuf,

        /// Number of topics
        #[arg(long, short = 't')]
        topics: usize,

        /// Dirichlet smoothing for topic given (user, sentiment)
        #[arg(long, default_value = "1.0")]
        alpha: f64,

        /// Dirichlet smoothing for word given (sentiment, topic)
        #[arg(long, default_value = "1.0")]
        eta: f64,

        /// Post-burn-in iterations
        #[arg(long, default_value = "150")]
        iterations: usize,

        /// Burn-in iterations, discarded
        #[arg(long, default_value = "10")]
        burn_in: usize,

        /// Record every Nth post-burn-in iteration
        #[arg(long, default_value = "1")]
        thin: usize,

        /// Iterations per lot (checkpoint granularity)
        #[arg(long, default_value = "50")]
        lot_size: usize,

        /// Base seed; each lot reseeds as seed + lot
        #[arg(long, default_value = "123")]
        seed: u64,

        /// Log progress every N iterations
        #[arg(long, default_value = "15")]
        update_every: usize,

        /// Directory for per-lot checkpoint files
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Checkpoint file from a prior run to resume from
        #[arg(long, requires = "resume_lot")]
        resume: Option<PathBuf>,

        /// Last fully completed lot of the prior run
        #[arg(long, requires = "resume")]
        resume_lot: Option<usize>,
    },

    /// Merge two checkpoints covering disjoint lot ranges
    Merge {
        /// Checkpoint holding the earlier lots
        first: PathBuf,

        /// Checkpoint holding the later lots
        second: PathBuf,

        /// Output file for the merged result
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("silda=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            word_counts,
            ratings,
            users,
            topics,
            alpha,
            eta,
            iterations,
            burn_in,
            thin,
            lot_size,
            seed,
            update_every,
            out_dir,
            resume,
            resume_lot,
        } => {
            let corpus = Corpus::from_files(&word_counts, &ratings, &users)?;
            info!(
                docs = corpus.n_docs(),
                words = corpus.n_words(),
                users = corpus.n_users(),
                sentiments = corpus.n_sentiments(),
                "corpus loaded"
            );

            let config = RunConfig {
                n_topics: topics,
                alpha,
                eta,
                n_iter: iterations,
                n_burn: burn_in,
                n_thin: thin,
                n_lot: lot_size,
                seed,
                n_update: update_every,
                max_retries: 3,
            };

            let resume = match (resume, resume_lot) {
                (Some(path), Some(target_lot)) => {
                    let checkpoint = Checkpoint::load(&path)
                        .with_context(|| format!("loading resume checkpoint {}", path.display()))?;
                    Some(Resume {
                        checkpoint,
                        target_lot,
                    })
                }
                _ => None,
            };

            fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating output directory {}", out_dir.display()))?;
            let scheduler = BatchScheduler::new(&corpus, config, &out_dir);
            let final_checkpoint = scheduler.run(resume)?;
            info!(
                saved = final_checkpoint.n_saved(),
                lot = ?final_checkpoint.last_complete_lot,
                "sampling finished"
            );
        }

        Commands::Merge {
            first,
            second,
            output,
        } => {
            let first = Checkpoint::load(&first)?;
            let second = Checkpoint::load(&second)?;
            let merged = merge_checkpoints(&first, &second)?;
            let file = File::create(&output)
                .with_context(|| format!("creating merge output {}", output.display()))?;
            serde_json::to_writer(BufWriter::new(file), &merged)?;
            info!(path = %output.display(), "merged results written");
        }
    }

    Ok(())
}
