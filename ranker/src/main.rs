use anyhow::Result;
use clap::{Parser, Subcommand};
use ranker::{import, run, show, top};
use simgraph_core::{CancelToken, EngineConfig, PairStrategy, DEFAULT_EPSILON, DEFAULT_THRESHOLD};

const MIB: usize = 1 << 20;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ranker")]
#[command(about = "Compute document neighbor lists and centrality ranks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load token maps from a JSON/JSONL file or directory into the store
    Import {
        #[arg(long)]
        input: PathBuf,
        /// Store directory
        #[arg(long, default_value = "./store")]
        store: PathBuf,
    },
    /// Compute neighbors and ranks for every stored document
    Run {
        #[arg(long, default_value = "./store")]
        store: PathBuf,
        /// Documents strictly closer than this are neighbors
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
        /// Floor added to each document's distance total
        #[arg(long, default_value_t = DEFAULT_EPSILON)]
        epsilon: f64,
        /// symmetric or exhaustive
        #[arg(long, default_value = "symmetric")]
        strategy: PairStrategy,
        /// Worker threads (0 = one per core)
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Memory cap for the cached distance matrix, in MiB
        #[arg(long, default_value_t = 1024)]
        matrix_budget_mb: usize,
        /// Compute without writing results
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Print the stored neighbors and rank of one document
    Show {
        #[arg(long, default_value = "./store")]
        store: PathBuf,
        #[arg(long)]
        doc: u32,
    },
    /// Print the most central documents
    Top {
        #[arg(long, default_value = "./store")]
        store: PathBuf,
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { input, store } => {
            let n = import(&input, &store)?;
            tracing::info!(num_docs = n, store = %store.display(), "import complete");
        }
        Commands::Run {
            store,
            threshold,
            epsilon,
            strategy,
            threads,
            matrix_budget_mb,
            dry_run,
        } => {
            let config = EngineConfig::default()
                .with_threshold(threshold)
                .with_epsilon(epsilon)
                .with_strategy(strategy)
                .with_threads(threads)
                .with_matrix_budget(matrix_budget_mb.saturating_mul(MIB));
            let cancel = CancelToken::new();
            let worker_cancel = cancel.clone();
            let mut job =
                tokio::task::spawn_blocking(move || run(&store, config, dry_run, &worker_cancel));
            let summary = tokio::select! {
                res = &mut job => res??,
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("interrupt received, stopping after in-flight documents");
                    cancel.cancel();
                    job.await??
                }
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Show { store, doc } => {
            println!("{}", serde_json::to_string_pretty(&show(&store, doc)?)?);
        }
        Commands::Top { store, k } => {
            println!("{}", serde_json::to_string_pretty(&top(&store, k)?)?);
        }
    }
    Ok(())
}
