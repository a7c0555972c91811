use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quire_core::tokenizer::{install_stopwords, Language};
use quire_core::{attach_snippets, build, query, DirectoryStore, IndexStorage, Layout, QueryOutcome, Storage, UnknownTermPolicy};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quire-indexer")]
#[command(about = "Build and query a positional inverted index", long_about = None)]
struct Cli {
    /// Stop-word languages (comma separated); all supported languages by default
    #[arg(long, global = true, value_delimiter = ',')]
    languages: Vec<Language>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of *.txt documents
    Build {
        /// Document directory
        #[arg(long)]
        input: PathBuf,
        /// Output directory (sharded) or file (flat)
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = Layout::Sharded)]
        layout: Layout,
    },
    /// Run one AND query and print the JSON result
    Search {
        #[arg(long)]
        index: PathBuf,
        #[arg(long, default_value_t = Layout::Sharded)]
        layout: Layout,
        #[arg(long, default_value_t = UnknownTermPolicy::FailFast)]
        policy: UnknownTermPolicy,
        /// Document directory used to cut snippets
        #[arg(long)]
        documents: Option<PathBuf>,
        query: Vec<String>,
    },
    /// Print term and posting counts
    Stats {
        #[arg(long)]
        index: PathBuf,
        #[arg(long, default_value_t = Layout::Sharded)]
        layout: Layout,
    },
}

#[derive(Serialize)]
struct Stats {
    layout: Layout,
    terms: usize,
    postings: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let languages = if cli.languages.is_empty() { Language::ALL.to_vec() } else { cli.languages };
    install_stopwords(&languages);

    match cli.command {
        Commands::Build { input, output, layout } => build_index(input, output, layout),
        Commands::Search { index, layout, policy, documents, query } => {
            search(Storage::open(layout, index), policy, documents, &query.join(" "))
        }
        Commands::Stats { index, layout } => stats(Storage::open(layout, index)),
    }
}

fn build_index(input: PathBuf, output: PathBuf, layout: Layout) -> Result<()> {
    anyhow::ensure!(input.is_dir(), "input {} is not a directory", input.display());
    let store = DirectoryStore::new(&input);
    let outcome = build(store.documents());
    tracing::info!(indexed = outcome.indexed, skipped = outcome.skipped, terms = outcome.index.len(), "ingested documents");

    let storage = Storage::open(layout, &output);
    storage.export(&outcome.index).with_context(|| format!("exporting {layout} index to {}", output.display()))?;
    tracing::info!(output = %output.display(), %layout, "index build complete");
    Ok(())
}

fn search(storage: Storage, policy: UnknownTermPolicy, documents: Option<PathBuf>, text: &str) -> Result<()> {
    let outcome = query(text, &storage, policy).context("query failed")?;
    let json = match outcome {
        QueryOutcome::Matches(result) => {
            let result = match documents {
                Some(dir) => attach_snippets(result, &DirectoryStore::new(dir)),
                None => result,
            };
            serde_json::to_value(result)?
        }
        other => serde_json::json!({ "message": other.message() }),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn stats(storage: Storage) -> Result<()> {
    let index = storage.load_all().context("loading index")?;
    let stats = Stats { layout: storage.layout(), terms: index.len(), postings: index.posting_count() };
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
