use anyhow::Result;
use axum::Router;
use clap::Parser;
use quire_core::tokenizer::{install_stopwords, Language};
use quire_core::{Layout, UnknownTermPolicy};
use server::{build_app, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory (sharded) or file (flat)
    #[arg(long, env = "QUIRE_INDEX", default_value = "./index")]
    index: PathBuf,
    #[arg(long, env = "QUIRE_LAYOUT", default_value_t = Layout::Sharded)]
    layout: Layout,
    /// Handling of query terms missing from the index
    #[arg(long, env = "QUIRE_POLICY", default_value_t = UnknownTermPolicy::FailFast)]
    policy: UnknownTermPolicy,
    /// Directory holding the original *.txt documents
    #[arg(long, env = "QUIRE_DOCUMENTS", default_value = "./documents")]
    documents: PathBuf,
    /// Stop-word languages (comma separated); all supported languages by default
    #[arg(long, value_delimiter = ',')]
    languages: Vec<Language>,
    /// Rebuild the index from the documents every N seconds (first run at startup)
    #[arg(long, env = "QUIRE_REBUILD_INTERVAL", value_parser = clap::value_parser!(u64).range(1..))]
    rebuild_interval: Option<u64>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 5001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let languages = if args.languages.is_empty() { Language::ALL.to_vec() } else { args.languages };
    install_stopwords(&languages);

    let config = ServerConfig {
        index: args.index,
        layout: args.layout,
        policy: args.policy,
        documents: args.documents,
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
        cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        rebuild_interval: args.rebuild_interval.map(Duration::from_secs),
    };
    let app: Router = build_app(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
