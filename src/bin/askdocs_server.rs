use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use askdocs::settings::{ApiArgs, CorpusArgs};
use askdocs::telemetry::init_tracing;
use askdocs::{server, QueryEngine};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "askdocs-server",
    about = "Serve question answering over the section corpus via HTTP"
)]
struct ServerCli {
    /// Bind address for the HTTP server.
    #[arg(long, env = "ASKDOCS_BIND", default_value = "127.0.0.1:5000")]
    bind: String,

    #[command(flatten)]
    api: ApiArgs,

    #[command(flatten)]
    corpus: CorpusArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = ServerCli::parse();
    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;

    // Blocking HTTP clients must be built off the async workers.
    let (api, corpus) = (cli.api, cli.corpus);
    let engine = tokio::task::spawn_blocking(move || QueryEngine::from_args(&api, &corpus))
        .await
        .context("engine setup task failed")??;

    let app = server::router(Arc::new(engine));
    tracing::info!(%addr, "askdocs-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("server shutdown")?;
    Ok(())
}
