use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use rawchat::{build_router, observability, AppConfig, AppState};

#[derive(Parser, Debug)]
#[command(name = "rawchat", about = "Streaming chat gateway for OpenAI-compatible providers")]
struct Args {
    /// TOML config file; skipped if missing
    #[arg(long, env = "RAWCHAT_CONFIG", default_value = "config/rawchat.toml")]
    config: PathBuf,

    /// Overrides the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    observability::init_tracing();
    let args = Args::parse();

    let mut cfg = AppConfig::load(&args.config).await?;
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    tracing::info!(
        base_url = %cfg.upstream.base_url,
        default_model = %cfg.server.default_model,
        credentials = cfg.upstream.api_key.is_some(),
        "configuration loaded"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    let app = build_router(AppState::new(cfg)?);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("RawChat gateway listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
