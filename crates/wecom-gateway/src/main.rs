use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wecom_gateway::config::{GatewayConfig, LogConfig, LogFormat};
use wecom_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "wecom-gateway")]
#[command(version, about = "WeCom callback gateway - relays @mentions to an AI assistant")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "WECOM_CONFIG_PATH")]
    config: Option<PathBuf>,
}

fn init_tracing(log: &LogConfig) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = GatewayConfig::load(args.config.as_deref())?;
    init_tracing(&config.log);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting wecom-gateway");

    let server = GatewayServer::new(config)?;
    server.start().await?;

    Ok(())
}
