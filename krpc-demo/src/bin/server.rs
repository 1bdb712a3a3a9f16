use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use krpc::{Error, Result};
use krpc_demo::{DemoImpl, EchoService, GreetService, Server, ServerConfig, build_endpoint};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Listen address.
    #[arg(default_value = "0.0.0.0:8000")]
    pub addr: std::net::SocketAddr,

    /// JSON file with the server configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<ServerConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read(path)
                .map_err(|e| Error::internal(format!("read {}: {e}", path.display())))?;
            Ok(serde_json::from_slice(&raw)?)
        }
        None => Ok(ServerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let endpoint = build_endpoint(Arc::new(DemoImpl::default()));
    let server = Server::create(endpoint, config);
    let addr = server.listen(args.addr).await?;
    tracing::info!(
        "Serving {:?} on {}...",
        [
            <DemoImpl as EchoService>::NAME,
            <DemoImpl as GreetService>::NAME
        ],
        addr.to_string()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop();
    server.join().await;
    Ok(())
}
