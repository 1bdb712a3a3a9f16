use std::time::Duration;

use clap::Parser;
use krpc::{Result, services::ServiceInfo};
use krpc_demo::{Client, ClientConfig};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server address.
    #[arg(default_value = "127.0.0.1:8000")]
    pub addr: std::net::SocketAddr,

    /// Include the argument schema of every method.
    #[arg(long, default_value_t = false)]
    pub describe: bool,

    /// Use `MessagePack` for the request.
    #[arg(long, default_value_t = false)]
    pub use_msgpack: bool,

    /// Request timeout in milliseconds.
    #[arg(long, default_value = "1000")]
    pub timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        timeout: Duration::from_millis(args.timeout_ms),
        use_msgpack: args.use_msgpack,
        ..Default::default()
    };
    let method = format!(
        "{}/{}",
        ServiceInfo::NAME,
        if args.describe { "Describe" } else { "List" }
    );

    let mut client = Client::connect(args.addr, config).await?;
    let rsp: serde_json::Value = client.call(&method, &()).await?;
    println!("{}", serde_json::to_string_pretty(&rsp)?);
    Ok(())
}
