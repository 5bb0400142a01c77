use std::time::Duration;

use clap::Parser;
use questboard::logger::setup_logger;
use questboard::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "questboard-server")]
#[command(about = "Planning-poker room server", long_about = None)]
struct Args {
    /// Host to bind
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = 48377)]
    port: u16,

    /// HTTP path that accepts WebSocket upgrades
    #[arg(long, default_value = "/ws")]
    path: String,

    /// Seconds between heartbeat sweeps
    #[arg(long, default_value_t = 4)]
    heartbeat_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), QuestboardError> {
    setup_logger(env!("CARGO_BIN_NAME"), "info");
    let args = Args::parse();

    let server = QuestboardServer::builder()
        .bind(&format!("{}:{}", args.host, args.port))
        .path(args.path)
        .heartbeat(HeartbeatConfig::with_interval(Duration::from_secs(
            args.heartbeat_secs,
        )))
        .build()
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
