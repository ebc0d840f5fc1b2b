//! frame-relay server binary
//!
//! Run with: frame-relay [--bind ADDR] [--max-connections N]
//!           [--queue-capacity N] [--idle-session-timeout SECS]
//!
//! Every flag also reads from the environment (`RELAY_BIND`, ...).
//! Log verbosity follows `RUST_LOG`, defaulting to `frame_relay=info`.
//!
//! ## Producing
//!   Open a WebSocket to ws://HOST:10000/worker/<session> and send binary frames.
//!
//! ## Viewing
//!   Browse to http://HOST:10000/ or open ws://HOST:10000/view and send
//!   {"type":"SUBSCRIBE","sessionId":"<session>"}.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use frame_relay::{RegistryConfig, RelayServer, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "frame-relay", version, about = "Relay live binary streams to WebSocket viewers")]
struct Cli {
    /// Address to bind to
    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0:10000")]
    bind: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, env = "RELAY_MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,

    /// Outbound messages buffered per connection before sends are dropped
    #[arg(long, env = "RELAY_QUEUE_CAPACITY", default_value_t = 64)]
    queue_capacity: usize,

    /// Evict sessions with no producer and no viewers after this many seconds
    #[arg(long, env = "RELAY_IDLE_SESSION_TIMEOUT", value_name = "SECS")]
    idle_session_timeout: Option<u64>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::with_addr(self.bind)
            .max_connections(self.max_connections)
            .outbound_queue_capacity(self.queue_capacity)
    }

    fn registry_config(&self) -> RegistryConfig {
        match self.idle_session_timeout {
            Some(secs) => RegistryConfig::default().idle_session_timeout(Duration::from_secs(secs)),
            None => RegistryConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frame_relay=info".parse()?),
        )
        .init();

    let server = RelayServer::with_registry_config(cli.server_config(), cli.registry_config());

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["frame-relay"]);

        assert_eq!(cli.bind.port(), 10000);
        assert_eq!(cli.server_config().outbound_queue_capacity, 64);
        assert!(!cli.registry_config().eviction_enabled());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "frame-relay",
            "--bind",
            "127.0.0.1:9000",
            "--max-connections",
            "10",
            "--idle-session-timeout",
            "120",
        ]);

        let server = cli.server_config();
        assert_eq!(server.bind_addr.port(), 9000);
        assert_eq!(server.max_connections, 10);
        assert_eq!(
            cli.registry_config().idle_session_timeout,
            Some(Duration::from_secs(120))
        );
    }
}
