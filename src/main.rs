#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use std::net::{IpAddr, SocketAddr};

use checkers_server::config::Limits;
use checkers_server::logging;
use checkers_server::server::CheckersServer;

const DEFAULT_PORT: u16 = 12345;
const DEFAULT_BIND: &str = "0.0.0.0";

/// A stateful TCP game server hosting two-player checkers matches.
#[derive(Parser, Debug)]
#[command(name = "checkers-server")]
#[command(about = "A stateful TCP game server hosting two-player checkers matches")]
#[command(version)]
struct Cli {
    /// Port to listen on (1-65535). Reverts to 12345 if out of range.
    port: Option<String>,

    /// Address to bind to.
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();

    let port = match cli.port.as_deref().map(str::parse::<u16>) {
        Some(Ok(0)) | None => {
            if cli.port.is_some() {
                tracing::warn!("port must be 1-65535, using default {DEFAULT_PORT}");
            }
            DEFAULT_PORT
        }
        Some(Ok(port)) => port,
        Some(Err(_)) => {
            tracing::warn!(
                raw = cli.port.as_deref().unwrap_or_default(),
                "invalid port argument, using default {DEFAULT_PORT}"
            );
            DEFAULT_PORT
        }
    };

    let bind_address: IpAddr = cli
        .bind_address
        .as_deref()
        .unwrap_or(DEFAULT_BIND)
        .parse()
        .unwrap_or_else(|_| {
            tracing::warn!("invalid bind address, using default {DEFAULT_BIND}");
            DEFAULT_BIND.parse().expect("default bind address parses")
        });

    let addr = SocketAddr::new(bind_address, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "checkers server listening");

    let server = CheckersServer::new(Limits::default());
    server.run(listener).await
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn defaults_to_no_positional_args() {
        let cli = Cli::try_parse_from(["checkers-server"]).unwrap();
        assert!(cli.port.is_none());
        assert!(cli.bind_address.is_none());
    }

    #[test]
    fn accepts_port_and_bind_address() {
        let cli = Cli::try_parse_from(["checkers-server", "9000", "127.0.0.1"]).unwrap();
        assert_eq!(cli.port.as_deref(), Some("9000"));
        assert_eq!(cli.bind_address.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn help_flag_is_recognized() {
        let result = Cli::try_parse_from(["checkers-server", "--help"]);
        assert!(result.is_err());
        let help_text = result.unwrap_err().to_string();
        assert!(help_text.contains("checkers-server"));
    }

    #[test]
    fn version_flag_is_recognized() {
        let result = Cli::try_parse_from(["checkers-server", "--version"]);
        assert!(result.is_err());
    }
}
