//! seirc: IRC gateway to Stack Exchange chat
//!
//! Usage:
//!   seirc                  - Serve IRC clients on the configured address
//!   seirc --config <path>  - Use a specific configuration file
//!   seirc --help           - Show help

use std::sync::Arc;

use seirc_core::{ChatService, Config};
use seirc_stack::StackChatService;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Serve, optionally with an explicit config file
    Serve { config_path: Option<String> },
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = match parse_args(std::env::args().skip(1))? {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("seirc {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Serve { config_path } => config_path,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = match &config_path {
        Some(path) => Config::from_toml_file(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting seirc...");
    tracing::info!("Chat origin: {}", config.chat.origin);

    let service: Arc<dyn ChatService> = Arc::new(
        StackChatService::new(&config.chat)
            .map_err(|e| anyhow::anyhow!("Failed to create chat client: {}", e))?,
    );

    let server = tokio::spawn(async move {
        if let Err(e) = seirc_irc::start_server(config, service).await {
            tracing::error!("IRC server error: {}", e);
        }
    });

    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    server.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<RunMode> {
    let mut args = args.into_iter();
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a file path"))?;
                config_path = Some(path);
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Serve { config_path })
}

/// Print help message
fn print_help() {
    println!("seirc - IRC gateway to Stack Exchange chat");
    println!();
    println!("Usage:");
    println!("  seirc                  Serve IRC clients");
    println!("  seirc --config <path>  Read settings from <path> instead of ./seirc.toml");
    println!("  seirc --help           Show this help message");
    println!("  seirc --version        Show version");
    println!();
    println!("Connect with any IRC client and register with:");
    println!("  NICK <nick>, USER x x x :<login email>, PASS <password>");
    println!("then JOIN <room id> to enter a chat room.");
    println!();
    println!("Environment Variables:");
    println!("  SEIRC_BIND_HOST           Listen host (default: localhost)");
    println!("  SEIRC_BIND_PORT           Listen port (default: 7825)");
    println!("  SEIRC_CHAT_ORIGIN         Chat host (default: https://chat.stackexchange.com)");
    println!("  SEIRC_LOGIN_ORIGIN        Login host (default: https://meta.stackexchange.com)");
    println!("  SEIRC_POLL_INTERVAL_SECS  Seconds between event polls (default: 2)");
    println!("  SEIRC_SERVER_NAME         IRC server name (default: SEIRC)");
    println!("  RUST_LOG                  Log filter (default: info)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(args(&[])).unwrap(), RunMode::Serve { config_path: None });
        assert_eq!(parse_args(args(&["--help"])).unwrap(), RunMode::Help);
        assert_eq!(parse_args(args(&["-v"])).unwrap(), RunMode::Version);
        assert_eq!(
            parse_args(args(&["--config", "/etc/seirc.toml"])).unwrap(),
            RunMode::Serve {
                config_path: Some("/etc/seirc.toml".to_string())
            }
        );
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }
}
