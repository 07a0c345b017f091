//! Command-line interface for the rfidhub RFID self-checkin hub.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rfidhub_core::config::env_vars;
use rfidhub_core::HubConfig;

/// rfidhub - bridge between the self-checkin UI, RFID readers and SIP2.
#[derive(Parser, Debug)]
#[command(name = "rfidhub")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML).
    #[arg(short, long, global = true, default_value = "rfidhub.toml")]
    config: PathBuf,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the hub.
    Serve {
        /// Address to bind to, overrides the configuration.
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = HubConfig::load(Some(&args.config))
        .with_context(|| format!("loading {}", args.config.display()))?;

    match args.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(
                version = rfidhub_core::VERSION,
                bind = %config.server.bind,
                sip = %config.sip.addr,
                device_port = config.device.port,
                "Starting rfidhub"
            );
            rfidhub_api::run(config).await
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested (for production/container environments)
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "rfidhub=debug" } else { "rfidhub=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from(["rfidhub", "serve", "--bind", "127.0.0.1:9000"]).unwrap();
        match args.command {
            Command::Serve { bind } => assert_eq!(bind.as_deref(), Some("127.0.0.1:9000")),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.config, PathBuf::from("rfidhub.toml"));
        assert!(!args.verbose);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["rfidhub", "config", "-c", "/etc/rfidhub.toml", "-v"]).unwrap();
        assert!(matches!(args.command, Command::Config));
        assert_eq!(args.config, PathBuf::from("/etc/rfidhub.toml"));
        assert!(args.verbose);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["rfidhub"]).is_err());
    }
}
