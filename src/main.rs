//! upkeep CLI entry point
//!
//! Parses arguments, installs the log subscriber, runs the command and
//! renders failures with [`user_friendly_error`].

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use upkeep_cli::cli;
use upkeep_cli::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.build_config();
    init_logging(config.log_level.as_deref());

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute_with_config(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` wins over the level chosen by flags; no level and no
/// `RUST_LOG` means no logging.
fn init_logging(level: Option<&str>) {
    let filter = match (std::env::var("RUST_LOG").ok(), level) {
        (Some(directives), _) => EnvFilter::new(directives),
        (None, Some(level)) => EnvFilter::new(level),
        (None, None) => return,
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}
