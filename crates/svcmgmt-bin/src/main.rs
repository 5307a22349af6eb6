use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod service;

#[derive(Parser, Debug)]
#[command(name = "glassfish-service")]
#[command(about = "Install a GlassFish domain or instance as a host-managed service")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "GF_SERVICE_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a domain or instance as a systemd service
    Create(service::CreateArgs),
    /// Remove a previously installed service
    Delete(service::DeleteArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(
        "glassfish-service v{} starting (os={}, arch={})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    match cli.command {
        Commands::Create(args) => service::run_create(args),
        Commands::Delete(args) => service::run_delete(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
