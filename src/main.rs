//! LDGradnja server: drawing conversion, AI proxy and frontend hosting.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use ldgradnja_core::config::AppConfig;

/// LDGradnja backend server
#[derive(Debug, Parser)]
#[command(name = "ldgradnja-server", version, about, long_about = None)]
struct Cli {
    /// Directory holding default.toml and <env>.toml
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Environment name selecting <env>.toml
    #[arg(short, long, env = "LDGRADNJA_ENV", default_value = "development")]
    env: String,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match AppConfig::load(&cli.config, &cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_logging(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = %cli.config,
        env = %cli.env,
        "Configuration loaded"
    );

    if let Err(e) = ldgradnja_api::run_server(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging. `RUST_LOG` wins over `logging.level`.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
