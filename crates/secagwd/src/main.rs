use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use secagw_cloud_hetzner::HetznerProvider;
use secagw_core::{CredentialVault, GatewayService, SqlStore};
use secagwd::{AppState, DaemonConfig, build_router, config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "secagwd")]
#[command(about = "SECA sovereign-cloud API gateway", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// KDL config file (default: ./secagwd.kdl, then the user config dir)
    #[arg(short, long, env = "SECAGW_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, env = "SECAGW_LISTEN")]
    listen: Option<String>,

    /// SQLite database URL
    #[arg(long, env = "SECAGW_DATABASE")]
    database: Option<String>,

    /// Base64 AES-256 master key for the credential vault
    #[arg(long, env = "SECAGW_MASTER_KEY", hide_env_values = true)]
    master_key: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh master key and exit
    GenerateKey,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn apply_overrides(config: &mut DaemonConfig, cli: Cli) {
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(key) = cli.master_key {
        config.master_key = Some(key);
    }
    config.activation.provider = config.provider.clone();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::GenerateKey)) {
        println!("{}", CredentialVault::generate_key());
        return Ok(());
    }

    init_tracing(cli.log_format);

    let mut config = config::load(cli.config.as_deref()).context("loading configuration")?;
    apply_overrides(&mut config, cli);

    let master_key = config
        .master_key
        .as_deref()
        .context("no master key configured (set SECAGW_MASTER_KEY or master-key)")?;
    let vault = CredentialVault::from_base64(master_key).context("invalid master key")?;

    let store = SqlStore::connect(&config.database)
        .await
        .with_context(|| format!("opening {}", config.database))?;
    let provider = HetznerProvider::new(config.hetzner.clone());

    let service = GatewayService::new(
        Arc::new(store),
        Arc::new(provider),
        vault,
        config.activation.clone(),
        config.gateway.clone(),
    );
    let router = build_router(AppState {
        service: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(
        listen = %config.listen,
        provider = %config.provider,
        nat_vm = config.gateway.nat_enabled,
        "secagwd started"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
