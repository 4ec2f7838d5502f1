//! Accrue daemon. Serves the staking ledger over RPC.

mod config;
mod snapshot_file;

use std::path::PathBuf;
use std::sync::Arc;

use accrue_ledger::{MemoryToken, StakingLedger, SystemClock};
use accrue_rpc::{RpcServer, RpcState};
use accrue_utils::{init_logging, LogFormat};
use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "accrue-daemon", about = "Token staking ledger with continuous reward accrual")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "ACCRUE_CONFIG")]
    config: Option<PathBuf>,

    /// RPC server port.
    #[arg(long, env = "ACCRUE_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Address the RPC server binds to.
    #[arg(long, env = "ACCRUE_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Directory holding the ledger snapshot.
    #[arg(long, env = "ACCRUE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[arg(long, env = "ACCRUE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ACCRUE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Expose the `mint` RPC action (development only).
    #[arg(long, env = "ACCRUE_DEV_MINT")]
    dev_mint: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the ledger and its RPC server.
    Run,
    /// Print the effective configuration as TOML.
    ShowConfig,
    /// Verify a snapshot file and print its summary.
    InspectSnapshot {
        /// Snapshot to inspect. Defaults to the one in the data directory.
        path: Option<PathBuf>,
    },
}

impl Cli {
    fn effective_config(&self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)?,
            None => DaemonConfig::default(),
        };
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(addr) = &self.bind_address {
            config.bind_address = addr.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.dev_mint |= self.dev_mint;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;
    init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Run => run(config).await,
        Command::ShowConfig => {
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::InspectSnapshot { path } => {
            let path = path.unwrap_or_else(|| config.snapshot_path());
            let snapshot = snapshot_file::load(&path)?
                .with_context(|| format!("no snapshot at {}", path.display()))?;
            println!("hash:          {}", snapshot.hash_hex());
            println!("created_at:    {}", snapshot.created_at);
            println!("decimals:      {}", snapshot.decimals);
            println!("positions:     {}", snapshot.position_count());
            println!("total_staked:  {}", snapshot.index.total_staked());
            println!("reward_pool:   {}", snapshot.reward_pool);
            println!("reward_rate:   {}", snapshot.index.reward_rate_per_second());
            Ok(())
        }
    }
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let params = config.ledger_params()?;
    let token = MemoryToken::new(config.token_decimals)?;
    let snapshot_path = config.snapshot_path();

    let ledger = match snapshot_file::load(&snapshot_path)? {
        Some(snapshot) => {
            // The in-memory token starts empty; back restored stake and pool.
            let custody = snapshot.index.total_staked().add(snapshot.reward_pool)?;
            token.fund_vault(custody).await?;
            info!(path = %snapshot_path.display(), "loaded ledger snapshot");
            StakingLedger::from_snapshot(token, SystemClock, params, snapshot)?
        }
        None => StakingLedger::new(token, SystemClock, params)?,
    };

    let mut events = ledger.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            debug!(?event, "ledger event");
        }
    });

    if config.dev_mint {
        warn!("dev mint enabled: any client can create tokens");
    }
    let state = Arc::new(RpcState::new(ledger.clone(), config.dedup_capacity, config.dev_mint));
    let server = RpcServer::new(config.rpc_addr()?, state);
    info!(
        addr = %server.addr,
        decimals = ledger.decimals(),
        rate = %ledger.pool().await.reward_rate_per_second,
        "starting accrue daemon"
    );
    server.start(shutdown_signal()).await?;

    if config.snapshot_on_shutdown {
        let snapshot = ledger.snapshot().await?;
        snapshot_file::save(&snapshot_path, &snapshot)?;
        info!(path = %snapshot_path.display(), hash = %snapshot.hash_hex(), "ledger snapshot written");
    }
    info!(stats = ?ledger.stats(), "accrue daemon exited cleanly");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
