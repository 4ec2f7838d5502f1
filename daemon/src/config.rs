//! Daemon configuration with TOML file support.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use accrue_types::{AccountId, FixedPointAmount, LedgerParams};
use accrue_utils::LogFormat;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Configuration for the staking daemon.
///
/// Loaded from a TOML file via [`DaemonConfig::from_toml_file`]; missing keys
/// take their defaults. CLI flags override file values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// RPC port.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Address the RPC server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Emission in whole tokens per second, shared by all stakers (e.g. "0.5").
    #[serde(default = "default_reward_rate")]
    pub reward_rate: String,

    /// Decimal scale of the token.
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,

    /// Accounts allowed to fund the pool and change the rate.
    #[serde(default)]
    pub funders: Vec<String>,

    /// Directory holding the ledger snapshot.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Write a snapshot when the daemon stops.
    #[serde(default = "default_true")]
    pub snapshot_on_shutdown: bool,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of request ids remembered for de-duplication.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Expose the `mint` action. Development only.
    #[serde(default)]
    pub dev_mint: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_rpc_port() -> u16 {
    7077
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_reward_rate() -> String {
    "1".to_string()
}

fn default_token_decimals() -> u8 {
    18
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./accrue_data")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dedup_capacity() -> usize {
    accrue_rpc::DEFAULT_DEDUP_CAPACITY
}

// ── Impl ───────────────────────────────────────────────────────────────

impl DaemonConfig {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn rpc_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .with_context(|| format!("invalid bind_address {:?}", self.bind_address))?;
        Ok(SocketAddr::new(ip, self.rpc_port))
    }

    /// Ledger parameters at the configured token scale.
    pub fn ledger_params(&self) -> anyhow::Result<LedgerParams> {
        let rate = FixedPointAmount::parse_units(&self.reward_rate, self.token_decimals)
            .with_context(|| format!("invalid reward_rate {:?}", self.reward_rate))?;
        let mut funders = Vec::with_capacity(self.funders.len());
        for raw in &self.funders {
            match AccountId::new(raw.as_str()) {
                Some(id) => funders.push(id),
                None => bail!("funder ids must not be empty"),
            }
        }
        Ok(LedgerParams::new(rate, funders))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(crate::snapshot_file::SNAPSHOT_FILE_NAME)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            rpc_port: default_rpc_port(),
            bind_address: default_bind_address(),
            reward_rate: default_reward_rate(),
            token_decimals: default_token_decimals(),
            funders: Vec::new(),
            data_dir: default_data_dir(),
            snapshot_on_shutdown: default_true(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            dedup_capacity: default_dedup_capacity(),
            dev_mint: false,
        }
    }
}
