use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_SERVICE_BIND: &str = "0.0.0.0:8081";
pub const DEFAULT_SNAPSHOT_PATH: &str = ".";
pub const DEFAULT_GET_TIMEOUT_MS: u64 = 20_000;

// Service configuration sourced from SSQUEUE_* environment variables.
#[derive(Debug, Clone)]
pub struct SsqueueConfig {
    // Debug log level plus source locations in log lines.
    pub debug: bool,
    // Public send/get API listener.
    pub bind_addr: SocketAddr,
    // Liveness/metrics/log-tag listener; None disables it.
    pub service_bind: Option<SocketAddr>,
    pub snapshot: SnapshotConfig,
    // Long-poll bound used when a get request carries no timeout.
    pub get_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub disable: bool,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SsqueueConfigOverride {
    debug: Option<bool>,
    address: Option<String>,
    service_address: Option<String>,
    get_timeout_ms: Option<u64>,
    snapshot: Option<SnapshotConfigOverride>,
}

#[derive(Debug, Deserialize)]
struct SnapshotConfigOverride {
    disable: Option<bool>,
    path: Option<String>,
}

impl SsqueueConfig {
    pub fn from_env() -> Result<Self> {
        let debug = env_flag("SSQUEUE_DEBUG");
        let bind_addr = parse_addr(
            &std::env::var("SSQUEUE_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
        )
        .with_context(|| "parse SSQUEUE_ADDRESS")?;
        let service_bind = parse_optional_addr(
            &std::env::var("SSQUEUE_SERVICE_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_SERVICE_BIND.to_string()),
        )
        .with_context(|| "parse SSQUEUE_SERVICE_ADDRESS")?;
        let snapshot = SnapshotConfig {
            disable: env_flag("SSQUEUE_SNAPSHOT_DISABLE"),
            path: std::env::var("SSQUEUE_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
        };
        let get_timeout_ms = std::env::var("SSQUEUE_GET_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_GET_TIMEOUT_MS);
        Ok(Self {
            debug,
            bind_addr,
            service_bind,
            snapshot,
            get_timeout_ms,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("SSQUEUE_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read SSQUEUE_CONFIG: {path}"))?;
            let override_cfg: SsqueueConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse ssqueue config yaml")?;
            config.apply(override_cfg)?;
        }
        Ok(config)
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_millis(self.get_timeout_ms)
    }

    fn apply(&mut self, override_cfg: SsqueueConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.debug {
            self.debug = value;
        }
        if let Some(value) = override_cfg.address {
            self.bind_addr = parse_addr(&value).with_context(|| "parse address")?;
        }
        if let Some(value) = override_cfg.service_address {
            self.service_bind =
                parse_optional_addr(&value).with_context(|| "parse service_address")?;
        }
        if let Some(value) = override_cfg.get_timeout_ms.filter(|value| *value > 0) {
            self.get_timeout_ms = value;
        }
        if let Some(snapshot) = override_cfg.snapshot {
            if let Some(value) = snapshot.disable {
                self.snapshot.disable = value;
            }
            if let Some(value) = snapshot.path {
                self.snapshot.path = PathBuf::from(value);
            }
        }
        Ok(())
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// A bare `:port` listens on every interface.
fn parse_addr(value: &str) -> Result<SocketAddr> {
    let value = value.trim();
    let addr: SocketAddr = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}").parse()?,
        None => value.parse()?,
    };
    Ok(addr)
}

// Empty string switches the listener off.
fn parse_optional_addr(value: &str) -> Result<Option<SocketAddr>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(parse_addr(value)?))
}
