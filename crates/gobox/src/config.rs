use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use gobox_build::Toolchain;
use gobox_contracts::{
    DEFAULT_CANCEL_POLL_MS, DEFAULT_READ_CACHE_THRESHOLD, DEFAULT_SCRATCH_ROOT,
    DEFAULT_TOOLCHAIN_ROOT, ENV_CANCEL_POLL_MS, ENV_LOG, ENV_READ_CACHE_THRESHOLD,
    ENV_SCRATCH_ROOT, ENV_TOOLCHAIN_ROOT,
};
use gobox_sandbox::SandboxConfig;
use gobox_vfs::VfsConfig;

pub const DEFAULT_LOG_FILTER: &str = "gobox=info";

/// Session settings taken from `GOBOX_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub log_filter: String,
    pub read_cache_threshold: usize,
    pub toolchain_root: String,
    pub scratch_root: String,
    pub cancel_poll_interval: Duration,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            read_cache_threshold: DEFAULT_READ_CACHE_THRESHOLD,
            toolchain_root: DEFAULT_TOOLCHAIN_ROOT.to_string(),
            scratch_root: DEFAULT_SCRATCH_ROOT.to_string(),
            cancel_poll_interval: Duration::from_millis(DEFAULT_CANCEL_POLL_MS),
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = EnvConfig::default();
        if let Some(v) = get(ENV_LOG) {
            cfg.log_filter = v;
        }
        if let Some(v) = get(ENV_READ_CACHE_THRESHOLD) {
            cfg.read_cache_threshold = parse_var(ENV_READ_CACHE_THRESHOLD, &v)?;
        }
        if let Some(v) = get(ENV_TOOLCHAIN_ROOT) {
            cfg.toolchain_root = v;
        }
        if let Some(v) = get(ENV_SCRATCH_ROOT) {
            cfg.scratch_root = v;
        }
        if let Some(v) = get(ENV_CANCEL_POLL_MS) {
            let ms: u64 = parse_var(ENV_CANCEL_POLL_MS, &v)?;
            if ms == 0 {
                return Err(invalid(ENV_CANCEL_POLL_MS, &v));
            }
            cfg.cancel_poll_interval = Duration::from_millis(ms);
        }
        Ok(cfg)
    }

    pub fn vfs_config(&self) -> VfsConfig {
        VfsConfig {
            read_cache_threshold: self.read_cache_threshold,
        }
    }

    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            cancel_poll_interval: self.cancel_poll_interval,
            ..SandboxConfig::default()
        }
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain::at(self.toolchain_root.as_str()).with_scratch_root(self.scratch_root.as_str())
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| invalid(name, raw))
}

fn invalid(name: &str, raw: &str) -> anyhow::Error {
    anyhow!("invalid environment variable {name}={raw}")
}
