use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use spotwatch::{FailurePolicy, PolicyFilter, PollerConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct ClientCfg {
    pub endpoint: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FailureCfg {
    FailFast,
    Retry {
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerCfg {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_start_time_epsilon_ms")]
    pub start_time_epsilon_ms: u64,
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,
    #[serde(default = "default_failure")]
    pub failure: FailureCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client: ClientCfg,
    #[serde(default)]
    pub poller: PollerCfg,
    #[serde(default)]
    pub policies: Vec<PolicyFilter>,
}

fn default_api_key_env() -> String {
    "SPOTWATCH_API_KEY".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_start_time_epsilon_ms() -> u64 {
    5
}

fn default_stream_capacity() -> usize {
    1000
}

fn default_failure() -> FailureCfg {
    FailureCfg::FailFast
}

impl Default for PollerCfg {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            start_time_epsilon_ms: default_start_time_epsilon_ms(),
            stream_capacity: default_stream_capacity(),
            failure: default_failure(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read {}", path.as_ref().display()))?;
        let cfg: Self = toml::from_str(&s).context("parse Config.toml")?;
        Ok(cfg)
    }
}

impl TryFrom<&PollerCfg> for PollerConfig {
    type Error = anyhow::Error;

    fn try_from(cfg: &PollerCfg) -> Result<Self> {
        if cfg.poll_interval_secs == 0 {
            bail!("poller.poll_interval_secs must be at least 1");
        }
        if cfg.stream_capacity == 0 {
            bail!("poller.stream_capacity must be at least 1");
        }

        let failure_policy = match cfg.failure {
            FailureCfg::FailFast => FailurePolicy::FailFast,
            FailureCfg::Retry {
                max_attempts,
                initial_backoff_ms,
                max_backoff_ms,
            } => FailurePolicy::Retry {
                max_attempts,
                initial_backoff: Duration::from_millis(initial_backoff_ms),
                max_backoff: Duration::from_millis(max_backoff_ms),
            },
        };

        Ok(Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            start_time_epsilon: Duration::from_millis(cfg.start_time_epsilon_ms),
            stream_capacity: cfg.stream_capacity,
            failure_policy,
        })
    }
}
