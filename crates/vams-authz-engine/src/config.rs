use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::policy::RetryPolicy;

pub const DEFAULT_REFRESH_POLICY_SECONDS: u64 = 30;
pub const DEFAULT_POLICY_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_POLICY_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 1000;

// Engine configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzConfig {
    pub refresh_interval: Duration,
    pub policy_retry_attempts: u32,
    pub policy_retry_delay: Duration,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
struct AuthzConfigOverride {
    refresh_policy_seconds: Option<u64>,
    policy_retry_attempts: Option<u32>,
    policy_retry_delay_ms: Option<u64>,
    page_size: Option<usize>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_POLICY_SECONDS),
            policy_retry_attempts: DEFAULT_POLICY_RETRY_ATTEMPTS,
            policy_retry_delay: Duration::from_millis(DEFAULT_POLICY_RETRY_DELAY_MS),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn positive_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value != T::default())
}

fn positive<T: PartialEq + Default>(value: Option<T>) -> Option<T> {
    value.filter(|value| *value != T::default())
}

impl AuthzConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let refresh_interval = positive_env::<u64>("VAMS_AUTHZ_REFRESH_POLICY_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_interval);
        let policy_retry_attempts = positive_env::<u32>("VAMS_AUTHZ_POLICY_RETRY_ATTEMPTS")
            .unwrap_or(defaults.policy_retry_attempts);
        let policy_retry_delay = positive_env::<u64>("VAMS_AUTHZ_POLICY_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.policy_retry_delay);
        let page_size =
            positive_env::<usize>("VAMS_AUTHZ_PAGE_SIZE").unwrap_or(defaults.page_size);
        Ok(Self {
            refresh_interval,
            policy_retry_attempts,
            policy_retry_delay,
            page_size,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("VAMS_AUTHZ_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read VAMS_AUTHZ_CONFIG: {path}"))?;
            let override_cfg: AuthzConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse authz config yaml")?;
            if let Some(value) = positive(override_cfg.refresh_policy_seconds) {
                config.refresh_interval = Duration::from_secs(value);
            }
            if let Some(value) = positive(override_cfg.policy_retry_attempts) {
                config.policy_retry_attempts = value;
            }
            if let Some(value) = positive(override_cfg.policy_retry_delay_ms) {
                config.policy_retry_delay = Duration::from_millis(value);
            }
            if let Some(value) = positive(override_cfg.page_size) {
                config.page_size = value;
            }
        }
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.policy_retry_attempts, self.policy_retry_delay)
    }
}
