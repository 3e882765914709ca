// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scrape configuration: defaults, then `OPENBOX_*` environment overrides,
//! then command-line overrides.

use crate::convergence::{Thresholds, Timing};
use crate::renderer::LaunchOptions;
use anyhow::{Context, Result};
use openbox_catalog::extract::selectors;
use openbox_catalog::SiteOrigin;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTING_URL: &str = "https://www.potterybarn.com/shop/sale/open-box-deals/";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const ENV_LISTING_URL: &str = "OPENBOX_LISTING_URL";
pub const ENV_USER_AGENT: &str = "OPENBOX_USER_AGENT";
pub const ENV_DEADLINE_SECS: &str = "OPENBOX_DEADLINE_SECS";
pub const ENV_MAX_CYCLES: &str = "OPENBOX_MAX_CYCLES";
pub const ENV_DB: &str = "OPENBOX_DB";

/// Everything one scrape run needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeConfig {
    pub listing_url: String,
    pub user_agent: String,
    pub headless: bool,
    pub viewport: (u32, u32),
    pub navigation_timeout: Duration,
    /// Overall budget for acquisition, shared by every retry.
    pub deadline: Duration,
    /// Pause after navigation before looking for products.
    pub initial_settle: Duration,
    /// Selector that signals the listing has rendered.
    pub readiness_selector: String,
    pub readiness_wait: Duration,
    pub thresholds: Thresholds,
    pub timing: Timing,
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` waits `n × retry_backoff` before retrying.
    pub retry_backoff: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headless: true,
            viewport: (1920, 1080),
            navigation_timeout: Duration::from_secs(60),
            deadline: Duration::from_secs(30 * 60),
            initial_settle: Duration::from_secs(2),
            readiness_selector: selectors::CELL.to_string(),
            readiness_wait: Duration::from_secs(10),
            thresholds: Thresholds::default(),
            timing: Timing::default(),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

/// Command-line overrides; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOverrides {
    pub listing_url: Option<String>,
    pub deadline_secs: Option<u64>,
    pub max_cycles: Option<u32>,
    pub max_attempts: Option<u32>,
    pub headful: bool,
}

impl ScrapeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_LISTING_URL) {
            self.listing_url = url;
        }
        if let Some(ua) = lookup(ENV_USER_AGENT) {
            self.user_agent = ua;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_DEADLINE_SECS)? {
            self.deadline = Duration::from_secs(secs);
        }
        if let Some(cycles) = parse_var::<u32>(&lookup, ENV_MAX_CYCLES)? {
            self.thresholds.max_cycles = cycles;
        }
        Ok(self)
    }

    pub fn apply(&mut self, overrides: &ScrapeOverrides) {
        if let Some(url) = &overrides.listing_url {
            self.listing_url = url.clone();
        }
        if let Some(secs) = overrides.deadline_secs {
            self.deadline = Duration::from_secs(secs);
        }
        if let Some(cycles) = overrides.max_cycles {
            self.thresholds.max_cycles = cycles;
        }
        if let Some(attempts) = overrides.max_attempts {
            self.max_attempts = attempts.max(1);
        }
        if overrides.headful {
            self.headless = false;
        }
    }

    /// The origin every relative link on the listing resolves against.
    pub fn origin(&self) -> Result<SiteOrigin> {
        SiteOrigin::parse(&self.listing_url)
            .with_context(|| format!("listing URL {:?} is not an absolute web URL", self.listing_url))
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            user_agent: self.user_agent.clone(),
            headless: self.headless,
            window: self.viewport,
        }
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key}={raw:?} is not a valid number"))
        })
        .transpose()
}

/// Where the product database lives: explicit flag, then `OPENBOX_DB`, then
/// `~/.openbox/products.db`.
pub fn resolve_db_path(flag: Option<PathBuf>, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    flag.or_else(|| lookup(ENV_DB).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".openbox")
        .join("products.db")
}

/// Create the database's parent directory if needed.
pub fn ensure_parent(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ScrapeConfig::default();
        assert_eq!(cfg.listing_url, DEFAULT_LISTING_URL);
        assert_eq!(cfg.viewport, (1920, 1080));
        assert_eq!(cfg.deadline, Duration::from_secs(1800));
        assert_eq!(cfg.thresholds.max_cycles, 500);
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.origin().unwrap().as_str(), "https://www.potterybarn.com");
    }

    #[test]
    fn test_env_overrides_defaults() {
        let cfg = ScrapeConfig::default()
            .with_env(env(&[
                (ENV_LISTING_URL, "https://shop.example.com/clearance/"),
                (ENV_DEADLINE_SECS, " 90 "),
                (ENV_MAX_CYCLES, "40"),
            ]))
            .unwrap();
        assert_eq!(cfg.deadline, Duration::from_secs(90));
        assert_eq!(cfg.thresholds.max_cycles, 40);
        assert_eq!(cfg.origin().unwrap().as_str(), "https://shop.example.com");
        assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_bad_env_number_is_an_error() {
        let err = ScrapeConfig::default()
            .with_env(env(&[(ENV_DEADLINE_SECS, "soon")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("OPENBOX_DEADLINE_SECS"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut cfg = ScrapeConfig::default()
            .with_env(env(&[(ENV_MAX_CYCLES, "40")]))
            .unwrap();
        cfg.apply(&ScrapeOverrides {
            max_cycles: Some(7),
            max_attempts: Some(0),
            headful: true,
            ..ScrapeOverrides::default()
        });
        assert_eq!(cfg.thresholds.max_cycles, 7);
        assert_eq!(cfg.max_attempts, 1);
        assert!(!cfg.launch_options().headless);
    }

    #[test]
    fn test_backoff_is_linear() {
        let cfg = ScrapeConfig::default();
        assert_eq!(cfg.backoff(1), Duration::from_secs(2));
        assert_eq!(cfg.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_invalid_listing_url() {
        let cfg = ScrapeConfig {
            listing_url: "open-box-deals".into(),
            ..ScrapeConfig::default()
        };
        assert!(cfg.origin().is_err());
    }

    #[test]
    fn test_db_path_resolution_order() {
        let flag = PathBuf::from("/tmp/flag.db");
        assert_eq!(
            resolve_db_path(Some(flag.clone()), env(&[(ENV_DB, "/tmp/env.db")])),
            flag
        );
        assert_eq!(
            resolve_db_path(None, env(&[(ENV_DB, "/tmp/env.db")])),
            PathBuf::from("/tmp/env.db")
        );
        assert!(resolve_db_path(None, env(&[])).ends_with(".openbox/products.db"));
    }

    #[test]
    fn test_ensure_parent_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/products.db");
        ensure_parent(&path).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        ensure_parent(std::path::Path::new("products.db")).unwrap();
    }
}
