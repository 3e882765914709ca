// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! `openbox serve`: the REST API over the product store.

use crate::cli::output::{self, Styled};
use crate::cli::{open_store, progress_printer};
use crate::config::ScrapeConfig;
use crate::progress;
use crate::renderer::chromium::{find_chromium, ChromiumLauncher};
use crate::rest::{self, AppState};
use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(db: &Path, host: IpAddr, port: u16) -> Result<()> {
    let s = Styled::new();
    let config = ScrapeConfig::from_env()?;
    config.origin()?;
    let store = open_store(db)?;

    if find_chromium().is_none() {
        warn!("Chromium not found; scrape requests will fail until it is installed");
    }

    let (tx, rx) = progress::channel();
    if !output::is_quiet() && !output::is_json() {
        progress_printer::spawn(rx, s);
    }
    let state = Arc::new(AppState::new(store, Arc::new(ChromiumLauncher), config).with_progress(tx));

    let addr = SocketAddr::new(host, port);
    info!(db = %db.display(), "serving product store");
    if !output::is_quiet() {
        eprintln!("  {} Openbox API on http://{addr}", s.ok_sym());
        eprintln!("  Health check: http://{addr}/health");
    }
    rest::start(addr, state)
        .await
        .with_context(|| format!("REST API on {addr} stopped"))
}
