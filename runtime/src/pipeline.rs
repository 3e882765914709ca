// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! One scrape run: acquire the converged listing, extract records, persist.
//!
//! Acquisition is retried with a linear backoff; each attempt launches its
//! own browser, but one deadline bounds every attempt and the waits between
//! them. A run that hits the deadline is not retried. Persistence runs once,
//! outside the retry loop, so a caller can hold the store only for the commit.

use crate::config::ScrapeConfig;
use crate::convergence::{ConvergenceDriver, ConvergenceOutcome, Phase};
use crate::progress::{ProgressEventKind, Reporter};
use crate::renderer::{Launcher, Renderer};
use crate::session::{Deadline, RenderSession, SessionError};
use anyhow::Result;
use openbox_catalog::{
    extract_products, CatalogResult, GroupingStrategy, ProductRecord, ProductStore, SaveSummary, SiteOrigin,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum AcquireError {
    #[error("browser unavailable: {0}")]
    Browser(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("could not read the page snapshot: {0}")]
    Snapshot(#[source] SessionError),
}

impl AcquireError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Session(SessionError::Timeout))
    }
}

/// The converged page as handed to the extractor.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub html: String,
    /// Where the page ended up after convergence.
    pub final_url: String,
    pub convergence: ConvergenceOutcome,
    /// 1-based attempt that succeeded.
    pub attempts: u32,
}

/// Acquire the listing, retrying up to `config.max_attempts` times within
/// `config.deadline`.
pub async fn acquire(
    launcher: &dyn Launcher,
    config: &ScrapeConfig,
    reporter: &mut Reporter,
) -> Result<Acquisition, AcquireError> {
    let max_attempts = config.max_attempts.max(1);
    let deadline = Deadline::after(config.deadline);
    let mut attempt = 1;
    loop {
        info!(attempt, max_attempts, url = %config.listing_url, "starting acquisition");
        match acquire_once(launcher, config, deadline, reporter, attempt).await {
            Ok(acquisition) => return Ok(acquisition),
            Err(e) if attempt < max_attempts && !e.is_timeout() => {
                let wait = config.backoff(attempt).min(deadline.remaining());
                warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    retry_in_ms = wait.as_millis() as u64,
                    "acquisition failed; retrying"
                );
                reporter.emit(ProgressEventKind::Warning {
                    message: format!("attempt {attempt}/{max_attempts} failed: {e}"),
                });
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                error!(attempts = attempt, error = %e, "acquisition failed after all attempts");
                return Err(e);
            }
        }
    }
}

async fn acquire_once(
    launcher: &dyn Launcher,
    config: &ScrapeConfig,
    deadline: Deadline,
    reporter: &mut Reporter,
    attempt: u32,
) -> Result<Acquisition, AcquireError> {
    let renderer = deadline
        .bound(launcher.launch(&config.launch_options()))
        .await?
        .map_err(|e| AcquireError::Browser(format!("{e:#}")))?;
    let result = drive(renderer.as_ref(), config, deadline, reporter, attempt).await;
    if let Err(e) = renderer.shutdown().await {
        warn!(error = %e, "browser shutdown failed");
    }
    result
}

async fn drive(
    renderer: &dyn Renderer,
    config: &ScrapeConfig,
    deadline: Deadline,
    reporter: &mut Reporter,
    attempt: u32,
) -> Result<Acquisition, AcquireError> {
    let ctx = deadline
        .bound(renderer.new_context())
        .await?
        .map_err(|e| AcquireError::Browser(format!("{e:#}")))?;
    let mut session = RenderSession::new(ctx, deadline, config.navigation_timeout);
    let result = converge(&mut session, config, reporter, attempt).await;
    session.close().await;
    result
}

async fn converge(
    session: &mut RenderSession,
    config: &ScrapeConfig,
    reporter: &mut Reporter,
    attempt: u32,
) -> Result<Acquisition, AcquireError> {
    let nav = session.navigate(&config.listing_url).await?;
    info!(url = %nav.final_url, load_time_ms = nav.load_time_ms, "listing loaded");
    reporter.emit(ProgressEventKind::Navigated {
        url: nav.final_url.clone(),
        attempt,
        load_time_ms: nav.load_time_ms,
    });

    let (width, height) = config.viewport;
    if !session.resize_viewport(width, height).await? {
        reporter.emit(ProgressEventKind::Warning {
            message: "viewport resize unavailable".into(),
        });
    }

    session.settle(config.initial_settle).await?;
    if !session
        .wait_for_selector(&config.readiness_selector, config.readiness_wait)
        .await?
    {
        warn!(selector = %config.readiness_selector, "product cells did not appear; continuing");
        reporter.emit(ProgressEventKind::Warning {
            message: format!("no element matched {} after navigation", config.readiness_selector),
        });
    }

    let convergence = ConvergenceDriver::new(session, config.thresholds, config.timing, reporter)
        .run()
        .await;
    if convergence.phase == Phase::TimedOut {
        return Err(AcquireError::Session(SessionError::Timeout));
    }

    let final_url = match session.current_url().await {
        Ok(url) if !url.is_empty() => {
            if url != nav.final_url {
                info!(from = %nav.final_url, to = %url, "listing URL changed while scrolling");
            }
            url
        }
        Ok(_) => nav.final_url,
        Err(e) if e.is_timeout() => return Err(e.into()),
        Err(e) => {
            debug!(error = %e, "could not read the current URL");
            nav.final_url
        }
    };

    let html = session.snapshot_html().await.map_err(|e| {
        if e.is_timeout() {
            AcquireError::Session(e)
        } else {
            AcquireError::Snapshot(e)
        }
    })?;

    Ok(Acquisition {
        html,
        final_url,
        convergence,
        attempts: attempt,
    })
}

/// Records read off an acquired page.
#[derive(Debug, Clone)]
pub struct Collected {
    pub records: Vec<ProductRecord>,
    pub strategy: GroupingStrategy,
    pub candidates: usize,
    pub convergence: ConvergenceOutcome,
    pub attempts: u32,
}

/// Acquire the listing and extract its records. Nothing is persisted.
pub async fn collect(launcher: &dyn Launcher, config: &ScrapeConfig, reporter: &mut Reporter) -> Result<Collected> {
    let origin = config.origin()?;
    let acquisition = acquire(launcher, config, reporter).await?;
    let extraction = extract(&acquisition.html, &origin, reporter);
    if extraction.records.is_empty() {
        warn!(candidates = extraction.candidates, "no products found on the listing");
    }
    Ok(Collected {
        records: extraction.records,
        strategy: extraction.strategy,
        candidates: extraction.candidates,
        convergence: acquisition.convergence,
        attempts: acquisition.attempts,
    })
}

/// Run the extractor over `html` and report the counts.
pub fn extract(html: &str, origin: &SiteOrigin, reporter: &mut Reporter) -> openbox_catalog::Extraction {
    let extraction = extract_products(html, origin);
    reporter.emit(ProgressEventKind::Extracted {
        records: extraction.records.len(),
        candidates: extraction.candidates,
    });
    extraction
}

/// Commit `records` in one batch. An empty batch never touches the store.
pub fn persist(
    store: &mut ProductStore,
    records: &[ProductRecord],
    reporter: &mut Reporter,
) -> CatalogResult<SaveSummary> {
    if records.is_empty() {
        info!("nothing to persist");
        return Ok(SaveSummary::default());
    }
    let summary = store.save_products(records)?;
    reporter.emit(ProgressEventKind::Persisted {
        saved: summary.saved,
        updated: summary.updated,
        skipped: summary.skipped,
        failed: summary.failed,
    });
    Ok(summary)
}

/// What a finished run reports.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub run_id: String,
    pub attempts: u32,
    pub phase: Phase,
    pub cycles: u32,
    pub strategy: GroupingStrategy,
    pub candidates: usize,
    pub found: usize,
    pub saved: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ScrapeReport {
    pub fn new(run_id: &str, collected: &Collected, summary: &SaveSummary) -> Self {
        Self {
            run_id: run_id.to_string(),
            attempts: collected.attempts,
            phase: collected.convergence.phase,
            cycles: collected.convergence.cycles,
            strategy: collected.strategy,
            candidates: collected.candidates,
            found: collected.records.len(),
            saved: summary.saved,
            updated: summary.updated,
            skipped: summary.skipped,
            failed: summary.failed,
        }
    }
}
