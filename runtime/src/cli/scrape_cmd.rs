// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! `openbox scrape`: one full run against the live listing.

use crate::cli::output::{self, Styled};
use crate::cli::{open_store, progress_printer};
use crate::config::{ScrapeConfig, ScrapeOverrides};
use crate::pipeline::{self, ScrapeReport};
use crate::progress::{self, Reporter};
use crate::renderer::chromium::ChromiumLauncher;
use anyhow::{Context, Result};
use openbox_catalog::{render_snapshot, ProductRecord};
use std::path::Path;
use tracing::info;

pub async fn run(db: &Path, overrides: &ScrapeOverrides, snapshot: Option<&Path>) -> Result<()> {
    let s = Styled::new();
    let mut config = ScrapeConfig::from_env()?;
    config.apply(overrides);
    config.origin()?;

    // Open the store up front so a bad path fails before the browser starts.
    let mut store = open_store(db)?;

    let (tx, rx) = progress::channel();
    let printer = (!output::is_quiet() && !output::is_json()).then(|| progress_printer::spawn(rx, s));
    let mut reporter = Reporter::new(Some(tx));
    info!(run_id = reporter.run_id(), url = %config.listing_url, db = %db.display(), "scrape started");

    let collected = pipeline::collect(&ChromiumLauncher, &config, &mut reporter).await?;
    if let Some(path) = snapshot {
        write_snapshot(path, &collected.records)?;
    }
    let summary = pipeline::persist(&mut store, &collected.records, &mut reporter)?;
    let report = ScrapeReport::new(reporter.run_id(), &collected, &summary);

    drop(reporter);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if output::is_json() {
        output::print_json(&report);
    } else if !output::is_quiet() {
        if report.found == 0 {
            eprintln!("  {} No products found.", s.warn_sym());
        }
        eprintln!(
            "  {} {} {} found, {} new, {} updated",
            s.ok_sym(),
            s.bold("Done:"),
            report.found,
            report.saved,
            report.updated
        );
        if let Some(path) = snapshot {
            eprintln!("  Snapshot written to {}", path.display());
        }
    }
    Ok(())
}

/// Write the record set in the snapshot wire format.
pub fn write_snapshot(path: &Path, records: &[ProductRecord]) -> Result<()> {
    let text = render_snapshot(records)?;
    std::fs::write(path, text).with_context(|| format!("cannot write snapshot {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "snapshot written");
    Ok(())
}
