// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! `openbox import <file>`: persist a previously exported snapshot.
//!
//! Snapshot URLs may have been edited by hand, so every record is made
//! absolute against the configured listing origin before it is keyed.

use crate::cli::open_store;
use crate::cli::output::{self, Styled};
use crate::config::ScrapeConfig;
use crate::pipeline;
use crate::progress::Reporter;
use anyhow::{Context, Result};
use openbox_catalog::{parse_snapshot, SaveSummary, SiteOrigin};
use std::path::Path;
use tracing::warn;

pub async fn run(db: &Path, file: &Path) -> Result<()> {
    let origin = ScrapeConfig::from_env()?.origin()?;
    let summary = import(db, file, &origin)?;

    if output::is_json() {
        output::print_json(&summary);
    } else if !output::is_quiet() {
        let s = Styled::new();
        eprintln!(
            "  {} Imported {}: {} new, {} updated, {} skipped, {} failed",
            s.ok_sym(),
            file.display(),
            summary.saved,
            summary.updated,
            summary.skipped,
            summary.failed
        );
    }
    Ok(())
}

/// Parse `file`, normalize its URLs against `origin` and commit it into the
/// store at `db`.
pub fn import(db: &Path, file: &Path, origin: &SiteOrigin) -> Result<SaveSummary> {
    let text = std::fs::read_to_string(file).with_context(|| format!("cannot read snapshot {}", file.display()))?;
    let mut records = parse_snapshot(&text).with_context(|| format!("malformed snapshot {}", file.display()))?;
    for record in &mut records {
        let raw = record.product_url.clone();
        if !record.normalize(origin) && !raw.trim().is_empty() {
            warn!(url = %raw, name = record.label(), "dropping product with an unusable URL");
        }
    }
    let mut store = open_store(db)?;
    Ok(pipeline::persist(&mut store, &records, &mut Reporter::silent())?)
}
