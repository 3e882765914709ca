// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use crate::cli::output::{self, Styled};
use crate::config::ScrapeConfig;
use crate::renderer::chromium::{find_chromium, CHROMIUM_PATH_ENV};
use anyhow::Result;
use openbox_catalog::ProductStore;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct Report {
    pub os: &'static str,
    pub arch: &'static str,
    pub chromium: Option<PathBuf>,
    pub listing_url: String,
    pub database: PathBuf,
    /// Stored product count, when the store opened.
    pub products: Option<u64>,
    pub database_error: Option<String>,
    pub ready: bool,
}

/// Check Chromium availability, configuration and the product store.
pub async fn run(db: &Path) -> Result<()> {
    let report = check(db);
    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }

    let s = Styled::new();
    println!("{}", s.bold("Openbox Doctor"));
    println!("==============");
    println!();
    println!("OS:   {}", report.os);
    println!("Arch: {}", report.arch);
    println!();

    match &report.chromium {
        Some(path) => println!("{} Chromium found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} Chromium NOT found. Install Chrome or set {CHROMIUM_PATH_ENV}.",
            s.err_sym()
        ),
    }
    println!("{} Listing: {}", s.ok_sym(), report.listing_url);
    match (&report.products, &report.database_error) {
        (Some(count), _) => println!(
            "{} Product store: {} ({count} products)",
            s.ok_sym(),
            report.database.display()
        ),
        (None, Some(e)) => println!("{} Product store unusable: {e}", s.err_sym()),
        (None, None) => {}
    }

    println!();
    if report.ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}

/// Gather the report without printing. The store is opened read-write, so
/// a fresh path gets an empty database.
pub fn check(db: &Path) -> Report {
    let chromium = find_chromium();
    let listing_url = match ScrapeConfig::from_env() {
        Ok(config) => config.listing_url,
        Err(e) => format!("invalid configuration: {e:#}"),
    };
    let (products, database_error) = match probe_store(db) {
        Ok(count) => (Some(count), None),
        Err(e) => (None, Some(format!("{e:#}"))),
    };
    let ready = chromium.is_some() && products.is_some();
    Report {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        chromium,
        listing_url,
        database: db.to_path_buf(),
        products,
        database_error,
        ready,
    }
}

fn probe_store(db: &Path) -> Result<u64> {
    crate::config::ensure_parent(db)?;
    let store = ProductStore::open(db)?;
    store.ping()?;
    Ok(store.count()?)
}
