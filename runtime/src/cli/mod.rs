// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `openbox` binary.

pub mod doctor;
pub mod import_cmd;
pub mod list_cmd;
pub mod output;
pub mod progress_printer;
pub mod scrape_cmd;
pub mod serve_cmd;

use anyhow::{Context, Result};
use openbox_catalog::ProductStore;
use std::path::Path;

/// Open (creating if needed) the product store at `path`.
pub fn open_store(path: &Path) -> Result<ProductStore> {
    crate::config::ensure_parent(path)?;
    ProductStore::open(path).with_context(|| format!("cannot open product store {}", path.display()))
}
