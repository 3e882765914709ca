// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the catalog crate.

use std::path::PathBuf;

/// All errors surfaced by the catalog layer.
///
/// Per-record upsert failures never appear here: the gateway logs and skips
/// them. Everything below is fatal for the operation that returned it.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("failed to open product store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to prepare product schema: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("failed to begin transaction: {0}")]
    Transaction(#[source] rusqlite::Error),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] rusqlite::Error),

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("malformed product snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("invalid site origin {0:?}")]
    Origin(String),
}

/// Convenience alias used across the crate.
pub type CatalogResult<T> = Result<T, CatalogError>;
