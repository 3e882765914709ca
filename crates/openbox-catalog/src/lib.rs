// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Openbox catalog — product records, listing extraction, and idempotent
//! persistence for open-box inventory snapshots.
//!
//! This crate has no browser or async dependency: the runtime hands it the
//! converged page markup and receives [`ProductRecord`]s back, then commits
//! them through [`ProductStore`].

pub mod error;
pub mod extract;
pub mod store;
pub mod types;
pub mod urls;

pub use error::{CatalogError, CatalogResult};
pub use extract::{extract_products, Extraction, GroupingStrategy};
pub use store::{ListQuery, ProductStore, SortColumn, SortOrder};
pub use types::*;
pub use urls::SiteOrigin;
