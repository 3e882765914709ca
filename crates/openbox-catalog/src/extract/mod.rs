// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Listing extractor: converged page markup in, deduplicated records out.
//!
//! The page is parsed once. Candidate cells come from one of two grouping
//! strategies (the listing's structural container, or the generic cell
//! markers), whichever yields more. Each candidate is resolved through the
//! field chains in [`resolvers`]; a cell that cannot be resolved is skipped
//! with a debug log and never affects its neighbours.
//!
//! Extraction is synchronous because the `scraper` document is `!Send`;
//! async callers must not hold it across an `.await`.

pub mod resolvers;
pub mod selectors;

use crate::types::ProductRecord;
use crate::urls::SiteOrigin;
use resolvers::{first_resolved, Cell, PageIndex, NAME_CHAIN, URL_CHAIN};
use scraper::{ElementRef, Html};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Which candidate group the extractor walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    /// Grid items inside the listing's two-column container.
    Container,
    /// Any element carrying a product-cell marker.
    Generic,
}

/// Result of one extraction pass.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    /// Records in page order, unique by `product_url`.
    pub records: Vec<ProductRecord>,
    pub strategy: GroupingStrategy,
    /// Number of candidate elements walked.
    pub candidates: usize,
    /// Candidates that produced no record.
    pub rejected: usize,
}

/// Why a candidate element produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotAProductCell,
    /// The URL was already taken by an earlier cell in this pass.
    DuplicateUrl(String),
    /// Neither a name nor a URL could be resolved.
    NoIdentity,
}

/// Extract product records from converged listing markup.
pub fn extract_products(html: &str, origin: &SiteOrigin) -> Extraction {
    let document = Html::parse_document(html);
    let page = PageIndex::build(&document, origin);

    let (strategy, elements) = candidate_group(&document);
    let candidates = elements.len();

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut rejected = 0;

    for (position, element) in elements.into_iter().enumerate() {
        let cell = Cell::new(element, &page, position);
        match resolve_cell(&cell, &mut seen) {
            Ok(record) => records.push(record),
            Err(reason) => {
                rejected += 1;
                debug!(position, ?reason, "skipping candidate element");
            }
        }
    }

    info!(
        extracted = records.len(),
        candidates,
        ?strategy,
        "extracted products from listing"
    );

    Extraction {
        records,
        strategy,
        candidates,
        rejected,
    }
}

/// Pick the larger of the two candidate groups; ties go to the container.
fn candidate_group(document: &Html) -> (GroupingStrategy, Vec<ElementRef<'_>>) {
    let container: Vec<_> = document.select(&selectors::CONTAINER_CELLS).collect();
    let generic: Vec<_> = document.select(&selectors::CELLS).collect();
    if container.len() >= generic.len() {
        (GroupingStrategy::Container, container)
    } else {
        (GroupingStrategy::Generic, generic)
    }
}

/// Resolve one cell into a record, or say why not.
///
/// The URL is resolved and checked against `seen` before anything else, so
/// a later cell repeating an earlier URL is dropped even when it carries
/// richer data: the first sighting wins.
pub fn resolve_cell(cell: &Cell<'_>, seen: &mut HashSet<String>) -> Result<ProductRecord, Rejection> {
    if !cell.is_product_cell() {
        return Err(Rejection::NotAProductCell);
    }

    let resolved_url = first_resolved(&URL_CHAIN, cell);
    if let Some(url) = &resolved_url {
        if seen.contains(url) {
            return Err(Rejection::DuplicateUrl(url.clone()));
        }
    }

    let name = first_resolved(&NAME_CHAIN, cell);

    let product_url = match resolved_url {
        Some(url) => url,
        None => {
            let name = name.as_deref().ok_or(Rejection::NoIdentity)?;
            let url = cell
                .origin()
                .slug_url(name)
                .unwrap_or_else(|| cell.origin().placeholder_url(cell.position()));
            if seen.contains(&url) {
                return Err(Rejection::DuplicateUrl(url));
            }
            url
        }
    };
    seen.insert(product_url.clone());

    Ok(ProductRecord {
        name,
        product_url,
        image_url: resolvers::resolve_image(cell),
        price: resolvers::resolve_price(cell),
        grade: resolvers::resolve_grade(cell),
    })
}
