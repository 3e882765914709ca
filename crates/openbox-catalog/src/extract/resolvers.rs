// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-field resolver chains.
//!
//! Every field of a [`ProductRecord`](crate::types::ProductRecord) is
//! resolved by an ordered slice of resolver functions; the first one that
//! returns `Some` wins. Each resolver looks at a single source (an attribute,
//! a sub-element, the cell text) so it can be tested on its own.

use super::selectors;
use crate::urls::{humanize_identifier, SiteOrigin};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A field resolver: one source, one optional answer.
pub type Resolver<T> = fn(&Cell<'_>) -> Option<T>;

/// Run a chain and return the first resolved value.
pub fn first_resolved<T>(chain: &[Resolver<T>], cell: &Cell<'_>) -> Option<T> {
    chain.iter().find_map(|resolve| resolve(cell))
}

/// Product URL sources, most reliable first.
pub const URL_CHAIN: [Resolver<String>; 3] =
    [url_from_identifier, url_from_product_link, url_from_product_anchor];

/// Display name sources, most reliable first.
pub const NAME_CHAIN: [Resolver<String>; 5] = [
    name_from_labelledby,
    name_from_name_elements,
    name_from_anchor_label,
    name_from_image_alt,
    name_from_identifier,
];

/// Document-wide lookups shared by every cell of one page.
pub struct PageIndex<'a> {
    by_id: HashMap<&'a str, ElementRef<'a>>,
    origin: &'a SiteOrigin,
}

impl<'a> PageIndex<'a> {
    pub fn build(document: &'a Html, origin: &'a SiteOrigin) -> Self {
        let mut by_id = HashMap::new();
        for el in document.select(&selectors::WITH_ID) {
            if let Some(id) = el.value().id() {
                by_id.entry(id).or_insert(el);
            }
        }
        Self { by_id, origin }
    }

    pub fn origin(&self) -> &SiteOrigin {
        self.origin
    }

    fn element_by_id(&self, id: &str) -> Option<ElementRef<'a>> {
        self.by_id.get(id).copied()
    }
}

/// One candidate element plus the context its resolvers need.
pub struct Cell<'a> {
    element: ElementRef<'a>,
    page: &'a PageIndex<'a>,
    position: usize,
    identifier: Option<String>,
}

impl<'a> Cell<'a> {
    pub fn new(element: ElementRef<'a>, page: &'a PageIndex<'a>, position: usize) -> Self {
        let identifier = marker_attr(element, selectors::PRODUCT_ID_ATTR)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from);
        Self {
            element,
            page,
            position,
            identifier,
        }
    }

    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }

    pub fn origin(&self) -> &SiteOrigin {
        self.page.origin
    }

    /// Index of the element within the chosen candidate group.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The structured product identifier (`aria-product`), if any.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Whether the element shows any of the product-cell signals.
    pub fn is_product_cell(&self) -> bool {
        let value = self.element.value();
        value.classes().any(|c| c == selectors::GRID_ITEM_CLASS)
            || value.attr("data-component") == Some("Shop-ProductCell")
            || self.element.select(&selectors::SHOP_CELL).next().is_some()
            || self.element.select(&selectors::CELL_CONTAINER).next().is_some()
    }

    /// Whole cell text, whitespace-collapsed.
    pub fn text(&self) -> String {
        element_text(&self.element)
    }

    fn product_anchors(&self) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.element.select(&selectors::ANCHOR).filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| selectors::PRODUCT_HREF_MARKERS.iter().any(|m| href.contains(m)))
        })
    }
}

/// Attribute on the element itself or, failing that, on its inner
/// `Shop-ProductCell`.
fn marker_attr<'a>(element: ElementRef<'a>, attr: &str) -> Option<&'a str> {
    element.value().attr(attr).or_else(|| {
        element
            .select(&selectors::SHOP_CELL)
            .find_map(|inner| inner.value().attr(attr))
    })
}

/// Collapse an element's text nodes into one whitespace-normalized line.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

// ── productURL ───────────────────────────────────────────────────────────────

pub fn url_from_identifier(cell: &Cell<'_>) -> Option<String> {
    cell.identifier().and_then(|id| cell.origin().product_url(id))
}

pub fn url_from_product_link(cell: &Cell<'_>) -> Option<String> {
    cell.element
        .select(&selectors::PRODUCT_LINK)
        .find_map(|link| link.value().attr("href"))
        .and_then(|href| cell.origin().absolutize(href))
}

pub fn url_from_product_anchor(cell: &Cell<'_>) -> Option<String> {
    cell.product_anchors()
        .find_map(|a| a.value().attr("href"))
        .and_then(|href| cell.origin().absolutize(href))
}

// ── name ─────────────────────────────────────────────────────────────────────

pub fn name_from_labelledby(cell: &Cell<'_>) -> Option<String> {
    let ids = marker_attr(cell.element, "aria-labelledby")?;
    let label = ids
        .split_whitespace()
        .filter_map(|id| cell.page.element_by_id(id))
        .map(|el| element_text(&el))
        .collect::<Vec<_>>()
        .join(" ");
    non_empty(&label)
}

pub fn name_from_name_elements(cell: &Cell<'_>) -> Option<String> {
    cell.element
        .select(&selectors::NAME)
        .find_map(|el| non_empty(&element_text(&el)))
}

pub fn name_from_anchor_label(cell: &Cell<'_>) -> Option<String> {
    cell.product_anchors()
        .find_map(|a| a.value().attr("aria-label").and_then(non_empty))
}

pub fn name_from_image_alt(cell: &Cell<'_>) -> Option<String> {
    cell.element
        .select(&selectors::ANY_IMAGE)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .and_then(non_empty)
}

pub fn name_from_identifier(cell: &Cell<'_>) -> Option<String> {
    cell.identifier().and_then(|id| non_empty(&humanize_identifier(id)))
}

// ── imageURL ─────────────────────────────────────────────────────────────────

/// First product image's `src`, or its lazy-load `data-src` when `src` is
/// missing or a non-web placeholder.
pub fn resolve_image(cell: &Cell<'_>) -> Option<String> {
    let img = cell.element.select(&selectors::IMAGE).next()?;
    ["src", "data-src"]
        .iter()
        .find_map(|attr| img.value().attr(attr).and_then(|v| cell.origin().absolutize(v)))
}

// ── price ────────────────────────────────────────────────────────────────────

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("amount regex is valid"));

/// Parse one displayed amount: thousands separators stripped, first decimal
/// number taken.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    AMOUNT_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Lowest of all displayed amounts (original and sale prices both show).
pub fn resolve_price(cell: &Cell<'_>) -> Option<f64> {
    cell.element
        .select(&selectors::PRICE_AMOUNT)
        .filter_map(|el| parse_amount(&element_text(&el)))
        .reduce(f64::min)
}

// ── grade ────────────────────────────────────────────────────────────────────

pub const CONTRACT_GRADE: &str = "Contract Grade";
pub const OPEN_BOX: &str = "Open Box";

/// Text patterns in precedence order; matched against lowercased cell text.
static GRADE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bgrade[\s:-]+a\b", "A"),
        (r"\bgrade[\s:-]+b\b", "B"),
        (r"\bgrade[\s:-]+c\b", "C"),
        (r"\bopen[\s-]*box\b", OPEN_BOX),
    ]
    .into_iter()
    .map(|(pattern, grade)| (Regex::new(pattern).expect("grade regex is valid"), grade))
    .collect()
});

/// Grade keyword found in free text, if any.
pub fn grade_from_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    GRADE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|(_, grade)| *grade)
}

/// The contract-grade marker wins; otherwise scan the cell text.
pub fn resolve_grade(cell: &Cell<'_>) -> Option<String> {
    if cell.element.select(&selectors::CONTRACT_GRADE).next().is_some() {
        return Some(CONTRACT_GRADE.to_string());
    }
    grade_from_text(&cell.text()).map(String::from)
}
