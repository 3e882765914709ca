// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! CSS selectors for the open-box listing markup.
//!
//! The raw strings are public so the runtime's in-page scripts count and
//! scroll against exactly the cells the extractor later reads.

use scraper::Selector;
use std::sync::LazyLock;

/// Generic product cell: the component marker or the grid marker class.
pub const CELL: &str = r#"[data-component="Shop-ProductCell"], .grid-item"#;

/// Grid cells inside the listing's two-column container.
pub const CONTAINER_CELL: &str = "#subcat-page > div.sub-cat-container.sub-cat-container-page-with-aside > section > div.two-column-grid > div.grid-item";

/// The listing's scrollable grid container.
pub const CONTAINER: &str = "#subcat-page > div.sub-cat-container.sub-cat-container-page-with-aside > section > div.two-column-grid";

/// Href fragment that marks an anchor as a product link.
pub const PRODUCT_HREF_MARKERS: [&str; 2] = ["/product/", "/products/"];

/// Grid marker class.
pub const GRID_ITEM_CLASS: &str = "grid-item";

/// Attribute carrying the structured product identifier.
pub const PRODUCT_ID_ATTR: &str = "aria-product";

/// Case-insensitive phrases that identify a "load more" affordance.
pub const LOAD_MORE_PHRASES: [&str; 4] = ["show more", "show me more", "load more", "see more"];

fn parse(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("selector {selector:?} is valid: {e:?}"))
}

pub static CELLS: LazyLock<Selector> = LazyLock::new(|| parse(CELL));

pub static CONTAINER_CELLS: LazyLock<Selector> = LazyLock::new(|| parse(CONTAINER_CELL));

/// Inner component marker.
pub static SHOP_CELL: LazyLock<Selector> =
    LazyLock::new(|| parse(r#"[data-component="Shop-ProductCell"]"#));

pub static CELL_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| parse(".product-cell-container"));

/// Dedicated product links, in preference order within one selector list.
pub static PRODUCT_LINK: LazyLock<Selector> = LazyLock::new(|| {
    parse(
        r#"[data-test-id="product-image-link"], .product-image-link, .product-name a, a[href*="/product/"]"#,
    )
});

/// Any anchor with an href.
pub static ANCHOR: LazyLock<Selector> = LazyLock::new(|| parse("a[href]"));

/// Elements whose text is the product title.
pub static NAME: LazyLock<Selector> = LazyLock::new(|| {
    parse(r#"[data-test-id="product-info"] span, .product-name a span, .product-name span, h2, h3, h4"#)
});

/// Product image elements.
pub static IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    parse(r#"[data-test-id="product-image"], img.product-image, .product-image-link img"#)
});

pub static ANY_IMAGE: LazyLock<Selector> = LazyLock::new(|| parse("img"));

/// Price amounts; a cell may show several (original + sale).
pub static PRICE_AMOUNT: LazyLock<Selector> =
    LazyLock::new(|| parse(r#"[data-test-id="amount"], .product-price .amount"#));

pub static CONTRACT_GRADE: LazyLock<Selector> = LazyLock::new(|| parse(".contractgrade"));

/// Every element carrying an id, for `aria-labelledby` lookups.
pub static WITH_ID: LazyLock<Selector> = LazyLock::new(|| parse("[id]"));
