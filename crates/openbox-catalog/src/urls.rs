// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! URL normalization against the listing site's origin.

use crate::error::{CatalogError, CatalogResult};
use url::Url;

/// Path segment under which the site serves product pages.
pub const PRODUCT_PATH_PREFIX: &str = "/products/";

/// The scheme + host every relative URL on the listing resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteOrigin {
    base: Url,
}

impl SiteOrigin {
    /// Build an origin from any absolute URL on the site; path, query and
    /// fragment are discarded.
    pub fn parse(url: &str) -> CatalogResult<Self> {
        let mut base = Url::parse(url).map_err(|_| CatalogError::Origin(url.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(CatalogError::Origin(url.to_string()));
        }
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self { base })
    }

    /// Scheme and host without a trailing slash, e.g. `https://www.example.com`.
    pub fn as_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Make a link or image reference absolute.
    ///
    /// Absolute `http(s)` URLs pass through unchanged, protocol-relative URLs
    /// take the origin's scheme, and everything else is joined onto the
    /// origin. Empty input and non-web schemes (`javascript:`, `data:`) give
    /// `None`.
    pub fn absolutize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Some(raw.to_string());
        }
        if raw.starts_with("//") {
            return Some(format!("{}:{raw}", self.base.scheme()));
        }
        let joined = self.base.join(raw).ok()?;
        matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
    }

    /// Canonical product URL for a structured product identifier.
    pub fn product_url(&self, identifier: &str) -> Option<String> {
        let identifier = identifier.trim().trim_matches('/');
        if identifier.is_empty() {
            return None;
        }
        self.absolutize(&format!("{PRODUCT_PATH_PREFIX}{identifier}/"))
    }

    /// Product URL synthesized from a display name. `None` when the name
    /// slugifies to nothing.
    pub fn slug_url(&self, name: &str) -> Option<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return None;
        }
        self.product_url(&slug)
    }

    /// Last-resort key for a cell with no resolvable identity beyond its
    /// position on the page. Not stable across runs.
    pub fn placeholder_url(&self, position: usize) -> String {
        format!("{}{PRODUCT_PATH_PREFIX}unknown-{position}/", self.as_str())
    }
}

/// Lowercase, collapse whitespace runs to `-`, drop everything outside
/// `[a-z0-9-]`.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Turn a hyphenated identifier into a display name: `blue-vase` → `Blue Vase`.
pub fn humanize_identifier(identifier: &str) -> String {
    identifier
        .replace('-', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> SiteOrigin {
        SiteOrigin::parse("https://www.potterybarn.com/shop/sale/open-box-deals/").unwrap()
    }

    #[test]
    fn test_origin_strips_path() {
        assert_eq!(origin().as_str(), "https://www.potterybarn.com");
    }

    #[test]
    fn test_origin_rejects_non_web_urls() {
        assert!(SiteOrigin::parse("not a url").is_err());
        assert!(SiteOrigin::parse("file:///tmp/x").is_err());
    }

    #[test]
    fn test_absolutize_root_relative() {
        assert_eq!(
            origin().absolutize("/products/x/").as_deref(),
            Some("https://www.potterybarn.com/products/x/")
        );
    }

    #[test]
    fn test_absolutize_protocol_relative() {
        assert_eq!(
            origin().absolutize("//cdn.site.com/img.jpg").as_deref(),
            Some("https://cdn.site.com/img.jpg")
        );
    }

    #[test]
    fn test_absolutize_passes_absolute_through_unchanged() {
        let raw = "http://Other.Example/Path?q=1#frag";
        assert_eq!(origin().absolutize(raw).as_deref(), Some(raw));
    }

    #[test]
    fn test_absolutize_rejects_empty_and_script_urls() {
        assert_eq!(origin().absolutize("   "), None);
        assert_eq!(origin().absolutize("javascript:void(0)"), None);
    }

    #[test]
    fn test_product_url_from_identifier() {
        assert_eq!(
            origin().product_url("blue-vase").as_deref(),
            Some("https://www.potterybarn.com/products/blue-vase/")
        );
        assert_eq!(origin().product_url("  "), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Aubrey  Woven Basket (Large)"), "aubrey-woven-basket-large");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn test_slug_url_empty_slug_is_none() {
        assert_eq!(origin().slug_url("™"), None);
        assert_eq!(
            origin().slug_url("Linen Throw").as_deref(),
            Some("https://www.potterybarn.com/products/linen-throw/")
        );
    }

    #[test]
    fn test_humanize_identifier() {
        assert_eq!(humanize_identifier("blue-vase"), "Blue Vase");
        assert_eq!(humanize_identifier("pb-classic-sofa-2"), "Pb Classic Sofa 2");
    }

    #[test]
    fn test_placeholder_url() {
        assert_eq!(
            origin().placeholder_url(7),
            "https://www.potterybarn.com/products/unknown-7/"
        );
    }
}
