// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data types for catalog records and their stored form.

use crate::error::CatalogResult;
use crate::urls::SiteOrigin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One catalog entry as extracted from the listing page.
///
/// Serializes to the snapshot wire shape `{name, url, image, price, grade}`
/// with absent fields as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: Option<String>,
    /// Absolute product URL; the identity key for dedup and upsert.
    #[serde(rename = "url", default, deserialize_with = "null_as_empty")]
    pub product_url: String,
    #[serde(rename = "image", default)]
    pub image_url: Option<String>,
    /// Lowest displayed price.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub grade: Option<String>,
}

impl ProductRecord {
    /// A record with only its identity key set.
    pub fn new(product_url: impl Into<String>) -> Self {
        Self {
            name: None,
            product_url: product_url.into(),
            image_url: None,
            price: None,
            grade: None,
        }
    }

    /// Whether the record carries a usable identity key.
    pub fn has_identity(&self) -> bool {
        !self.product_url.trim().is_empty()
    }

    /// Make the product and image URLs absolute against `origin`.
    ///
    /// A product URL that cannot be made absolute is cleared, so the store
    /// skips the record; returns `false` in that case. An image that cannot
    /// be made absolute is dropped.
    pub fn normalize(&mut self, origin: &SiteOrigin) -> bool {
        self.image_url = self.image_url.as_deref().and_then(|raw| origin.absolutize(raw));
        match origin.absolutize(&self.product_url) {
            Some(url) => {
                self.product_url = url;
                true
            }
            None => {
                self.product_url.clear();
                false
            }
        }
    }

    /// Label used in log lines: the name when known, else the URL.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.product_url)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Parse a snapshot (JSON array of wire-format records).
///
/// Prices that are negative or not finite are dropped rather than rejected.
pub fn parse_snapshot(json: &str) -> CatalogResult<Vec<ProductRecord>> {
    let mut records: Vec<ProductRecord> = serde_json::from_str(json)?;
    for record in &mut records {
        record.price = record.price.filter(|p| p.is_finite() && *p >= 0.0);
    }
    Ok(records)
}

/// Render a record set as a pretty-printed snapshot.
pub fn render_snapshot(records: &[ProductRecord]) -> CatalogResult<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// A persisted product row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: i64,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub grade: Option<String>,
    pub image_url: Option<String>,
    pub product_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredProduct {
    /// Strip storage metadata, leaving the catalog record.
    pub fn record(&self) -> ProductRecord {
        ProductRecord {
            name: self.name.clone(),
            product_url: self.product_url.clone(),
            image_url: self.image_url.clone(),
            price: self.price,
            grade: self.grade.clone(),
        }
    }
}

/// How a single upsert landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// First sighting of the URL (`created_at == updated_at`).
    Inserted,
    /// The URL already existed and its mutable fields were overwritten.
    Updated,
}

/// Counters reported after a batch commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSummary {
    /// New rows.
    pub saved: usize,
    /// Existing rows refreshed.
    pub updated: usize,
    /// Records without a product URL, or repeating one already in the batch.
    pub skipped: usize,
    /// Records whose upsert failed.
    pub failed: usize,
    /// Size of the submitted batch.
    pub total: usize,
}

impl SaveSummary {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.saved += 1,
            WriteOutcome::Updated => self.updated += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_uses_short_keys_and_nulls() {
        let mut record = ProductRecord::new("https://www.potterybarn.com/products/vase/");
        record.price = Some(89.99);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "https://www.potterybarn.com/products/vase/");
        assert_eq!(json["price"], 89.99);
        assert!(json["name"].is_null());
        assert!(json["image"].is_null());
        assert!(json["grade"].is_null());
        assert!(json.get("product_url").is_none());
    }

    #[test]
    fn test_parse_snapshot_tolerates_null_url_and_missing_fields() {
        let json = r#"[
            {"name": "Lamp", "url": null, "image": null, "price": null, "grade": null},
            {"name": "Rug", "url": "https://x.test/products/rug/"}
        ]"#;
        let records = parse_snapshot(json).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].has_identity());
        assert_eq!(records[1].product_url, "https://x.test/products/rug/");
        assert_eq!(records[1].grade, None);
    }

    #[test]
    fn test_parse_snapshot_drops_negative_price() {
        let json = r#"[{"name": "Chair", "url": "https://x.test/p/", "price": -5.0}]"#;
        let records = parse_snapshot(json).unwrap();
        assert_eq!(records[0].price, None);
    }

    #[test]
    fn test_parse_snapshot_rejects_non_array() {
        assert!(parse_snapshot(r#"{"name": "x"}"#).is_err());
        assert!(parse_snapshot("not json").is_err());
    }

    #[test]
    fn test_normalize_makes_urls_absolute() {
        let origin = SiteOrigin::parse("https://www.potterybarn.com/").unwrap();
        let mut relative = ProductRecord::new("/products/x/");
        relative.image_url = Some("//cdn.site.com/i.jpg".into());
        assert!(relative.normalize(&origin));
        assert_eq!(relative.product_url, "https://www.potterybarn.com/products/x/");
        assert_eq!(relative.image_url.as_deref(), Some("https://cdn.site.com/i.jpg"));

        let mut padded = ProductRecord::new("  https://www.potterybarn.com/products/x/ ");
        assert!(padded.normalize(&origin));
        assert_eq!(padded.product_url, relative.product_url);

        let mut scripted = ProductRecord::new("javascript:void(0)");
        scripted.image_url = Some("   ".into());
        assert!(!scripted.normalize(&origin));
        assert!(!scripted.has_identity());
        assert_eq!(scripted.image_url, None);
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = SaveSummary::default();
        summary.record(WriteOutcome::Inserted);
        summary.record(WriteOutcome::Updated);
        summary.record(WriteOutcome::Updated);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.updated, 2);
    }
}
