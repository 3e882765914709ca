// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! SQLite-backed product store.
//!
//! Writes go through [`ProductStore::save_products`]: one transaction per
//! batch, one upsert per record keyed on `product_url`. Within a batch the
//! first record for a URL wins and repeats are skipped. A failing record is
//! logged and skipped; only opening the transaction or committing it can fail
//! the batch.

use crate::error::{CatalogError, CatalogResult};
use crate::types::{ProductRecord, SaveSummary, StoredProduct, WriteOutcome};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS products (
    id          INTEGER PRIMARY KEY,
    name        TEXT,
    price       REAL,
    grade       TEXT,
    image_url   TEXT,
    product_url TEXT UNIQUE NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_products_grade ON products(grade);
CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at);
";

const UPSERT: &str = "
INSERT INTO products (name, price, grade, image_url, product_url, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
ON CONFLICT(product_url) DO UPDATE SET
    name = excluded.name,
    price = excluded.price,
    grade = excluded.grade,
    image_url = excluded.image_url,
    updated_at = excluded.updated_at
RETURNING id, created_at, updated_at
";

const COLUMNS: &str = "id, name, price, grade, image_url, product_url, created_at, updated_at";

/// Largest page the list query will return.
pub const MAX_LIMIT: u32 = 500;
pub const DEFAULT_LIMIT: u32 = 50;

/// Persistent product table.
pub struct ProductStore {
    conn: Connection,
}

impl ProductStore {
    /// Open (or create) the store at `path`, creating the schema if absent.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let conn = Connection::open(path).map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// A throwaway store, used by tests and dry runs.
    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| CatalogError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> CatalogResult<Self> {
        conn.execute_batch(SCHEMA).map_err(CatalogError::Schema)?;
        Ok(Self { conn })
    }

    /// Upsert a batch, stamping every write with the current time.
    pub fn save_products(&mut self, records: &[ProductRecord]) -> CatalogResult<SaveSummary> {
        self.save_products_at(records, Utc::now())
    }

    /// Upsert a batch with an explicit write timestamp.
    pub fn save_products_at(
        &mut self,
        records: &[ProductRecord],
        now: DateTime<Utc>,
    ) -> CatalogResult<SaveSummary> {
        let mut summary = SaveSummary {
            total: records.len(),
            ..SaveSummary::default()
        };

        let mut seen = HashSet::new();
        let tx = self.conn.transaction().map_err(CatalogError::Transaction)?;
        for record in records {
            if !record.has_identity() {
                summary.skipped += 1;
                warn!(name = record.label(), "skipping product without a URL");
                continue;
            }
            if !seen.insert(record.product_url.as_str()) {
                summary.skipped += 1;
                debug!(url = %record.product_url, "skipping repeated URL in batch");
                continue;
            }
            match upsert(&tx, record, now) {
                Ok(outcome) => {
                    debug!(url = %record.product_url, ?outcome, "upserted product");
                    summary.record(outcome);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(url = %record.product_url, error = %e, "failed to save product");
                }
            }
        }
        tx.commit().map_err(CatalogError::Commit)?;

        info!(
            saved = summary.saved,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            total = summary.total,
            "committed product batch"
        );
        Ok(summary)
    }

    pub fn get(&self, id: i64) -> CatalogResult<Option<StoredProduct>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], stored_from_row)
            .optional()?)
    }

    pub fn find_by_url(&self, url: &str) -> CatalogResult<Option<StoredProduct>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE product_url = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![url], stored_from_row)
            .optional()?)
    }

    /// One page of products plus the total matching the filter.
    pub fn list(&self, query: &ListQuery) -> CatalogResult<(u64, Vec<StoredProduct>)> {
        let pattern = query.name.as_deref().map(like_pattern);

        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\')",
            params![pattern],
            |row| row.get(0),
        )?;

        let limit = query.effective_limit();
        let sql = format!(
            "SELECT {COLUMNS} FROM products
             WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\')
             ORDER BY {} {}, id {}
             LIMIT ?2 OFFSET ?3",
            query.sort.column(),
            query.order.keyword(),
            query.order.keyword(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![pattern, limit, query.offset()], stored_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((total.max(0) as u64, rows))
    }

    /// Every product with the given grade, newest first.
    pub fn by_grade(&self, grade: &str) -> CatalogResult<Vec<StoredProduct>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM products WHERE grade = ?1 ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![grade], stored_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> CatalogResult<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// Cheap liveness check for health endpoints.
    pub fn ping(&self) -> CatalogResult<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

fn upsert(
    tx: &Transaction<'_>,
    record: &ProductRecord,
    now: DateTime<Utc>,
) -> rusqlite::Result<WriteOutcome> {
    let mut stmt = tx.prepare_cached(UPSERT)?;
    let (created_at, updated_at): (DateTime<Utc>, DateTime<Utc>) = stmt.query_row(
        params![
            record.name,
            record.price,
            record.grade,
            record.image_url,
            record.product_url,
            now,
        ],
        |row| Ok((row.get(1)?, row.get(2)?)),
    )?;
    Ok(if created_at == updated_at {
        WriteOutcome::Inserted
    } else {
        WriteOutcome::Updated
    })
}

fn stored_from_row(row: &Row<'_>) -> rusqlite::Result<StoredProduct> {
    Ok(StoredProduct {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        grade: row.get(3)?,
        image_url: row.get(4)?,
        product_url: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Sortable columns. Anything else falls back to `created_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    CreatedAt,
    Name,
    Price,
    Grade,
}

impl SortColumn {
    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Name => "name",
            Self::Price => "price",
            Self::Grade => "grade",
        }
    }

    /// Lenient parse: unknown values give the default column.
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_at" | "createdat" => Ok(Self::CreatedAt),
            "name" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "grade" => Ok(Self::Grade),
            other => Err(format!("unknown sort column: {other}")),
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Only an explicit `asc` sorts ascending.
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Paging, sorting and filtering for [`ProductStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub sort: SortColumn,
    pub order: SortOrder,
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            sort: SortColumn::default(),
            order: SortOrder::default(),
            name: None,
        }
    }
}

impl ListQuery {
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_LIMIT)
    }

    fn offset(&self) -> i64 {
        i64::from(self.effective_page() - 1) * i64::from(self.effective_limit())
    }

    /// Number of pages needed for `total` rows at the effective limit.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.effective_limit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(url: &str, name: &str, price: f64) -> ProductRecord {
        ProductRecord {
            name: Some(name.into()),
            product_url: url.into(),
            image_url: None,
            price: Some(price),
            grade: None,
        }
    }

    #[test]
    fn test_first_write_sets_equal_timestamps() {
        let mut store = ProductStore::open_in_memory().unwrap();
        let summary = store
            .save_products_at(&[record("https://x.test/products/a/", "A", 10.0)], t0())
            .unwrap();
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.updated, 0);

        let row = store.find_by_url("https://x.test/products/a/").unwrap().unwrap();
        assert_eq!(row.created_at, row.updated_at);
        assert_eq!(row.created_at, t0());
    }

    #[test]
    fn test_second_write_updates_in_place() {
        let mut store = ProductStore::open_in_memory().unwrap();
        let url = "https://x.test/products/a/";
        store.save_products_at(&[record(url, "A", 129.99)], t0()).unwrap();
        let first = store.find_by_url(url).unwrap().unwrap();

        let later = t0() + Duration::hours(6);
        let summary = store.save_products_at(&[record(url, "A", 89.99)], later).unwrap();
        assert_eq!(summary.saved, 0);
        assert_eq!(summary.updated, 1);

        let second = store.find_by_url(url).unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.updated_at, later);
        assert_eq!(second.price, Some(89.99));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_empty_url_is_skipped() {
        let mut store = ProductStore::open_in_memory().unwrap();
        let mut nameless = ProductRecord::new("  ");
        nameless.name = Some("Ghost".into());
        let summary = store
            .save_products_at(&[nameless, record("https://x.test/products/b/", "B", 1.0)], t0())
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.total, 2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_repeated_url_in_batch_counts_once() {
        let mut store = ProductStore::open_in_memory().unwrap();
        let url = "https://x.test/products/a/";
        let summary = store
            .save_products_at(&[record(url, "First", 10.0), record(url, "Second", 5.0)], t0())
            .unwrap();
        assert_eq!((summary.saved, summary.updated, summary.skipped), (1, 0, 1));
        assert_eq!(summary.total, 2);
        assert_eq!(store.count().unwrap(), 1);
        let row = store.find_by_url(url).unwrap().unwrap();
        assert_eq!(row.name.as_deref(), Some("First"));
        assert_eq!(row.price, Some(10.0));

        let later = t0() + Duration::hours(1);
        let again = store
            .save_products_at(&[record(url, "First", 9.0), record(url, "Second", 5.0)], later)
            .unwrap();
        assert_eq!((again.saved, again.updated, again.skipped), (0, 1, 1));
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let mut store = ProductStore::open_in_memory().unwrap();
        let summary = store.save_products(&[]).unwrap();
        assert_eq!(summary, SaveSummary::default());
    }

    #[test]
    fn test_get_missing_row() {
        let store = ProductStore::open_in_memory().unwrap();
        assert!(store.get(42).unwrap().is_none());
    }

    fn seeded() -> ProductStore {
        let mut store = ProductStore::open_in_memory().unwrap();
        let rows = [
            ("a", "Oak Table", 300.0, Some("A")),
            ("b", "Linen Sofa", 1200.0, Some("B")),
            ("c", "Oak Chair", 150.0, Some("A")),
            ("d", "Wool_Rug", 80.0, None),
        ];
        for (i, (slug, name, price, grade)) in rows.into_iter().enumerate() {
            let mut rec = record(&format!("https://x.test/products/{slug}/"), name, price);
            rec.grade = grade.map(String::from);
            store
                .save_products_at(&[rec], t0() + Duration::minutes(i as i64))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_list_defaults_newest_first() {
        let store = seeded();
        let (total, rows) = store.list(&ListQuery::default()).unwrap();
        assert_eq!(total, 4);
        let names: Vec<_> = rows.iter().map(|r| r.name.as_deref().unwrap()).collect();
        assert_eq!(names, ["Wool_Rug", "Oak Chair", "Linen Sofa", "Oak Table"]);
    }

    #[test]
    fn test_list_paginates_and_sorts() {
        let store = seeded();
        let query = ListQuery {
            page: 2,
            limit: 2,
            sort: SortColumn::Price,
            order: SortOrder::Asc,
            name: None,
        };
        let (total, rows) = store.list(&query).unwrap();
        assert_eq!(total, 4);
        let prices: Vec<_> = rows.iter().map(|r| r.price.unwrap()).collect();
        assert_eq!(prices, [300.0, 1200.0]);
        assert_eq!(query.total_pages(total), 2);
    }

    #[test]
    fn test_list_name_filter_is_case_insensitive_and_literal() {
        let store = seeded();
        let query = ListQuery {
            name: Some("oak".into()),
            ..ListQuery::default()
        };
        let (total, rows) = store.list(&query).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);

        let underscore = ListQuery {
            name: Some("l_n".into()),
            ..ListQuery::default()
        };
        assert_eq!(store.list(&underscore).unwrap().0, 0);
    }

    #[test]
    fn test_by_grade_newest_first() {
        let store = seeded();
        let rows = store.by_grade("A").unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_deref().unwrap()).collect();
        assert_eq!(names, ["Oak Chair", "Oak Table"]);
        assert!(store.by_grade("Z").unwrap().is_empty());
    }

    #[test]
    fn test_sort_parsing_is_whitelisted() {
        assert_eq!(SortColumn::parse_or_default("price"), SortColumn::Price);
        assert_eq!(SortColumn::parse_or_default("id; DROP TABLE"), SortColumn::CreatedAt);
        assert_eq!(SortOrder::parse_or_default("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse_or_default("sideways"), SortOrder::Desc);
    }

    #[test]
    fn test_limit_is_clamped() {
        let q = ListQuery {
            page: 0,
            limit: 10_000,
            ..ListQuery::default()
        };
        assert_eq!(q.effective_limit(), MAX_LIMIT);
        assert_eq!(q.effective_page(), 1);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn test_open_on_disk_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.db");
        {
            let mut store = ProductStore::open(&path).unwrap();
            store
                .save_products(&[record("https://x.test/products/a/", "A", 1.0)])
                .unwrap();
        }
        let store = ProductStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        store.ping().unwrap();
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/products.db");
        assert!(matches!(
            ProductStore::open(&path),
            Err(CatalogError::Open { .. })
        ));
    }
}
