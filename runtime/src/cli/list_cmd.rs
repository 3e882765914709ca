// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! `openbox list`: browse the stored catalog.

use crate::cli::open_store;
use crate::cli::output::{self, Styled};
use anyhow::Result;
use openbox_catalog::{ListQuery, SortColumn, SortOrder, StoredProduct};
use std::path::Path;

/// Filters accepted by `openbox list`.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub grade: Option<String>,
    pub name: Option<String>,
    pub page: u32,
    pub limit: u32,
    pub sort: String,
    pub order: String,
}

impl ListArgs {
    pub fn query(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            limit: self.limit,
            sort: SortColumn::parse_or_default(&self.sort),
            order: SortOrder::parse_or_default(&self.order),
            name: self.name.clone(),
        }
    }
}

pub async fn run(db: &Path, args: &ListArgs) -> Result<()> {
    let store = open_store(db)?;

    if let Some(grade) = &args.grade {
        let products = store.by_grade(grade)?;
        if output::is_json() {
            output::print_json(&serde_json::json!({
                "products": products,
                "count": products.len(),
            }));
        } else {
            print_table(&products);
            if !output::is_quiet() {
                eprintln!("  {} products graded {grade}", products.len());
            }
        }
        return Ok(());
    }

    let query = args.query();
    let (total, products) = store.list(&query)?;
    if output::is_json() {
        output::print_json(&serde_json::json!({
            "products": products,
            "pagination": {
                "page": query.effective_page(),
                "limit": query.effective_limit(),
                "total": total,
                "totalPages": query.total_pages(total),
            }
        }));
        return Ok(());
    }

    print_table(&products);
    if !output::is_quiet() {
        eprintln!(
            "  page {} of {} ({total} products)",
            query.effective_page(),
            query.total_pages(total).max(1)
        );
    }
    Ok(())
}

fn print_table(products: &[StoredProduct]) {
    let s = Styled::new();
    for line in products.iter().map(|p| row(p, &s)) {
        println!("{line}");
    }
}

fn row(p: &StoredProduct, s: &Styled) -> String {
    let price = p.price.map_or_else(|| "-".to_string(), |v| format!("${v:.2}"));
    let grade = p.grade.as_deref().unwrap_or("-");
    let name = p.name.as_deref().unwrap_or("(unnamed)");
    format!(
        "{:>6}  {:<14} {:>10}  {}  {}",
        p.id,
        grade,
        price,
        name,
        s.dim(&p.product_url)
    )
}
