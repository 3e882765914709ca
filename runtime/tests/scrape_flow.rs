// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scrape against a simulated infinite-scroll listing: a page
//! that grows by one batch per "show more" click, then persistence and the
//! REST read path over the resulting store.

use anyhow::Result;
use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use openbox_catalog::ProductStore;
use openbox_runtime::config::ScrapeConfig;
use openbox_runtime::convergence::{Phase, Thresholds, Timing};
use openbox_runtime::pipeline::{self, ScrapeReport};
use openbox_runtime::progress::{self, ProgressEventKind, Reporter};
use openbox_runtime::renderer::{LaunchOptions, Launcher, NavigationResult, RenderContext, Renderer};
use openbox_runtime::rest::{self, AppState};
use openbox_runtime::scripts;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

const BATCH: u64 = 24;
const BATCHES: u64 = 3;

/// Listing state shared between the page and the test.
#[derive(Default)]
struct Listing {
    clicks: u64,
}

impl Listing {
    fn items(&self) -> u64 {
        BATCH * (self.clicks + 1)
    }

    fn has_more(&self) -> bool {
        self.clicks + 1 < BATCHES
    }

    fn html(&self) -> String {
        let cells: String = (1..=self.items())
            .map(|i| {
                format!(
                    r#"<div data-component="Shop-ProductCell">
  <a class="product-image-link" href="/products/item-{i}/"><img class="product-image" src="/img/{i}.jpg"></a>
  <div class="product-name"><a href="/products/item-{i}/"><span>Item {i}</span></a></div>
  <span data-test-id="amount">{i}.00</span>
  <p>Open Box, Grade A</p>
</div>"#
                )
            })
            .collect();
        format!("<html><body><main>{cells}</main></body></html>")
    }
}

struct ListingPage(Arc<Mutex<Listing>>);

#[async_trait]
impl RenderContext for ListingPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 12,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        let mut listing = self.0.lock().unwrap();
        let value = if script == scripts::SAMPLE.as_str() {
            json!({ "count": listing.items(), "height": listing.items() * 380 })
        } else if script == scripts::CLICK_MORE.as_str() {
            let clicked = listing.has_more();
            if clicked {
                listing.clicks += 1;
            }
            json!(clicked)
        } else if script == scripts::AFFORDANCE_PRESENT.as_str() {
            json!(listing.has_more())
        } else {
            json!(true)
        };
        Ok(value)
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.0.lock().unwrap().html())
    }

    async fn get_url(&self) -> Result<String> {
        Ok("https://www.potterybarn.com/shop/sale/open-box-deals/".into())
    }

    async fn set_viewport(&self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

struct ListingBrowser(Arc<Mutex<Listing>>);

#[async_trait]
impl Renderer for ListingBrowser {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Ok(Box::new(ListingPage(Arc::clone(&self.0))))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Every launch sees a freshly loaded listing.
struct ListingLauncher;

#[async_trait]
impl Launcher for ListingLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Renderer>> {
        assert!(options.headless);
        Ok(Box::new(ListingBrowser(Arc::new(Mutex::new(Listing::default())))))
    }
}

fn config() -> ScrapeConfig {
    ScrapeConfig {
        initial_settle: Duration::ZERO,
        readiness_wait: Duration::from_millis(10),
        retry_backoff: Duration::ZERO,
        deadline: Duration::from_secs(30),
        timing: Timing::ZERO,
        thresholds: Thresholds {
            item_streak: 3,
            height_streak: 3,
            max_cycles: 50,
            final_passes: 2,
        },
        ..ScrapeConfig::default()
    }
}

#[tokio::test]
async fn test_scrape_loads_every_batch_and_persists() {
    let (tx, mut rx) = progress::channel();
    let mut reporter = Reporter::new(Some(tx));
    let collected = pipeline::collect(&ListingLauncher, &config(), &mut reporter).await.unwrap();

    assert_eq!(collected.convergence.phase, Phase::Converged);
    assert_eq!(collected.convergence.items, BATCH * BATCHES);
    assert_eq!(collected.records.len() as u64, BATCH * BATCHES);
    assert_eq!(
        collected.records[0].product_url,
        "https://www.potterybarn.com/products/item-1/"
    );
    assert_eq!(collected.records[0].grade.as_deref(), Some("A"));

    let dir = tempfile::tempdir().unwrap();
    let mut store = ProductStore::open(&dir.path().join("products.db")).unwrap();
    let summary = pipeline::persist(&mut store, &collected.records, &mut reporter).unwrap();
    assert_eq!(summary.saved as u64, BATCH * BATCHES);

    let report = ScrapeReport::new(reporter.run_id(), &collected, &summary);
    assert_json_include!(
        actual: serde_json::to_value(&report).unwrap(),
        expected: json!({ "phase": "converged", "strategy": "generic", "found": 72, "saved": 72, "updated": 0 })
    );

    drop(reporter);
    let mut clicks = 0;
    while let Ok(event) = rx.recv().await {
        if matches!(event.event, ProgressEventKind::AffordanceActivated { .. }) {
            clicks += 1;
        }
    }
    assert_eq!(clicks, BATCHES - 1);
}

#[test]
fn test_rest_serves_a_scraped_store() {
    tokio_test::block_on(async {
        let store = ProductStore::open_in_memory().unwrap();
        let state = Arc::new(AppState::new(store, Arc::new(ListingLauncher), config()));

        let scrape = rest::router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/products/scrape")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(scrape.status(), StatusCode::OK);

        let listed = rest::router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/products?sort=price&order=asc&limit=5&page=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(listed.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_json_include!(
            actual: body.clone(),
            expected: json!({ "pagination": { "page": 2, "limit": 5, "total": 72, "totalPages": 15 } })
        );
        assert_eq!(body["products"][0]["name"], "Item 6");
        assert_eq!(body["products"][0]["price"], 6.0);
    });
}
