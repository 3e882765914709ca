// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! A rendered page bound to an overall acquisition deadline.
//!
//! [`RenderSession`] wraps a [`RenderContext`] and classifies every failure
//! as navigation, evaluation or timeout. Once the deadline has passed every
//! operation fails fast with [`SessionError::Timeout`]; an operation still
//! running when the deadline passes is cancelled.

use crate::renderer::{NavigationResult, RenderContext};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How often `wait_for_selector` re-checks the page.
const SELECTOR_POLL: Duration = Duration::from_millis(250);

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("acquisition deadline expired")]
    Timeout,
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// A fixed point in time after which acquisition stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Run `fut`, failing with `Timeout` if the deadline has already passed
    /// or passes before it completes.
    pub async fn bound<F: Future>(self, fut: F) -> Result<F::Output, SessionError> {
        if self.expired() {
            return Err(SessionError::Timeout);
        }
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| SessionError::Timeout)
    }
}

pub struct RenderSession {
    ctx: Box<dyn RenderContext>,
    deadline: Deadline,
    navigation_timeout: Duration,
}

impl RenderSession {
    pub fn new(ctx: Box<dyn RenderContext>, deadline: Deadline, navigation_timeout: Duration) -> Self {
        Self {
            ctx,
            deadline,
            navigation_timeout,
        }
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Load `url`. The navigation itself is bounded by the smaller of the
    /// navigation timeout and the time left before the deadline.
    pub async fn navigate(&mut self, url: &str) -> Result<NavigationResult, SessionError> {
        let budget = self.navigation_timeout.min(self.deadline.remaining());
        let timeout_ms = budget.as_millis() as u64;
        let deadline = self.deadline;
        deadline
            .bound(self.ctx.navigate(url, timeout_ms))
            .await?
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: format!("{e:#}"),
            })
    }

    /// Evaluate a script and return its value.
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value, SessionError> {
        self.deadline
            .bound(self.ctx.execute_js(script))
            .await?
            .map_err(|e| SessionError::Evaluation(format!("{e:#}")))
    }

    /// Evaluate a script and decode its value.
    pub async fn evaluate_as<T: DeserializeOwned>(&self, script: &str) -> Result<T, SessionError> {
        let value = self.evaluate(script).await?;
        serde_json::from_value(value)
            .map_err(|e| SessionError::Evaluation(format!("unexpected script result: {e}")))
    }

    /// Poll until `selector` matches or `within` elapses. Returns whether it
    /// matched; failed checks count as "not yet".
    pub async fn wait_for_selector(&self, selector: &str, within: Duration) -> Result<bool, SessionError> {
        let script = selector_probe(selector);
        let give_up = Instant::now() + within;
        loop {
            match self.evaluate(&script).await {
                Ok(serde_json::Value::Bool(true)) => return Ok(true),
                Ok(_) => {}
                Err(SessionError::Timeout) => return Err(SessionError::Timeout),
                Err(e) => debug!(error = %e, "selector check failed"),
            }
            if Instant::now() >= give_up {
                return Ok(false);
            }
            let next = (Instant::now() + SELECTOR_POLL).min(give_up);
            if next >= self.deadline.at {
                tokio::time::sleep_until(self.deadline.at).await;
                return Err(SessionError::Timeout);
            }
            tokio::time::sleep_until(next).await;
        }
    }

    /// Best-effort viewport override. Returns whether it took effect; only a
    /// deadline expiry is an error.
    pub async fn resize_viewport(&self, width: u32, height: u32) -> Result<bool, SessionError> {
        match self.deadline.bound(self.ctx.set_viewport(width, height)).await? {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "no viewport-resize capability; keeping default viewport");
                Ok(false)
            }
        }
    }

    /// The URL the page is on now.
    pub async fn current_url(&self) -> Result<String, SessionError> {
        self.deadline
            .bound(self.ctx.get_url())
            .await?
            .map_err(|e| SessionError::Evaluation(format!("{e:#}")))
    }

    /// Read the whole page markup.
    pub async fn snapshot_html(&self) -> Result<String, SessionError> {
        self.deadline
            .bound(self.ctx.get_html())
            .await?
            .map_err(|e| SessionError::Evaluation(format!("{e:#}")))
    }

    /// Sleep for `interval`, but never past the deadline. Running into the
    /// deadline is a `Timeout`.
    pub async fn settle(&self, interval: Duration) -> Result<(), SessionError> {
        if self.deadline.expired() {
            return Err(SessionError::Timeout);
        }
        let wake = Instant::now() + interval;
        if wake > self.deadline.at {
            tokio::time::sleep_until(self.deadline.at).await;
            return Err(SessionError::Timeout);
        }
        tokio::time::sleep_until(wake).await;
        Ok(())
    }

    /// Release the underlying context. Close failures are logged only.
    pub async fn close(self) {
        if let Err(e) = self.ctx.close().await {
            warn!(error = %e, "failed to close render context");
        }
    }
}

fn selector_probe(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!("document.querySelector({quoted}) !== null")
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use anyhow::anyhow;
    use serde_json::{json, Value};

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Dims {
        count: u64,
        height: u64,
    }

    #[tokio::test]
    async fn test_evaluate_returns_value() {
        let s = session(FakePage::queued(vec![Ok(json!(42))]), Duration::from_secs(5));
        assert_eq!(s.evaluate("1 + 41").await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_evaluate_failure_is_evaluation_error() {
        let s = session(
            FakePage::queued(vec![Err(anyhow!("ReferenceError: foo is not defined"))]),
            Duration::from_secs(5),
        );
        let err = s.evaluate("foo").await.unwrap_err();
        assert!(matches!(err, SessionError::Evaluation(ref m) if m.contains("ReferenceError")));
    }

    #[tokio::test]
    async fn test_evaluate_as_decodes() {
        let s = session(FakePage::queued(vec![sample(12, 3400)]), Duration::from_secs(5));
        let dims: Dims = s.evaluate_as("sample").await.unwrap();
        assert_eq!(dims, Dims { count: 12, height: 3400 });
    }

    #[tokio::test]
    async fn test_evaluate_as_wrong_shape_is_evaluation_error() {
        let s = session(FakePage::queued(vec![Ok(json!("nope"))]), Duration::from_secs(5));
        let err = s.evaluate_as::<Dims>("sample").await.unwrap_err();
        assert!(matches!(err, SessionError::Evaluation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_after_expiry_fail_fast() {
        let page = FakePage::queued(vec![Ok(json!(1))]);
        let log = page.log.clone();
        let s = session(page, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(s.evaluate("x").await.unwrap_err().is_timeout());
        assert!(s.settle(Duration::ZERO).await.unwrap_err().is_timeout());
        assert!(s.snapshot_html().await.unwrap_err().is_timeout());
        // The page was never touched.
        assert!(log.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_cancels_in_flight_navigation() {
        let mut page = FakePage::queued(vec![]);
        page.navigation_delay = Duration::from_secs(30);
        let mut s = session(page, Duration::from_secs(2));
        let err = s.navigate("https://x.test/").await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_current_url_follows_navigation() {
        let mut s = session(FakePage::queued(vec![]), Duration::from_secs(5));
        assert_eq!(s.current_url().await.unwrap(), "about:blank");
        s.navigate("https://x.test/listing/").await.unwrap();
        assert_eq!(s.current_url().await.unwrap(), "https://x.test/listing/");
    }

    #[tokio::test]
    async fn test_navigation_failure_keeps_url() {
        let mut page = FakePage::queued(vec![]);
        page.navigation = Err("net::ERR_NAME_NOT_RESOLVED".into());
        let mut s = session(page, Duration::from_secs(5));
        match s.navigate("https://x.test/").await.unwrap_err() {
            SessionError::Navigation { url, reason } => {
                assert_eq!(url, "https://x.test/");
                assert!(reason.contains("ERR_NAME_NOT_RESOLVED"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_into_deadline_times_out() {
        let s = session(FakePage::queued(vec![]), Duration::from_secs(3));
        s.settle(Duration::from_secs(1)).await.unwrap();
        assert!(s.settle(Duration::from_secs(5)).await.unwrap_err().is_timeout());
        assert!(s.deadline().expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_selector_polls_until_match() {
        let page = FakePage::queued(vec![Ok(json!(false)), Err(anyhow!("detached")), Ok(json!(true))]);
        let log = page.log.clone();
        let s = session(page, Duration::from_secs(60));
        assert!(s.wait_for_selector(".grid-item", Duration::from_secs(10)).await.unwrap());
        assert_eq!(log.all().len(), 3);
        assert!(log.all()[0].contains("document.querySelector(\".grid-item\")"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_selector_gives_up_without_error() {
        let page = FakePage::new(|_| Ok(Value::Bool(false)));
        let s = session(page, Duration::from_secs(60));
        let matched = s.wait_for_selector(".grid-item", Duration::from_secs(1)).await.unwrap();
        assert!(!matched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_selector_respects_deadline() {
        let page = FakePage::new(|_| Ok(Value::Bool(false)));
        let s = session(page, Duration::from_secs(1));
        let err = s.wait_for_selector(".grid-item", Duration::from_secs(10)).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_resize_without_capability_is_not_fatal() {
        let mut page = FakePage::queued(vec![]);
        page.viewport = false;
        let s = session(page, Duration::from_secs(5));
        assert!(!s.resize_viewport(1920, 1080).await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_evaluation_error() {
        let mut page = FakePage::queued(vec![]);
        page.html = Err("page snapshot is not a string".into());
        let s = session(page, Duration::from_secs(5));
        assert!(matches!(s.snapshot_html().await, Err(SessionError::Evaluation(_))));
    }

    #[tokio::test]
    async fn test_close_releases_context() {
        let page = FakePage::queued(vec![]);
        let closed = page.closed.clone();
        session(page, Duration::from_secs(5)).close().await;
        assert_eq!(closed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
