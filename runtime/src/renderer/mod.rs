// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). Deadlines and
//! error classification live one level up, in [`crate::session`].

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Options applied when the browser is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub user_agent: String,
    pub headless: bool,
    /// Initial window size.
    pub window: (u32, u32),
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// The URL the page is on now, after any client-side redirect.
    async fn get_url(&self) -> Result<String>;
    /// Override the viewport size. Engines without the capability keep the
    /// default, which reports it as unsupported.
    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        let _ = (width, height);
        anyhow::bail!("viewport resize not supported by this renderer")
    }
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Starts a browser engine for one acquisition attempt.
///
/// Each attempt gets a fresh engine so a wedged browser cannot poison the
/// retry.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Renderer>>;
}
