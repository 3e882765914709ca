// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{LaunchOptions, Launcher, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

/// Environment variable naming an explicit browser binary.
pub const CHROMIUM_PATH_ENV: &str = "OPENBOX_CHROMIUM_PATH";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. OPENBOX_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.openbox/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".openbox/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".openbox/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".openbox/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".openbox/chromium/chrome-linux64/chrome"),
                home.join(".openbox/chromium/chrome"),
            ]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance configured for listing acquisition.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let chrome_path = find_chromium()
            .with_context(|| format!("Chromium not found. Install Chrome or set {CHROMIUM_PATH_ENV}."))?;
        debug!(path = %chrome_path.display(), "launching Chromium");

        let (width, height) = options.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height)
            .arg(format!("--user-agent={}", options.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP connection.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        Ok(Box::new(ChromiumContext { page }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }
}

/// Launches a fresh [`ChromiumRenderer`] per acquisition attempt.
pub struct ChromiumLauncher;

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Renderer>> {
        Ok(Box::new(ChromiumRenderer::launch(options).await?))
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("page snapshot is not a string: {e:?}"))?;

        Ok(html)
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.page
            .execute(params)
            .await
            .context("failed to override device metrics")?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        Ok(())
    }
}
