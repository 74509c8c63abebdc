//! Browser control for headless verification.
//!
//! When compiled with the `browser` feature this module drives Chromium over
//! the Chrome `DevTools` Protocol via chromiumoxide. One [`Browser`] is one
//! browser process; every [`ContextPool::new_context`] call creates an
//! isolated CDP browser context (own storage, cookies and DOM) with a single
//! page.
//!
//! [`ContextPool::new_context`]: crate::driver::ContextPool::new_context

use serde::{Deserialize, Serialize};

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Budget for a single CDP request in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            request_timeout_ms: 30_000,
        }
    }
}

impl BrowserConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::BrowserConfig;
    use crate::driver::{ContextPool, MouseButton, PageDriver, StorageEntries, Viewport};
    use crate::locator::{ElementInfo, Locator, Point};
    use crate::result::{HarnessError, HarnessResult};
    use crate::session;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchMouseEventParams, DispatchMouseEventType, MouseButton as CdpMouseButton,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
        CaptureScreenshotParams, RemoveScriptToEvaluateOnNewDocumentParams, ScriptIdentifier,
    };
    use chromiumoxide::cdp::browser_protocol::target::{
        CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
    };
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tracing::{debug, info, warn};

    fn driver_err(e: impl std::fmt::Display) -> HarnessError {
        HarnessError::driver(e.to_string())
    }

    /// Browser process with a real CDP connection
    #[derive(Debug)]
    pub struct Browser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Browser {
        /// Launch a new browser process
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> HarnessResult<Self> {
            let mut builder = CdpConfig::builder()
                .request_timeout(Duration::from_millis(config.request_timeout_ms));

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder.build().map_err(HarnessError::driver)?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                HarnessError::driver(format!("failed to launch browser: {e}"))
            })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });
            info!(headless = config.headless, "browser launched");

            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser process
        pub async fn close(self) -> HarnessResult<()> {
            let result = {
                let mut browser = self.inner.lock().await;
                browser.close().await.map(|_| ()).map_err(driver_err)
            };
            self.handle.abort();
            info!("browser closed");
            result
        }
    }

    #[async_trait]
    impl ContextPool for Browser {
        type Page = Page;

        async fn new_context(&self, viewport: Viewport) -> HarnessResult<Page> {
            let browser = self.inner.lock().await;
            let context_id = browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(driver_err)?
                .result
                .browser_context_id;

            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id.clone())
                .build()
                .map_err(HarnessError::driver)?;
            let page = match browser.new_page(target).await {
                Ok(page) => page,
                Err(e) => {
                    let _ = browser
                        .execute(DisposeBrowserContextParams::new(context_id))
                        .await;
                    return Err(driver_err(e));
                }
            };
            drop(browser);

            let metrics = SetDeviceMetricsOverrideParams::builder()
                .width(i64::from(viewport.width))
                .height(i64::from(viewport.height))
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(HarnessError::driver)?;
            page.execute(metrics).await.map_err(driver_err)?;
            debug!(width = viewport.width, height = viewport.height, "browsing context created");

            Ok(Page {
                viewport,
                page,
                context_id,
                browser: Arc::clone(&self.inner),
                seed: Mutex::new(None),
                closed: Mutex::new(false),
            })
        }
    }

    /// One browsing context with a real CDP page
    #[derive(Debug)]
    pub struct Page {
        viewport: Viewport,
        page: CdpPage,
        context_id: BrowserContextId,
        browser: Arc<Mutex<CdpBrowser>>,
        seed: Mutex<Option<(StorageEntries, ScriptIdentifier)>>,
        closed: Mutex<bool>,
    }

    impl Page {
        async fn eval<T: serde::de::DeserializeOwned>(&self, expr: String) -> HarnessResult<T> {
            self.page
                .evaluate(expr)
                .await
                .map_err(|e| HarnessError::evaluation(e.to_string()))?
                .into_value()
                .map_err(driver_err)
        }
    }

    #[derive(serde::Deserialize)]
    struct StorageProbe {
        ok: bool,
        value: Option<String>,
        error: Option<String>,
    }

    #[async_trait]
    impl PageDriver for Page {
        async fn navigate(&self, url: &str) -> HarnessResult<()> {
            self.page
                .goto(url)
                .await
                .map_err(|e| HarnessError::navigation(url, e.to_string()))?;
            Ok(())
        }

        async fn current_url(&self) -> HarnessResult<String> {
            self.eval(String::from("window.location.href")).await
        }

        async fn install_storage_seed(&self, entries: &StorageEntries) -> HarnessResult<()> {
            let mut seed = self.seed.lock().await;
            if let Some((installed, _)) = seed.as_ref() {
                if installed == entries {
                    return Ok(());
                }
            }
            if let Some((_, identifier)) = seed.take() {
                self.page
                    .execute(RemoveScriptToEvaluateOnNewDocumentParams::new(identifier))
                    .await
                    .map_err(|e| HarnessError::bootstrap(e.to_string()))?;
            }
            let script = session::init_script(entries)?;
            let identifier = self
                .page
                .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(script))
                .await
                .map_err(|e| HarnessError::bootstrap(e.to_string()))?;
            *seed = Some((entries.clone(), identifier));
            Ok(())
        }

        async fn read_storage(&self, key: &str) -> HarnessResult<Option<String>> {
            let probe: StorageProbe = self.eval(session::storage_probe_script(key)?).await?;
            if probe.ok {
                Ok(probe.value)
            } else {
                Err(HarnessError::bootstrap(probe.error.unwrap_or_else(|| {
                    String::from("localStorage is not available")
                })))
            }
        }

        async fn query(&self, locator: &Locator) -> HarnessResult<Vec<ElementInfo>> {
            self.eval(locator.to_probe_script()).await
        }

        async fn click_at(&self, point: Point, button: MouseButton) -> HarnessResult<()> {
            let cdp_button = match button {
                MouseButton::Primary => CdpMouseButton::Left,
                MouseButton::Secondary => CdpMouseButton::Right,
            };
            let moved = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseMoved)
                .x(point.x)
                .y(point.y)
                .build()
                .map_err(HarnessError::driver)?;
            self.page.execute(moved).await.map_err(driver_err)?;

            for kind in [
                DispatchMouseEventType::MousePressed,
                DispatchMouseEventType::MouseReleased,
            ] {
                let params = DispatchMouseEventParams::builder()
                    .r#type(kind)
                    .x(point.x)
                    .y(point.y)
                    .button(cdp_button.clone())
                    .click_count(1)
                    .build()
                    .map_err(HarnessError::driver)?;
                self.page.execute(params).await.map_err(driver_err)?;
            }
            Ok(())
        }

        async fn screenshot(&self) -> HarnessResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let screenshot = self.page.execute(params).await.map_err(driver_err)?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(driver_err)
        }

        fn viewport(&self) -> Viewport {
            self.viewport
        }

        async fn close(&self) -> HarnessResult<()> {
            let mut closed = self.closed.lock().await;
            if *closed {
                return Ok(());
            }
            *closed = true;
            if let Err(e) = self.page.clone().close().await {
                warn!(error = %e, "page close failed, disposing context anyway");
            }
            let browser = self.browser.lock().await;
            browser
                .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
                .await
                .map_err(driver_err)?;
            debug!("browsing context released");
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{Browser, Page};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert!(config.sandbox);
        assert!(config.chromium_path.is_none());
    }

    #[test]
    fn test_builders() {
        let config = BrowserConfig::default()
            .with_headless(false)
            .with_chromium_path("/usr/bin/chromium")
            .with_no_sandbox();
        assert!(!config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
    }
}
