//! Browser session driver
//!
//! Connects to the Chrome instance exposed by a started antidetect profile
//! and drives it over CDP: navigation, script evaluation, keyboard input and
//! touch gestures. One session covers exactly one task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchTouchEventParams, DispatchTouchEventType,
    TouchPoint,
};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::errors::SessionError;
use super::humanize::GestureSurface;

/// A live browser connection for one task
pub struct SearchSession {
    /// Profile id owning the underlying browser, used in log lines
    pub id: String,
    browser: Option<Browser>,
    page: Option<Page>,
    alive: Arc<AtomicBool>,
    handler_task: tokio::task::JoinHandle<()>,
}

impl SearchSession {
    /// Connect to the browser behind a started profile's websocket endpoint.
    pub async fn connect(profile_id: &str, websocket_link: &str) -> Result<Self, SessionError> {
        info!("Profile {} connecting to browser at {}", profile_id, websocket_link);

        let (mut browser, mut handler) = Browser::connect(websocket_link)
            .await
            .map_err(|e| SessionError::ConnectFailed(e.to_string()))?;

        // When the handler stream ends, Chrome has disconnected.
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        let id_for_handler = profile_id.to_string();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("Profile {} browser event stream ended", id_for_handler);
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        // Populate targets so pages opened before we attached are visible.
        let _ = browser.fetch_targets().await;

        Ok(Self {
            id: profile_id.to_string(),
            browser: Some(browser),
            page: None,
            alive,
            handler_task,
        })
    }

    /// Check if the browser connection is still up
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn browser(&self) -> Result<&Browser, SessionError> {
        self.browser
            .as_ref()
            .ok_or_else(|| SessionError::ConnectionLost("browser already closed".into()))
    }

    fn page(&self) -> Result<&Page, SessionError> {
        self.page
            .as_ref()
            .ok_or_else(|| SessionError::ConnectionLost("no active page".into()))
    }

    /// Open a fresh tab and navigate it. The settle delay keeps navigation
    /// from racing the profile's browser startup.
    pub async fn open(&mut self, url: &str, settle: Duration) -> Result<(), SessionError> {
        let page = self
            .browser()?
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::NavigationFailed(e.to_string()))?;

        tokio::time::sleep(settle).await;

        debug!("Profile {} navigating to: {}", self.id, url);
        page.goto(url)
            .await
            .map_err(|e| SessionError::NavigationFailed(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| SessionError::NavigationFailed(e.to_string()))?;

        self.page = Some(page);
        Ok(())
    }

    /// Execute JavaScript on the page with default 30 second timeout
    pub async fn execute_js(&self, script: &str) -> Result<serde_json::Value, SessionError> {
        self.execute_js_with_timeout(script, 30).await
    }

    /// Execute JavaScript with a custom timeout (seconds). Promises are
    /// awaited and the result returned by value.
    pub async fn execute_js_with_timeout(
        &self,
        script: &str,
        timeout_secs: u64,
    ) -> Result<serde_json::Value, SessionError> {
        let page = self.page()?;

        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(SessionError::JavaScriptError)?;

        let result = tokio::time::timeout(Duration::from_secs(timeout_secs), page.evaluate(params))
            .await
            .map_err(|_| {
                SessionError::Timeout(format!(
                    "JavaScript execution timed out after {}s",
                    timeout_secs
                ))
            })?
            .map_err(|e| SessionError::JavaScriptError(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Wait for an element matching a selector to appear in the DOM.
    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<(), SessionError> {
        let script = format!(
            r#"new Promise((resolve) => {{
                const sel = {selector};
                if (document.querySelector(sel)) {{ resolve('found'); return; }}
                const observer = new MutationObserver(() => {{
                    if (document.querySelector(sel)) {{
                        observer.disconnect();
                        resolve('found');
                    }}
                }});
                observer.observe(document.documentElement, {{ childList: true, subtree: true }});
                setTimeout(() => {{ observer.disconnect(); resolve('timeout'); }}, {timeout_ms});
            }})"#,
            selector = serde_json::to_string(selector).unwrap_or_default(),
            timeout_ms = timeout_ms,
        );

        let outcome = self
            .execute_js_with_timeout(&script, timeout_ms / 1000 + 5)
            .await?;

        match outcome.as_str() {
            Some("found") => Ok(()),
            _ => Err(SessionError::ElementNotFound(format!(
                "timed out waiting for {}",
                selector
            ))),
        }
    }

    /// Click on an element by selector
    pub async fn click(&self, selector: &str) -> Result<(), SessionError> {
        let page = self.page()?;

        let element = page
            .find_element(selector)
            .await
            .map_err(|e| SessionError::ElementNotFound(format!("{}: {}", selector, e)))?;

        element
            .click()
            .await
            .map_err(|e| SessionError::JavaScriptError(e.to_string()))?;

        Ok(())
    }

    /// Type text into the focused element via raw CDP keyboard events, with a
    /// jittered per-character delay around `base_delay_ms`.
    pub async fn type_chars(&self, text: &str, base_delay_ms: u64) -> Result<(), SessionError> {
        let page = self.page()?;
        let mut rng = rand::rngs::StdRng::from_entropy();

        for c in text.chars() {
            let key_down = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyDown)
                .text(c.to_string())
                .build()
                .unwrap();
            page.execute(key_down)
                .await
                .map_err(|e| SessionError::JavaScriptError(format!("CDP keyDown failed: {}", e)))?;

            let key_up = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::KeyUp)
                .build()
                .unwrap();
            page.execute(key_up)
                .await
                .map_err(|e| SessionError::JavaScriptError(format!("CDP keyUp failed: {}", e)))?;

            let jitter = base_delay_ms / 2;
            let delay = rng.gen_range(base_delay_ms.saturating_sub(jitter)..=base_delay_ms + jitter);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        Ok(())
    }

    /// Press Enter via raw CDP key events
    pub async fn press_enter(&self) -> Result<(), SessionError> {
        let page = self.page()?;

        // small random delay before pressing (100-300ms)
        let delay = {
            let mut rng = rand::rngs::StdRng::from_entropy();
            rng.gen_range(100..300)
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let key_down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::RawKeyDown)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13)
            .build()
            .unwrap();
        page.execute(key_down)
            .await
            .map_err(|e| SessionError::JavaScriptError(format!("CDP Enter keyDown failed: {}", e)))?;

        // char event with \r triggers form submission
        let char_event = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text("\r")
            .build()
            .unwrap();
        page.execute(char_event)
            .await
            .map_err(|e| SessionError::JavaScriptError(format!("CDP Enter char failed: {}", e)))?;

        let key_up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13)
            .build()
            .unwrap();
        page.execute(key_up)
            .await
            .map_err(|e| SessionError::JavaScriptError(format!("CDP Enter keyUp failed: {}", e)))?;

        Ok(())
    }

    /// Ids of all page targets currently open in the browser.
    pub async fn page_targets(&self) -> Result<Vec<TargetId>, SessionError> {
        let pages = self
            .browser()?
            .pages()
            .await
            .map_err(|e| SessionError::ConnectionLost(e.to_string()))?;

        Ok(pages.iter().map(|p| p.target_id().clone()).collect())
    }

    /// Wait (bounded) for a page not present in `known` to appear, bring it
    /// to the foreground and make it the session's active page.
    pub async fn adopt_spawned_page(
        &mut self,
        known: &[TargetId],
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let browser = self.browser()?;

        let new_page = tokio::time::timeout(timeout, async {
            loop {
                if let Ok(pages) = browser.pages().await {
                    if let Some(page) = pages
                        .into_iter()
                        .find(|p| !known.contains(p.target_id()))
                    {
                        return page;
                    }
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        })
        .await
        .map_err(|_| SessionError::NavigationTimeout("no new page appeared after click".into()))?;

        debug!("Profile {} adopting spawned page {:?}", self.id, new_page.target_id());
        let _ = new_page.bring_to_front().await;
        self.page = Some(new_page);

        Ok(())
    }

    /// Close the active page and the whole browser session, releasing the
    /// profile's browser resources. Never fails; errors are logged.
    pub async fn close(&mut self) {
        self.alive.store(false, Ordering::Relaxed);

        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }

        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
        }

        self.handler_task.abort();
        info!("Profile {} browser session closed", self.id);
    }
}

#[async_trait]
impl GestureSurface for SearchSession {
    async fn viewport(&self) -> Result<(f64, f64), SessionError> {
        let value = self
            .execute_js("({ width: window.innerWidth, height: window.innerHeight })")
            .await?;

        let width = value.get("width").and_then(|v| v.as_f64()).unwrap_or(1280.0);
        let height = value.get("height").and_then(|v| v.as_f64()).unwrap_or(720.0);
        Ok((width, height))
    }

    async fn touch_start(&self, x: f64, y: f64) -> Result<(), SessionError> {
        let page = self.page()?;
        let point = TouchPoint::builder().x(x).y(y).build().unwrap();
        let params = DispatchTouchEventParams::builder()
            .r#type(DispatchTouchEventType::TouchStart)
            .touch_points(vec![point])
            .build()
            .unwrap();
        page.execute(params)
            .await
            .map_err(|e| SessionError::JavaScriptError(format!("CDP touchStart failed: {}", e)))?;
        Ok(())
    }

    async fn touch_move(&self, x: f64, y: f64) -> Result<(), SessionError> {
        let page = self.page()?;
        let point = TouchPoint::builder().x(x).y(y).build().unwrap();
        let params = DispatchTouchEventParams::builder()
            .r#type(DispatchTouchEventType::TouchMove)
            .touch_points(vec![point])
            .build()
            .unwrap();
        page.execute(params)
            .await
            .map_err(|e| SessionError::JavaScriptError(format!("CDP touchMove failed: {}", e)))?;
        Ok(())
    }

    async fn touch_end(&self) -> Result<(), SessionError> {
        let page = self.page()?;
        let params = DispatchTouchEventParams::builder()
            .r#type(DispatchTouchEventType::TouchEnd)
            .touch_points(Vec::<TouchPoint>::new())
            .build()
            .unwrap();
        page.execute(params)
            .await
            .map_err(|e| SessionError::JavaScriptError(format!("CDP touchEnd failed: {}", e)))?;
        Ok(())
    }

    async fn scroll_by(&self, dy: f64) -> Result<(), SessionError> {
        self.execute_js(&format!("window.scrollBy(0, {})", dy)).await?;
        Ok(())
    }

    async fn at_bottom(&self, tolerance: f64) -> Result<bool, SessionError> {
        let value = self
            .execute_js(&format!(
                "(window.innerHeight + window.scrollY) >= (document.body.scrollHeight - {})",
                tolerance
            ))
            .await?;

        Ok(value.as_bool().unwrap_or(false))
    }
}
