//! Browser automation using chromiumoxide.

use chromiumoxide::browser::{Browser as ChromeBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams as FetchEnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::BrowserSettings;
use crate::export::render::PdfLayout;
use crate::scraper::parsers::RawOption;
use crate::scraper::session::Session;
use crate::types::ExportError;

/// Resolves selectors across the top document and same-origin iframes
const DOM_PRELUDE: &str = r#"
const __roots = () => {
    const out = [document];
    for (const frame of document.querySelectorAll('iframe')) {
        try { if (frame.contentDocument) out.push(frame.contentDocument); } catch (e) {}
    }
    return out;
};
const __all = (sel) => __roots().flatMap((d) => Array.from(d.querySelectorAll(sel)));
"#;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JSON-encode a string for embedding in a script
fn js_str(s: &str) -> String {
    Value::from(s).to_string()
}

/// Fetch patterns pausing only script requests that match `urls`
fn script_patterns(urls: &[&str]) -> Vec<RequestPattern> {
    urls.iter()
        .map(|url| RequestPattern {
            url_pattern: Some(url.to_string()),
            resource_type: Some(ResourceType::Script),
            request_stage: Some(RequestStage::Request),
        })
        .collect()
}

fn browser_err(e: impl std::fmt::Display) -> ExportError {
    ExportError::Browser(e.to_string())
}

fn default_chrome_path() -> &'static str {
    if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else if cfg!(target_os = "windows") {
        "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"
    } else {
        "google-chrome"
    }
}

/// One Chrome instance with a single working tab
pub struct ChromeSession {
    browser: ChromeBrowser,
    page: Page,
    handle: JoinHandle<()>,
    /// Request interceptors installed by `block_urls`
    interceptors: Mutex<Vec<JoinHandle<()>>>,
    navigation_timeout: Duration,
}

impl ChromeSession {
    /// Launch a browser instance and open a blank tab
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, ExportError> {
        let chrome_path = settings
            .chrome_executable
            .clone()
            .unwrap_or_else(|| default_chrome_path().to_string());
        let navigation_timeout = Duration::from_millis(settings.navigation_timeout_ms);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .no_sandbox()
            .disable_default_args()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--mute-audio")
            .request_timeout(navigation_timeout)
            .window_size(settings.viewport_width, settings.viewport_height);
        builder = if settings.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };

        let config = builder
            .build()
            .map_err(|e| ExportError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = ChromeBrowser::launch(config)
            .await
            .map_err(|e| ExportError::Browser(format!("Failed to launch browser: {}", e)))?;

        // Handler must keep running for the browser to work
        let handle = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => continue,
                    None => break,
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ExportError::Browser(format!("Failed to create new page: {}", e)))?;

        Ok(Self {
            browser,
            page,
            handle,
            interceptors: Mutex::new(Vec::new()),
            navigation_timeout,
        })
    }

    /// Run `body` inside a function scope with the DOM helpers in place
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T, ExportError> {
        let script = format!("(() => {{ {} {} }})()", DOM_PRELUDE, body);
        let result = self.page.evaluate(script).await.map_err(browser_err)?;
        result.into_value::<T>().map_err(browser_err)
    }

    /// Close the browser
    pub async fn close(mut self) -> Result<(), ExportError> {
        let _ = self.browser.close().await;
        if let Ok(interceptors) = self.interceptors.get_mut() {
            interceptors.drain(..).for_each(|task| task.abort());
        }
        self.handle.abort();
        Ok(())
    }
}

impl Session for ChromeSession {
    async fn goto(&self, url: &str) -> Result<(), ExportError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ExportError::Navigation(format!("{}: {}", url, e))),
            Err(_) => Err(ExportError::Navigation(format!("{}: timed out", url))),
        }
    }

    async fn reload(&self) -> Result<(), ExportError> {
        match tokio::time::timeout(self.navigation_timeout, self.page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ExportError::Navigation(format!("reload: {}", e))),
            Err(_) => Err(ExportError::Navigation("reload: timed out".into())),
        }
    }

    async fn html(&self) -> Result<String, ExportError> {
        self.page.content().await.map_err(browser_err)
    }

    async fn body_text(&self) -> Result<String, ExportError> {
        self.eval("return __roots().map((d) => (d.body ? d.body.innerText : '')).join('\\n');")
            .await
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, ExportError> {
        self.eval(&format!(
            "const el = __all({}).find((e) => (e.innerText || e.textContent || '').trim());
             return el ? (el.innerText || el.textContent).trim() : null;",
            js_str(selector)
        ))
        .await
    }

    async fn exists(&self, selector: &str) -> Result<bool, ExportError> {
        self.eval(&format!("return __all({}).length > 0;", js_str(selector)))
            .await
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, ExportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.exists(selector).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("Timed out waiting for {}", selector);
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn options_of(&self, selector: &str) -> Result<Vec<RawOption>, ExportError> {
        let pairs: Vec<(String, String)> = self
            .eval(&format!(
                "const s = __all({})[0];
                 if (!s || !s.options) return [];
                 return Array.from(s.options).map((o) => [(o.value || '').trim(), (o.text || '').trim()]);",
                js_str(selector)
            ))
            .await?;
        Ok(pairs
            .into_iter()
            .map(|(value, label)| RawOption::new(value, label))
            .collect())
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<bool, ExportError> {
        self.eval(&format!(
            "const s = __all({sel})[0];
             const v = {val};
             if (!s || !Array.from(s.options || []).some((o) => o.value === v)) return false;
             s.value = v;
             s.dispatchEvent(new Event('change', {{ bubbles: true }}));
             return true;",
            sel = js_str(selector),
            val = js_str(value)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> Result<bool, ExportError> {
        self.click_nth(selector, 0).await
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<bool, ExportError> {
        self.eval(&format!(
            "const el = __all({})[{}];
             if (!el) return false;
             el.click();
             return true;",
            js_str(selector),
            index
        ))
        .await
    }

    async fn click_text(&self, selector: &str, needles: &[&str]) -> Result<bool, ExportError> {
        let needles = Value::from(needles.to_vec()).to_string();
        self.eval(&format!(
            "const needles = {}.map((n) => n.toLowerCase());
             const el = __all({}).find((e) => {{
                 const t = ((e.innerText || e.textContent || '') + ' ' + (e.value || '')).toLowerCase();
                 return needles.some((n) => t.includes(n));
             }});
             if (!el) return false;
             el.click();
             return true;",
            needles,
            js_str(selector)
        ))
        .await
    }

    async fn remove(&self, selector: &str) -> Result<usize, ExportError> {
        self.eval(&format!(
            "const els = __all({});
             els.forEach((e) => e.remove());
             return els.length;",
            js_str(selector)
        ))
        .await
    }

    async fn hide(&self, selector: &str) -> Result<usize, ExportError> {
        self.eval(&format!(
            "const els = __all({});
             els.forEach((e) => e.style.setProperty('display', 'none', 'important'));
             return els.length;",
            js_str(selector)
        ))
        .await
    }

    async fn add_style(&self, css: &str) -> Result<(), ExportError> {
        let _: bool = self
            .eval(&format!(
                "const st = document.createElement('style');
                 st.textContent = {};
                 (document.head || document.documentElement).appendChild(st);
                 return true;",
                js_str(css)
            ))
            .await?;
        Ok(())
    }

    async fn set_content(&self, html: &str) -> Result<(), ExportError> {
        self.page.set_content(html).await.map_err(browser_err)?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ExportError> {
        let result = self.page.evaluate(script).await.map_err(browser_err)?;
        Ok(result.into_value::<Value>().unwrap_or_default())
    }

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), ExportError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn block_urls(&self, patterns: &[&str]) -> Result<(), ExportError> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(browser_err)?;

        self.page
            .execute(FetchEnableParams {
                patterns: Some(script_patterns(patterns)),
                handle_auth_requests: None,
            })
            .await
            .map_err(browser_err)?;

        // Only matching script requests are paused, so every one is failed
        let page = self.page.clone();
        let interceptor = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                debug!("Blocked script {}", event.request.url);
                let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(e) = page.execute(fail).await {
                    debug!("Could not block {}: {}", event.request.url, e);
                }
            }
        });

        match self.interceptors.lock() {
            Ok(mut interceptors) => interceptors.push(interceptor),
            Err(_) => warn!("Interceptor list poisoned; blocker runs until the browser closes"),
        }
        Ok(())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<(), ExportError> {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().into_owned())
            .build()
            .map_err(browser_err)?;
        self.browser.execute(params).await.map_err(browser_err)?;
        Ok(())
    }

    async fn print_pdf(&self, layout: &PdfLayout, path: &Path) -> Result<(), ExportError> {
        let (top, right, bottom, left) = layout.margins.inches();
        let show_header_footer = layout.displays_header_footer();
        let params = PrintToPdfParams {
            print_background: Some(layout.print_background),
            paper_width: Some(layout.paper_width_in),
            paper_height: Some(layout.paper_height_in),
            margin_top: Some(top),
            margin_right: Some(right),
            margin_bottom: Some(bottom),
            margin_left: Some(left),
            display_header_footer: Some(show_header_footer),
            header_template: show_header_footer
                .then(|| layout.header_template.clone().unwrap_or_else(|| "<span></span>".into())),
            footer_template: show_header_footer
                .then(|| layout.footer_template.clone().unwrap_or_else(|| "<span></span>".into())),
            ..Default::default()
        };
        self.page
            .save_pdf(params, path)
            .await
            .map_err(|e| ExportError::Render(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_targets_scripts_only() {
        let patterns = script_patterns(&["*analytics*", "*cookie*"]);

        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].url_pattern.as_deref(), Some("*analytics*"));
        assert!(patterns
            .iter()
            .all(|p| p.resource_type == Some(ResourceType::Script)
                && p.request_stage == Some(RequestStage::Request)));
    }

    #[test]
    fn test_js_str_escapes() {
        assert_eq!(js_str("select[name=\"a\"]"), "\"select[name=\\\"a\\\"]\"");
    }
}
