//! Browser-session capability used by every export flow.
//!
//! One session is created per bank and passed by reference through the
//! enumerator, controller and render steps. Selectors are resolved against the
//! top document and any same-origin iframes.

use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::export::render::PdfLayout;
use crate::scraper::parsers::RawOption;
use crate::types::ExportError;

/// Browser automation operations the exporter needs
#[allow(async_fn_in_trait)]
pub trait Session {
    async fn goto(&self, url: &str) -> Result<(), ExportError>;
    async fn reload(&self) -> Result<(), ExportError>;

    /// Serialized DOM of the top document
    async fn html(&self) -> Result<String, ExportError>;
    async fn body_text(&self) -> Result<String, ExportError>;
    async fn text_of(&self, selector: &str) -> Result<Option<String>, ExportError>;
    async fn exists(&self, selector: &str) -> Result<bool, ExportError>;
    /// Poll until `selector` appears; false on timeout
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, ExportError>;
    async fn options_of(&self, selector: &str) -> Result<Vec<RawOption>, ExportError>;

    /// Set a `<select>` value and dispatch `change`; false when the select or
    /// option is missing
    async fn select_value(&self, selector: &str, value: &str) -> Result<bool, ExportError>;
    async fn click(&self, selector: &str) -> Result<bool, ExportError>;
    async fn click_nth(&self, selector: &str, index: usize) -> Result<bool, ExportError>;
    /// Click the first match whose text or value contains any needle
    /// (case-insensitive)
    async fn click_text(&self, selector: &str, needles: &[&str]) -> Result<bool, ExportError>;
    async fn remove(&self, selector: &str) -> Result<usize, ExportError>;
    async fn hide(&self, selector: &str) -> Result<usize, ExportError>;

    async fn add_style(&self, css: &str) -> Result<(), ExportError>;
    async fn set_content(&self, html: &str) -> Result<(), ExportError>;
    async fn evaluate(&self, script: &str) -> Result<Value, ExportError>;

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), ExportError>;
    /// Fail script requests whose URL matches any wildcard pattern; other
    /// resource types load normally
    async fn block_urls(&self, patterns: &[&str]) -> Result<(), ExportError>;
    async fn set_download_dir(&self, dir: &Path) -> Result<(), ExportError>;
    async fn print_pdf(&self, layout: &PdfLayout, path: &Path) -> Result<(), ExportError>;
}

/// Ordered fallback selectors, tried until one succeeds
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
}

impl Probe {
    pub const fn new(name: &'static str, selectors: &'static [&'static str]) -> Self {
        Self { name, selectors }
    }

    /// First selector present on the page
    pub async fn resolve<S: Session>(&self, session: &S) -> Result<Option<&'static str>, ExportError> {
        for &selector in self.selectors {
            if session.exists(selector).await? {
                debug!("{}: matched {}", self.name, selector);
                return Ok(Some(selector));
            }
        }
        debug!("{}: no selector matched", self.name);
        Ok(None)
    }

    /// Select `value` on the first selector that accepts it
    pub async fn select<S: Session>(
        &self,
        session: &S,
        value: &str,
    ) -> Result<Option<&'static str>, ExportError> {
        for &selector in self.selectors {
            if session.select_value(selector, value).await? {
                return Ok(Some(selector));
            }
        }
        Ok(None)
    }

    pub async fn options<S: Session>(&self, session: &S) -> Result<Vec<RawOption>, ExportError> {
        match self.resolve(session).await? {
            Some(selector) => session.options_of(selector).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn click_first<S: Session>(&self, session: &S) -> Result<Option<&'static str>, ExportError> {
        for &selector in self.selectors {
            if session.click(selector).await? {
                return Ok(Some(selector));
            }
        }
        Ok(None)
    }

    /// First non-empty element text
    pub async fn text<S: Session>(&self, session: &S) -> Result<Option<String>, ExportError> {
        for &selector in self.selectors {
            if let Some(text) = session.text_of(selector).await? {
                if !text.trim().is_empty() {
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }

    /// Remove every element matched by any selector
    pub async fn remove_all<S: Session>(&self, session: &S) -> Result<usize, ExportError> {
        let mut removed = 0;
        for &selector in self.selectors {
            removed += session.remove(selector).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted in-memory session backed by `scraper`.

    use super::*;
    use scraper::{Html, Selector};
    use std::collections::{HashMap, VecDeque};
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard};

    #[derive(Debug, Default)]
    pub struct FakeState {
        pub base: String,
        pub current: String,
        /// Pages served by successive goto/reload calls, then `base`
        pub loads: VecDeque<String>,
        /// Page shown after selecting a value
        pub on_select: HashMap<String, VecDeque<String>>,
        /// Files dropped into the download dir when a click key fires
        pub on_click: HashMap<String, Vec<String>>,
        pub select_failures: u32,
        pub fail_print: bool,

        pub visited: Vec<String>,
        pub reloads: u32,
        pub selected: Vec<String>,
        pub clicked: Vec<String>,
        pub styles: Vec<String>,
        pub contents: Vec<String>,
        pub evaluated: Vec<String>,
        pub printed: Vec<PathBuf>,
        pub layouts: Vec<PdfLayout>,
        pub blocked: Vec<String>,
        pub user_agent: Option<String>,
        pub download_dir: Option<PathBuf>,
    }

    pub struct FakeSession {
        state: Mutex<FakeState>,
    }

    fn selector(s: &str) -> Result<Selector, ExportError> {
        Selector::parse(s).map_err(|e| ExportError::Browser(format!("bad selector {}: {:?}", s, e)))
    }

    fn clean(text: String) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    impl FakeSession {
        pub fn new(base: &str) -> Self {
            Self {
                state: Mutex::new(FakeState {
                    base: base.to_string(),
                    current: base.to_string(),
                    ..Default::default()
                }),
            }
        }

        pub fn with_loads(self, pages: &[&str]) -> Self {
            self.state().loads = pages.iter().map(|p| p.to_string()).collect();
            self
        }

        pub fn on_select(self, value: &str, pages: &[&str]) -> Self {
            self.state()
                .on_select
                .insert(value.to_string(), pages.iter().map(|p| p.to_string()).collect());
            self
        }

        pub fn on_click(self, key: &str, files: &[&str]) -> Self {
            self.state()
                .on_click
                .insert(key.to_string(), files.iter().map(|f| f.to_string()).collect());
            self
        }

        pub fn failing_selects(self, n: u32) -> Self {
            self.state().select_failures = n;
            self
        }

        pub fn failing_print(self) -> Self {
            self.state().fail_print = true;
            self
        }

        pub fn state(&self) -> MutexGuard<'_, FakeState> {
            self.state.lock().unwrap()
        }

        fn load_next(&self) {
            let mut state = self.state();
            let next = match state.loads.pop_front() {
                Some(page) => page,
                None => state.base.clone(),
            };
            state.current = next;
        }

        fn count(&self, sel: &str) -> Result<usize, ExportError> {
            let sel = selector(sel)?;
            let doc = Html::parse_document(&self.state().current);
            let n = doc.select(&sel).count();
            Ok(n)
        }

        fn fire_click(&self, key: &str) {
            let mut state = self.state();
            state.clicked.push(key.to_string());
            let files = state.on_click.get(key).cloned().unwrap_or_default();
            if let Some(dir) = state.download_dir.clone() {
                for file in files {
                    std::fs::write(dir.join(file), b"%PDF-1.4 download").unwrap();
                }
            }
        }
    }

    impl Session for FakeSession {
        async fn goto(&self, url: &str) -> Result<(), ExportError> {
            self.state().visited.push(url.to_string());
            self.load_next();
            Ok(())
        }

        async fn reload(&self) -> Result<(), ExportError> {
            self.state().reloads += 1;
            self.load_next();
            Ok(())
        }

        async fn html(&self) -> Result<String, ExportError> {
            Ok(self.state().current.clone())
        }

        async fn body_text(&self) -> Result<String, ExportError> {
            let doc = Html::parse_document(&self.state().current);
            Ok(doc.root_element().text().collect::<Vec<_>>().join(" "))
        }

        async fn text_of(&self, sel: &str) -> Result<Option<String>, ExportError> {
            let sel = selector(sel)?;
            let doc = Html::parse_document(&self.state().current);
            let text = doc
                .select(&sel)
                .next()
                .map(|el| clean(el.text().collect::<Vec<_>>().join(" ")));
            Ok(text)
        }

        async fn exists(&self, sel: &str) -> Result<bool, ExportError> {
            Ok(self.count(sel)? > 0)
        }

        async fn wait_for(&self, sel: &str, _timeout: Duration) -> Result<bool, ExportError> {
            Ok(self.count(sel)? > 0)
        }

        async fn options_of(&self, sel: &str) -> Result<Vec<RawOption>, ExportError> {
            let sel = selector(sel)?;
            let opt = selector("option")?;
            let doc = Html::parse_document(&self.state().current);
            let options = doc
                .select(&sel)
                .next()
                .map(|select| {
                    select
                        .select(&opt)
                        .map(|o| {
                            RawOption::new(
                                o.value().attr("value").unwrap_or_default().trim(),
                                clean(o.text().collect()),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(options)
        }

        async fn select_value(&self, sel: &str, value: &str) -> Result<bool, ExportError> {
            let sel = selector(sel)?;
            let opt = selector("option")?;
            let mut state = self.state();
            if state.select_failures > 0 {
                state.select_failures -= 1;
                return Ok(false);
            }

            let has_option = {
                let doc = Html::parse_document(&state.current);
                let found = doc
                    .select(&sel)
                    .next()
                    .map(|s| s.select(&opt).any(|o| o.value().attr("value") == Some(value)))
                    .unwrap_or(false);
                found
            };
            if !has_option {
                return Ok(false);
            }

            state.selected.push(value.to_string());
            let next = state.on_select.get_mut(value).and_then(|q| q.pop_front());
            if let Some(page) = next {
                state.current = page;
            }
            Ok(true)
        }

        async fn click(&self, sel: &str) -> Result<bool, ExportError> {
            if self.count(sel)? == 0 {
                return Ok(false);
            }
            self.fire_click(sel);
            Ok(true)
        }

        async fn click_nth(&self, sel: &str, index: usize) -> Result<bool, ExportError> {
            if self.count(sel)? <= index {
                return Ok(false);
            }
            self.fire_click(&format!("{}[{}]", sel, index));
            Ok(true)
        }

        async fn click_text(&self, sel: &str, needles: &[&str]) -> Result<bool, ExportError> {
            let parsed = selector(sel)?;
            let hit = {
                let doc = Html::parse_document(&self.state().current);
                let found = doc.select(&parsed).any(|el| {
                    let text = el.text().collect::<String>().to_lowercase();
                    let value = el.value().attr("value").unwrap_or_default().to_lowercase();
                    needles.iter().any(|n| {
                        let n = n.to_lowercase();
                        text.contains(&n) || value.contains(&n)
                    })
                });
                found
            };
            if hit {
                self.fire_click(&format!("{}:text", sel));
            }
            Ok(hit)
        }

        async fn remove(&self, sel: &str) -> Result<usize, ExportError> {
            self.count(sel)
        }

        async fn hide(&self, sel: &str) -> Result<usize, ExportError> {
            self.count(sel)
        }

        async fn add_style(&self, css: &str) -> Result<(), ExportError> {
            self.state().styles.push(css.to_string());
            Ok(())
        }

        async fn set_content(&self, html: &str) -> Result<(), ExportError> {
            let mut state = self.state();
            state.contents.push(html.to_string());
            state.current = html.to_string();
            Ok(())
        }

        async fn evaluate(&self, script: &str) -> Result<Value, ExportError> {
            self.state().evaluated.push(script.to_string());
            Ok(Value::Null)
        }

        async fn set_user_agent(&self, user_agent: &str) -> Result<(), ExportError> {
            self.state().user_agent = Some(user_agent.to_string());
            Ok(())
        }

        async fn block_urls(&self, patterns: &[&str]) -> Result<(), ExportError> {
            self.state().blocked = patterns.iter().map(|p| p.to_string()).collect();
            Ok(())
        }

        async fn set_download_dir(&self, dir: &Path) -> Result<(), ExportError> {
            self.state().download_dir = Some(dir.to_path_buf());
            Ok(())
        }

        async fn print_pdf(&self, layout: &PdfLayout, path: &Path) -> Result<(), ExportError> {
            let mut state = self.state();
            if state.fail_print {
                return Err(ExportError::Render("printToPDF failed".into()));
            }
            std::fs::write(path, b"%PDF-1.4 fake")?;
            state.printed.push(path.to_path_buf());
            state.layouts.push(layout.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeSession;
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="dynamic-select"><select name="time_slot">
            <option value="">เลือก</option>
            <option value="a">08:30</option>
          </select></div>
          <button class="accept">ยอมรับทั้งหมด</button>
          <p id="stamp">  วันที่ 12 กันยายน 2568  </p>
        </body></html>
    "#;

    const DROPDOWN: Probe = Probe::new(
        "time dropdown",
        &[".select-time-exchange.dynamic-select select", "select[name*=\"time\"]", "select"],
    );

    #[tokio::test]
    async fn test_probe_resolves_first_present() {
        let session = FakeSession::new(PAGE);
        assert_eq!(DROPDOWN.resolve(&session).await.unwrap(), Some("select[name*=\"time\"]"));

        let missing = Probe::new("missing", &["#nope", ".nope"]);
        assert_eq!(missing.resolve(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_probe_select_and_options() {
        let session = FakeSession::new(PAGE);
        let options = DROPDOWN.options(&session).await.unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[1], RawOption::new("a", "08:30"));

        assert!(DROPDOWN.select(&session, "a").await.unwrap().is_some());
        assert!(DROPDOWN.select(&session, "zzz").await.unwrap().is_none());
        assert_eq!(session.state().selected, vec!["a"]);
    }

    #[tokio::test]
    async fn test_probe_text() {
        let session = FakeSession::new(PAGE);
        let stamp = Probe::new("stamp", &["#ModDate", "#stamp"]);
        assert_eq!(
            stamp.text(&session).await.unwrap().as_deref(),
            Some("วันที่ 12 กันยายน 2568")
        );
    }

    #[tokio::test]
    async fn test_click_text_case_insensitive() {
        let session = FakeSession::new(PAGE);
        assert!(session.click_text("button", &["ยอมรับ"]).await.unwrap());
        assert!(!session.click_text("button", &["decline"]).await.unwrap());
    }
}
