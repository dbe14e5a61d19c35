//! Per-bank export flows and the orchestrator that runs them in order.
//!
//! Each bank module holds its profile (URL, selector probes, text patterns,
//! PDF layout) and one `export` function driving a [`Session`].

pub mod bbl;
pub mod bot;
pub mod exim;
pub mod kbank;
pub mod uob;

use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, TimingConfig};
use crate::export::{BusinessWindow, ExportTarget, ExtractionController, OutputResolver, PdfLayout};
use crate::retry::retry;
use crate::scraper::{ChromeSession, Probe, Session};
use crate::types::{BankCode, BankReport, ExportError, RoundOutcome, SkipReason};

/// Source of "now" for fallbacks taken mid-run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    System,
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }
}

/// Everything a bank flow needs besides the session
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub config: AppConfig,
    pub resolver: OutputResolver,
    /// Wall clock at the start of the run
    pub now: NaiveDateTime,
    pub clock: Clock,
}

impl ExportContext {
    pub fn new(config: AppConfig) -> Self {
        let resolver = OutputResolver::new(&config.output.root);
        Self {
            config,
            resolver,
            now: Local::now().naive_local(),
            clock: Clock::System,
        }
    }

    pub fn window(&self) -> &BusinessWindow {
        &self.config.window
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.config.timing
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// Wall clock at the moment of the call, not at the start of the run
    pub fn current_time(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn controller(&self) -> ExtractionController {
        ExtractionController::new(&self.config.retry, &self.config.timing)
    }

    /// Zero waits, fixed clock (2025-09-12 10:00), rooted at `root`
    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        let mut ctx = Self::new(AppConfig::for_tests(root));
        ctx.now = NaiveDate::from_ymd_opt(2025, 9, 12)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid test clock");
        ctx.clock = Clock::Fixed(ctx.now);
        ctx
    }
}

/// Navigate with backoff, then give the page its load wait
pub async fn navigate<S: Session>(session: &S, ctx: &ExportContext, url: &str) -> Result<(), ExportError> {
    let policy = ctx.config.retry.navigation();
    retry(&policy, url, || session.goto(url)).await?;
    sleep(ctx.timing().page_load_wait()).await;
    Ok(())
}

/// Click a consent button from `buttons`, else any button showing one of
/// `accept_texts`
pub async fn dismiss_cookies<S: Session>(
    session: &S,
    buttons: &Probe,
    accept_texts: &[&str],
) -> Result<bool, ExportError> {
    if let Some(selector) = buttons.click_first(session).await? {
        debug!("Dismissed cookie popup via {}", selector);
        return Ok(true);
    }
    if session.click_text("button", accept_texts).await? {
        debug!("Dismissed cookie popup via button text");
        return Ok(true);
    }
    Ok(false)
}

/// Print the current page to `target` unless the file is already there.
///
/// The existence check runs right before printing so a file written since
/// the round started is never overwritten.
pub async fn render_if_absent<S: Session>(
    session: &S,
    ctx: &ExportContext,
    target: ExportTarget,
    layout: &PdfLayout,
) -> Result<RoundOutcome, ExportError> {
    if ctx.resolver.exists(&target) {
        return Ok(already_exists(&target));
    }

    ctx.resolver.ensure_dir(&target)?;
    sleep(ctx.timing().render_settle_wait()).await;
    session.print_pdf(layout, &target.file_path).await?;

    info!("PDF created: {}", target.file_name());
    Ok(RoundOutcome::Exported(target))
}

/// Skip outcome for an existing target, logged the same way everywhere
pub(crate) fn already_exists(target: &ExportTarget) -> RoundOutcome {
    info!("File already exists: {} - skipping", target.file_name());
    RoundOutcome::Skipped(SkipReason::AlreadyExists(target.file_path.clone()))
}

/// Outcome for a round the controller gave up on
pub(crate) fn exhausted(label: &str, checks: u32, last_error: Option<String>) -> RoundOutcome {
    match last_error {
        Some(e) => warn!("No rate data for {} after {} checks, last error: {}", label, checks, e),
        None => warn!("No rate data for {} after {} checks, skipping", label, checks),
    }
    RoundOutcome::Exhausted { attempts: checks }
}

/// Run one bank's flow on an open session
pub async fn export_bank<S: Session>(
    session: &S,
    ctx: &ExportContext,
    bank: BankCode,
) -> Result<BankReport, ExportError> {
    match bank {
        BankCode::Bbl => bbl::export(session, ctx).await,
        BankCode::Bot => bot::export(session, ctx).await,
        BankCode::Kbank => kbank::export(session, ctx).await,
        BankCode::Uob => uob::export(session, ctx).await,
        BankCode::Exim => exim::export(session, ctx).await,
    }
}

/// Launch a browser, run one bank, and close the browser again
pub async fn run_bank(ctx: &ExportContext, bank: BankCode) -> anyhow::Result<BankReport> {
    let session = ChromeSession::launch(&ctx.config.browser)
        .await
        .with_context(|| format!("Failed to start browser for {}", bank))?;

    let result = export_bank(&session, ctx, bank).await;
    session.close().await?;

    result.with_context(|| format!("{} export failed", bank.display_name()))
}

/// Result of a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<BankReport>,
    pub failures: Vec<(BankCode, String)>,
}

impl RunSummary {
    pub fn record(&mut self, bank: BankCode, result: anyhow::Result<BankReport>) {
        match result {
            Ok(report) => {
                info!(
                    "{} export completed: {} exported, {} skipped, {} failed",
                    bank.display_name(),
                    report.exported(),
                    report.skipped(),
                    report.failed()
                );
                self.reports.push(report);
            }
            Err(e) => {
                error!("{:#}", e);
                self.failures.push((bank, format!("{:#}", e)));
            }
        }
    }

    /// True when banks were run and every one failed at the top level
    pub fn all_failed(&self) -> bool {
        self.reports.is_empty() && !self.failures.is_empty()
    }

    pub fn exported(&self) -> usize {
        self.reports.iter().map(BankReport::exported).sum()
    }
}

/// Run every bank in `banks` sequentially; one bank failing never stops
/// the others
pub async fn run_all(ctx: &ExportContext, banks: &[BankCode]) -> RunSummary {
    info!("Starting exchange rate export for {} bank(s)", banks.len());
    let mut summary = RunSummary::default();

    for &bank in banks {
        info!("Starting {} export", bank.display_name());
        summary.record(bank, run_bank(ctx, bank).await);
    }

    info!(
        "All exports completed: {} PDF(s) created, {} bank(s) failed",
        summary.exported(),
        summary.failures.len()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::session::fake::FakeSession;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_render_if_absent_writes_then_skips() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let session = FakeSession::new("<html></html>");
        let target = ctx.resolver.resolve(BankCode::Exim, ctx.today(), 1);

        let first = render_if_absent(&session, &ctx, target.clone(), &PdfLayout::a4())
            .await
            .unwrap();
        assert!(first.is_exported());
        assert!(target.file_path.exists());

        let second = render_if_absent(&session, &ctx, target.clone(), &PdfLayout::a4())
            .await
            .unwrap();
        assert!(second.is_skipped());
        assert_eq!(session.state().printed.len(), 1);
    }

    #[tokio::test]
    async fn test_render_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let session = FakeSession::new("<html></html>").failing_print();
        let target = ctx.resolver.resolve(BankCode::Uob, ctx.today(), 2);

        let err = render_if_absent(&session, &ctx, target.clone(), &PdfLayout::a4())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
        assert!(!target.file_path.exists());
    }

    #[tokio::test]
    async fn test_dismiss_cookies_falls_back_to_text() {
        const BUTTONS: Probe = Probe::new("cookie buttons", &["#c-p-bn", "#c-cancel-bn"]);

        let by_id = FakeSession::new(r#"<button id="c-cancel-bn">x</button>"#);
        assert!(dismiss_cookies(&by_id, &BUTTONS, &["ยอมรับ"]).await.unwrap());
        assert_eq!(by_id.state().clicked, vec!["#c-cancel-bn"]);

        let by_text = FakeSession::new("<button>ตกลง</button>");
        assert!(dismiss_cookies(&by_text, &BUTTONS, &["ยอมรับ", "ตกลง"]).await.unwrap());

        let none = FakeSession::new("<p>no popup</p>");
        assert!(!dismiss_cookies(&none, &BUTTONS, &["ยอมรับ"]).await.unwrap());
    }

    #[tokio::test]
    async fn test_navigate_records_visit() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let session = FakeSession::new("<html></html>");

        navigate(&session, &ctx, "https://example.test/rates").await.unwrap();
        assert_eq!(session.state().visited, vec!["https://example.test/rates"]);
    }

    #[test]
    fn test_run_summary() {
        let mut summary = RunSummary::default();
        assert!(!summary.all_failed());

        summary.record(BankCode::Bot, Err(anyhow::anyhow!("browser crashed")));
        assert!(summary.all_failed());

        let mut report = BankReport::new(BankCode::Bbl);
        report.push("09:00", RoundOutcome::Exhausted { attempts: 15 });
        summary.record(BankCode::Bbl, Ok(report));
        assert!(!summary.all_failed());
        assert_eq!(summary.failures[0].0, BankCode::Bot);
        assert_eq!(summary.exported(), 0);
    }
}
