//! Kasikornbank: the current publication, printed from the live page.

use tracing::{debug, info, warn};

use super::{exhausted, navigate, render_if_absent, ExportContext};
use crate::export::{Margins, PdfLayout, Readiness, RoundDriver};
use crate::scraper::parsers::thai_date::{self, BODY_TEXT_PATTERNS, KBANK_ELEMENT_PATTERNS};
use crate::scraper::parsers::{PublicationInfo, RateTableParser};
use crate::scraper::{Probe, Session, KBANK_URL};
use crate::types::{BankCode, BankReport, ExportError, RoundOutcome, SkipReason};

/// Analytics and consent scripts that keep the page busy or cover the table
const BLOCKED_URLS: [&str; 8] = [
    "*google-analytics*",
    "*googletagmanager*",
    "*facebook*",
    "*hotjar*",
    "*cookie*",
    "*consent*",
    "*analytics*",
    "*tracking*",
];

const COOKIE_BANNERS: Probe = Probe::new(
    "K-BANK cookie banners",
    &[
        "[data-testid=\"cookie-banner\"]",
        ".cookie-consent",
        ".cookie-banner",
        ".cookie-popup",
        ".cookies-popup",
        ".gdpr-popup",
        ".consent-banner",
        "#cookie-consent",
        "#cookieConsent",
        ".modal-backdrop",
        ".cookie-overlay",
        "[class*=\"cookie\"]",
        "[id*=\"cookie\"]",
        "button[aria-label*=\"cookie\"]",
        "button[aria-label*=\"ยอมรับ\"]",
        "button[aria-label*=\"accept\"]",
    ],
);

const ACCEPT_TEXTS: [&str; 3] = ["ยอมรับ", "accept", "อนุญาต"];

const DATE_ELEMENT: Probe = Probe::new("K-BANK date element", &["#ModDate", ".date-data"]);

const PRINT_CSS: &str = r#"
header, nav, footer, .navbar, .menu, .sidebar, .advertisement, .ads { display: none !important; }
body { margin: 0; padding: 10px; }
.container { max-width: 100%; }
table, td, th { font-size: 18px !important; }
td { padding: 12px !important; }
th { padding: 14px !important; font-weight: bold !important; }
@media print {
  @page { margin-top: 50px; margin-bottom: 30px; }
  @page:first { margin-top: 10px; }
  table, td, th { font-size: 18px !important; }
}
"#;

async fn clear_cookie_banners<S: Session>(session: &S) -> Result<(), ExportError> {
    let removed = COOKIE_BANNERS.remove_all(session).await?;
    if removed > 0 {
        debug!("Removed {} cookie elements", removed);
    }
    if session.click_text("button", &ACCEPT_TEXTS).await? {
        debug!("Clicked cookie accept button");
    }
    Ok(())
}

/// The page always shows the latest round, so there is nothing to select
struct LatestRates;

impl RoundDriver for LatestRates {
    async fn select<S: Session>(&self, _session: &S) -> Result<(), ExportError> {
        Ok(())
    }

    async fn is_ready<S: Session>(&self, session: &S) -> Result<bool, ExportError> {
        let html = session.html().await?;
        Ok(RateTableParser::has_rate_rows(&html, "table"))
    }

    async fn refresh<S: Session>(&self, session: &S) -> Result<(), ExportError> {
        session.reload().await?;
        clear_cookie_banners(session).await
    }
}

/// Publication stamp from `#ModDate`/`.date-data`, else from the body text
pub async fn read_publication<S: Session>(session: &S) -> Result<PublicationInfo, ExportError> {
    let info = match DATE_ELEMENT.text(session).await? {
        Some(text) => {
            debug!("Date element text: {}", text);
            thai_date::parse(&text, &KBANK_ELEMENT_PATTERNS)?
        }
        None => {
            debug!("Date element not found, searching body text");
            let body = session.body_text().await?;
            thai_date::parse(&body, &BODY_TEXT_PATTERNS)?
        }
    };
    Ok(info)
}

fn layout(generated_at: &str) -> PdfLayout {
    PdfLayout::a4()
        .margins(Margins::new(50.0, 20.0, 200.0, 20.0))
        .header(
            "<div style=\"font-size: 10px; text-align: center; width: 100%; margin: 0 20px;\">\
             <span>Kasikorn Bank - Foreign Exchange Rates</span></div>",
        )
        .footer(format!(
            "<div style=\"font-size: 10px; text-align: center; width: 100%; margin: 0 20px;\">\
             <span>Generated on {} | Page <span class=\"pageNumber\"></span> of <span class=\"totalPages\"></span></span></div>",
            generated_at
        ))
}

async fn export_current<S: Session>(session: &S, ctx: &ExportContext) -> Result<RoundOutcome, ExportError> {
    let run = ctx.controller().run(session, &LatestRates, "k-bank").await;
    debug!("k-bank: {}", run.describe());
    if let Readiness::Exhausted { checks, last_error } = run.readiness {
        return Ok(exhausted("k-bank", checks, last_error));
    }

    session.add_style(PRINT_CSS).await?;

    let info = read_publication(session).await?;
    info!(
        "Publication {} {} (round {:?})",
        info.iso_date(),
        info.canonical_time(),
        info.round_index
    );

    if !ctx.window().is_eligible(&info.canonical_time()) {
        info!(
            "Time {} is outside business hours ({}), skipping export",
            info.canonical_time(),
            ctx.window().describe()
        );
        return Ok(RoundOutcome::Skipped(SkipReason::OutsideWindow(info.canonical_time())));
    }

    let target = match info.round_index {
        Some(round) => ctx.resolver.resolve(BankCode::Kbank, info.date, round),
        None => ctx.resolver.resolve_next(BankCode::Kbank, info.date)?,
    };

    let generated_at = ctx.current_time().format("%d/%m/%Y %H:%M:%S").to_string();
    render_if_absent(session, ctx, target, &layout(&generated_at)).await
}

/// Export the publication currently on the page
pub async fn export<S: Session>(session: &S, ctx: &ExportContext) -> Result<BankReport, ExportError> {
    let mut report = BankReport::new(BankCode::Kbank);

    session.set_user_agent(&ctx.config.browser.user_agent).await?;
    session.block_urls(&BLOCKED_URLS).await?;
    navigate(session, ctx, KBANK_URL).await?;
    clear_cookie_banners(session).await?;

    let outcome = export_current(session, ctx).await.unwrap_or_else(|e| {
        warn!("K-BANK export failed: {}", e);
        RoundOutcome::Failed(e)
    });
    report.push("latest", outcome);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use crate::scraper::session::fake::FakeSession;

    fn page(stamp: &str) -> String {
        format!(
            r#"<html><body>
              <div class="cookie-banner">cookies</div>
              <span id="ModDate">{}</span>
              <table>
                <tr><th>Currency</th><th>Buying</th></tr>
                <tr><td>USD</td><td>32.10</td></tr>
              </table>
            </body></html>"#,
            stamp
        )
    }

    const LOADING: &str = "<html><body><table><tr><td>-</td></tr></table></body></html>";

    #[tokio::test]
    async fn test_export_named_by_round() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let html = page("12 กันยายน 2568 เวลา 13:10:38 รอบที่ 7");
        let session = FakeSession::new(&html);

        let report = export(&session, &ctx).await.unwrap();

        assert_eq!(report.exported(), 1);
        assert!(tmp.path().join("K-BANK/2025/September/k-bank 2025-09-12 #7.pdf").exists());
        let state = session.state();
        assert_eq!(state.blocked.len(), 8);
        assert!(state.user_agent.is_some());
        assert_eq!(state.styles.len(), 1);
        assert_eq!(state.layouts[0].margins, Margins::new(50.0, 20.0, 200.0, 20.0));
    }

    #[tokio::test]
    async fn test_export_without_round_uses_next_sequence() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let dir = tmp.path().join("K-BANK/2025/September");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("k-bank 2025-09-12 #1.pdf"), b"x").unwrap();
        fs::write(dir.join("k-bank 2025-09-12 #2.pdf"), b"x").unwrap();

        let html = page("12 กันยายน 2568 13:10:38");
        let session = FakeSession::new(&html);
        let report = export(&session, &ctx).await.unwrap();

        assert_eq!(report.exported(), 1);
        assert!(dir.join("k-bank 2025-09-12 #3.pdf").exists());
    }

    #[tokio::test]
    async fn test_outside_window_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let html = page("12 กันยายน 2568 เวลา 16:01:00 รอบที่ 9");
        let session = FakeSession::new(&html);

        let report = export(&session, &ctx).await.unwrap();

        assert!(matches!(
            &report.outcomes[0].1,
            RoundOutcome::Skipped(SkipReason::OutsideWindow(t)) if t == "16:01"
        ));
        assert!(session.state().printed.is_empty());
    }

    #[tokio::test]
    async fn test_existing_round_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let dir = tmp.path().join("K-BANK/2025/September");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("k-bank 2025-09-12 #7.pdf"), b"x").unwrap();

        let html = page("12 กันยายน 2568 เวลา 13:10:38 รอบที่ 7");
        let session = FakeSession::new(&html);
        let report = export(&session, &ctx).await.unwrap();

        assert_eq!(report.skipped(), 1);
        assert!(session.state().printed.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_stamp_fails() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let html = page("กำลังโหลด");
        let session = FakeSession::new(&html);

        let report = export(&session, &ctx).await.unwrap();
        assert!(matches!(
            report.outcomes[0].1,
            RoundOutcome::Failed(ExportError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_body_text_fallback_after_refresh() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let ready = r#"<html><body>
            <p>วันที่ 12 กันยายน 2568 เวลา 09:15:00 รอบที่ 2</p>
            <table><tr><td>USD</td><td>32.10</td></tr></table>
        </body></html>"#;
        let session = FakeSession::new(ready).with_loads(&[LOADING]);

        let report = export(&session, &ctx).await.unwrap();

        assert_eq!(report.exported(), 1);
        assert_eq!(session.state().reloads, 1);
        assert!(tmp.path().join("K-BANK/2025/September/k-bank 2025-09-12 #2.pdf").exists());
    }
}
