//! EXIM Thailand: time-labelled rounds behind a search button, page printed
//! as-is. The rate widget may live in a same-origin iframe.

use chrono::NaiveDate;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{already_exists, dismiss_cookies, exhausted, navigate, render_if_absent, ExportContext};
use crate::export::{ExtractionController, Margins, PdfLayout, Readiness, RoundDriver};
use crate::scraper::parsers::thai_date::{self, DATE_ONLY_PATTERNS};
use crate::scraper::parsers::{enumerate, RateTableParser, RoundOption};
use crate::scraper::{Probe, Session, EXIM_URL};
use crate::types::{BankCode, BankReport, ExportError, RoundOutcome};

const COOKIE_BUTTONS: Probe = Probe::new("EXIM cookie buttons", &["#c-p-bn", "#c-cancel-bn"]);
const ACCEPT_TEXTS: [&str; 3] = ["ยอมรับ", "Accept", "ตกลง"];

const ROUND_SELECT: Probe = Probe::new(
    "EXIM round dropdown",
    &[
        "#p_lt_ctl02_pageplaceholder_p_lt_ctl01_WebPartZone_WebPartZone_zone_Custom_EximExchangeRate_DropDownList1",
        "select[id*=\"DropDownList1\"]",
        "select[name*=\"DropDownList1\"]",
    ],
);

const DATE_LABEL: Probe = Probe::new(
    "EXIM date label",
    &["#p_lt_ctl02_pageplaceholder_p_lt_ctl01_WebPartZone_WebPartZone_zone_Custom_EximExchangeRate_datetime"],
);

const SEARCH_BUTTON: &str = "#btnSearch";
const SEARCH_CONTROLS: &str = "button, input[type=\"submit\"], input[type=\"button\"]";
const PRINT_BUTTON: &str = "#btnPrint";
const PRINT_CONTROLS: &str = "button, input[type=\"button\"], a";
const RATE_MARKERS: [&str; 3] = ["ซื้อ", "ขาย", "อัตรา"];

const DROPDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// 1cm at 96 dpi
const MARGIN_PX: f64 = 37.8;

struct EximRound<'a> {
    option: &'a RoundOption,
}

impl RoundDriver for EximRound<'_> {
    async fn select<S: Session>(&self, session: &S) -> Result<(), ExportError> {
        if ROUND_SELECT.select(session, &self.option.value).await?.is_none() {
            return Err(ExportError::Selection(format!(
                "round {} not selectable",
                self.option.raw_label
            )));
        }

        let searched = session.click(SEARCH_BUTTON).await?
            || session.click_text(SEARCH_CONTROLS, &["ค้นหา"]).await?;
        if !searched {
            debug!("No search button, relying on the change event");
        }
        Ok(())
    }

    async fn is_ready<S: Session>(&self, session: &S) -> Result<bool, ExportError> {
        let has_print = session.exists(PRINT_BUTTON).await?
            || RateTableParser::has_control_with_text(
                &session.html().await?,
                PRINT_CONTROLS,
                &["พิมพ์", "print"],
            );
        if !has_print {
            return Ok(false);
        }
        let body = session.body_text().await?;
        Ok(RateTableParser::contains_any(&body, &RATE_MARKERS))
    }
}

/// Publication date from the date label, else the run's date
pub async fn publication_date<S: Session>(session: &S, ctx: &ExportContext) -> Result<NaiveDate, ExportError> {
    let parsed = DATE_LABEL
        .text(session)
        .await?
        .and_then(|text| thai_date::parse_date(&text, &DATE_ONLY_PATTERNS));
    Ok(match parsed {
        Some(date) => date,
        None => {
            warn!("Date label missing or unreadable, using today");
            ctx.today()
        }
    })
}

fn layout() -> PdfLayout {
    PdfLayout::a4()
        .margins(Margins::uniform(MARGIN_PX))
        .print_background(true)
}

async fn export_round<S: Session>(
    session: &S,
    ctx: &ExportContext,
    controller: &ExtractionController,
    option: &RoundOption,
    date: NaiveDate,
    index: u32,
) -> Result<RoundOutcome, ExportError> {
    let run = controller.run(session, &EximRound { option }, &option.raw_label).await;
    debug!("{}: {}", option.raw_label, run.describe());
    if let Readiness::Exhausted { checks, last_error } = run.readiness {
        return Ok(exhausted(&option.raw_label, checks, last_error));
    }

    let target = ctx.resolver.resolve(BankCode::Exim, date, index);
    render_if_absent(session, ctx, target, &layout()).await
}

/// Export every in-window round not yet on disk; file `#n` is the round's
/// position among the in-window rounds
pub async fn export<S: Session>(session: &S, ctx: &ExportContext) -> Result<BankReport, ExportError> {
    let mut report = BankReport::new(BankCode::Exim);

    navigate(session, ctx, EXIM_URL).await?;
    if !dismiss_cookies(session, &COOKIE_BUTTONS, &ACCEPT_TEXTS).await? {
        debug!("No cookie popup");
    }

    if !session.wait_for(ROUND_SELECT.selectors[0], DROPDOWN_TIMEOUT).await?
        && ROUND_SELECT.resolve(session).await?.is_none()
    {
        warn!("EXIM round dropdown not found - nothing to export");
        return Ok(report);
    }

    let options = ROUND_SELECT.options(session).await?;
    let rounds = enumerate(&options, ctx.window());
    info!(
        "Found {} rounds within business hours ({})",
        rounds.len(),
        ctx.window().describe()
    );
    if rounds.is_empty() {
        warn!("No rounds within business hours - stopping");
        return Ok(report);
    }

    let date = publication_date(session, ctx).await?;
    let controller = ctx.controller();
    let mut rendered_any = false;

    for (position, option) in rounds.iter().enumerate() {
        let index = position as u32 + 1;
        let target = ctx.resolver.resolve(BankCode::Exim, date, index);
        if ctx.resolver.exists(&target) {
            report.push(&option.raw_label, already_exists(&target));
            continue;
        }

        if rendered_any {
            sleep(ctx.timing().inter_round_wait()).await;
        }

        info!("Processing round {}: {}", index, option.raw_label);
        let outcome = export_round(session, ctx, &controller, option, date, index)
            .await
            .unwrap_or_else(|e| {
                warn!("Cannot export PDF for round {}: {}", index, e);
                RoundOutcome::Failed(e)
            });
        report.push(&option.raw_label, outcome);
        rendered_any = true;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::session::fake::FakeSession;
    use std::fs;
    use tempfile::TempDir;

    const DROPDOWN: &str = r#"
        <select id="p_lt_ctl02_pageplaceholder_p_lt_ctl01_WebPartZone_WebPartZone_zone_Custom_EximExchangeRate_DropDownList1">
          <option value="">เลือกรอบ</option>
          <option value="1">รอบที่ 1 เวลา 08:33</option>
          <option value="2">รอบที่ 2 เวลา 11:02</option>
          <option value="3">รอบที่ 3 เวลา 16:45</option>
        </select>
        <span id="p_lt_ctl02_pageplaceholder_p_lt_ctl01_WebPartZone_WebPartZone_zone_Custom_EximExchangeRate_datetime">11 กันยายน 2568</span>
        <input type="button" id="btnSearch" value="ค้นหา">
    "#;

    fn form_page() -> String {
        format!(r#"<html><body><button id="c-p-bn">ยอมรับ</button>{DROPDOWN}</body></html>"#)
    }

    fn rates_page() -> String {
        format!(
            r#"<html><body>{DROPDOWN}
              <table><tr><th>สกุลเงิน</th><th>อัตราซื้อ</th><th>อัตราขาย</th></tr>
              <tr><td>USD</td><td>32.05</td><td>32.40</td></tr></table>
              <input type="button" value="พิมพ์">
            </body></html>"#
        )
    }

    #[tokio::test]
    async fn test_export_in_window_rounds() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let form = form_page();
        let rates = rates_page();
        let session = FakeSession::new(&form)
            .on_select("1", &[&rates])
            .on_select("2", &[&rates]);

        let report = export(&session, &ctx).await.unwrap();

        assert_eq!(report.exported(), 2);
        let dir = tmp.path().join("Exim/2025/September");
        assert!(dir.join("Exim 2025-09-11 #1.pdf").exists());
        assert!(dir.join("Exim 2025-09-11 #2.pdf").exists());

        let state = session.state();
        assert_eq!(state.selected, vec!["1", "2"]);
        assert!(state.clicked.contains(&"#c-p-bn".to_string()));
        assert_eq!(state.clicked.iter().filter(|c| *c == "#btnSearch").count(), 2);
        assert!(state.layouts[0].print_background);
        assert_eq!(state.layouts[0].margins, Margins::uniform(MARGIN_PX));
    }

    #[tokio::test]
    async fn test_existing_rounds_skip_selection() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let dir = tmp.path().join("Exim/2025/September");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Exim 2025-09-11 #1.pdf"), b"old").unwrap();
        fs::write(dir.join("Exim 2025-09-11 #2.pdf"), b"old").unwrap();

        let session = FakeSession::new(&form_page());
        let report = export(&session, &ctx).await.unwrap();

        assert_eq!(report.skipped(), 2);
        assert!(session.state().selected.is_empty());
    }

    #[tokio::test]
    async fn test_missing_print_button_exhausts_round() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = ExportContext::for_tests(tmp.path());
        ctx.config.retry.max_round_attempts = 1;
        ctx.config.retry.max_data_checks = 3;

        // Rates shown but no print control
        let no_print = format!("<html><body>{DROPDOWN}<p>อัตราซื้อ 32.05</p></body></html>");
        let rates = rates_page();
        let session = FakeSession::new(&no_print).on_select("2", &[&rates]);

        let report = export(&session, &ctx).await.unwrap();

        assert!(matches!(
            report.outcomes[0].1,
            RoundOutcome::Exhausted { attempts: 3 }
        ));
        assert!(report.outcomes[1].1.is_exported());
        assert_eq!(session.state().reloads, 2);
    }

    #[tokio::test]
    async fn test_date_falls_back_to_today() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let session = FakeSession::new("<html><body><span>no date</span></body></html>");

        assert_eq!(publication_date(&session, &ctx).await.unwrap(), ctx.today());
    }

    #[tokio::test]
    async fn test_missing_dropdown_ends_quietly() {
        let tmp = TempDir::new().unwrap();
        let ctx = ExportContext::for_tests(tmp.path());
        let session = FakeSession::new("<html><body><p>maintenance</p></body></html>");

        let report = export(&session, &ctx).await.unwrap();
        assert!(report.outcomes.is_empty());
        assert!(session.state().selected.is_empty());
    }
}
