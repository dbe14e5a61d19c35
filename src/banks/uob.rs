//! UOB: numbered rounds, page printed as-is with chrome hidden.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{exhausted, navigate, render_if_absent, ExportContext};
use crate::export::{ExtractionController, Margins, PdfLayout, Readiness, RoundDriver};
use crate::scraper::parsers::thai_date::{self, UOB_PATTERNS};
use crate::scraper::parsers::{enumerate_numbered, PublicationInfo, RateTableParser};
use crate::scraper::{Session, UOB_URL};
use crate::types::{BankCode, BankReport, ExportError, RoundOutcome, SkipReason};

const ROUND_SELECT: &str = "select[name=\"count_form\"]";

/// The page's own submit hook, run after changing the round
const SUBMIT_HOOK: &str = "if (typeof chkValid4 === 'function') { chkValid4(); }";

const HIDDEN: [&str; 10] = [
    "header",
    "nav",
    "footer",
    ".header",
    ".navigation",
    ".footer",
    "#header",
    "#nav",
    "#footer",
    "td[width=\"25%\"][align=\"center\"]",
];

const PRINT_CSS: &str = r#"
body { background: white !important; font-family: Arial, sans-serif; margin: 0; padding: 20px; }
* { background-color: transparent !important; }
table { background: white !important; border-collapse: collapse !important; width: 100% !important; margin: 10px 0 !important; }
tr, td, th { background: white !important; border: 1px solid #ddd !important; padding: 8px !important; text-align: center !important; font-size: 14px !important; }
th { background: #f5f5f5 !important; font-weight: bold !important; font-size: 15px !important; }
"#;

struct UobRound {
    round: u32,
}

impl RoundDriver for UobRound {
    async fn select<S: Session>(&self, session: &S) -> Result<(), ExportError> {
        if !session.select_value(ROUND_SELECT, &self.round.to_string()).await? {
            return Err(ExportError::Selection(format!("round {} not in dropdown", self.round)));
        }
        session.evaluate(SUBMIT_HOOK).await?;
        debug!("Round {} selected", self.round);
        Ok(())
    }

    async fn is_ready<S: Session>(&self, session: &S) -> Result<bool, ExportError> {
        let html = session.html().await?;
        Ok(RateTableParser::has_rate_rows(&html, "table"))
    }
}

/// Publication stamp for the selected round.
///
/// Missing fields fall back to the run's date and clock and to the round
/// that was selected.
pub fn read_publication(body: &str, ctx: &ExportContext, selected_round: u32) -> PublicationInfo {
    let mut info = match thai_date::parse(body, &UOB_PATTERNS) {
        Ok(info) => info,
        Err(e) => {
            warn!("{}; using current date and time", e);
            let now = ctx.current_time();
            PublicationInfo {
                date: thai_date::parse_date(body, &UOB_PATTERNS).unwrap_or(now.date()),
                time: now.time(),
                round_index: thai_date::parse_round(body, &UOB_PATTERNS),
                raw_matched_text: String::new(),
            }
        }
    };
    if info.round_index.is_none() {
        debug!("No round on page, using selected round {}", selected_round);
        info.round_index = Some(selected_round);
    }
    info
}

fn layout(round: u32, info: &PublicationInfo) -> PdfLayout {
    let time = info.canonical_time();
    PdfLayout::a4()
        .margins(Margins::new(60.0, 20.0, 60.0, 20.0))
        .print_background(false)
        .header(format!(
            "<div style=\"font-size: 12px; text-align: center; width: 100%;\">UOB - อัตราแลกเปลี่ยน ครั้งที่ {} เวลา {}</div>",
            round, time
        ))
        .footer(format!(
            "<div style=\"font-size: 10px; text-align: center; width: 100%; white-space: nowrap;\">อัพเดท ณ วันที่ {} เวลา {} - Page <span class=\"pageNumber\"></span></div>",
            info.iso_date(),
            time
        ))
}

async fn export_round<S: Session>(
    session: &S,
    ctx: &ExportContext,
    controller: &ExtractionController,
    round: u32,
) -> Result<RoundOutcome, ExportError> {
    let label = format!("uob round {}", round);
    let run = controller.run(session, &UobRound { round }, &label).await;
    debug!("{}: {}", label, run.describe());
    if let Readiness::Exhausted { checks, last_error } = run.readiness {
        return Ok(exhausted(&label, checks, last_error));
    }

    let body = session.body_text().await?;
    let info = read_publication(&body, ctx, round);
    let file_round = info.round_index.unwrap_or(round);

    if !ctx.window().is_eligible(&info.canonical_time()) {
        info!(
            "Round {} at {} is outside business hours ({}) - skipped",
            round,
            info.canonical_time(),
            ctx.window().describe()
        );
        return Ok(RoundOutcome::Skipped(SkipReason::OutsideWindow(info.canonical_time())));
    }

    let target = ctx.resolver.resolve(BankCode::Uob, info.date, file_round);
    if ctx.resolver.exists(&target) {
        return Ok(super::already_exists(&target));
    }

    for selector in HIDDEN {
        session.hide(selector).await?;
    }
    session.add_style(PRINT_CSS).await?;

    render_if_absent(session, ctx, target, &layout(file_round, &info)).await
}

/// Export every numbered round listed in the dropdown
pub async fn export<S: Session>(session: &S, ctx: &ExportContext) -> Result<BankReport, ExportError> {
    let mut report = BankReport::new(BankCode::Uob);

    navigate(session, ctx, UOB_URL).await?;

    let options = session.options_of(ROUND_SELECT).await?;
    let rounds = enumerate_numbered(&options);
    info!("Found {} available rounds: {:?}", rounds.len(), rounds);
    if rounds.is_empty() {
        warn!("No rounds found on UOB page");
        return Ok(report);
    }

    let controller = ctx.controller();
    for (position, &round) in rounds.iter().enumerate() {
        if position > 0 {
            sleep(ctx.timing().inter_round_wait()).await;
        }

        info!("Processing round {}", round);
        let outcome = export_round(session, ctx, &controller, round)
            .await
            .unwrap_or_else(|e| {
                warn!("Error creating PDF for round {}: {}", round, e);
                RoundOutcome::Failed(e)
            });
        report.push(round.to_string(), outcome);
    }

    Ok(report)
}
