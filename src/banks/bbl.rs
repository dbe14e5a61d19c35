//! Bangkok Bank: time-of-day dropdown, extracted table rebuilt as a clean page.

use chrono::{Datelike, NaiveDate};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{already_exists, exhausted, navigate, render_if_absent, ExportContext};
use crate::export::render::escape_html;
use crate::export::{ExtractionController, Margins, PdfLayout, Readiness, RoundDriver};
use crate::scraper::parsers::thai_date::{thai_month_abbrev, to_buddhist_era};
use crate::scraper::parsers::{enumerate, BblFragment, RateTableParser, RoundOption};
use crate::scraper::{Probe, Session, BBL_URL};
use crate::types::{BankCode, BankReport, ExportError, RoundOutcome};

const TIME_DROPDOWN: Probe = Probe::new(
    "BBL time dropdown",
    &[
        ".select-time-exchange.dynamic-select select",
        "select[name*=\"time\"]",
        ".dynamic-select select",
        "select.form-control",
        "select",
    ],
);

const GO_BUTTON: &str = "#get-fxrates";
const RATE_TABLE: &str = "#section-1 table";
const DROPDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Pulls the page's own stylesheet rules so the rebuilt table keeps its look
const COLLECT_STYLES: &str = r#"Array.from(document.styleSheets).map((sheet) => {
    try { return Array.from(sheet.cssRules).map((rule) => rule.cssText).join('\n'); }
    catch (e) { return ''; }
}).join('\n')"#;

const FONT_STACK: &str = "\"Loma\", \"Garuda\", \"Kinnari\", \"Norasi\", \"Sawasdee\", \"Waree\", \"Noto Sans Thai\", sans-serif";

const PDF_CSS: &str = r#"
* { box-sizing: border-box !important; -webkit-print-color-adjust: exact !important; }
body { margin: 0 !important; padding: 2px 5px !important; background: white !important; font-size: 14px !important; line-height: 1.2 !important; color: #333 !important; }
#section-2, [id*="section-2"], .section-2, [class*="section-2"] { display: none !important; }
.update-info { text-align: left !important; margin: 100px 0 15px 0 !important; font-size: 18px !important; font-weight: bold !important; }
.unit-info { text-align: left !important; margin: 20px 0 10px 0 !important; font-size: 15px !important; color: #666 !important; }
.note-section { margin: 15px 0 0 0 !important; font-size: 15px !important; color: #555 !important; line-height: 1.4 !important; }
.note-title { font-weight: bold !important; margin-bottom: 8px !important; }
.note-content { margin-bottom: 12px !important; font-size: 13px !important; line-height: 1.3 !important; }
table { page-break-inside: avoid !important; border-collapse: collapse !important; width: 100% !important; margin: 20px 0 0 0 !important; background: white !important; }
tr { page-break-inside: avoid !important; background: white !important; }
th, td { border: 1px solid #ddd !important; padding: 4px !important; text-align: center !important; background: white !important; font-size: 14px !important; font-weight: bold !important; vertical-align: middle !important; height: 30px !important; }
th { background: #f8f9fa !important; color: #495057 !important; border-bottom: 2px solid #dee2e6 !important; font-size: 15px !important; height: 35px !important; }
table td:nth-child(1), table th:nth-child(1) { width: 15% !important; text-align: left !important; padding-left: 10px !important; }
table td:nth-child(2), table th:nth-child(2) { width: 25% !important; text-align: left !important; padding-left: 10px !important; }
"#;

/// Select one time option and press GO
struct BblRound<'a> {
    option: &'a RoundOption,
}

impl RoundDriver for BblRound<'_> {
    async fn select<S: Session>(&self, session: &S) -> Result<(), ExportError> {
        let Some(selector) = TIME_DROPDOWN.select(session, &self.option.value).await? else {
            return Err(ExportError::Selection(format!(
                "time option {} not selectable",
                self.option.raw_label
            )));
        };
        debug!("Selected {} via {}", self.option.raw_label, selector);

        if !session.click(GO_BUTTON).await? {
            return Err(ExportError::Selection("GO button not found".into()));
        }
        Ok(())
    }

    async fn is_ready<S: Session>(&self, session: &S) -> Result<bool, ExportError> {
        let html = session.html().await?;
        // Header row plus at least one rate row
        Ok(RateTableParser::row_count(&html, RATE_TABLE) > 1)
    }
}

/// `อัพเดท ณ วันที่ 12 ก.ย. 2568 ครั้งที่ 09:00`
pub fn update_line(date: NaiveDate, round_label: &str) -> String {
    format!(
        "อัพเดท ณ วันที่ {} {} {} ครั้งที่ {}",
        date.day(),
        thai_month_abbrev(date.month()).unwrap_or_default(),
        to_buddhist_era(date.year()),
        round_label
    )
}

/// Standalone document holding only the rate table, unit line and notes
pub fn fragment_document(fragment: &BblFragment, update_text: &str, page_styles: &str) -> String {
    let unit = fragment
        .unit_text
        .as_deref()
        .map(|u| format!("<div class=\"unit-info\">{}</div>", escape_html(u)))
        .unwrap_or_default();

    let notes = if fragment.notes.is_empty() {
        String::new()
    } else {
        let items: String = fragment
            .notes
            .iter()
            .map(|n| format!("<div class=\"note-content\">{}</div>", escape_html(n)))
            .collect();
        format!(
            "<div class=\"note-section\"><div class=\"note-title\">หมายเหตุ</div>{}</div>",
            items
        )
    };

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>BBL Exchange Rates</title>\
         <style>{page_styles}\n{PDF_CSS}\nbody, div {{ font-family: {FONT_STACK} !important; }}</style></head>\
         <body><div class=\"update-info\">{update}</div>{table}{unit}{notes}</body></html>",
        update = escape_html(update_text),
        table = fragment.table_html,
    )
}

fn layout(round_label: &str) -> PdfLayout {
    let header = "<div style=\"font-size: 10px; width: 100%; text-align: center; padding: 3px 0;\">\
        <div style=\"font-size: 18px; color: #003366; font-weight: bold;\">ธนาคารกรุงเทพ จำกัด (มหาชน)</div>\
        <div style=\"font-size: 16px; color: #003366; font-weight: bold; margin-top: 25px;\">อัตราแลกเปลี่ยนเงินตราต่างประเทศ</div>\
        </div>";
    let footer = format!(
        "<div style=\"font-size: 9px; width: 100%; text-align: center; color: #666;\">\
         <span>อัตราแลกเปลี่ยนเงินตราต่างประเทศ - ธนาคารกรุงเทพ | {} | หน้า <span class=\"pageNumber\"></span> จาก <span class=\"totalPages\"></span></span></div>",
        escape_html(round_label)
    );

    PdfLayout::a4()
        .margins(Margins::new(65.0, 10.0, 25.0, 10.0))
        .header(header)
        .footer(footer)
}

async fn export_round<S: Session>(
    session: &S,
    ctx: &ExportContext,
    controller: &ExtractionController,
    option: &RoundOption,
    index: u32,
) -> Result<RoundOutcome, ExportError> {
    let run = controller.run(session, &BblRound { option }, &option.raw_label).await;
    debug!("{}: {}", option.raw_label, run.describe());
    if let Readiness::Exhausted { checks, last_error } = run.readiness {
        return Ok(exhausted(&option.raw_label, checks, last_error));
    }

    let html = session.html().await?;
    let Some(fragment) = RateTableParser::extract_bbl_fragment(&html) else {
        return Err(ExportError::Render(format!(
            "rate table missing for {}",
            option.raw_label
        )));
    };
    let styles = session.evaluate(COLLECT_STYLES).await?;
    let document = fragment_document(
        &fragment,
        &update_line(ctx.today(), &option.raw_label),
        styles.as_str().unwrap_or_default(),
    );
    session.set_content(&document).await?;

    let target = ctx.resolver.resolve(BankCode::Bbl, ctx.today(), index);
    render_if_absent(session, ctx, target, &layout(&option.raw_label)).await
}

/// Export every in-window time option; file `#n` is the option's position
pub async fn export<S: Session>(session: &S, ctx: &ExportContext) -> Result<BankReport, ExportError> {
    let mut report = BankReport::new(BankCode::Bbl);

    navigate(session, ctx, BBL_URL).await?;
    if !session.wait_for(TIME_DROPDOWN.selectors[0], DROPDOWN_TIMEOUT).await? {
        warn!("Primary time dropdown not found, trying alternatives");
    }

    let options = TIME_DROPDOWN.options(session).await?;
    if options.is_empty() {
        warn!("BBL time dropdown not found - nothing to export");
        return Ok(report);
    }
    let rounds = enumerate(&options, ctx.window());
    info!(
        "Found {} time options in {} (of {} listed)",
        rounds.len(),
        ctx.window().describe(),
        options.len()
    );
    if rounds.is_empty() {
        warn!("No valid BBL time options in business hours");
        return Ok(report);
    }
    if !session.exists(GO_BUTTON).await? {
        warn!("BBL GO button not found - nothing to export");
        return Ok(report);
    }

    let controller = ctx.controller();
    let mut page_dirty = false;

    for (position, option) in rounds.iter().enumerate() {
        let index = position as u32 + 1;
        let target = ctx.resolver.resolve(BankCode::Bbl, ctx.today(), index);
        if ctx.resolver.exists(&target) {
            report.push(&option.raw_label, already_exists(&target));
            continue;
        }

        if page_dirty {
            debug!("Reloading page for next time option");
            navigate(session, ctx, BBL_URL).await?;
            sleep(ctx.timing().inter_round_wait()).await;
        }

        info!("Processing time option {}/{}: {}", index, rounds.len(), option.raw_label);
        let outcome = export_round(session, ctx, &controller, option, index)
            .await
            .unwrap_or_else(|e| {
                warn!("Error processing {}: {}", option.raw_label, e);
                RoundOutcome::Failed(e)
            });
        report.push(&option.raw_label, outcome);
        page_dirty = true;
    }

    Ok(report)
}
