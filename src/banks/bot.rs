//! Bank of Thailand: native PDF download renamed into the archive.

use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{navigate, ExportContext};
use crate::export::{ExportTarget, OutputResolver};
use crate::scraper::parsers::download_name::bot_download_date;
use crate::scraper::parsers::{is_bot_pdf_download, is_side_download, reformat_download_name};
use crate::scraper::{Session, BOT_URL};
use crate::types::{BankCode, BankReport, ExportError, RoundOutcome, SkipReason};

const EXPORT_BUTTON: &str = ".btn-export";
/// The second export button produces the PDF
const PDF_EXPORT_INDEX: usize = 1;
const CLICK_ATTEMPTS: u32 = 2;
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight / 2)";

fn file_names(dir: &Path) -> Result<Vec<String>, ExportError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn has_fresh_download(dir: &Path) -> Result<bool, ExportError> {
    Ok(file_names(dir)?.iter().any(|n| is_bot_pdf_download(n)))
}

fn remove_side_downloads(dir: &Path) -> Result<(), ExportError> {
    let label = BankCode::Bot.label();
    for name in file_names(dir)? {
        if !is_side_download(&name, label) {
            continue;
        }
        match fs::remove_file(dir.join(&name)) {
            Ok(()) => debug!("Removed stray download {}", name),
            Err(e) => warn!("Could not remove {}: {}", name, e),
        }
    }
    Ok(())
}

/// Archive target for `download`, kept in the download folder.
///
/// The name comes from the publication date in the download name; the daily
/// name for `run_date` is used when those digits are not a date.
pub fn download_target(resolver: &OutputResolver, run_date: NaiveDate, download: &str) -> ExportTarget {
    let daily = resolver.resolve_daily(BankCode::Bot, run_date);
    let renamed = reformat_download_name(download, BankCode::Bot.label())
        .zip(bot_download_date(download));

    match renamed {
        Some((name, published)) => {
            let file_path = daily.dir().join(name);
            ExportTarget {
                date_str: published.format("%Y-%m-%d").to_string(),
                file_path,
                ..daily
            }
        }
        None => {
            warn!("No date in download name {}, using {}", download, daily.file_name());
            daily
        }
    }
}

/// Rename the `ER_PDF_DDMMYYYY.pdf` download in `dir` to
/// `BOT YYYY-MM-DD.pdf` and delete the other downloads.
///
/// An existing renamed file is never replaced; the fresh download is
/// deleted instead.
pub fn collect_download(
    resolver: &OutputResolver,
    dir: &Path,
    run_date: NaiveDate,
) -> Result<RoundOutcome, ExportError> {
    let names = file_names(dir)?;
    let Some(file) = names.iter().find(|n| is_bot_pdf_download(n)) else {
        remove_side_downloads(dir)?;
        return Err(ExportError::NoData { attempts: CLICK_ATTEMPTS });
    };

    let target = download_target(resolver, run_date, file);
    let source = dir.join(file);
    let outcome = if resolver.exists(&target) {
        info!("File already exists: {}", target.file_name());
        fs::remove_file(&source)?;
        RoundOutcome::Skipped(SkipReason::AlreadyExists(target.file_path.clone()))
    } else {
        debug!("Renaming {} to {}", file, target.file_name());
        resolver.ensure_dir(&target)?;
        fs::rename(&source, &target.file_path)?;
        info!("PDF created: {}", target.file_name());
        RoundOutcome::Exported(target)
    };

    remove_side_downloads(dir)?;
    Ok(outcome)
}

/// Download today's BOT publication into the month folder
pub async fn export<S: Session>(session: &S, ctx: &ExportContext) -> Result<BankReport, ExportError> {
    let mut report = BankReport::new(BankCode::Bot);

    navigate(session, ctx, BOT_URL).await?;

    let dir = ctx.resolver.month_dir(BankCode::Bot, ctx.today());
    fs::create_dir_all(&dir)?;
    session.set_download_dir(&dir).await?;
    session.evaluate(SCROLL_SCRIPT).await?;

    if session.click_text("button", &["GO"]).await? {
        debug!("Clicked GO button");
        sleep(ctx.timing().post_selection_wait()).await;
    }

    let mut clicked = false;
    for attempt in 1..=CLICK_ATTEMPTS {
        if !session.click_nth(EXPORT_BUTTON, PDF_EXPORT_INDEX).await? {
            break;
        }
        clicked = true;
        sleep(ctx.timing().download_wait()).await;
        if has_fresh_download(&dir)? {
            break;
        }
        debug!("No download after click {}/{}", attempt, CLICK_ATTEMPTS);
    }

    let outcome = if !clicked {
        warn!("PDF export button not found");
        RoundOutcome::Failed(ExportError::Selection("PDF export button not found".into()))
    } else {
        collect_download(&ctx.resolver, &dir, ctx.today()).unwrap_or_else(|e| {
            warn!("PDF export failed: {}", e);
            RoundOutcome::Failed(e)
        })
    };
    report.push("daily", outcome);

    Ok(report)
}
