//! Names of files produced by native downloads (BOT).

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static BOT_DOWNLOAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ER_PDF_(\d{2})(\d{2})(\d{4})\.pdf$").expect("download regex"));

/// Extensions BOT's export buttons produce besides the PDF
const SIDE_DOWNLOAD_EXTENSIONS: [&str; 5] = [".pdf", ".csv", ".xls", ".xlsx", ".zip"];

/// `ER_PDF_` plus eight digits, whether or not they form a valid date
pub fn is_bot_pdf_download(file_name: &str) -> bool {
    BOT_DOWNLOAD_RE.is_match(file_name)
}

/// Publication date from `ER_PDF_DDMMYYYY.pdf`
pub fn bot_download_date(file_name: &str) -> Option<NaiveDate> {
    let caps = BOT_DOWNLOAD_RE.captures(file_name)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `ER_PDF_05092025.pdf` -> `BOT 2025-09-05.pdf`
pub fn reformat_download_name(file_name: &str, label: &str) -> Option<String> {
    let date = bot_download_date(file_name)?;
    Some(format!("{} {}.pdf", label, date.format("%Y-%m-%d")))
}

/// Downloads to delete after a BOT export: stray PDFs and CSV/Excel/ZIP
/// files that are neither archived outputs nor documentation.
pub fn is_side_download(file_name: &str, label: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    SIDE_DOWNLOAD_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        && !file_name.starts_with(&format!("{} ", label))
        && !lower.contains("documentation")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reformat_download_name() {
        assert_eq!(
            reformat_download_name("ER_PDF_05092025.pdf", "BOT").as_deref(),
            Some("BOT 2025-09-05.pdf")
        );
        assert_eq!(reformat_download_name("ER_PDF_5092025.pdf", "BOT"), None);
        assert_eq!(reformat_download_name("ER_PDF_32132025.pdf", "BOT"), None);
        assert_eq!(reformat_download_name("ER_XLS_05092025.xlsx", "BOT"), None);
    }

    #[test]
    fn test_is_bot_pdf_download() {
        assert!(is_bot_pdf_download("ER_PDF_05092025.pdf"));
        assert!(is_bot_pdf_download("ER_PDF_32132025.pdf"));
        assert!(!is_bot_pdf_download("ER_CSV_05092025.csv"));
        assert!(!is_bot_pdf_download("BOT 2025-09-05.pdf"));
    }

    #[test]
    fn test_side_downloads() {
        assert!(is_side_download("ER_CSV_05092025.csv", "BOT"));
        assert!(is_side_download("report.PDF", "BOT"));
        assert!(is_side_download("ER_PDF_05092025.pdf", "BOT"));
        assert!(!is_side_download("BOT 2025-09-05.pdf", "BOT"));
        assert!(!is_side_download("documentation.pdf", "BOT"));
        assert!(!is_side_download("notes.txt", "BOT"));
    }
}
