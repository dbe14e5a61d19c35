//! Readiness checks and fragment extraction over rendered rate pages.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})*(?:\.\d+)?$|^\d+(?:\.\d+)?$").expect("numeric regex"));

fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_numeric_cell(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && NUMERIC_RE.is_match(trimmed)
}

/// Parser for exchange-rate tables
pub struct RateTableParser;

impl RateTableParser {
    /// Number of `<tr>` rows in the first table matched by `table_selector`
    pub fn row_count(html: &str, table_selector: &str) -> usize {
        let document = Html::parse_document(html);
        let Ok(table_sel) = Selector::parse(table_selector) else {
            return 0;
        };
        let row_sel = Selector::parse("tr").expect("tr selector");

        document
            .select(&table_sel)
            .next()
            .map(|table| table.select(&row_sel).count())
            .unwrap_or(0)
    }

    /// Count rows that carry at least one numeric-looking cell
    ///
    /// Placeholder tables (`-`, `N/A`, empty cells) count as zero.
    pub fn data_row_count(html: &str, scope_selector: &str) -> usize {
        let document = Html::parse_document(html);
        let Ok(scope_sel) = Selector::parse(scope_selector) else {
            return 0;
        };
        let row_sel = Selector::parse("tr").expect("tr selector");
        let cell_sel = Selector::parse("td").expect("td selector");

        document
            .select(&scope_sel)
            .flat_map(|scope| scope.select(&row_sel))
            .filter(|row| row.select(&cell_sel).any(|cell| is_numeric_cell(&text_of(&cell))))
            .count()
    }

    /// True when the page has at least one real data row
    pub fn has_rate_rows(html: &str, scope_selector: &str) -> bool {
        Self::data_row_count(html, scope_selector) > 0
    }

    /// True when the visible text contains any of `markers`
    pub fn contains_any(text: &str, markers: &[&str]) -> bool {
        markers.iter().any(|m| text.contains(m))
    }

    /// True when an element matched by `selector` shows any needle in its
    /// text or `value` attribute (case-insensitive)
    pub fn has_control_with_text(html: &str, selector: &str, needles: &[&str]) -> bool {
        let document = Html::parse_document(html);
        let Ok(sel) = Selector::parse(selector) else {
            return false;
        };
        let needles: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();

        document.select(&sel).any(|el| {
            let text = text_of(&el).to_lowercase();
            let value = el.value().attr("value").unwrap_or_default().to_lowercase();
            needles.iter().any(|n| text.contains(n) || value.contains(n))
        })
    }

    /// Extract the BBL rate table plus its unit line and notes
    pub fn extract_bbl_fragment(html: &str) -> Option<BblFragment> {
        let document = Html::parse_document(html);
        let table_sel = Selector::parse("#section-1 table").ok()?;
        let table = document.select(&table_sel).next()?;

        let mut fragment = BblFragment {
            table_html: table.html(),
            unit_text: None,
            notes: Vec::new(),
        };

        let info_sel = Selector::parse(".text-grey.text-x-small").ok()?;
        if let Some(info) = document.select(&info_sel).next() {
            let unit_sel = Selector::parse("p.pad-bot-md").ok()?;
            fragment.unit_text = info
                .select(&unit_sel)
                .next()
                .map(|p| text_of(&p))
                .filter(|t| !t.is_empty());

            let strong_sel = Selector::parse("strong").ok()?;
            let p_sel = Selector::parse("p").ok()?;
            if info.select(&strong_sel).next().is_some() {
                fragment.notes = info
                    .select(&p_sel)
                    .skip(1)
                    .map(|p| text_of(&p))
                    .filter(|t| !t.is_empty())
                    .collect();
            }
        }

        Some(fragment)
    }
}

/// Rate table markup plus the surrounding unit/note text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BblFragment {
    pub table_html: String,
    pub unit_text: Option<String>,
    pub notes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BBL_PAGE: &str = r#"
        <html><body>
          <div id="section-1">
            <table>
              <tr><th>Currency</th><th>Buying</th></tr>
              <tr><td>USD</td><td>32.15</td></tr>
              <tr><td>EUR</td><td>1,037.50</td></tr>
            </table>
          </div>
          <div id="section-2"><table><tr><td>ignored</td></tr></table></div>
          <div class="text-grey text-x-small">
            <p class="pad-bot-md">หน่วย : บาท</p>
            <strong>หมายเหตุ</strong>
            <p>อัตราอาจเปลี่ยนแปลง</p>
            <p>  </p>
            <p>สอบถามสาขา</p>
          </div>
        </body></html>
    "#;

    const PLACEHOLDER_PAGE: &str = r#"
        <html><body><div id="section-1"><table>
          <tr><th>Currency</th><th>Buying</th></tr>
          <tr><td>-</td><td>N/A</td></tr>
        </table></div></body></html>
    "#;

    #[test]
    fn test_row_count() {
        assert_eq!(RateTableParser::row_count(BBL_PAGE, "#section-1 table"), 3);
        assert_eq!(RateTableParser::row_count(BBL_PAGE, "#missing table"), 0);
        assert_eq!(RateTableParser::row_count(BBL_PAGE, "::bad"), 0);
    }

    #[test]
    fn test_data_rows_ignore_placeholders() {
        assert_eq!(RateTableParser::data_row_count(BBL_PAGE, "#section-1"), 2);
        assert!(!RateTableParser::has_rate_rows(PLACEHOLDER_PAGE, "#section-1"));
        assert!(RateTableParser::has_rate_rows(BBL_PAGE, "body"));
    }

    #[test]
    fn test_contains_any() {
        assert!(RateTableParser::contains_any("อัตรา ซื้อ ขาย", &["ซื้อ", "ขาย"]));
        assert!(!RateTableParser::contains_any("loading...", &["ซื้อ", "ขาย"]));
    }

    #[test]
    fn test_has_control_with_text() {
        let html = r##"<html><body>
            <input type="button" value="PRINT">
            <a href="#">หน้าแรก</a>
        </body></html>"##;
        let controls = "button, input[type=\"button\"], a";
        assert!(RateTableParser::has_control_with_text(html, controls, &["พิมพ์", "print"]));
        assert!(!RateTableParser::has_control_with_text(html, "button", &["print"]));
        assert!(!RateTableParser::has_control_with_text(html, controls, &["ค้นหา"]));
    }

    #[test]
    fn test_extract_bbl_fragment() {
        let fragment = RateTableParser::extract_bbl_fragment(BBL_PAGE).unwrap();
        assert!(fragment.table_html.starts_with("<table>"));
        assert!(fragment.table_html.contains("32.15"));
        assert!(!fragment.table_html.contains("ignored"));
        assert_eq!(fragment.unit_text.as_deref(), Some("หน่วย : บาท"));
        assert_eq!(fragment.notes, vec!["อัตราอาจเปลี่ยนแปลง", "สอบถามสาขา"]);
    }

    #[test]
    fn test_extract_bbl_fragment_missing_table() {
        assert!(RateTableParser::extract_bbl_fragment("<html><body></body></html>").is_none());
    }
}
