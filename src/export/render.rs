//! PDF page layout handed to the browser's print capability.

/// CSS pixels per inch; Chrome's print margins are in inches
const PX_PER_INCH: f64 = 96.0;

/// A4 in inches
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

/// Margins in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub const fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn uniform(px: f64) -> Self {
        Self::new(px, px, px, px)
    }

    /// (top, right, bottom, left) in inches
    pub fn inches(&self) -> (f64, f64, f64, f64) {
        (
            self.top / PX_PER_INCH,
            self.right / PX_PER_INCH,
            self.bottom / PX_PER_INCH,
            self.left / PX_PER_INCH,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub print_background: bool,
    pub margins: Margins,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
}

impl PdfLayout {
    pub fn a4() -> Self {
        Self {
            paper_width_in: A4_WIDTH_IN,
            paper_height_in: A4_HEIGHT_IN,
            print_background: true,
            margins: Margins::uniform(38.0),
            header_template: None,
            footer_template: None,
        }
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn print_background(mut self, on: bool) -> Self {
        self.print_background = on;
        self
    }

    pub fn header(mut self, template: impl Into<String>) -> Self {
        self.header_template = Some(template.into());
        self
    }

    pub fn footer(mut self, template: impl Into<String>) -> Self {
        self.footer_template = Some(template.into());
        self
    }

    /// Chrome requires both templates when either is shown
    pub fn displays_header_footer(&self) -> bool {
        self.header_template.is_some() || self.footer_template.is_some()
    }
}

const HTML_ENTITIES: &[(char, &str)] = &[
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&#39;"),
];

/// Minimal HTML escaping for text placed into templates
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match HTML_ENTITIES.iter().find(|(ch, _)| *ch == c) {
            Some((_, entity)) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}
