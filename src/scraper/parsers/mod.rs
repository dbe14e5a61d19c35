//! Text and HTML parsers for bank rate pages.

pub mod download_name;
pub mod rate_table;
pub mod round_options;
pub mod thai_date;

pub use download_name::{is_bot_pdf_download, is_side_download, reformat_download_name};
pub use rate_table::{BblFragment, RateTableParser};
pub use round_options::{enumerate, enumerate_numbered, RawOption, RoundOption};
pub use thai_date::{ParseFailure, Pattern, PublicationInfo};
