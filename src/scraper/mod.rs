//! Web scraping layer for the bank exchange-rate pages
//!
//! Provides browser automation, the session capability, and text/HTML parsers.

pub mod browser;
pub mod parsers;
pub mod session;

pub use browser::ChromeSession;
pub use session::{Probe, Session};

/// Exchange-rate page URLs
pub const BBL_URL: &str = "https://www.bangkokbank.com/th-TH/Personal/Other-Services/View-Rates/Foreign-Exchange-Rates";
pub const BOT_URL: &str = "https://www.bot.or.th/th/statistics/exchange-rate.html";
pub const KBANK_URL: &str = "https://www.kasikornbank.com/th/rate/Pages/Foreign-Exchange.aspx";
pub const UOB_URL: &str =
    "https://ereport.uob.co.th/UOBWebFrontService/Exchange/FxRateThNew.jsp?flags=LastFx";
pub const EXIM_URL: &str = "https://www.exim.go.th/th/exchange_rate/exchange.aspx";
