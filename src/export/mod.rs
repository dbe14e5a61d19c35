//! Export pipeline: window checks, output paths, retry control and PDF layout.

pub mod controller;
pub mod render;
pub mod target;
pub mod window;

pub use controller::{ExtractionController, Readiness, RoundDriver};
pub use render::{Margins, PdfLayout};
pub use target::{ExportTarget, OutputResolver};
pub use window::BusinessWindow;
