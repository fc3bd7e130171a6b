//! adaptest-report: Self-contained HTML session reports.

pub mod html;

pub use html::{generate_html, write_html_report};
