mod annotate;
mod page;
mod report;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod scanner;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use app::{build_scanner, start_app};
pub use report::{render_report, ReportError};
