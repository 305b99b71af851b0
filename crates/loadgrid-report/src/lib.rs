//! loadgrid-report: periodic cluster utilization reports.
//!
//! # Architecture
//!
//! ```text
//! Reporter::run
//!   └── every interval: snapshot() ← each Node's used/capacity
//!         └── UtilizationObserver::observe(&UtilizationReport)
//!               ├── TracingObserver  (structured log lines)
//!               └── WriterObserver   (text or JSON lines to any writer)
//! ```

pub mod observer;
pub mod report;
pub mod reporter;

pub use observer::{ReportFormat, TracingObserver, UtilizationObserver, WriterObserver};
pub use report::{NodeUtilization, UtilizationReport};
pub use reporter::Reporter;
