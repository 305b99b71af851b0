//! loadgrid-metrics: load history and observability for the grid.
//!
//! Maintains the bounded per-node load windows that drive prediction,
//! counts placement outcomes, and renders Prometheus text.
//!
//! # Architecture
//!
//! ```text
//! MetricsCollector
//!   ├── periodic sample_all() ← reads every Node snapshot
//!   ├── MetricsSender::push() ← external samples
//!   └── run() → single loop appending to LoadWindows
//!
//! PlacementCounters
//!   └── track() ← GridEvent stream
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain
//! ```

pub mod collector;
pub mod counters;
pub mod prometheus;
pub mod window;

pub use collector::{MetricsCollector, MetricsSender};
pub use counters::{CounterSnapshot, PlacementCounters};
pub use prometheus::{NodeGauge, render_prometheus};
pub use window::{LoadWindow, LoadWindows};
