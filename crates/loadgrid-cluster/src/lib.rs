//! loadgrid-cluster: a running placement grid.
//!
//! [`Grid::start`] turns a validated `GridConfig` into live tasks and
//! [`Grid::shutdown`] stops them in dependency order.
//!
//! # Architecture
//!
//! ```text
//! Grid
//!   ├── Node × N            (worker per node, own stop signal)
//!   ├── MetricsCollector    (samples nodes → LoadWindows)
//!   ├── Scheduler           (arrival queue → best feasible node)
//!   ├── Reporter            (utilization → observers)
//!   └── PlacementCounters   (GridEvent stream → counters)
//! ```

pub mod grid;

pub use grid::Grid;
pub use loadgrid_metrics::CounterSnapshot;
