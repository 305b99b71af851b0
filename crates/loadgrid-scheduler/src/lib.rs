//! loadgrid-scheduler: decides where each arriving job runs.
//!
//! Jobs enter through a bounded arrival queue. The scheduler loop takes one
//! job at a time, filters the nodes it fits on, scores them against their
//! recent load and hands the job to the winner. Jobs that fit nowhere are
//! re-queued after a backoff, or rejected once the retry policy says so.
//!
//! # Architecture
//!
//! ```text
//! JobSubmitter ──► arrival queue ──► Scheduler::run
//!                        ▲              ├── evaluate() ← Node snapshots + LoadWindows
//!                        │              ├── winner → hand-off task → Node::submit
//!                        └── retry task ◄── no winner (RetryPolicy)
//! ```

pub mod error;
pub mod retry;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{JobSubmitter, Scheduler};
