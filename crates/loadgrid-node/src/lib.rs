//! loadgrid-node: a capacity-bounded compute node.
//!
//! Each node owns its occupancy counters and a private bounded job queue,
//! and runs an independent execution loop:
//!
//! ```text
//! Node (Arc, shared)                 NodeWorker (task)
//!   ├── submit() / submit_reserved()  ──► queue ──► execute(job)
//!   ├── try_reserve() / snapshot()         │          ├── used += demand
//!   └── stop() ───────── watch ──────────► │          ├── JobExecutor::execute
//!                                          │          └── used -= demand
//!                                          └── on stop: drop or drain queue
//! ```
//!
//! Jobs on one node run strictly one at a time in queue order; different
//! nodes run concurrently.

pub mod error;
pub mod executor;
pub mod node;

pub use error::{NodeError, NodeResult};
pub use executor::{BoxFuture, JobExecutor, SleepExecutor};
pub use node::{Node, NodeSnapshot, NodeWorker};
