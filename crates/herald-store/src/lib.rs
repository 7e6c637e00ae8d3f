//! Persistent snapshot of mirrored tracker tasks.
//!
//! Holds the canonical `TaskRecord` model plus the SQLite store every
//! herald component shares: reconcile primitives, notification bookkeeping,
//! comment watermarks, action audits, and the retention sweep.

pub mod task;
pub mod task_store;

pub use task::{FetchedTask, Priority, TaskRecord, UNSPECIFIED_DEPARTMENT};
pub use task_store::{SweepReport, TaskStore};

#[cfg(test)]
mod tests;
