//! Synchronization, throttling, and interactive-action core.
//!
//! Everything here is driven by independent periodic timers against one
//! shared store: the fetch+reconcile+notify cycle, the comment-watch
//! cycle, the retention sweep, and the fixed-time notices. Per-item
//! failures are contained and logged; none of them abort a cycle or the
//! process.

pub mod actions;
pub mod comments;
pub mod gate;
pub mod notices;
pub mod notify;
pub mod reconcile;

pub use actions::ActionCoordinator;
pub use comments::{watch_support_comments, CommentWatchReport};
pub use gate::CycleGate;
pub use notices::{parse_timezone, FixedNotice, NoticeConfig, NoticeRunner};
pub use notify::{notify_due_tasks, throttle_policy, NotifyReport, PolicyConfig, ThrottlePolicy};
pub use reconcile::{reconcile_source, sync_all_sources, ReconcileReport, SyncReport};

use std::collections::HashMap;
use std::sync::Arc;

use herald_tracker::SourceAdapter;

/// Adapter registry keyed by source id; selection happens per task at fetch
/// and action time.
pub type AdapterMap = HashMap<String, Arc<dyn SourceAdapter>>;

/// Retention window for archived, resolved tasks.
pub const DEFAULT_RETENTION_DAYS: i64 = 35;

/// Deletes archived+Done tasks past the retention window along with their
/// orphaned side records.
pub fn sweep_retention(
    store: &herald_store::TaskStore,
    retention_days: i64,
    now_unix_ms: i64,
) -> anyhow::Result<herald_store::SweepReport> {
    let cutoff = now_unix_ms - retention_days.max(0) * 24 * 60 * 60 * 1_000;
    let report = store.sweep_expired(cutoff)?;
    if report.tasks_deleted > 0 {
        tracing::info!(
            tasks = report.tasks_deleted,
            watermarks = report.watermarks_deleted,
            audits = report.audits_deleted,
            "retention sweep removed expired tasks"
        );
    }
    Ok(report)
}
