//! Merges fetched issue sets into the local snapshot with archival
//! semantics.

use tracing::{info, warn};

use herald_store::{FetchedTask, TaskStore};

use crate::AdapterMap;

/// Outcome of reconciling one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub upserted: usize,
    pub archived: usize,
}

/// Outcome of one full fetch+reconcile pass over every source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sources_synced: usize,
    pub sources_failed: usize,
    pub upserted: usize,
    pub archived: usize,
}

/// Upserts every fetched issue, then archives stored tasks for this source
/// that the fetch no longer returned. An empty fetch archives everything
/// still unarchived for the source.
pub fn reconcile_source(
    store: &TaskStore,
    source_id: &str,
    fetched: &[FetchedTask],
    now_unix_ms: i64,
) -> anyhow::Result<ReconcileReport> {
    let mut upserted = 0_usize;
    for task in fetched {
        store.upsert_fetched(source_id, task, now_unix_ms)?;
        upserted += 1;
    }
    let fetched_ids: Vec<String> = fetched.iter().map(|task| task.id.clone()).collect();
    let archived = store.archive_missing(source_id, &fetched_ids, now_unix_ms)?;
    Ok(ReconcileReport { upserted, archived })
}

/// Fetches and reconciles every configured source. A failure on one source
/// is logged and never prevents reconciling the others.
pub async fn sync_all_sources(
    store: &TaskStore,
    adapters: &AdapterMap,
    now_unix_ms: i64,
) -> SyncReport {
    let mut report = SyncReport::default();
    for (source_id, adapter) in adapters {
        let fetched = match adapter.fetch_open_tasks().await {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(source = %source_id, %error, "source fetch failed; skipping");
                report.sources_failed += 1;
                continue;
            }
        };
        match reconcile_source(store, source_id, &fetched, now_unix_ms) {
            Ok(outcome) => {
                info!(
                    source = %source_id,
                    upserted = outcome.upserted,
                    archived = outcome.archived,
                    "reconciled source"
                );
                report.sources_synced += 1;
                report.upserted += outcome.upserted;
                report.archived += outcome.archived;
            }
            Err(error) => {
                warn!(source = %source_id, %error, "reconcile failed; skipping source");
                report.sources_failed += 1;
            }
        }
    }
    report
}
