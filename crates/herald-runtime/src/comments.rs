//! Forwards unseen remote comments on closed-but-unarchived support tasks.

use tracing::warn;

use herald_chat::ChatTransport;
use herald_store::TaskStore;

use crate::AdapterMap;

/// Outcome of one comment-watch sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentWatchReport {
    pub tasks_checked: usize,
    pub comments_forwarded: usize,
}

/// For every unarchived, Done task in the support department: fetch remote
/// comments, forward the ones above the stored watermark in ascending
/// numeric order, then advance the watermark once to the highest forwarded
/// identifier. Re-running with no new comments is a no-op.
pub async fn watch_support_comments(
    store: &TaskStore,
    adapters: &AdapterMap,
    transport: &dyn ChatTransport,
    support_department: &str,
    now_unix_ms: i64,
) -> anyhow::Result<CommentWatchReport> {
    let mut report = CommentWatchReport::default();
    let tasks = store.unarchived_done_tasks(support_department)?;
    for task in tasks {
        report.tasks_checked += 1;
        let Some(adapter) = adapters.get(&task.source) else {
            warn!(task = %task.id, source = %task.source, "no adapter for watched task");
            continue;
        };
        let mut comments = match adapter.list_comments(&task.id).await {
            Ok(comments) => comments,
            Err(error) => {
                warn!(task = %task.id, %error, "comment fetch failed; will retry next sweep");
                continue;
            }
        };
        // Numeric sort: comment identifiers are not lexically ordered.
        comments.sort_by_key(|comment| comment.id);

        let watermark = match store.comment_watermark(&task.id) {
            Ok(watermark) => watermark,
            Err(error) => {
                warn!(task = %task.id, %error, "watermark lookup failed");
                continue;
            }
        };
        let mut forwarded_up_to = None;
        for comment in comments
            .iter()
            .filter(|comment| watermark.map_or(true, |seen| comment.id > seen))
        {
            let text = format!("💬 {} — {}:\n{}", task.id, comment.author, comment.body);
            if let Err(error) = transport.send_notice(&text).await {
                // Stop here so the unforwarded tail stays above the
                // watermark for the next sweep.
                warn!(task = %task.id, comment = comment.id, %error, "comment forward failed");
                break;
            }
            forwarded_up_to = Some(comment.id);
            report.comments_forwarded += 1;
        }
        if let Some(max_forwarded) = forwarded_up_to {
            if let Err(error) =
                store.advance_comment_watermark(&task.id, max_forwarded, now_unix_ms)
            {
                warn!(task = %task.id, %error, "watermark advance failed");
            }
        }
    }
    Ok(report)
}
