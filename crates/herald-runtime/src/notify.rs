//! Due-task selection under the two throttle policies, rendering, and
//! dispatch bookkeeping.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::warn;

use herald_chat::{ActionKind, ChatTransport, InlineControl, TaskAction};
use herald_core::datetime_from_unix_ms;
use herald_store::{TaskRecord, TaskStore};

use crate::AdapterMap;

/// Attributes driving which throttle policy a task falls under.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Department whose tasks get the calendar-day policy and the
    /// interactive controls.
    pub support_department: String,
    /// Issue types covered by the 72-hour rolling window.
    pub infra_issue_types: Vec<String>,
    /// Timezone in which calendar days are compared.
    pub reference_timezone: Tz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottlePolicy {
    CalendarDay,
    RollingWindow,
}

/// Outcome of one notification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub sent: usize,
    pub failed: usize,
}

/// Which policy applies to a task, if any. The support department wins when
/// both attribute sets match; tasks matching neither are never
/// auto-notified.
pub fn throttle_policy(task: &TaskRecord, config: &PolicyConfig) -> Option<ThrottlePolicy> {
    if task.department == config.support_department {
        return Some(ThrottlePolicy::CalendarDay);
    }
    let infra = config
        .infra_issue_types
        .iter()
        .any(|kind| kind.eq_ignore_ascii_case(&task.issue_type));
    infra.then_some(ThrottlePolicy::RollingWindow)
}

/// Whether a task is due for (re-)notification under its policy.
pub fn is_due(task: &TaskRecord, policy: ThrottlePolicy, now: DateTime<Utc>, tz: Tz) -> bool {
    let Some(last_sent_ms) = task.last_sent_unix_ms else {
        return true;
    };
    let Some(last_sent) = datetime_from_unix_ms(last_sent_ms) else {
        return true;
    };
    match policy {
        ThrottlePolicy::CalendarDay => {
            last_sent.with_timezone(&tz).date_naive() < now.with_timezone(&tz).date_naive()
        }
        ThrottlePolicy::RollingWindow => now - last_sent > Duration::days(3),
    }
}

/// Renders one notification body.
pub fn render_notification(task: &TaskRecord, browse_url: &str) -> String {
    let emoji = task.priority.emoji();
    let heading = if emoji.is_empty() {
        format!("{} [{}]", task.id, task.source)
    } else {
        format!("{emoji} {} [{}]", task.id, task.source)
    };
    let assignee = if task.assignee.is_empty() {
        "unassigned"
    } else {
        task.assignee.as_str()
    };
    format!(
        "{heading}\n{}\ntype: {} | assignee: {assignee} | department: {}\n{browse_url}",
        task.title, task.issue_type, task.department
    )
}

fn interactive_controls(task_id: &str) -> Vec<InlineControl> {
    vec![
        InlineControl::new("Take", TaskAction::new(ActionKind::Take, task_id)),
        InlineControl::new("Comment", TaskAction::new(ActionKind::Comment, task_id)),
        InlineControl::new("Complete", TaskAction::new(ActionKind::Complete, task_id)),
    ]
}

/// Selects the due tasks in policy order and returns them paired with the
/// policy that made them due. Calendar-day tasks come first; within each
/// group the order is priority rank then id, so repeated passes over the
/// same store state emit the same sequence.
pub fn select_due_tasks(
    tasks: Vec<TaskRecord>,
    config: &PolicyConfig,
    now: DateTime<Utc>,
) -> Vec<(TaskRecord, ThrottlePolicy)> {
    let mut due: Vec<(TaskRecord, ThrottlePolicy)> = tasks
        .into_iter()
        .filter_map(|task| {
            let policy = throttle_policy(&task, config)?;
            is_due(&task, policy, now, config.reference_timezone).then_some((task, policy))
        })
        .collect();
    due.sort_by(|(a, pa), (b, pb)| {
        let group = |policy: &ThrottlePolicy| match policy {
            ThrottlePolicy::CalendarDay => 0_u8,
            ThrottlePolicy::RollingWindow => 1_u8,
        };
        group(pa)
            .cmp(&group(pb))
            .then(a.priority.rank().cmp(&b.priority.rank()))
            .then(a.id.cmp(&b.id))
    });
    due
}

/// Sends every due notification and records the dispatch time per task.
/// One task's failure never blocks the rest of the batch, and `last_sent`
/// is only written after its send is confirmed.
pub async fn notify_due_tasks(
    store: &TaskStore,
    adapters: &AdapterMap,
    transport: &dyn ChatTransport,
    config: &PolicyConfig,
    now_unix_ms: i64,
) -> anyhow::Result<NotifyReport> {
    let now = datetime_from_unix_ms(now_unix_ms)
        .ok_or_else(|| anyhow::anyhow!("invalid notification timestamp {now_unix_ms}"))?;
    let candidates = store.unarchived_tasks()?;
    let due = select_due_tasks(candidates, config, now);

    let mut report = NotifyReport::default();
    for (task, policy) in due {
        let Some(adapter) = adapters.get(&task.source) else {
            warn!(task = %task.id, source = %task.source, "no adapter for task source");
            report.failed += 1;
            continue;
        };
        let body = render_notification(&task, &adapter.browse_url(&task.id));
        let controls = match policy {
            ThrottlePolicy::CalendarDay => interactive_controls(&task.id),
            ThrottlePolicy::RollingWindow => Vec::new(),
        };
        match transport.send_message(&body, &controls).await {
            Ok(_reference) => {
                if let Err(error) = store.mark_sent(&task.id, now_unix_ms) {
                    warn!(task = %task.id, %error, "notification sent but dispatch time not recorded");
                }
                report.sent += 1;
            }
            Err(error) => {
                warn!(task = %task.id, %error, "notification send failed");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
