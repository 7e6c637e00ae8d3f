//! Fixed-time notices: configured texts sent when a cron schedule fires.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use serde::Deserialize;
use tracing::warn;

use herald_chat::ChatTransport;
use herald_core::datetime_from_unix_ms;

/// One configured notice: a cron expression in the reference timezone plus
/// the fixed text to deliver.
#[derive(Debug, Clone, Deserialize)]
pub struct NoticeConfig {
    pub cron: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct FixedNotice {
    schedule: Schedule,
    text: String,
    next_due_unix_ms: Option<i64>,
}

/// Tracks a set of fixed notices and fires the ones that came due since the
/// last tick. A failed send is retried on the next tick because the due
/// marker only advances after delivery.
pub struct NoticeRunner {
    notices: Vec<FixedNotice>,
    timezone: Tz,
}

impl NoticeRunner {
    pub fn new(configs: &[NoticeConfig], timezone: Tz, now_unix_ms: i64) -> Result<Self> {
        let mut notices = Vec::with_capacity(configs.len());
        for config in configs {
            let schedule = Schedule::from_str(&config.cron)
                .with_context(|| format!("invalid notice cron expression '{}'", config.cron))?;
            let next_due_unix_ms = next_due(&schedule, timezone, now_unix_ms);
            notices.push(FixedNotice {
                schedule,
                text: config.text.clone(),
                next_due_unix_ms,
            });
        }
        Ok(Self { notices, timezone })
    }

    /// Sends every notice whose schedule fired at or before `now`.
    pub async fn fire_due(&mut self, transport: &dyn ChatTransport, now_unix_ms: i64) -> usize {
        let mut fired = 0_usize;
        for notice in &mut self.notices {
            let Some(due) = notice.next_due_unix_ms else {
                continue;
            };
            if due > now_unix_ms {
                continue;
            }
            if let Err(error) = transport.send_notice(&notice.text).await {
                warn!(%error, "fixed-time notice send failed; will retry next tick");
                continue;
            }
            fired += 1;
            notice.next_due_unix_ms = next_due(&notice.schedule, self.timezone, now_unix_ms);
        }
        fired
    }

    pub fn next_due_unix_ms(&self) -> Option<i64> {
        self.notices
            .iter()
            .filter_map(|notice| notice.next_due_unix_ms)
            .min()
    }
}

fn next_due(schedule: &Schedule, timezone: Tz, from_unix_ms: i64) -> Option<i64> {
    let from = datetime_from_unix_ms(from_unix_ms)?.with_timezone(&timezone);
    schedule
        .after(&from)
        .next()
        .map(|instant| instant.with_timezone(&Utc).timestamp_millis())
}

/// Parses a timezone name from configuration.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| anyhow!("unknown timezone '{name}'"))
}
