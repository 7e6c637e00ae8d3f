//! Foundational utilities shared across herald crates.
//!
//! Every persisted timestamp in herald is a unix millisecond value; the
//! helpers here convert between that representation and `chrono` instants
//! used by throttle-window math. The crate also hosts the read-only
//! identity directory consumed by the tracker adapters and the action
//! coordinator.

pub mod identity;
pub mod time_utils;

pub use identity::{Identity, IdentityDirectory};
pub use time_utils::{
    current_unix_timestamp, current_unix_timestamp_ms, datetime_from_unix_ms, unix_ms_from_datetime,
};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn time_utils_round_trip_bounds() {
        let now_s = current_unix_timestamp();
        let now_ms = current_unix_timestamp_ms();
        let now_ms_s = now_ms / 1_000;
        assert!(now_ms_s >= now_s);
        assert!(now_ms_s <= now_s.saturating_add(1));
    }

    #[test]
    fn datetime_conversion_round_trips() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 10, 23, 59, 30).unwrap();
        let ms = unix_ms_from_datetime(instant);
        assert_eq!(datetime_from_unix_ms(ms), Some(instant));
    }

    fn directory() -> IdentityDirectory {
        IdentityDirectory::new(vec![Identity {
            chat_id: "chat-7".to_string(),
            display_name: "Casey Larkin".to_string(),
            tracker_logins: HashMap::from([("ops".to_string(), "clarkin".to_string())]),
        }])
    }

    #[test]
    fn identity_lookups_resolve_both_directions() {
        let directory = directory();
        assert_eq!(directory.login_for("chat-7", "ops"), Some("clarkin"));
        assert_eq!(directory.login_for("chat-7", "infra"), None);
        assert_eq!(directory.login_for("chat-9", "ops"), None);
        assert_eq!(
            directory.display_name_for_login("ops", "clarkin"),
            Some("Casey Larkin")
        );
        assert_eq!(directory.display_name_for_login("ops", "stranger"), None);
    }
}
