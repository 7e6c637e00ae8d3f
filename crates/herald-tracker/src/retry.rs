//! Bounded-retry predicates and backoff math for tracker HTTP calls.

pub const BASE_BACKOFF_MS: u64 = 200;

pub fn should_retry_status(status: u16) -> bool {
    status == 408 || status == 425 || status == 429 || status >= 500
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

pub fn retry_delay_ms(attempt: usize, base_delay_ms: u64) -> u64 {
    let shift = attempt.min(6);
    base_delay_ms.max(1).saturating_mul(1_u64 << shift)
}

/// Truncates a response body so a failed call never floods the log.
pub fn truncate_for_error(body: &str) -> String {
    const MAX_CHARS: usize = 400;
    if body.chars().count() <= MAX_CHARS {
        return body.to_string();
    }
    let truncated: String = body.chars().take(MAX_CHARS).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_status_selection_is_correct() {
        assert!(should_retry_status(429));
        assert!(should_retry_status(503));
        assert!(!should_retry_status(400));
        assert!(!should_retry_status(404));
    }

    #[test]
    fn backoff_doubles_per_attempt_and_caps() {
        assert_eq!(retry_delay_ms(0, BASE_BACKOFF_MS), 200);
        assert_eq!(retry_delay_ms(1, BASE_BACKOFF_MS), 400);
        assert_eq!(retry_delay_ms(2, BASE_BACKOFF_MS), 800);
        assert_eq!(retry_delay_ms(64, BASE_BACKOFF_MS), retry_delay_ms(6, BASE_BACKOFF_MS));
    }

    #[test]
    fn error_bodies_are_truncated() {
        let long = "x".repeat(1_000);
        let rendered = truncate_for_error(&long);
        assert!(rendered.chars().count() < 1_000);
        assert!(rendered.ends_with('…'));
        assert_eq!(truncate_for_error("short"), "short");
    }
}
