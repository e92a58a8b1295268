//! Computed admission views.
//!
//! These are snapshots derived from store counters at check time; none of
//! them is ever persisted.

use serde::Serialize;

use super::policy::QuotaLimit;

/// Result of one short-window rate limit check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOutcome {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured window limit
    pub limit: u32,
    /// Requests counted in this window, including this one
    pub current: u64,
    /// Requests left in this window
    pub remaining: u64,
    /// Approximate Unix time when the window resets
    pub reset_time: i64,
    /// Seconds to wait before retrying; zero when allowed
    pub retry_after: u64,
}

/// Result of a monthly quota check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyUsage {
    /// Whether one more billable call fits in this month's allowance
    pub allowed: bool,
    /// Calls consumed this calendar month
    pub current: u64,
    /// Monthly allowance for the caller's tier
    pub limit: QuotaLimit,
    /// Allowance left this month
    pub remaining: QuotaLimit,
}

/// Snapshot of a window counter, taken without consuming a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Requests counted in the current window
    pub current: u64,
    /// Configured window limit
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u64,
    /// Unix time when the window resets; `None` when the store reports no
    /// expiry for the key
    pub reset_time: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = RateLimitOutcome {
            allowed: false,
            limit: 100,
            current: 101,
            remaining: 0,
            reset_time: 1_701_003_600,
            retry_after: 3600,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "allowed": false,
                "limit": 100,
                "current": 101,
                "remaining": 0,
                "resetTime": 1_701_003_600,
                "retryAfter": 3600,
            })
        );
    }

    #[test]
    fn test_monthly_usage_unlimited_serializes_null() {
        let usage = MonthlyUsage {
            allowed: true,
            current: 42,
            limit: QuotaLimit::Unlimited,
            remaining: QuotaLimit::Unlimited,
        };
        assert_eq!(
            serde_json::to_value(&usage).unwrap(),
            json!({
                "allowed": true,
                "current": 42,
                "limit": null,
                "remaining": null,
            })
        );
    }

    #[test]
    fn test_status_without_expiry_serializes_null_reset() {
        let status = RateLimitStatus {
            current: 0,
            limit: 100,
            remaining: 100,
            reset_time: None,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap()["resetTime"],
            json!(null)
        );
    }
}
