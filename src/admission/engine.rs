//! The admission engine.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::config::TollgateConfig;
use crate::store::CounterStore;

use super::key::{month_key, WindowKey, DEFAULT_PURPOSE};
use super::outcome::{MonthlyUsage, RateLimitOutcome, RateLimitStatus};
use super::policy::{PlanTier, QuotaPolicy};

/// Garbage-collection TTL on monthly counters. Rollover comes from the
/// calendar month in the key, not from this.
const MONTHLY_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Fixed-window rate checks and monthly quota enforcement over an
/// injected counter store.
///
/// The engine holds no durable state of its own; every counter lives in
/// the store, so any number of engine instances across any number of
/// processes converge on the same counts.
///
/// Store failures are handled fail-open: the check reports the request as
/// allowed with nominal values, logs a warning, and the caller never sees
/// an error. An outage in the admission layer must not become an outage
/// of the API behind it.
pub struct AdmissionEngine<S: CounterStore> {
    store: Arc<S>,
    config: TollgateConfig,
    policy: QuotaPolicy,
}

impl<S: CounterStore> Clone for AdmissionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S: CounterStore> AdmissionEngine<S> {
    /// Create an engine over `store` with the given configuration.
    pub fn new(store: Arc<S>, config: TollgateConfig) -> Self {
        let policy = QuotaPolicy::from(&config.quota);
        Self {
            store,
            config,
            policy,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    /// Check and consume one slot in the caller's current window.
    ///
    /// Increments the window counter, creating it with the window's TTL
    /// when absent, and compares the new count against `limit`. The
    /// reported `reset_time` is `now + window`, an upper bound on the
    /// counter's true expiry.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        limit: u32,
        window_minutes: u64,
    ) -> RateLimitOutcome {
        let window_seconds = window_minutes * 60;
        let now = Utc::now().timestamp();
        let key = WindowKey::derive(identifier, DEFAULT_PURPOSE, window_seconds, now);

        trace!(key = %key, limit = limit, "Checking rate limit");

        match self.store.increment(&key.to_store_key(), window_seconds).await {
            Ok(current) => {
                let allowed = current <= u64::from(limit);
                if !allowed {
                    debug!(
                        key = %key,
                        current = current,
                        limit = limit,
                        "Rate limit exceeded"
                    );
                }
                RateLimitOutcome {
                    allowed,
                    limit,
                    current,
                    remaining: u64::from(limit).saturating_sub(current),
                    reset_time: now + window_seconds as i64,
                    retry_after: if allowed { 0 } else { window_seconds },
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    identifier = %identifier,
                    "Rate limit check failed, failing open"
                );
                RateLimitOutcome {
                    allowed: true,
                    limit,
                    current: 0,
                    remaining: u64::from(limit),
                    reset_time: now + window_seconds as i64,
                    retry_after: 0,
                }
            }
        }
    }

    /// Check the caller's monthly quota without consuming from it.
    ///
    /// Reads the month counter and resolves the allowance from the plan
    /// tier; `allowed` answers whether one more billable call fits.
    /// Usage is recorded separately via [`increment_monthly_usage`],
    /// since not every admitted request is billable.
    ///
    /// [`increment_monthly_usage`]: AdmissionEngine::increment_monthly_usage
    pub async fn check_monthly_limit(&self, user_id: &str, tier: PlanTier) -> MonthlyUsage {
        let limit = self.policy.monthly_limit(tier);
        let key = month_key(user_id, Utc::now());

        let current = match self.store.get(&key).await {
            Ok(value) => value.and_then(|v| v.as_u64()).unwrap_or(0),
            Err(e) => {
                warn!(
                    error = %e,
                    user_id = %user_id,
                    tier = %tier,
                    "Monthly quota check failed, failing open"
                );
                return MonthlyUsage {
                    allowed: true,
                    current: 0,
                    limit,
                    remaining: limit,
                };
            }
        };

        MonthlyUsage {
            allowed: limit.admits(current),
            current,
            limit,
            remaining: limit.remaining(current),
        }
    }

    /// Record one billable call against the user's monthly quota.
    ///
    /// Call once per billable unit of work. Returns the month's new
    /// total, or `0` when the store was unreachable; in the failure case
    /// the call goes uncounted rather than unserved.
    pub async fn increment_monthly_usage(&self, user_id: &str) -> u64 {
        let key = month_key(user_id, Utc::now());
        match self.store.increment(&key, MONTHLY_TTL_SECONDS).await {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    error = %e,
                    user_id = %user_id,
                    "Failed to record monthly usage"
                );
                0
            }
        }
    }

    /// Delete the caller's current window counter, freeing it immediately.
    ///
    /// An administrative escape hatch; it operates on the configured
    /// default window and purpose. Returns whether the deletion went
    /// through; a store failure reports `false` rather than an error.
    /// Resetting an absent counter succeeds.
    pub async fn reset_rate_limit(&self, identifier: &str) -> bool {
        let window_seconds = self.config.rate_limit.window_minutes * 60;
        let now = Utc::now().timestamp();
        let key = WindowKey::derive(identifier, DEFAULT_PURPOSE, window_seconds, now);

        match self.store.delete(&key.to_store_key()).await {
            Ok(()) => {
                debug!(key = %key, "Rate limit reset");
                true
            }
            Err(e) => {
                warn!(
                    error = %e,
                    identifier = %identifier,
                    "Failed to reset rate limit"
                );
                false
            }
        }
    }

    /// Snapshot the caller's current window without consuming a request.
    ///
    /// Uses the configured default limit and window. `reset_time` is
    /// `None` when the store reports no expiry for the key; an unknown
    /// reset is reported as unknown, never as a made-up timestamp.
    pub async fn rate_limit_status(&self, identifier: &str) -> RateLimitStatus {
        let limit = self.config.rate_limit.max_requests_per_window;
        let window_seconds = self.config.rate_limit.window_minutes * 60;
        let now = Utc::now().timestamp();
        let key = WindowKey::derive(identifier, DEFAULT_PURPOSE, window_seconds, now);
        let store_key = key.to_store_key();

        let current = match self.store.get(&store_key).await {
            Ok(value) => value.and_then(|v| v.as_u64()).unwrap_or(0),
            Err(e) => {
                warn!(
                    error = %e,
                    identifier = %identifier,
                    "Rate limit status check failed"
                );
                return RateLimitStatus {
                    current: 0,
                    limit,
                    remaining: u64::from(limit),
                    reset_time: None,
                };
            }
        };

        let reset_time = match self.store.ttl(&store_key).await {
            Ok(ttl) if ttl > 0 => Some(now + ttl),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    error = %e,
                    identifier = %identifier,
                    "Rate limit status TTL lookup failed"
                );
                None
            }
        };

        RateLimitStatus {
            current,
            limit,
            remaining: u64::from(limit).saturating_sub(current),
            reset_time,
        }
    }
}
