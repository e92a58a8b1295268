//! Admission control: fixed-window rate limits, monthly quotas, and the
//! per-request decision contract.

mod engine;
mod key;
mod middleware;
mod outcome;
mod policy;

pub use engine::AdmissionEngine;
pub use key::{month_key, WindowKey, DEFAULT_PURPOSE};
pub use middleware::{
    AdmitOptions, Decision, Denial, DenialBody, IdentityExtractor, RequestContext,
    HEADER_LEGACY_LIMIT, HEADER_LEGACY_REMAINING, HEADER_LEGACY_RESET, HEADER_LIMIT,
    HEADER_REMAINING, HEADER_RESET, HEADER_RETRY_AFTER, STATUS_TOO_MANY_REQUESTS,
};
pub use outcome::{MonthlyUsage, RateLimitOutcome, RateLimitStatus};
pub use policy::{PlanTier, QuotaLimit, QuotaPolicy};
