//! Request admission: the contract between the engine and an HTTP layer.
//!
//! The engine stays transport-agnostic. A [`RequestContext`] carries the
//! request attributes identity extraction needs, and the [`Decision`]
//! coming back carries everything a response needs: headers for both
//! verdicts, plus status and body for a denial. Wiring those onto an
//! actual framework's request and response types is the embedding
//! service's job.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;

use crate::config::TollgateConfig;
use crate::error::{Result, TollgateError};
use crate::store::CounterStore;

use super::engine::AdmissionEngine;
use super::outcome::RateLimitOutcome;

/// Standard rate limit headers (draft-ietf-ratelimit-headers), sent on
/// every decided response.
pub const HEADER_LIMIT: &str = "RateLimit-Limit";
pub const HEADER_REMAINING: &str = "RateLimit-Remaining";
pub const HEADER_RESET: &str = "RateLimit-Reset";

/// Legacy header names some clients still expect; off by default.
pub const HEADER_LEGACY_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_LEGACY_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_LEGACY_RESET: &str = "X-RateLimit-Reset";

/// Sent only on denial.
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// HTTP status a denial renders to.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

const DEFAULT_DENIAL_MESSAGE: &str = "Rate limit exceeded. Upgrade your plan or wait.";

/// Maps a request to the identifier its counter is keyed on.
pub type IdentityExtractor = Arc<dyn Fn(&RequestContext) -> String + Send + Sync>;

/// Transport-agnostic view of an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    remote_addr: Option<IpAddr>,
    headers: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    /// Header value by name, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Options for one admission check.
#[derive(Clone)]
pub struct AdmitOptions {
    /// Maximum requests per window
    pub limit: u32,
    /// Window length in minutes
    pub window_minutes: u64,
    /// Denial reason handed back to the client
    pub message: String,
    /// Emit `RateLimit-*` headers
    pub standard_headers: bool,
    /// Emit `X-RateLimit-*` headers as well
    pub legacy_headers: bool,
    /// Custom identity extraction; when unset, `x-forwarded-for` wins,
    /// then the remote address
    pub key_extractor: Option<IdentityExtractor>,
}

impl std::fmt::Debug for AdmitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmitOptions")
            .field("limit", &self.limit)
            .field("window_minutes", &self.window_minutes)
            .field("message", &self.message)
            .field("standard_headers", &self.standard_headers)
            .field("legacy_headers", &self.legacy_headers)
            .finish_non_exhaustive()
    }
}

impl Default for AdmitOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            window_minutes: 60,
            message: DEFAULT_DENIAL_MESSAGE.to_string(),
            standard_headers: true,
            legacy_headers: false,
            key_extractor: None,
        }
    }
}

impl AdmitOptions {
    /// Options aligned with the deployment's configured window limits,
    /// rather than the compiled-in defaults.
    pub fn from_config(config: &TollgateConfig) -> Self {
        Self {
            limit: config.rate_limit.max_requests_per_window,
            window_minutes: config.rate_limit.window_minutes,
            ..Self::default()
        }
    }
}

/// One request's admission decision.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The underlying window-check outcome, for downstream handlers
    pub outcome: RateLimitOutcome,
    headers: Vec<(&'static str, String)>,
    denial: Option<Denial>,
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        self.denial.is_none()
    }

    /// Response headers to set regardless of verdict.
    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// The denial, when the request must be refused.
    pub fn denial(&self) -> Option<&Denial> {
        self.denial.as_ref()
    }

    /// Status the decision renders to: `429` on denial, `None` when the
    /// request continues to its handler.
    pub fn status(&self) -> Option<u16> {
        self.denial.as_ref().map(|_| STATUS_TOO_MANY_REQUESTS)
    }
}

/// The refusal half of a decision.
#[derive(Debug, Clone)]
pub struct Denial {
    /// Seconds the client should wait before retrying
    pub retry_after: u64,
    /// Denial reason for the response body
    pub message: String,
}

impl Denial {
    /// JSON body for the `429` response.
    pub fn body(&self) -> DenialBody<'_> {
        DenialBody {
            error: &self.message,
            retry_after: self.retry_after,
        }
    }
}

/// Wire shape of the denial body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialBody<'a> {
    pub error: &'a str,
    pub retry_after: u64,
}

impl<S: CounterStore> AdmissionEngine<S> {
    /// Admit or refuse one request.
    ///
    /// Extracts the caller's identity, consumes a slot in its window, and
    /// packages the verdict with response headers. Store failures never
    /// surface here (the check fails open); the only error is caller
    /// misconfiguration, which is a bug at the call site and not a
    /// per-request condition.
    pub async fn admit(&self, ctx: &RequestContext, options: &AdmitOptions) -> Result<Decision> {
        if options.limit == 0 {
            return Err(TollgateError::MisconfiguredPolicy(
                "limit must be positive".to_string(),
            ));
        }
        if options.window_minutes == 0 {
            return Err(TollgateError::MisconfiguredPolicy(
                "window must be positive".to_string(),
            ));
        }

        let identifier = match &options.key_extractor {
            Some(extract) => extract(ctx),
            None => default_identity(ctx),
        };

        let outcome = self
            .check_rate_limit(&identifier, options.limit, options.window_minutes)
            .await;

        let mut headers = Vec::new();
        if options.standard_headers {
            headers.push((HEADER_LIMIT, outcome.limit.to_string()));
            headers.push((HEADER_REMAINING, outcome.remaining.to_string()));
            headers.push((HEADER_RESET, outcome.reset_time.to_string()));
        }
        if options.legacy_headers {
            headers.push((HEADER_LEGACY_LIMIT, outcome.limit.to_string()));
            headers.push((HEADER_LEGACY_REMAINING, outcome.remaining.to_string()));
            headers.push((HEADER_LEGACY_RESET, outcome.reset_time.to_string()));
        }

        let denial = if outcome.allowed {
            None
        } else {
            headers.push((HEADER_RETRY_AFTER, outcome.retry_after.to_string()));
            Some(Denial {
                retry_after: outcome.retry_after,
                message: options.message.clone(),
            })
        };

        Ok(Decision {
            outcome,
            headers,
            denial,
        })
    }
}

/// Default identity: the `x-forwarded-for` header if present, else the
/// remote address, else a shared bucket for callers with neither.
fn default_identity(ctx: &RequestContext) -> String {
    if let Some(forwarded) = ctx.header("x-forwarded-for") {
        return forwarded.to_string();
    }
    match ctx.remote_addr() {
        Some(addr) => addr.to_string(),
        None => "unknown".to_string(),
    }
}
