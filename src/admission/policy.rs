//! Plan tiers and the quota policy derived from them.

use serde::{Deserialize, Serialize};

use crate::config::QuotaConfig;

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Base monthly allowance
    #[default]
    Free,
    /// The free allowance times a configured multiplier
    Premium,
    /// No monthly cap
    Enterprise,
}

impl PlanTier {
    /// Resolve a tier name, case-insensitively. Unknown names resolve to
    /// `Free`: a bad plan string from upstream must degrade to the
    /// smallest allowance, not fail the request.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "premium" => PlanTier::Premium,
            "enterprise" => PlanTier::Enterprise,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Premium => "premium",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monthly call allowance: a finite cap, or unlimited for enterprise.
///
/// Modeled as a variant rather than a sentinel value so nothing ever does
/// arithmetic on "infinity". Serializes as the plain number, or `null`
/// when unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QuotaLimit {
    /// A finite monthly allowance
    Bounded(u64),
    /// No cap
    Unlimited,
}

impl QuotaLimit {
    /// Whether `current` usage still admits one more call.
    pub fn admits(&self, current: u64) -> bool {
        match self {
            QuotaLimit::Bounded(limit) => current < *limit,
            QuotaLimit::Unlimited => true,
        }
    }

    /// Allowance left at `current` usage.
    pub fn remaining(&self, current: u64) -> QuotaLimit {
        match self {
            QuotaLimit::Bounded(limit) => QuotaLimit::Bounded(limit.saturating_sub(current)),
            QuotaLimit::Unlimited => QuotaLimit::Unlimited,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, QuotaLimit::Unlimited)
    }
}

/// Mapping from plan tier to monthly allowance.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    free_calls_per_month: u64,
    premium_multiplier: u64,
}

impl QuotaPolicy {
    pub fn new(free_calls_per_month: u64, premium_multiplier: u64) -> Self {
        Self {
            free_calls_per_month,
            premium_multiplier,
        }
    }

    /// Monthly allowance for a tier.
    pub fn monthly_limit(&self, tier: PlanTier) -> QuotaLimit {
        match tier {
            PlanTier::Free => QuotaLimit::Bounded(self.free_calls_per_month),
            PlanTier::Premium => QuotaLimit::Bounded(
                self.free_calls_per_month
                    .saturating_mul(self.premium_multiplier),
            ),
            PlanTier::Enterprise => QuotaLimit::Unlimited,
        }
    }
}

impl From<&QuotaConfig> for QuotaPolicy {
    fn from(config: &QuotaConfig) -> Self {
        Self::new(config.free_calls_per_month, config.premium_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tiers() {
        assert_eq!(PlanTier::parse("free"), PlanTier::Free);
        assert_eq!(PlanTier::parse("premium"), PlanTier::Premium);
        assert_eq!(PlanTier::parse("enterprise"), PlanTier::Enterprise);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(PlanTier::parse("Premium"), PlanTier::Premium);
        assert_eq!(PlanTier::parse("ENTERPRISE"), PlanTier::Enterprise);
    }

    #[test]
    fn test_unknown_tier_resolves_to_free() {
        assert_eq!(PlanTier::parse("platinum"), PlanTier::Free);
        assert_eq!(PlanTier::parse(""), PlanTier::Free);
    }

    #[test]
    fn test_monthly_limits_per_tier() {
        let policy = QuotaPolicy::new(1000, 10);
        assert_eq!(
            policy.monthly_limit(PlanTier::Free),
            QuotaLimit::Bounded(1000)
        );
        assert_eq!(
            policy.monthly_limit(PlanTier::Premium),
            QuotaLimit::Bounded(10_000)
        );
        assert!(policy.monthly_limit(PlanTier::Enterprise).is_unlimited());
    }

    #[test]
    fn test_admits_up_to_but_not_at_limit() {
        let limit = QuotaLimit::Bounded(5);
        assert!(limit.admits(0));
        assert!(limit.admits(4));
        assert!(!limit.admits(5));
        assert!(!limit.admits(6));
        assert!(QuotaLimit::Unlimited.admits(u64::MAX));
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let limit = QuotaLimit::Bounded(5);
        assert_eq!(limit.remaining(2), QuotaLimit::Bounded(3));
        assert_eq!(limit.remaining(9), QuotaLimit::Bounded(0));
        assert_eq!(QuotaLimit::Unlimited.remaining(9), QuotaLimit::Unlimited);
    }

    #[test]
    fn test_quota_limit_serializes_as_number_or_null() {
        assert_eq!(
            serde_json::to_string(&QuotaLimit::Bounded(1000)).unwrap(),
            "1000"
        );
        assert_eq!(
            serde_json::to_string(&QuotaLimit::Unlimited).unwrap(),
            "null"
        );
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(PlanTier::Premium.to_string(), "premium");
        assert_eq!(
            serde_json::to_string(&PlanTier::Enterprise).unwrap(),
            "\"enterprise\""
        );
    }
}
