//! Sliding-window rate limiting for AI-calling paths
//!
//! Per (endpoint kind, identifier) request windows with a block period
//! after the budget is exceeded. Constructed and injected like the
//! cache; entries are pruned lazily on check plus an explicit
//! `cleanup` for housekeeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// Endpoint families with distinct budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// Standard AI endpoints
    Ai,
    /// Vision analysis (very expensive)
    Vision,
    /// PDF processing (very expensive and slow)
    Pdf,
    /// Query expansion (fast, cheap)
    Query,
    /// Knowledge graph (database heavy)
    Graph,
}

/// Window budget for one endpoint kind
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
    pub block_duration: Duration,
}

impl EndpointKind {
    fn config(self) -> RateLimitConfig {
        let minute = Duration::seconds(60);
        match self {
            Self::Ai => RateLimitConfig {
                window: minute,
                max_requests: 20,
                block_duration: Duration::seconds(60),
            },
            Self::Vision => RateLimitConfig {
                window: minute,
                max_requests: 10,
                block_duration: Duration::seconds(120),
            },
            Self::Pdf => RateLimitConfig {
                window: minute,
                max_requests: 5,
                block_duration: Duration::seconds(180),
            },
            Self::Query => RateLimitConfig {
                window: minute,
                max_requests: 60,
                block_duration: Duration::seconds(30),
            },
            Self::Graph => RateLimitConfig {
                window: minute,
                max_requests: 30,
                block_duration: Duration::seconds(60),
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
struct LimitEntry {
    requests: Vec<DateTime<Utc>>,
    blocked_until: Option<DateTime<Utc>>,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
    /// Seconds until the caller may retry, present when blocked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Rate limiter statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct RateLimiterStats {
    pub total_tracked: usize,
    pub currently_blocked: usize,
}

/// Sliding-window rate limiter
pub struct RateLimiter {
    limits: RwLock<HashMap<(EndpointKind, String), LimitEntry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            limits: RwLock::new(HashMap::new()),
        }
    }

    /// Check whether a request from `identifier` is allowed
    pub fn check(&self, identifier: &str, kind: EndpointKind) -> RateLimitDecision {
        self.check_at(identifier, kind, Utc::now())
    }

    fn check_at(&self, identifier: &str, kind: EndpointKind, now: DateTime<Utc>) -> RateLimitDecision {
        let config = kind.config();
        let mut limits = self.limits.write();
        let entry = limits
            .entry((kind, identifier.to_string()))
            .or_default();

        if let Some(blocked_until) = entry.blocked_until {
            if now < blocked_until {
                return RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: blocked_until,
                    retry_after: Some((blocked_until - now).num_seconds().max(1) as u64),
                };
            }
            // Block expired
            entry.blocked_until = None;
            entry.requests.clear();
        }

        let window_start = now - config.window;
        entry.requests.retain(|t| *t > window_start);

        if entry.requests.len() >= config.max_requests {
            let blocked_until = now + config.block_duration;
            entry.blocked_until = Some(blocked_until);
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: blocked_until,
                retry_after: Some(config.block_duration.num_seconds().max(1) as u64),
            };
        }

        entry.requests.push(now);

        RateLimitDecision {
            allowed: true,
            remaining: config.max_requests - entry.requests.len(),
            reset_at: now + config.window,
            retry_after: None,
        }
    }

    /// Remove idle and expired entries; returns the removed count
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let mut limits = self.limits.write();
        let before = limits.len();
        limits.retain(|(kind, _), entry| {
            let window_start = now - kind.config().window;
            entry.requests.retain(|t| *t > window_start);
            if let Some(blocked_until) = entry.blocked_until {
                if now > blocked_until {
                    entry.blocked_until = None;
                }
            }
            !entry.requests.is_empty() || entry.blocked_until.is_some()
        });
        before - limits.len()
    }

    /// Reset limits for an identifier, for one kind or all
    pub fn reset(&self, identifier: &str, kind: Option<EndpointKind>) {
        let mut limits = self.limits.write();
        match kind {
            Some(kind) => {
                limits.remove(&(kind, identifier.to_string()));
            }
            None => {
                limits.retain(|(_, id), _| id != identifier);
            }
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let now = Utc::now();
        let limits = self.limits.read();
        RateLimiterStats {
            total_tracked: limits.len(),
            currently_blocked: limits
                .values()
                .filter(|e| e.blocked_until.is_some_and(|b| b > now))
                .count(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_budget_then_blocks() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        for i in 0..5 {
            let decision = limiter.check_at("client", EndpointKind::Pdf, now);
            assert!(decision.allowed, "request {} should be allowed", i);
            assert_eq!(decision.remaining, 4 - i);
        }

        let decision = limiter.check_at("client", EndpointKind::Pdf, now);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.retry_after, Some(180));
    }

    #[test]
    fn block_expires_after_duration() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        for _ in 0..6 {
            limiter.check_at("client", EndpointKind::Pdf, now);
        }
        // Still blocked inside the block window
        let later = now + Duration::seconds(60);
        assert!(!limiter.check_at("client", EndpointKind::Pdf, later).allowed);

        // Past the block window the budget resets
        let past = now + Duration::seconds(181);
        assert!(limiter.check_at("client", EndpointKind::Pdf, past).allowed);
    }

    #[test]
    fn old_requests_fall_out_of_the_window() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        for _ in 0..5 {
            limiter.check_at("client", EndpointKind::Pdf, now);
        }
        // A minute later the window is clear again
        let later = now + Duration::seconds(61);
        assert!(limiter.check_at("client", EndpointKind::Pdf, later).allowed);
    }

    #[test]
    fn identifiers_and_kinds_are_independent() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        for _ in 0..6 {
            limiter.check_at("a", EndpointKind::Pdf, now);
        }
        assert!(!limiter.check_at("a", EndpointKind::Pdf, now).allowed);
        assert!(limiter.check_at("b", EndpointKind::Pdf, now).allowed);
        assert!(limiter.check_at("a", EndpointKind::Query, now).allowed);
    }

    #[test]
    fn reset_clears_state() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        for _ in 0..6 {
            limiter.check_at("a", EndpointKind::Pdf, now);
        }
        limiter.reset("a", Some(EndpointKind::Pdf));
        assert!(limiter.check_at("a", EndpointKind::Pdf, now).allowed);
    }

    #[test]
    fn stats_count_blocked_entries() {
        let limiter = RateLimiter::new();
        for _ in 0..6 {
            limiter.check("a", EndpointKind::Pdf);
        }
        limiter.check("b", EndpointKind::Ai);

        let stats = limiter.stats();
        assert_eq!(stats.total_tracked, 2);
        assert_eq!(stats.currently_blocked, 1);
    }
}
