//! Request Interceptor
//!
//! Holds the single installed intercept rule and decides, per request,
//! whether to let it through or redirect it to the local "blocked" page.
//!
//! Installing replaces the whole rule in one swap. A decision always reads
//! one fully installed rule, never a half-updated pattern set.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, trace};

use crate::pattern::{Pattern, PatternSet};
use crate::url::{extract_host, is_web_scheme};

/// Default destination for blocked requests.
pub const DEFAULT_REDIRECT: &str = "/blocked.html";

/// An installed rule: redirect every request matching `patterns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptRule {
    pub id: u32,
    pub patterns: PatternSet,
    pub redirect_to: String,
}

/// Decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptResult {
    /// No installed pattern matches
    Allow,
    /// Send the request to the informational page instead
    Redirect {
        to: String,
        rule_id: u32,
        pattern: Pattern,
    },
}

impl InterceptResult {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }
}

/// Interception counters.
#[derive(Debug, Default)]
struct InterceptorStats {
    total_requests: AtomicU64,
    redirected_requests: AtomicU64,
}

/// Point-in-time copy of the interception counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub redirected_requests: u64,
}

#[derive(Debug)]
struct Shared {
    slot: RwLock<Option<Arc<InterceptRule>>>,
    next_id: AtomicU32,
    redirect_to: String,
    stats: InterceptorStats,
}

/// Cloneable handle to the interception slot.
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    shared: Arc<Shared>,
}

impl Default for RequestInterceptor {
    fn default() -> Self {
        Self::new(DEFAULT_REDIRECT)
    }
}

impl RequestInterceptor {
    /// Create an interceptor with nothing installed.
    pub fn new(redirect_to: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: RwLock::new(None),
                next_id: AtomicU32::new(1),
                redirect_to: redirect_to.into(),
                stats: InterceptorStats::default(),
            }),
        }
    }

    pub fn redirect_to(&self) -> &str {
        &self.shared.redirect_to
    }

    /// Install a rule for `patterns`, replacing any existing one.
    /// Returns the new rule id.
    pub fn install(&self, patterns: PatternSet) -> u32 {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let rule = Arc::new(InterceptRule {
            id,
            patterns,
            redirect_to: self.shared.redirect_to.clone(),
        });

        let previous = self
            .shared
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(rule);
        debug!(
            "Installed intercept rule {} (replaced {:?})",
            id,
            previous.map(|r| r.id)
        );
        id
    }

    /// Remove the installed rule. Returns `false` if none was installed.
    pub fn uninstall(&self) -> bool {
        let previous = self
            .shared
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rule) = &previous {
            debug!("Uninstalled intercept rule {}", rule.id);
        }
        previous.is_some()
    }

    /// The currently installed rule.
    pub fn installed(&self) -> Option<Arc<InterceptRule>> {
        self.shared
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decide what happens to a request for `url`.
    pub fn intercept(&self, url: &str) -> InterceptResult {
        self.shared.stats.total_requests.fetch_add(1, Ordering::Relaxed);

        if !is_web_scheme(url) {
            return InterceptResult::Allow;
        }
        let Some(host) = extract_host(url) else {
            return InterceptResult::Allow;
        };
        let Some(rule) = self.installed() else {
            return InterceptResult::Allow;
        };

        match rule.patterns.matching(host) {
            Some(pattern) => {
                self.shared.stats.redirected_requests.fetch_add(1, Ordering::Relaxed);
                trace!("Redirecting {} ({})", url, pattern);
                InterceptResult::Redirect {
                    to: rule.redirect_to.clone(),
                    rule_id: rule.id,
                    pattern: pattern.clone(),
                }
            }
            None => InterceptResult::Allow,
        }
    }

    /// Shorthand for `intercept(url).is_redirect()`.
    pub fn should_redirect(&self, url: &str) -> bool {
        self.intercept(url).is_redirect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.shared.stats.total_requests.load(Ordering::Relaxed),
            redirected_requests: self.shared.stats.redirected_requests.load(Ordering::Relaxed),
        }
    }
}
