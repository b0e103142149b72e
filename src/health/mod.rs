//! Passive liveness tracking.
//!
//! The engine treats liveness as an input: something outside decides
//! whether a backend may take new requests and flips its availability
//! flag. For callers that derive liveness from request outcomes, this
//! module turns a stream of per-backend successes and failures into those
//! flips, using consecutive-outcome thresholds. Active probing is out of
//! scope.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::balance::Balancer;

/// Thresholds for flipping availability.
#[derive(Debug, Clone, Copy)]
pub struct LivenessPolicy {
    /// Consecutive failures before a backend is marked down.
    pub fall: u32,
    /// Consecutive successes before a downed backend is restored.
    pub rise: u32,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self { fall: 3, rise: 2 }
    }
}

#[derive(Default)]
struct OutcomeCounters {
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

/// Per-backend outcome counters driving `set_avail`.
pub struct LivenessTracker {
    policy: LivenessPolicy,
    counters: DashMap<String, OutcomeCounters>,
}

impl LivenessTracker {
    pub fn new(policy: LivenessPolicy) -> Self {
        Self {
            policy,
            counters: DashMap::new(),
        }
    }

    /// Record a successful request outcome for `name`.
    pub fn record_success(&self, balancer: &Balancer, name: &str) {
        let counters = self.counters.entry(name.to_string()).or_default();
        counters.consecutive_failures.store(0, Ordering::Relaxed);
        let run = counters.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        drop(counters);

        if run >= self.policy.rise {
            if let Some(backend) = balancer.backend(name) {
                if !backend.avail() {
                    info!(backend = name, successes = run, "backend restored");
                    backend.set_avail(true);
                }
            }
        }
    }

    /// Record a failed request outcome for `name`.
    pub fn record_failure(&self, balancer: &Balancer, name: &str) {
        let counters = self.counters.entry(name.to_string()).or_default();
        counters.consecutive_successes.store(0, Ordering::Relaxed);
        let run = counters.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        drop(counters);

        if run == self.policy.fall {
            warn!(backend = name, failures = run, "backend marked down");
            balancer.set_avail(name, false);
        }
    }

    /// Forget counters for backends no longer in the pool.
    pub fn retain_pool(&self, balancer: &Balancer) {
        self.counters
            .retain(|name, _| balancer.backend(name).is_some());
    }
}
