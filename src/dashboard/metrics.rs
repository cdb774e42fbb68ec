//! Metrics collection for the dashboard
//!
//! Thread-safe counters for decisions, their outcomes and policy store
//! health.

use crate::access_control::AccessDecision;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

/// Decision metrics collector
pub struct DecisionMetrics {
    /// Server start time
    start_time: Instant,
    /// Server start time as SystemTime (for display)
    start_system_time: SystemTime,
    total_decisions: AtomicU64,
    total_allowed: AtomicU64,
    total_denied: AtomicU64,
    /// Policy reads that failed and degraded to an empty role set
    store_failures: AtomicU64,
    /// Combined metrics data (single lock for all collections)
    data: RwLock<MetricsData>,
    /// Maximum recent decisions to keep
    max_recent_decisions: usize,
}

#[derive(Default)]
struct OutcomeStatsInner {
    count: u64,
    total_duration_us: u64,
    last_seen: Option<SystemTime>,
}

#[derive(Default)]
struct MetricsData {
    outcome_stats: HashMap<&'static str, OutcomeStatsInner>,
    recent_decisions: VecDeque<DecisionRecord>,
}

/// Record of a recent decision
#[derive(Clone, Serialize)]
pub struct DecisionRecord {
    pub path: String,
    pub method: String,
    pub allowed: bool,
    /// Allow or deny reason label
    pub reason: String,
    pub duration_us: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Serializable per-outcome statistics for API
#[derive(Clone, Serialize)]
pub struct OutcomeStats {
    pub reason: String,
    pub allowed: bool,
    pub count: u64,
    pub avg_duration_us: u64,
    pub last_seen: Option<u64>,
}

/// Overall metrics snapshot for API
#[derive(Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub start_time: u64,
    pub total_decisions: u64,
    pub total_allowed: u64,
    pub total_denied: u64,
    pub store_failures: u64,
    pub decisions_per_minute: f64,
    pub outcomes: Vec<OutcomeStats>,
    pub recent_decisions: Vec<DecisionRecord>,
}

fn unix_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Create a collector keeping the last `max_recent_decisions` decisions
    pub fn with_capacity(max_recent_decisions: usize) -> Self {
        Self {
            start_time: Instant::now(),
            start_system_time: SystemTime::now(),
            total_decisions: AtomicU64::new(0),
            total_allowed: AtomicU64::new(0),
            total_denied: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            data: RwLock::new(MetricsData {
                outcome_stats: HashMap::new(),
                recent_decisions: VecDeque::with_capacity(max_recent_decisions),
            }),
            max_recent_decisions,
        }
    }

    // Poisoned locks are recovered: losing a counter update beats panicking
    // inside the decision path.

    fn write_data(&self) -> RwLockWriteGuard<'_, MetricsData> {
        self.data.write().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_data(&self) -> RwLockReadGuard<'_, MetricsData> {
        self.data.read().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record one finished decision
    pub fn record_decision(
        &self,
        path: &str,
        method: &str,
        decision: &AccessDecision,
        duration: Duration,
    ) {
        let duration_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let now = SystemTime::now();
        let allowed = decision.is_allowed();
        let label = decision.label();

        self.total_decisions.fetch_add(1, Ordering::Relaxed);
        if allowed {
            self.total_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_denied.fetch_add(1, Ordering::Relaxed);
        }

        let mut data = self.write_data();

        let entry = data.outcome_stats.entry(label).or_default();
        entry.count += 1;
        entry.total_duration_us = entry.total_duration_us.saturating_add(duration_us);
        entry.last_seen = Some(now);

        if self.max_recent_decisions == 0 {
            return;
        }
        if data.recent_decisions.len() >= self.max_recent_decisions {
            data.recent_decisions.pop_front();
        }
        data.recent_decisions.push_back(DecisionRecord {
            path: path.to_string(),
            method: method.to_string(),
            allowed,
            reason: label.to_string(),
            duration_us,
            timestamp: unix_secs(now).unwrap_or(0),
        });
    }

    /// Count a policy read that failed
    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime_secs = self.start_time.elapsed().as_secs();
        let total_decisions = self.total_decisions.load(Ordering::Relaxed);

        let decisions_per_minute = if uptime_secs > 0 {
            (total_decisions as f64 / uptime_secs as f64) * 60.0
        } else {
            0.0
        };

        let data = self.read_data();

        let mut outcomes: Vec<OutcomeStats> = data
            .outcome_stats
            .iter()
            .map(|(reason, s)| OutcomeStats {
                reason: reason.to_string(),
                allowed: is_allow_label(reason),
                count: s.count,
                avg_duration_us: if s.count > 0 {
                    s.total_duration_us / s.count
                } else {
                    0
                },
                last_seen: s.last_seen.and_then(unix_secs),
            })
            .collect();
        outcomes.sort_unstable_by(|a, b| b.count.cmp(&a.count).then(a.reason.cmp(&b.reason)));

        let recent_decisions: Vec<_> = data.recent_decisions.iter().cloned().collect();

        drop(data);

        MetricsSnapshot {
            uptime_secs,
            start_time: unix_secs(self.start_system_time).unwrap_or(0),
            total_decisions,
            total_allowed: self.total_allowed.load(Ordering::Relaxed),
            total_denied: self.total_denied.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            decisions_per_minute,
            outcomes,
            recent_decisions,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn total_decisions(&self) -> u64 {
        self.total_decisions.load(Ordering::Relaxed)
    }

    pub fn total_denied(&self) -> u64 {
        self.total_denied.load(Ordering::Relaxed)
    }
}

fn is_allow_label(label: &str) -> bool {
    matches!(label, "exempt" | "preflight" | "role_granted")
}

impl Default for DecisionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
