//! Rolling per-provider counters and aggregate request stats.
//!
//! Snapshot semantics are read-only copies; recording is a short
//! mutex-guarded update that never blocks a routing decision on I/O.

use crate::breaker::BreakerSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct ProviderStats {
    success_count: u64,
    failure_count: u64,
    rejection_count: u64,
    last_latency: Option<Duration>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Aggregate {
    requests_total: u64,
    requests_succeeded: u64,
    attempts_total: u64,
}

/// Collector shared by all in-flight requests
#[derive(Debug, Default)]
pub struct RouterMetrics {
    providers: Mutex<HashMap<String, ProviderStats>>,
    aggregate: Mutex<Aggregate>,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, provider: &str, latency: Duration) {
        let mut providers = self.providers.lock().expect("metrics lock poisoned");
        let stats = providers.entry(provider.to_string()).or_default();
        stats.success_count += 1;
        stats.last_latency = Some(latency);
        stats.last_success_at = Some(Utc::now());
    }

    pub fn record_failure(&self, provider: &str, latency: Duration) {
        let mut providers = self.providers.lock().expect("metrics lock poisoned");
        let stats = providers.entry(provider.to_string()).or_default();
        stats.failure_count += 1;
        stats.last_latency = Some(latency);
        stats.last_failure_at = Some(Utc::now());
    }

    /// A content rejection is tracked separately from availability
    /// failures
    pub fn record_rejection(&self, provider: &str, latency: Duration) {
        let mut providers = self.providers.lock().expect("metrics lock poisoned");
        let stats = providers.entry(provider.to_string()).or_default();
        stats.rejection_count += 1;
        stats.last_latency = Some(latency);
    }

    /// Record a finished request with how many attempts it took
    pub fn record_request(&self, attempts: u64, succeeded: bool) {
        let mut agg = self.aggregate.lock().expect("metrics lock poisoned");
        agg.requests_total += 1;
        agg.attempts_total += attempts;
        if succeeded {
            agg.requests_succeeded += 1;
        }
    }

    pub fn provider_snapshot(&self, provider: &str) -> ProviderMetricsSnapshot {
        let providers = self.providers.lock().expect("metrics lock poisoned");
        let stats = providers.get(provider).cloned().unwrap_or_default();
        ProviderMetricsSnapshot::from_stats(&stats)
    }

    pub fn aggregate_snapshot(&self) -> AggregateSnapshot {
        let agg = self.aggregate.lock().expect("metrics lock poisoned");
        AggregateSnapshot {
            requests_total: agg.requests_total,
            requests_succeeded: agg.requests_succeeded,
            success_rate: if agg.requests_total > 0 {
                agg.requests_succeeded as f64 / agg.requests_total as f64
            } else {
                0.0
            },
            avg_attempts_per_request: if agg.requests_total > 0 {
                agg.attempts_total as f64 / agg.requests_total as f64
            } else {
                0.0
            },
        }
    }
}

/// Per-provider rolling counters, serialized for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetricsSnapshot {
    pub success_count: u64,
    pub failure_count: u64,
    pub rejection_count: u64,
    pub last_latency_ms: Option<u64>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl ProviderMetricsSnapshot {
    fn from_stats(stats: &ProviderStats) -> Self {
        Self {
            success_count: stats.success_count,
            failure_count: stats.failure_count,
            rejection_count: stats.rejection_count,
            last_latency_ms: stats.last_latency.map(|d| d.as_millis() as u64),
            last_success_at: stats.last_success_at,
            last_failure_at: stats.last_failure_at,
        }
    }
}

/// Aggregate request stats across all providers
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSnapshot {
    pub requests_total: u64,
    pub requests_succeeded: u64,
    pub success_rate: f64,
    pub avg_attempts_per_request: f64,
}

/// One provider's full health view: breaker plus counters
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub breaker: BreakerSnapshot,
    #[serde(flatten)]
    pub metrics: ProviderMetricsSnapshot,
}

/// Everything the status endpoint exposes
#[derive(Debug, Clone, Serialize)]
pub struct RouterSnapshot {
    pub providers: Vec<ProviderHealth>,
    #[serde(flatten)]
    pub aggregate: AggregateSnapshot,
}
