//! Router/dispatcher — provider selection, fallback chaining, breaker
//! bookkeeping, and the public request/response contract.
//!
//! Each request walks its candidate list sequentially: breaker gate,
//! adapter call under a timeout, validation, then either return or
//! advance. Adapter failures count against the breaker; validation
//! rejections do not — a reachable provider that produced unsuitable
//! content is a content problem, not an availability problem.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::breaker::{BreakerConfig, CallOutcome, CircuitBreaker, BreakerState};
use crate::error::{Attempt, AttemptReason, RouteError};
use crate::metrics::{ProviderHealth, RouterMetrics, RouterSnapshot};
use crate::providers::ProviderAdapter;
use crate::types::{Completion, GenerationRequest, ProviderDescriptor};
use crate::validator::{ResponseValidator, Verdict};

/// Router timeouts
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Ceiling for a single adapter call
    pub call_timeout: Duration,
    /// Ceiling for the whole request, across all candidates
    pub request_deadline: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            request_deadline: Duration::from_secs(120),
        }
    }
}

struct ProviderEntry {
    descriptor: ProviderDescriptor,
    adapter: Arc<dyn ProviderAdapter>,
    breaker: CircuitBreaker,
}

/// Routes generation requests across configured providers with
/// circuit breaking, response validation, and transparent fallback
pub struct Router {
    entries: Vec<ProviderEntry>,
    validator: ResponseValidator,
    metrics: RouterMetrics,
    config: RouterConfig,
}

impl Router {
    pub fn new(validator: ResponseValidator, config: RouterConfig) -> Self {
        Self {
            entries: Vec::new(),
            validator,
            metrics: RouterMetrics::new(),
            config,
        }
    }

    /// Register a backend. The provider set is fixed once the router
    /// starts serving.
    pub fn register_provider(
        &mut self,
        descriptor: ProviderDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
        breaker_config: BreakerConfig,
    ) {
        info!(
            "Registered provider {} (priority {})",
            descriptor.name, descriptor.priority
        );
        let breaker = CircuitBreaker::new(descriptor.name.clone(), breaker_config);
        self.entries.push(ProviderEntry {
            descriptor,
            adapter,
            breaker,
        });
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    pub fn provider_count(&self) -> usize {
        self.entries.len()
    }

    /// True while at least one breaker is not Open (readiness signal)
    pub fn has_available_provider(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.breaker.state() != BreakerState::Open)
    }

    /// Candidate indices: the hinted provider first when known, then
    /// the rest by descending priority (ties keep configuration order)
    fn candidate_order(&self, hint: Option<&str>) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.entries[i].descriptor.priority));

        if let Some(hint) = hint {
            if let Some(pos) = order
                .iter()
                .position(|&i| self.entries[i].descriptor.name == hint)
            {
                let idx = order.remove(pos);
                order.insert(0, idx);
            } else {
                warn!("Provider hint {:?} does not match any configured provider", hint);
            }
        }

        order
    }

    /// Route a request: try candidates in order until one produces an
    /// accepted response, or fail terminally with every attempt
    /// enumerated. Each provider is attempted at most once.
    pub async fn route(&self, request: &GenerationRequest) -> Result<Completion, RouteError> {
        let deadline = Instant::now() + self.config.request_deadline;
        let mut attempts: Vec<Attempt> = Vec::new();

        for idx in self.candidate_order(request.provider.as_deref()) {
            let entry = &self.entries[idx];
            let name = entry.descriptor.name.as_str();

            let now = Instant::now();
            if now >= deadline {
                self.metrics.record_request(attempts.len() as u64, false);
                return Err(RouteError::DeadlineExceeded { attempts });
            }

            let Some(permit) = entry.breaker.try_acquire() else {
                debug!("Skipping provider {}: breaker open", name);
                attempts.push(Attempt::new(name, AttemptReason::BreakerOpen));
                continue;
            };

            let remaining = deadline - now;
            let budget = self.config.call_timeout.min(remaining);
            let deadline_limited = remaining < self.config.call_timeout;

            debug!("Attempting provider {} ({})", name, entry.adapter.model());
            let started = Instant::now();
            let outcome = tokio::time::timeout(budget, entry.adapter.invoke(request)).await;
            let latency = started.elapsed();

            let raw = match outcome {
                Err(_) if deadline_limited => {
                    // The caller's deadline cut this call short; the
                    // provider gets no availability signal
                    permit.record(CallOutcome::Neutral);
                    self.metrics.record_request(attempts.len() as u64, false);
                    warn!("Request deadline exceeded while calling {}", name);
                    return Err(RouteError::DeadlineExceeded { attempts });
                }
                Err(_) => {
                    permit.record(CallOutcome::Failure);
                    self.metrics.record_failure(name, latency);
                    warn!("Provider {} timed out after {:?}", name, latency);
                    attempts.push(Attempt::new(
                        name,
                        AttemptReason::Adapter(crate::error::AdapterErrorKind::Timeout),
                    ));
                    continue;
                }
                Ok(Err(err)) => {
                    permit.record(CallOutcome::Failure);
                    self.metrics.record_failure(name, latency);
                    warn!("Provider {} failed: {}", name, err);
                    attempts.push(Attempt::new(name, AttemptReason::Adapter(err.kind)));
                    continue;
                }
                Ok(Ok(raw)) => raw,
            };

            match self.validator.validate(&raw.text) {
                Verdict::Accepted => {
                    permit.record(CallOutcome::Success);
                    self.metrics.record_success(name, latency);
                    self.metrics
                        .record_request(attempts.len() as u64 + 1, true);
                    let fallback = !attempts.is_empty();
                    if fallback {
                        info!("Request served by fallback provider {}", name);
                    }
                    return Ok(Completion {
                        provider: name.to_string(),
                        model: raw.model,
                        text: raw.text,
                        usage: raw.usage,
                        latency,
                        fallback,
                    });
                }
                Verdict::Rejected(reason) => {
                    // Soft failure: the call reached the provider, so
                    // the breaker sees neither success nor failure
                    permit.record(CallOutcome::Neutral);
                    self.metrics.record_rejection(name, latency);
                    warn!("Provider {} response rejected: {}", name, reason);
                    attempts.push(Attempt::new(name, AttemptReason::Rejected(reason)));
                }
            }
        }

        self.metrics.record_request(attempts.len() as u64, false);
        Err(RouteError::Exhausted { attempts })
    }

    /// Read-only health view for the status endpoint; never blocks an
    /// in-flight routing decision beyond the counter mutexes
    pub fn snapshot(&self) -> RouterSnapshot {
        let providers = self
            .entries
            .iter()
            .map(|e| ProviderHealth {
                name: e.descriptor.name.clone(),
                breaker: e.breaker.snapshot(),
                metrics: self.metrics.provider_snapshot(&e.descriptor.name),
            })
            .collect();
        RouterSnapshot {
            providers,
            aggregate: self.metrics.aggregate_snapshot(),
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("providers", &self.provider_names())
            .field("config", &self.config)
            .finish()
    }
}
