//! Fetch orchestration: cache lookup, prioritized source fallback, circuit
//! bookkeeping and stale-cache degradation.

use std::sync::Arc;
use std::time::Duration;

use fundlayer_store::{CacheStats, CacheStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheAccessError, CacheMode, CachedValue, ResponseCache};
use crate::config::FetchConfig;
use crate::data_source::{DataSource, DataType, FetchParams, SourceError};
use crate::registry::{SourceDescriptor, SourceHealth, SourceRegistry};
use crate::validation::{PayloadShape, Validator};
use crate::{FetchError, UtcDateTime, ValidationError};

/// One logical fetch: what to get, how to judge it and how to cache it.
#[derive(Clone)]
pub struct FetchRequest {
    data_type: DataType,
    params: FetchParams,
    validator: Arc<dyn Validator>,
    cache_mode: CacheMode,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("data_type", &self.data_type)
            .field("params", &self.params)
            .field("cache_mode", &self.cache_mode)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl FetchRequest {
    /// Request with no parameters, the `Any` shape validator, cache mode
    /// `Use` and the data type's default TTL.
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            params: FetchParams::new(),
            validator: Arc::new(PayloadShape::Any),
            cache_mode: CacheMode::Use,
            ttl: None,
        }
    }

    pub fn params(mut self, params: FetchParams) -> Self {
        self.params = params;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// `false` skips the fresh-cache read but still writes the result.
    pub fn use_cache(self, use_cache: bool) -> Self {
        self.cache_mode(CacheMode::from_use_cache(use_cache))
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn fetch_params(&self) -> &FetchParams {
        &self.params
    }

    pub fn mode(&self) -> CacheMode {
        self.cache_mode
    }

    pub fn cache_key(&self) -> String {
        self.params.cache_key(&self.data_type)
    }
}

/// Where a served value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// Fresh cache entry.
    Cache,
    /// Live upstream call.
    Live { source: String },
    /// Expired cache entry served because every source failed.
    StaleCache,
}

impl Origin {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Live { .. } => "live",
            Self::StaleCache => "stale_cache",
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Live { source } => Some(source),
            Self::Cache | Self::StaleCache => None,
        }
    }
}

/// What happened to one source during one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    SkippedCircuitOpen { open_until: Option<UtcDateTime> },
    Failed { error: SourceError },
    Rejected { reason: String },
    TimedOut { after_ms: u64 },
    /// The request deadline ran out before this source's turn.
    NotAttempted,
}

impl AttemptOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::SkippedCircuitOpen { .. } => "skipped_circuit_open",
            Self::Failed { .. } => "failed",
            Self::Rejected { .. } => "rejected",
            Self::TimedOut { .. } => "timed_out",
            Self::NotAttempted => "not_attempted",
        }
    }

    /// Whether the attempt counted against the source's circuit.
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::Rejected { .. } | Self::TimedOut { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAttempt {
    pub source: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

/// Successful fetch result with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResponse {
    pub value: Value,
    pub origin: Origin,
    pub attempts: Vec<SourceAttempt>,
    pub warnings: Vec<String>,
    pub latency_ms: u64,
    /// Write time of the cache entry, when the value came from the cache.
    pub cached_at: Option<UtcDateTime>,
}

impl FetchResponse {
    /// `true` when a stale cache entry stood in for live data.
    pub fn is_degraded(&self) -> bool {
        self.origin == Origin::StaleCache
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }
}

/// Public entry point of the data layer.
///
/// Holds the source registry and the persistent cache; share it behind an
/// `Arc` between tasks.
#[derive(Debug)]
pub struct FetchOrchestrator {
    config: FetchConfig,
    registry: SourceRegistry,
    cache: ResponseCache,
}

impl FetchOrchestrator {
    pub fn new(store: CacheStore, config: FetchConfig) -> Self {
        Self {
            registry: SourceRegistry::new(config.circuit()),
            cache: ResponseCache::new(store),
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Appends `source` to the fallback list of `data_type`.
    pub fn register<S>(
        &self,
        data_type: &DataType,
        name: impl Into<String>,
        source: S,
    ) -> Arc<SourceDescriptor>
    where
        S: DataSource + 'static,
    {
        self.registry.register(data_type, name, Arc::new(source))
    }

    /// Fetches one logical item, walking the registered sources in priority
    /// order and degrading to a stale cache entry when all of them fail.
    pub async fn fetch_with_fallback(
        &self,
        request: FetchRequest,
    ) -> Result<FetchResponse, FetchError> {
        let started = Instant::now();
        let data_type = request.data_type.clone();
        let key = request.cache_key();
        let ttl = request.ttl.unwrap_or_else(|| self.config.ttl_for(&data_type));
        if ttl.is_zero() {
            return Err(ValidationError::ZeroTtl.into());
        }

        if request.cache_mode.reads_fresh() {
            if let Some(hit) = self.read_cache(&request, &key).await {
                if hit.fresh {
                    tracing::debug!(data_type = %data_type, key = %key, "serving fresh cache entry");
                    return Ok(FetchResponse {
                        value: hit.value,
                        origin: Origin::Cache,
                        attempts: Vec::new(),
                        warnings: Vec::new(),
                        latency_ms: elapsed_ms(started),
                        cached_at: Some(UtcDateTime::from(hit.created_at)),
                    });
                }
            }
        }

        let sources = self.registry.sources_for(&data_type);
        if sources.is_empty() {
            tracing::error!(data_type = %data_type, "no sources configured");
            return Err(FetchError::Configuration {
                data_type: data_type.to_string(),
            });
        }

        let deadline = started + self.config.request_timeout;
        let mut attempts = Vec::with_capacity(sources.len());

        for descriptor in sources {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                attempts.push(SourceAttempt {
                    source: descriptor.name().to_owned(),
                    outcome: AttemptOutcome::NotAttempted,
                    latency_ms: 0,
                });
                continue;
            }

            let now = self.cache.now();
            if !descriptor.circuit().is_eligible(now) {
                let open_until = descriptor.circuit().snapshot().open_until;
                tracing::debug!(
                    data_type = %data_type,
                    source = descriptor.name(),
                    "skipping source with open circuit"
                );
                attempts.push(SourceAttempt {
                    source: descriptor.name().to_owned(),
                    outcome: AttemptOutcome::SkippedCircuitOpen { open_until },
                    latency_ms: 0,
                });
                continue;
            }

            let budget = self.config.source_timeout.min(remaining);
            let call_started = Instant::now();
            let source = descriptor.source();
            let result = tokio::time::timeout(budget, source.fetch(&request.params)).await;
            let latency_ms = elapsed_ms(call_started);

            let outcome = match result {
                Ok(Ok(payload)) => match request.validator.validate(&payload) {
                    Ok(()) => {
                        descriptor.circuit().record_success();
                        attempts.push(SourceAttempt {
                            source: descriptor.name().to_owned(),
                            outcome: AttemptOutcome::Succeeded,
                            latency_ms,
                        });
                        if request.cache_mode.writes() {
                            self.write_cache(&data_type, &key, &payload, ttl).await;
                        }
                        return Ok(self.live_response(
                            payload,
                            descriptor.name(),
                            attempts,
                            started,
                        ));
                    }
                    Err(failure) => {
                        tracing::warn!(
                            data_type = %data_type,
                            source = descriptor.name(),
                            reason = failure.reason(),
                            "source payload rejected by validator"
                        );
                        AttemptOutcome::Rejected {
                            reason: failure.reason().to_owned(),
                        }
                    }
                },
                Ok(Err(error)) => {
                    tracing::warn!(
                        data_type = %data_type,
                        source = descriptor.name(),
                        code = error.code(),
                        error = error.message(),
                        "source fetch failed"
                    );
                    AttemptOutcome::Failed { error }
                }
                Err(_) => {
                    let after_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(
                        data_type = %data_type,
                        source = descriptor.name(),
                        after_ms,
                        "source fetch timed out"
                    );
                    AttemptOutcome::TimedOut { after_ms }
                }
            };

            self.record_failure(&descriptor, self.cache.now());
            attempts.push(SourceAttempt {
                source: descriptor.name().to_owned(),
                outcome,
                latency_ms,
            });
        }

        if attempts
            .iter()
            .any(|attempt| attempt.outcome == AttemptOutcome::NotAttempted)
        {
            tracing::warn!(data_type = %data_type, key = %key, "request deadline exceeded");
        }

        if request.cache_mode.falls_back_to_stale() {
            if let Some(hit) = self.read_cache(&request, &key).await {
                return Ok(self.fallback_response(&data_type, &key, hit, attempts, started));
            }
        }

        tracing::error!(
            data_type = %data_type,
            key = %key,
            attempts = attempts.len(),
            "all sources exhausted"
        );
        Err(FetchError::AllSourcesExhausted {
            data_type: data_type.to_string(),
            key,
            attempts,
        })
    }

    /// Same as [`Self::fetch_with_fallback`], aborted when `token` fires.
    /// An aborted fetch never writes to the cache.
    pub async fn fetch_until_cancelled(
        &self,
        request: FetchRequest,
        token: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let key = request.cache_key();
        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(key = %key, "fetch cancelled");
                Err(FetchError::Cancelled { key })
            }
            result = self.fetch_with_fallback(request) => result,
        }
    }

    /// Health snapshot of every source registered for `data_type`.
    pub fn list_sources(&self, data_type: &DataType) -> Vec<SourceHealth> {
        let now = self.cache.now();
        self.registry
            .sources_for(data_type)
            .iter()
            .map(|descriptor| descriptor.health(now))
            .collect()
    }

    pub async fn clear_expired(&self) -> Result<usize, CacheAccessError> {
        let removed = self.cache.clear_expired().await?;
        tracing::info!(removed, "cleared expired cache entries");
        Ok(removed)
    }

    pub async fn clear_all(&self) -> Result<usize, CacheAccessError> {
        let removed = self.cache.clear_all().await?;
        tracing::info!(removed, "cleared cache");
        Ok(removed)
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, CacheAccessError> {
        self.cache.stats().await
    }

    pub async fn cache_len(&self) -> Result<usize, CacheAccessError> {
        Ok(self.cache.stats().await?.entries)
    }

    /// Cache lookup that the request's validator accepts. Read errors are
    /// logged and count as a miss.
    async fn read_cache(&self, request: &FetchRequest, key: &str) -> Option<CachedValue> {
        let hit = match self.cache.get(key).await {
            Ok(hit) => hit?,
            Err(error) => {
                tracing::warn!(key, error = %error, "cache read failed; treating as miss");
                return None;
            }
        };

        match request.validator.validate(&hit.value) {
            Ok(()) => Some(hit),
            Err(failure) => {
                tracing::debug!(key, reason = failure.reason(), "cached payload rejected by validator");
                None
            }
        }
    }

    async fn write_cache(&self, data_type: &DataType, key: &str, payload: &Value, ttl: Duration) {
        if let Err(error) = self.cache.set(key, payload, ttl).await {
            tracing::warn!(
                data_type = %data_type,
                key,
                error = %error,
                "cache write failed; serving live result"
            );
        }
    }

    fn record_failure(&self, descriptor: &SourceDescriptor, now: OffsetDateTime) {
        if descriptor.circuit().record_failure(now) {
            tracing::warn!(
                data_type = %descriptor.data_type(),
                source = descriptor.name(),
                fail_count = descriptor.circuit().fail_count(),
                cooldown_secs = self.config.cooldown.as_secs(),
                "circuit opened"
            );
        }
    }

    fn live_response(
        &self,
        value: Value,
        source: &str,
        attempts: Vec<SourceAttempt>,
        started: Instant,
    ) -> FetchResponse {
        let failed = attempts
            .iter()
            .filter(|attempt| attempt.outcome.is_failure())
            .count();
        let mut warnings = Vec::new();
        if failed > 0 {
            warnings.push(format!(
                "source fallback succeeded with '{source}' after {failed} failed attempt(s)"
            ));
        }

        FetchResponse {
            value,
            origin: Origin::Live {
                source: source.to_owned(),
            },
            attempts,
            warnings,
            latency_ms: elapsed_ms(started),
            cached_at: None,
        }
    }

    fn fallback_response(
        &self,
        data_type: &DataType,
        key: &str,
        hit: CachedValue,
        attempts: Vec<SourceAttempt>,
        started: Instant,
    ) -> FetchResponse {
        let cached_at = UtcDateTime::from(hit.created_at);
        let (origin, warning) = if hit.fresh {
            (
                Origin::Cache,
                format!("all sources failed; served cache entry written at {cached_at}"),
            )
        } else {
            tracing::warn!(
                data_type = %data_type,
                key,
                cached_at = %cached_at,
                "all sources failed; serving stale cache entry"
            );
            (
                Origin::StaleCache,
                format!("all sources failed; served stale cache entry written at {cached_at}"),
            )
        };

        FetchResponse {
            value: hit.value,
            origin,
            attempts,
            warnings: vec![warning],
            latency_ms: elapsed_ms(started),
            cached_at: Some(cached_at),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    let elapsed = started.elapsed().as_millis();
    u64::try_from(elapsed).unwrap_or(u64::MAX)
}
