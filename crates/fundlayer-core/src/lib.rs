//! # Fundlayer Core
//!
//! Resilient data access layer for volatile market data.
//!
//! ## Overview
//!
//! A [`FetchOrchestrator`] serves one logical data item (a fund price, a
//! sector flow ranking, a news list) by:
//!
//! - answering from the persistent cache while the entry is fresh
//! - otherwise walking the sources registered for the data type in priority
//!   order, skipping sources whose circuit is open
//! - validating every payload and writing the first accepted one back to the
//!   cache
//! - serving a stale cache entry, flagged as degraded, when every source fails
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Generic HTTP JSON source and source manifest |
//! | [`cache`] | Cache modes and async facade over the store |
//! | [`circuit_breaker`] | Per-source circuit tracker |
//! | [`config`] | Orchestrator configuration |
//! | [`data_source`] | `DataSource` trait, data types, parameters |
//! | [`domain`] | Typed market models |
//! | [`error`] | Error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`market`] | Typed wrappers for the well-known data types |
//! | [`orchestrator`] | Fetch with fallback |
//! | [`registry`] | Source registry and health snapshots |
//! | [`sweep`] | Periodic expiry sweep |
//! | [`validation`] | Payload validators |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fundlayer_core::{source_fn, CacheStore, DataType, FetchConfig, FetchOrchestrator, FetchRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = FetchOrchestrator::new(CacheStore::open_default()?, FetchConfig::from_env()?);
//!     orchestrator.register(
//!         &DataType::news(),
//!         "inline",
//!         source_fn(|_params| async { Ok(json!([{ "title": "A shares close higher" }])) }),
//!     );
//!
//!     let response = orchestrator
//!         .fetch_with_fallback(FetchRequest::new(DataType::news()).param("topic", "a-shares"))
//!         .await?;
//!     println!("{} via {}", response.value, response.origin.as_str());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Orchestrator  │────▶│  Cache (DuckDB)  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Source Registry │────▶│ Circuit Tracker  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! └─────────────────┘     └──────────────────┘
//! ```

pub mod adapters;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod market;
pub mod orchestrator;
pub mod registry;
pub mod sweep;
pub mod validation;

pub use adapters::{HttpJsonSource, ManifestEntry, SourceManifest};
pub use cache::{CacheAccessError, CacheMode, CachedValue, ResponseCache};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitSnapshot, CircuitState, CircuitTracker};
pub use config::FetchConfig;
pub use data_source::{
    source_fn, DataSource, DataType, FetchParams, FnSource, SourceError, SourceErrorKind,
    SourceFuture,
};
pub use domain::{
    FlowIndicator, FundHistory, FundQuote, NavPoint, NewsItem, SectorFlow, SectorType, UtcDateTime,
};
pub use error::{ConfigError, FetchError, ValidationError};
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, StaticHttpClient,
};
pub use market::{DecodesAs, Served};
pub use orchestrator::{
    AttemptOutcome, FetchOrchestrator, FetchRequest, FetchResponse, Origin, SourceAttempt,
};
pub use registry::{SourceDescriptor, SourceHealth, SourceRegistry};
pub use sweep::ExpirySweeper;
pub use validation::{validator_fn, FnValidator, PayloadShape, ValidationFailure, Validator};

pub use fundlayer_store::{
    CacheConfig, CacheStats, CacheStore, Clock, ManualClock, StoreError, SystemClock,
};
