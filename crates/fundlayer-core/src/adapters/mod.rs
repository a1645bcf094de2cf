//! Source implementations and the JSON manifest that wires them up.
//!
//! Provider-specific parsing lives outside this crate; the only built-in
//! source is [`HttpJsonSource`], configured per endpoint from a manifest
//! such as:
//!
//! ```json
//! {
//!   "sources": [
//!     {
//!       "data_type": "fund_realtime",
//!       "name": "eastmoney_fundgz",
//!       "url": "https://fundgz.1234567.com.cn/js/{code}.js?rt={now_ms}",
//!       "jsonp": true,
//!       "timeout_ms": 5000
//!     }
//!   ]
//! }
//! ```

mod http_json;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

pub use http_json::{render_url, unwrap_jsonp, HttpJsonSource, NOW_MS_PLACEHOLDER};

use crate::data_source::DataType;
use crate::http_client::HttpClient;
use crate::orchestrator::FetchOrchestrator;
use crate::{ConfigError, ValidationError};

/// One HTTP endpoint registered for one data type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub data_type: DataType,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub jsonp: bool,
    #[serde(default)]
    pub pointer: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Ordered list of HTTP sources. Order within a data type is priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceManifest {
    pub sources: Vec<ManifestEntry>,
}

impl SourceManifest {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ManifestIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    /// Parses manifest JSON; `origin` names the input in error messages.
    pub fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let manifest: Self =
            serde_json::from_str(raw).map_err(|source| ConfigError::ManifestParse {
                path: origin.to_owned(),
                source,
            })?;

        for entry in &manifest.sources {
            if entry.name.trim().is_empty() {
                return Err(ValidationError::EmptySourceName.into());
            }
            if entry.timeout_ms == Some(0) {
                return Err(ConfigError::NonPositive {
                    field: "timeout_ms",
                });
            }
        }
        Ok(manifest)
    }

    /// Data types in first-appearance order.
    pub fn data_types(&self) -> Vec<DataType> {
        let mut seen = Vec::new();
        for entry in &self.sources {
            if !seen.contains(&entry.data_type) {
                seen.push(entry.data_type.clone());
            }
        }
        seen
    }

    /// Registers every entry, in file order, as an [`HttpJsonSource`].
    pub fn register_all(
        &self,
        orchestrator: &FetchOrchestrator,
        client: Arc<dyn HttpClient>,
    ) -> usize {
        let default_timeout = orchestrator.config().source_timeout;
        for entry in &self.sources {
            let mut source = HttpJsonSource::new(entry.url.clone(), Arc::clone(&client))
                .with_jsonp(entry.jsonp)
                .with_timeout(
                    entry
                        .timeout_ms
                        .map_or(default_timeout, Duration::from_millis),
                );
            if let Some(pointer) = &entry.pointer {
                source = source.with_pointer(pointer.clone());
            }
            for (name, value) in &entry.headers {
                source = source.with_header(name.clone(), value.clone());
            }
            orchestrator.register(&entry.data_type, entry.name.trim(), source);
        }
        tracing::info!(sources = self.sources.len(), "registered manifest sources");
        self.sources.len()
    }
}
