//! Source registry: per data type, the ordered fallback list of providers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use time::OffsetDateTime;

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState, CircuitTracker};
use crate::data_source::{DataSource, DataType};
use crate::UtcDateTime;

/// One upstream provider registered for one data type, with its circuit.
pub struct SourceDescriptor {
    name: String,
    data_type: DataType,
    source: RwLock<Arc<dyn DataSource>>,
    circuit: CircuitTracker,
}

impl std::fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("circuit", &self.circuit)
            .finish_non_exhaustive()
    }
}

impl SourceDescriptor {
    fn new(
        name: String,
        data_type: DataType,
        source: Arc<dyn DataSource>,
        circuit: CircuitBreakerConfig,
    ) -> Self {
        Self {
            name,
            data_type,
            source: RwLock::new(source),
            circuit: CircuitTracker::new(circuit),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn circuit(&self) -> &CircuitTracker {
        &self.circuit
    }

    /// Current fetch capability. Cloned out so the lock is not held across
    /// the upstream call.
    pub fn source(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.source.read().expect("source lock is not poisoned"))
    }

    fn replace_source(&self, source: Arc<dyn DataSource>) {
        *self.source.write().expect("source lock is not poisoned") = source;
    }

    pub fn health(&self, now: OffsetDateTime) -> SourceHealth {
        let snapshot = self.circuit.snapshot();
        SourceHealth {
            name: self.name.clone(),
            fail_count: snapshot.fail_count,
            last_failure_at: snapshot.last_failure_at,
            circuit_open_until: snapshot.open_until,
            state: self.circuit.state(now),
            is_available: self.circuit.is_eligible(now),
        }
    }
}

/// Source health snapshot used by the `sources` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceHealth {
    pub name: String,
    pub fail_count: u32,
    pub last_failure_at: Option<UtcDateTime>,
    pub circuit_open_until: Option<UtcDateTime>,
    pub state: CircuitState,
    pub is_available: bool,
}

impl SourceHealth {
    pub fn status_label(&self) -> &'static str {
        match self.state {
            CircuitState::Closed if self.fail_count == 0 => "healthy",
            CircuitState::Closed => "degraded",
            CircuitState::HalfOpen => "probing",
            CircuitState::Open => "circuit_open",
        }
    }
}

/// Registry of sources per data type. Registration order is fallback
/// priority; it never changes after registration.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    circuit: CircuitBreakerConfig,
    sources: RwLock<HashMap<DataType, Vec<Arc<SourceDescriptor>>>>,
}

impl SourceRegistry {
    pub fn new(circuit: CircuitBreakerConfig) -> Self {
        Self {
            circuit,
            sources: RwLock::new(HashMap::new()),
        }
    }

    /// Append a source to the fallback list for `data_type`.
    ///
    /// Registering a name that already exists for the data type swaps its
    /// fetch capability in place. Priority and failure counters survive.
    pub fn register(
        &self,
        data_type: &DataType,
        name: impl Into<String>,
        source: Arc<dyn DataSource>,
    ) -> Arc<SourceDescriptor> {
        let name = name.into();
        let mut sources = self.sources.write().expect("registry lock is not poisoned");
        let list = sources.entry(data_type.clone()).or_default();

        if let Some(existing) = list.iter().find(|descriptor| descriptor.name == name) {
            existing.replace_source(source);
            tracing::debug!(data_type = %data_type, source = %name, "replaced source capability");
            return Arc::clone(existing);
        }

        let descriptor = Arc::new(SourceDescriptor::new(
            name,
            data_type.clone(),
            source,
            self.circuit,
        ));
        list.push(Arc::clone(&descriptor));
        tracing::debug!(
            data_type = %data_type,
            source = %descriptor.name,
            priority = list.len() - 1,
            "registered source"
        );
        descriptor
    }

    /// Descriptors for `data_type` in priority order; empty when unknown.
    pub fn sources_for(&self, data_type: &DataType) -> Vec<Arc<SourceDescriptor>> {
        self.sources
            .read()
            .expect("registry lock is not poisoned")
            .get(data_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Registered data types, sorted.
    pub fn data_types(&self) -> Vec<DataType> {
        let mut data_types = self
            .sources
            .read()
            .expect("registry lock is not poisoned")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        data_types.sort();
        data_types
    }
}
