use std::io::{self, Write};

use fundlayer_core::{FetchError, FetchResponse, Origin, Served, SourceAttempt, UtcDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

/// The single JSON object every command prints.
#[derive(Debug, Serialize)]
pub struct Document {
    pub data: Value,
    pub meta: Meta,
}

#[derive(Debug, Default, Serialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub degraded: bool,
    pub attempts: Vec<SourceAttempt>,
    pub warnings: Vec<String>,
    pub errors: Vec<ErrorRecord>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<UtcDateTime>,
}

#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub code: &'static str,
    pub message: String,
}

impl Document {
    /// Output for commands that do not go through the orchestrator.
    pub fn plain(data: Value) -> Self {
        Self {
            data,
            meta: Meta::default(),
        }
    }

    pub fn from_response(data_type: &str, response: FetchResponse) -> Self {
        Self {
            meta: Meta::served(
                data_type,
                &response.origin,
                response.attempts,
                response.warnings,
                response.latency_ms,
                response.cached_at,
            ),
            data: response.value,
        }
    }

    pub fn from_served<T: Serialize>(data_type: &str, served: Served<T>) -> Result<Self, CliError> {
        Ok(Self {
            data: serde_json::to_value(&served.data)?,
            meta: Meta::served(
                data_type,
                &served.origin,
                served.attempts,
                served.warnings,
                served.latency_ms,
                served.cached_at,
            ),
        })
    }

    /// `null` data plus the attempt chain; the caller exits with code 3.
    pub fn exhausted(error: &FetchError, data_type: String, attempts: Vec<SourceAttempt>) -> Self {
        Self {
            data: Value::Null,
            meta: Meta {
                data_type: Some(data_type),
                attempts,
                errors: vec![ErrorRecord {
                    code: error.code(),
                    message: error.to_string(),
                }],
                ..Meta::default()
            },
        }
    }
}

impl Meta {
    fn served(
        data_type: &str,
        origin: &Origin,
        attempts: Vec<SourceAttempt>,
        warnings: Vec<String>,
        latency_ms: u64,
        cached_at: Option<UtcDateTime>,
    ) -> Self {
        Self {
            data_type: Some(data_type.to_owned()),
            origin: Some(origin.as_str()),
            source: origin.source().map(str::to_owned),
            degraded: *origin == Origin::StaleCache,
            attempts,
            warnings,
            errors: Vec::new(),
            latency_ms,
            cached_at,
        }
    }
}

pub fn render(document: &Document, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, document)?;
    } else {
        serde_json::to_writer(&mut handle, document)?;
    }
    writeln!(handle)?;
    Ok(())
}
