use fundlayer_core::{DataType, FetchOrchestrator, SourceHealth};
use serde::Serialize;

use crate::cli::SourcesArgs;
use crate::error::CliError;
use crate::output::Document;

use super::Outcome;

#[derive(Debug, Serialize)]
struct SourceRow {
    #[serde(flatten)]
    health: SourceHealth,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SourceList {
    data_type: String,
    sources: Vec<SourceRow>,
}

pub fn run(args: &SourcesArgs, orchestrator: &FetchOrchestrator) -> Result<Outcome, CliError> {
    let data_type = DataType::parse(&args.data_type)?;
    let sources = orchestrator
        .list_sources(&data_type)
        .into_iter()
        .map(|health| SourceRow {
            status: health.status_label(),
            health,
        })
        .collect::<Vec<_>>();

    if sources.is_empty() {
        tracing::info!(data_type = %data_type, "no sources registered");
    }

    let list = SourceList {
        data_type: data_type.to_string(),
        sources,
    };
    Ok(Outcome::ok(Document::plain(serde_json::to_value(list)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundlayer_core::{source_fn, CacheConfig, CacheStore, FetchConfig};
    use serde_json::json;

    #[test]
    fn lists_sources_in_priority_order_with_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::open(CacheConfig::at_path(dir.path().join("cache.duckdb")))
            .expect("open store");
        let orchestrator = FetchOrchestrator::new(store, FetchConfig::default());
        for name in ["primary", "backup"] {
            orchestrator.register(
                &DataType::news(),
                name,
                source_fn(|_params| async { Ok(json!([])) }),
            );
        }

        let outcome = run(
            &SourcesArgs {
                data_type: "news".to_owned(),
            },
            &orchestrator,
        )
        .expect("list sources");

        let sources = &outcome.document.data["sources"];
        assert_eq!(sources[0]["name"], json!("primary"));
        assert_eq!(sources[1]["name"], json!("backup"));
        assert_eq!(sources[0]["status"], json!("healthy"));
        assert_eq!(sources[0]["is_available"], json!(true));
    }
}
