use std::time::Duration;

use fundlayer_core::{ExpirySweeper, FetchOrchestrator};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cli::CacheCommand;
use crate::error::CliError;
use crate::output::Document;

use super::Outcome;

pub async fn run(
    command: CacheCommand,
    orchestrator: &FetchOrchestrator,
    shutdown: &CancellationToken,
) -> Result<Outcome, CliError> {
    let data = match command {
        CacheCommand::Sweep(args) if args.watch => {
            let interval = args
                .interval_secs
                .map_or(orchestrator.config().sweep_interval, Duration::from_secs);
            let sweeper = ExpirySweeper::new(orchestrator.cache().clone(), interval);
            let removed = sweeper.run(shutdown.clone()).await;
            json!({ "removed": removed })
        }
        CacheCommand::Sweep(_) => json!({ "removed": orchestrator.clear_expired().await? }),
        CacheCommand::Clear => json!({ "removed": orchestrator.clear_all().await? }),
        CacheCommand::Stats => serde_json::to_value(orchestrator.cache_stats().await?)?,
    };
    Ok(Outcome::ok(Document::plain(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SweepArgs;
    use fundlayer_core::{CacheConfig, CacheStore, FetchConfig};

    fn orchestrator(dir: &tempfile::TempDir) -> FetchOrchestrator {
        let store = CacheStore::open(CacheConfig::at_path(dir.path().join("cache.duckdb")))
            .expect("open store");
        FetchOrchestrator::new(store, FetchConfig::default())
    }

    #[tokio::test]
    async fn clear_reports_removed_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orchestrator = orchestrator(&dir);
        orchestrator
            .cache()
            .set("news:topic=a", &json!([1]), Duration::from_secs(60))
            .await
            .expect("seed");

        let outcome = run(CacheCommand::Clear, &orchestrator, &CancellationToken::new())
            .await
            .expect("clear");
        assert_eq!(outcome.document.data, json!({ "removed": 1 }));

        let stats = run(CacheCommand::Stats, &orchestrator, &CancellationToken::new())
            .await
            .expect("stats");
        assert_eq!(stats.document.data["entries"], json!(0));
    }

    #[tokio::test]
    async fn watch_stops_when_shutdown_fires() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orchestrator = orchestrator(&dir);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let outcome = run(
            CacheCommand::Sweep(SweepArgs {
                watch: true,
                interval_secs: Some(1),
            }),
            &orchestrator,
            &shutdown,
        )
        .await
        .expect("sweep");
        assert_eq!(outcome.document.data, json!({ "removed": 0 }));
    }
}
