mod cache;
mod fetch;
mod market;
mod sources;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fundlayer_core::{
    CacheConfig, CacheStore, FetchConfig, FetchError, FetchOrchestrator, ReqwestHttpClient,
    SourceManifest,
};
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Document;

/// Rendered command output and whether every source was exhausted.
pub struct Outcome {
    pub document: Document,
    pub exhausted: bool,
}

impl Outcome {
    pub fn ok(document: Document) -> Self {
        Self {
            document,
            exhausted: false,
        }
    }
}

pub async fn run(cli: &Cli, shutdown: &CancellationToken) -> Result<Outcome, CliError> {
    match &cli.command {
        Command::Fetch(args) => {
            let orchestrator = open_orchestrator(cli, true)?;
            fetch::run(args, &orchestrator, shutdown).await
        }
        Command::FundPrice(args) => {
            let orchestrator = open_orchestrator(cli, true)?;
            market::fund_price(args, &orchestrator, shutdown).await
        }
        Command::FundHistory(args) => {
            let orchestrator = open_orchestrator(cli, true)?;
            market::fund_history(args, &orchestrator, shutdown).await
        }
        Command::SectorFlow(args) => {
            let orchestrator = open_orchestrator(cli, true)?;
            market::sector_flow(args, &orchestrator, shutdown).await
        }
        Command::News(args) => {
            let orchestrator = open_orchestrator(cli, true)?;
            market::news(args, &orchestrator, shutdown).await
        }
        Command::Sources(args) => {
            let orchestrator = open_orchestrator(cli, true)?;
            sources::run(args, &orchestrator)
        }
        Command::Cache(args) => {
            let orchestrator = open_orchestrator(cli, false)?;
            cache::run(args.command, &orchestrator, shutdown).await
        }
    }
}

/// Opens the cache and, when `with_sources`, registers the manifest sources.
fn open_orchestrator(cli: &Cli, with_sources: bool) -> Result<FetchOrchestrator, CliError> {
    let config = FetchConfig::from_env()?;
    let store = match &cli.cache_path {
        Some(path) => CacheStore::open(CacheConfig::at_path(path))?,
        None => CacheStore::open_default()?,
    };
    let orchestrator = FetchOrchestrator::new(store, config);

    if with_sources {
        if let Some(manifest) = resolve_manifest(cli.sources.as_deref())? {
            let registered = SourceManifest::load(&manifest)?
                .register_all(&orchestrator, Arc::new(ReqwestHttpClient::new()));
            tracing::debug!(path = %manifest.display(), registered, "loaded source manifest");
        }
    }
    Ok(orchestrator)
}

/// An explicit manifest must exist; the default one is optional.
fn resolve_manifest(explicit: Option<&Path>) -> Result<Option<PathBuf>, CliError> {
    match explicit {
        Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
        Some(path) => Err(CliError::MissingManifest {
            path: path.display().to_string(),
        }),
        None => {
            let default = CacheConfig::default().home.join("sources.json");
            if default.is_file() {
                Ok(Some(default))
            } else {
                tracing::info!(path = %default.display(), "no source manifest; registry is empty");
                Ok(None)
            }
        }
    }
}

/// Awaits `fetch` unless `shutdown` fires first.
async fn until_shutdown<T, F>(
    shutdown: &CancellationToken,
    key: String,
    fetch: F,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        biased;
        () = shutdown.cancelled() => Err(FetchError::Cancelled { key }),
        result = fetch => result,
    }
}

/// Turns exhaustion into a rendered outcome; other errors propagate.
fn settle<T>(
    result: Result<T, FetchError>,
    render: impl FnOnce(T) -> Result<Document, CliError>,
) -> Result<Outcome, CliError> {
    let error = match result {
        Ok(value) => return Ok(Outcome::ok(render(value)?)),
        Err(error) => error,
    };
    match &error {
        FetchError::AllSourcesExhausted {
            data_type,
            attempts,
            ..
        } => Ok(Outcome {
            document: Document::exhausted(&error, data_type.clone(), attempts.clone()),
            exhausted: true,
        }),
        _ => Err(error.into()),
    }
}
