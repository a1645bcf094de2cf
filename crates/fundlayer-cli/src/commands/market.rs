use fundlayer_core::market::{
    fund_history_request, fund_latest_price_request, news_request, sector_flow_request,
};
use fundlayer_core::{FetchOrchestrator, FetchRequest, FundHistory, FundQuote, NewsItem, SectorFlow};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::{FundHistoryArgs, FundPriceArgs, NewsArgs, SectorFlowArgs};
use crate::error::CliError;
use crate::output::Document;

use super::{settle, until_shutdown, Outcome};

pub async fn fund_price(
    args: &FundPriceArgs,
    orchestrator: &FetchOrchestrator,
    shutdown: &CancellationToken,
) -> Result<Outcome, CliError> {
    let request = fund_latest_price_request(&args.code)?;
    typed::<FundQuote>(request, orchestrator, shutdown).await
}

pub async fn fund_history(
    args: &FundHistoryArgs,
    orchestrator: &FetchOrchestrator,
    shutdown: &CancellationToken,
) -> Result<Outcome, CliError> {
    let request = fund_history_request(&args.code, args.lookback_days)?;
    typed::<FundHistory>(request, orchestrator, shutdown).await
}

pub async fn sector_flow(
    args: &SectorFlowArgs,
    orchestrator: &FetchOrchestrator,
    shutdown: &CancellationToken,
) -> Result<Outcome, CliError> {
    let request = sector_flow_request(args.indicator, args.sector_type);
    typed::<Vec<SectorFlow>>(request, orchestrator, shutdown).await
}

pub async fn news(
    args: &NewsArgs,
    orchestrator: &FetchOrchestrator,
    shutdown: &CancellationToken,
) -> Result<Outcome, CliError> {
    let request = news_request(&args.topic)?;
    typed::<Vec<NewsItem>>(request, orchestrator, shutdown).await
}

/// Runs `request` as a typed fetch that shutdown can abort under its cache key.
async fn typed<T>(
    request: FetchRequest,
    orchestrator: &FetchOrchestrator,
    shutdown: &CancellationToken,
) -> Result<Outcome, CliError>
where
    T: DeserializeOwned + Serialize,
{
    let data_type = request.data_type().clone();
    let key = request.cache_key();
    let result = until_shutdown(shutdown, key, orchestrator.fetch_typed::<T>(request)).await;
    settle(result, |served| Document::from_served(data_type.as_str(), served))
}
