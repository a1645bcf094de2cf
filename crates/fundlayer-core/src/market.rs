//! Typed wrappers for the well-known data types.
//!
//! Each wrapper builds a [`FetchRequest`] with the data type's TTL and a
//! validator that requires the payload to decode into the typed model, so a
//! source returning the wrong shape fails over like any other failure.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::data_source::DataType;
use crate::domain::{FlowIndicator, FundHistory, FundQuote, NewsItem, SectorFlow, SectorType};
use crate::orchestrator::{FetchOrchestrator, FetchRequest, FetchResponse, Origin, SourceAttempt};
use crate::validation::{ValidationFailure, Validator};
use crate::{FetchError, UtcDateTime, ValidationError};

/// A typed value together with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Served<T> {
    pub data: T,
    pub origin: Origin,
    pub attempts: Vec<SourceAttempt>,
    pub warnings: Vec<String>,
    pub latency_ms: u64,
    pub cached_at: Option<UtcDateTime>,
}

impl<T> Served<T> {
    pub fn is_degraded(&self) -> bool {
        self.origin == Origin::StaleCache
    }
}

impl<T: DeserializeOwned> Served<T> {
    fn decode(data_type: &DataType, response: FetchResponse) -> Result<Self, FetchError> {
        let data = T::deserialize(&response.value).map_err(|source| FetchError::Decode {
            data_type: data_type.to_string(),
            source,
        })?;
        Ok(Self {
            data,
            origin: response.origin,
            attempts: response.attempts,
            warnings: response.warnings,
            latency_ms: response.latency_ms,
            cached_at: response.cached_at,
        })
    }
}

/// Accepts payloads that decode into `T` and pass `check`.
pub struct DecodesAs<T> {
    check: fn(&T) -> Result<(), ValidationFailure>,
    marker: PhantomData<fn() -> T>,
}

impl<T> DecodesAs<T> {
    pub fn new(check: fn(&T) -> Result<(), ValidationFailure>) -> Self {
        Self {
            check,
            marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Validator for DecodesAs<T> {
    fn validate(&self, payload: &Value) -> Result<(), ValidationFailure> {
        let decoded = T::deserialize(payload)
            .map_err(|e| ValidationFailure::new(format!("payload does not decode: {e}")))?;
        (self.check)(&decoded)
    }
}

fn quote_has_price(quote: &FundQuote) -> Result<(), ValidationFailure> {
    if quote.price.is_finite() {
        Ok(())
    } else {
        Err(ValidationFailure::new("price is not a finite number"))
    }
}

fn history_has_points(history: &FundHistory) -> Result<(), ValidationFailure> {
    if history.points.is_empty() {
        Err(ValidationFailure::new("history has no points"))
    } else {
        Ok(())
    }
}

#[allow(clippy::ptr_arg)]
fn non_empty<T>(items: &Vec<T>) -> Result<(), ValidationFailure> {
    if items.is_empty() {
        Err(ValidationFailure::new("list is empty"))
    } else {
        Ok(())
    }
}

fn require(name: &str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MalformedParam {
            value: format!("{name}="),
        });
    }
    Ok(value.to_owned())
}

pub fn fund_latest_price_request(code: &str) -> Result<FetchRequest, ValidationError> {
    Ok(FetchRequest::new(DataType::fund_realtime())
        .param("code", require("code", code)?)
        .validator(DecodesAs::<FundQuote>::new(quote_has_price)))
}

pub fn fund_history_request(code: &str, lookback_days: u32) -> Result<FetchRequest, ValidationError> {
    Ok(FetchRequest::new(DataType::fund_history())
        .param("code", require("code", code)?)
        .param("lookback_days", lookback_days)
        .validator(DecodesAs::<FundHistory>::new(history_has_points)))
}

pub fn sector_flow_request(indicator: FlowIndicator, sector_type: SectorType) -> FetchRequest {
    FetchRequest::new(DataType::board_flow())
        .param("indicator", indicator)
        .param("sector_type", sector_type)
        .validator(DecodesAs::<Vec<SectorFlow>>::new(non_empty))
}

pub fn news_request(topic: &str) -> Result<FetchRequest, ValidationError> {
    Ok(FetchRequest::new(DataType::news())
        .param("topic", require("topic", topic)?)
        .validator(DecodesAs::<Vec<NewsItem>>::new(non_empty)))
}

impl FetchOrchestrator {
    /// Latest (estimated) price for one fund.
    pub async fn fund_latest_price(&self, code: &str) -> Result<Served<FundQuote>, FetchError> {
        self.fetch_typed(fund_latest_price_request(code)?).await
    }

    pub async fn fund_history(
        &self,
        code: &str,
        lookback_days: u32,
    ) -> Result<Served<FundHistory>, FetchError> {
        self.fetch_typed(fund_history_request(code, lookback_days)?)
            .await
    }

    pub async fn sector_flow(
        &self,
        indicator: FlowIndicator,
        sector_type: SectorType,
    ) -> Result<Served<Vec<SectorFlow>>, FetchError> {
        self.fetch_typed(sector_flow_request(indicator, sector_type))
            .await
    }

    pub async fn news(&self, topic: &str) -> Result<Served<Vec<NewsItem>>, FetchError> {
        self.fetch_typed(news_request(topic)?).await
    }

    /// Runs `request` and decodes the served payload into `T`.
    pub async fn fetch_typed<T: DeserializeOwned>(
        &self,
        request: FetchRequest,
    ) -> Result<Served<T>, FetchError> {
        let data_type = request.data_type().clone();
        let response = self.fetch_with_fallback(request).await?;
        Served::decode(&data_type, response)
    }
}
