//! Data source trait and request/response types.
//!
//! This module defines the provider contract (`DataSource`) every upstream
//! implementation follows, along with the identifiers used to route and
//! cache requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use fundlayer_core::{source_fn, DataType, FetchParams, SourceError};
//! use serde_json::json;
//!
//! let source = source_fn(|params: FetchParams| async move {
//!     let code = params.get("code").ok_or_else(|| SourceError::invalid_request("missing code"))?;
//!     Ok(json!({ "code": code, "price": 1.0 }))
//! });
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ValidationError;

/// Logical category of fetchable information, independent of provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataType(String);

impl DataType {
    pub const FUND_REALTIME: &'static str = "fund_realtime";
    pub const FUND_HISTORY: &'static str = "fund_history";
    pub const BOARD_FLOW: &'static str = "board_flow";
    pub const NEWS: &'static str = "news";

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let value = input.trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyDataType);
        }
        if !value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            return Err(ValidationError::InvalidDataType {
                value: value.to_owned(),
            });
        }
        Ok(Self(value.to_owned()))
    }

    pub fn fund_realtime() -> Self {
        Self(Self::FUND_REALTIME.to_owned())
    }

    pub fn fund_history() -> Self {
        Self(Self::FUND_HISTORY.to_owned())
    }

    pub fn board_flow() -> Self {
        Self(Self::BOARD_FLOW.to_owned())
    }

    pub fn news() -> Self {
        Self(Self::NEWS.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DataType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for DataType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.0
    }
}

/// Ordered request parameters. Iteration is sorted by name, which makes the
/// cache key independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams(BTreeMap<String, String>);

impl FetchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(name.into(), value.to_string());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) -> Option<String> {
        self.0.insert(name.into(), value.to_string())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parse `key=value` pairs, as accepted on the command line.
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let Some((name, value)) = pair.split_once('=') else {
                return Err(ValidationError::MalformedParam {
                    value: pair.to_owned(),
                });
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::EmptyParamName);
            }
            params.insert(name, value.trim());
        }
        Ok(params)
    }

    /// Canonical cache key: `data_type:k1=v1:k2=v2` with names sorted.
    /// Names and values are percent-encoded, so `:` and `=` never appear
    /// inside a component.
    pub fn cache_key(&self, data_type: &DataType) -> String {
        let mut key = String::from(data_type.as_str());
        for (name, value) in &self.0 {
            key.push(':');
            key.push_str(&urlencoding::encode(name));
            key.push('=');
            key.push_str(&urlencoding::encode(value));
        }
        key
    }
}

impl<K, V> FromIterator<(K, V)> for FetchParams
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Unavailable,
    Timeout,
    RateLimited,
    InvalidRequest,
    InvalidResponse,
    Internal,
}

/// Structured source error recorded against a source's circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidResponse,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::InvalidResponse => "source.invalid_response",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, SourceError>> + Send + 'a>>;

/// Upstream provider contract: given parameters, return a raw payload or
/// fail. The wire protocol is entirely up to the implementation.
pub trait DataSource: Send + Sync {
    fn fetch<'a>(&'a self, params: &'a FetchParams) -> SourceFuture<'a>;
}

/// Adapts an async closure into a [`DataSource`].
pub struct FnSource<F> {
    f: F,
}

/// Build a [`DataSource`] from `Fn(FetchParams) -> impl Future`.
pub fn source_fn<F, Fut>(f: F) -> FnSource<F>
where
    F: Fn(FetchParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, SourceError>> + Send + 'static,
{
    FnSource { f }
}

impl<F, Fut> DataSource for FnSource<F>
where
    F: Fn(FetchParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, SourceError>> + Send + 'static,
{
    fn fetch<'a>(&'a self, params: &'a FetchParams) -> SourceFuture<'a> {
        Box::pin((self.f)(params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_sorts_parameters() {
        let data_type = DataType::parse("fund_history").expect("valid");
        let a = FetchParams::new().with("lookback_days", 180).with("code", "008888");
        let b = FetchParams::new().with("code", "008888").with("lookback_days", 180);

        assert_eq!(a.cache_key(&data_type), b.cache_key(&data_type));
        assert_eq!(
            a.cache_key(&data_type),
            "fund_history:code=008888:lookback_days=180"
        );
    }

    #[test]
    fn cache_key_escapes_separators_inside_values() {
        let data_type = DataType::news();
        let smuggled = FetchParams::new().with("a", "1:b=2");
        let split = FetchParams::new().with("a", "1").with("b", "2");

        assert_ne!(smuggled.cache_key(&data_type), split.cache_key(&data_type));
        assert_eq!(smuggled.cache_key(&data_type), "news:a=1%3Ab%3D2");
        assert_eq!(
            FetchParams::new().with("topic", "50% off").cache_key(&data_type),
            "news:topic=50%25%20off"
        );
    }

    #[test]
    fn cache_key_without_params_is_the_data_type() {
        let data_type = DataType::news();
        assert_eq!(FetchParams::new().cache_key(&data_type), "news");
    }

    #[test]
    fn data_type_rejects_blank_and_separator_characters() {
        assert_eq!(DataType::parse("  "), Err(ValidationError::EmptyDataType));
        assert!(matches!(
            DataType::parse("fund:price"),
            Err(ValidationError::InvalidDataType { .. })
        ));
    }

    #[test]
    fn parse_pairs_requires_key_value_form() {
        let params = FetchParams::parse_pairs(["code=008888", "lookback_days = 30"]).expect("parse");
        assert_eq!(params.get("code"), Some("008888"));
        assert_eq!(params.get("lookback_days"), Some("30"));

        assert!(matches!(
            FetchParams::parse_pairs(["code"]),
            Err(ValidationError::MalformedParam { .. })
        ));
        assert_eq!(
            FetchParams::parse_pairs(["=x"]),
            Err(ValidationError::EmptyParamName)
        );
    }

    #[tokio::test]
    async fn fn_source_receives_params() {
        let source = source_fn(|params: FetchParams| async move {
            Ok::<_, SourceError>(json!({ "code": params.get("code").unwrap_or_default() }))
        });

        let payload = source
            .fetch(&FetchParams::new().with("code", "110011"))
            .await
            .expect("fetch");
        assert_eq!(payload, json!({ "code": "110011" }));
    }
}
