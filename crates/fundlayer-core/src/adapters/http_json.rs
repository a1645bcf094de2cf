use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;

use crate::data_source::{DataSource, FetchParams, SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest};

/// Placeholder resolved to the current unix time in milliseconds, used by
/// endpoints that want a cache-busting query parameter.
pub const NOW_MS_PLACEHOLDER: &str = "now_ms";

/// Generic JSON-over-HTTP source.
///
/// The URL template may reference request parameters as `{name}`; values are
/// URL-encoded. JSONP bodies (`callback({...});`) are unwrapped when
/// enabled and `pointer` selects a sub-document (RFC 6901).
pub struct HttpJsonSource {
    url_template: String,
    jsonp: bool,
    pointer: Option<String>,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpJsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJsonSource")
            .field("url_template", &self.url_template)
            .field("jsonp", &self.jsonp)
            .field("pointer", &self.pointer)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpJsonSource {
    pub fn new(url_template: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            url_template: url_template.into(),
            jsonp: false,
            pointer: None,
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(5),
            client,
        }
    }

    pub fn with_jsonp(mut self, jsonp: bool) -> Self {
        self.jsonp = jsonp;
        self
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    async fn fetch_json(&self, params: &FetchParams) -> Result<Value, SourceError> {
        let url = render_url(&self.url_template, params, OffsetDateTime::now_utc())?;
        let mut request = HttpRequest::get(url).with_timeout(self.timeout);
        for (name, value) in &self.headers {
            request = request.with_header(name.as_str(), value.as_str());
        }

        let response = self.client.execute(request).await.map_err(|error| {
            if error.is_timeout() {
                SourceError::timeout(format!("transport timeout: {}", error.message()))
            } else {
                SourceError::unavailable(format!("transport error: {}", error.message()))
            }
        })?;

        if response.status == 429 {
            return Err(SourceError::rate_limited("upstream returned status 429"));
        }
        if !response.is_success() {
            return Err(SourceError::unavailable(format!(
                "upstream returned status {}",
                response.status
            )));
        }

        let body = if self.jsonp {
            unwrap_jsonp(&response.body).ok_or_else(|| {
                SourceError::invalid_response("response is not a JSONP callback")
            })?
        } else {
            response.body.trim()
        };

        let document: Value = serde_json::from_str(body)
            .map_err(|e| SourceError::invalid_response(format!("failed to parse JSON: {e}")))?;

        match &self.pointer {
            None => Ok(document),
            Some(pointer) => document.pointer(pointer).cloned().ok_or_else(|| {
                SourceError::invalid_response(format!("JSON pointer '{pointer}' not found"))
            }),
        }
    }
}

impl DataSource for HttpJsonSource {
    fn fetch<'a>(&'a self, params: &'a FetchParams) -> SourceFuture<'a> {
        Box::pin(self.fetch_json(params))
    }
}

/// Substitutes `{name}` placeholders with URL-encoded parameter values.
/// An unterminated `{` is copied through literally.
pub fn render_url(
    template: &str,
    params: &FetchParams,
    now: OffsetDateTime,
) -> Result<String, SourceError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rendered.push_str(&rest[open..]);
            return Ok(rendered);
        };

        let name = &after[..close];
        if name == NOW_MS_PLACEHOLDER {
            let millis = now.unix_timestamp_nanos() / 1_000_000;
            rendered.push_str(&millis.to_string());
        } else {
            let value = params.get(name).ok_or_else(|| {
                SourceError::invalid_request(format!("missing parameter '{name}'"))
            })?;
            rendered.push_str(&urlencoding::encode(value));
        }
        rest = &after[close + 1..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

/// Extracts the argument of `callback(...)` with an optional trailing `;`.
pub fn unwrap_jsonp(body: &str) -> Option<&str> {
    let body = body.trim();
    let open = body.find('(')?;
    let callback = body[..open].trim();
    if callback.is_empty()
        || !callback
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$' | '.'))
    {
        return None;
    }

    let close = body.rfind(')')?;
    if close <= open || !body[close + 1..].trim().trim_end_matches(';').trim().is_empty() {
        return None;
    }
    Some(body[open + 1..close].trim())
}
