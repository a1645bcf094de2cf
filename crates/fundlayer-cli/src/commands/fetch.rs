use std::time::Duration;

use fundlayer_core::{CacheMode, DataType, FetchOrchestrator, FetchParams, FetchRequest};
use tokio_util::sync::CancellationToken;

use crate::cli::FetchArgs;
use crate::error::CliError;
use crate::output::Document;

use super::{settle, Outcome};

pub async fn run(
    args: &FetchArgs,
    orchestrator: &FetchOrchestrator,
    shutdown: &CancellationToken,
) -> Result<Outcome, CliError> {
    let request = build_request(args)?;
    let data_type = request.data_type().to_string();
    let result = orchestrator.fetch_until_cancelled(request, shutdown).await;
    settle(result, |response| {
        Ok(Document::from_response(&data_type, response))
    })
}

fn build_request(args: &FetchArgs) -> Result<FetchRequest, CliError> {
    let data_type = DataType::parse(&args.data_type)?;
    let params = FetchParams::parse_pairs(&args.params)?;

    let mode = if args.bypass_cache {
        CacheMode::Bypass
    } else {
        CacheMode::from_use_cache(!args.no_cache)
    };

    let mut request = FetchRequest::new(data_type)
        .params(params)
        .cache_mode(mode)
        .validator(args.shape.clone());
    if let Some(secs) = args.ttl_secs {
        request = request.ttl(Duration::from_secs(secs));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundlayer_core::PayloadShape;

    fn args(no_cache: bool, bypass_cache: bool) -> FetchArgs {
        FetchArgs {
            data_type: "fund_realtime".to_owned(),
            params: vec!["code=008888".to_owned()],
            no_cache,
            bypass_cache,
            ttl_secs: Some(30),
            shape: PayloadShape::Any,
        }
    }

    #[test]
    fn cache_flags_select_mode() {
        assert_eq!(build_request(&args(false, false)).expect("request").mode(), CacheMode::Use);
        assert_eq!(build_request(&args(true, false)).expect("request").mode(), CacheMode::Refresh);
        assert_eq!(build_request(&args(false, true)).expect("request").mode(), CacheMode::Bypass);
    }

    #[test]
    fn request_key_uses_canonical_params() {
        let request = build_request(&args(false, false)).expect("request");
        assert_eq!(request.cache_key(), "fund_realtime:code=008888");
    }

    #[test]
    fn malformed_param_is_a_validation_error() {
        let mut bad = args(false, false);
        bad.params = vec!["code".to_owned()];
        let err = build_request(&bad).expect_err("malformed param");
        assert_eq!(err.exit_code(), 2);
    }
}
