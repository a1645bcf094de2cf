//! Behavior-driven tests for the typed market wrappers
//!
//! These tests verify that the fund, sector and news helpers decode served
//! payloads into their models and treat wrongly shaped payloads as source
//! failures.

use std::time::Duration;

use fundlayer_core::{
    source_fn, DataType, FetchConfig, FetchError, FetchOrchestrator, FlowIndicator, ManualClock,
    Origin, SectorType, SourceError,
};
use fundlayer_tests::store_in;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn orchestrator() -> (TempDir, ManualClock, FetchOrchestrator) {
    let dir = tempdir().expect("tempdir");
    let clock = ManualClock::at_epoch_2024();
    let store = store_in(&dir, &clock);
    (dir, clock, FetchOrchestrator::new(store, FetchConfig::default()))
}

fn register_value(orchestrator: &FetchOrchestrator, data_type: &DataType, name: &str, value: Value) {
    orchestrator.register(
        data_type,
        name,
        source_fn(move |_params| {
            let value = value.clone();
            async move { Ok::<_, SourceError>(value) }
        }),
    );
}

fn register_failing(orchestrator: &FetchOrchestrator, data_type: &DataType, name: &str) {
    orchestrator.register(
        data_type,
        name,
        source_fn(|_params| async { Err::<Value, _>(SourceError::unavailable("down")) }),
    );
}

// =============================================================================
// Fund quotes
// =============================================================================

#[tokio::test]
async fn when_a_source_returns_a_quote_it_is_decoded_into_the_model() {
    // Given: A source returning a well-formed quote
    let (_dir, _clock, orchestrator) = orchestrator();
    register_value(
        &orchestrator,
        &DataType::fund_realtime(),
        "fundgz",
        json!({"code": "008888", "price": 1.2345, "pct": 0.56, "time": "2024-01-01 14:30"}),
    );

    // When: The latest price is requested
    let served = orchestrator
        .fund_latest_price("008888")
        .await
        .expect("quote");

    // Then: The typed quote carries the fields
    assert_eq!(served.data.code, "008888");
    assert!((served.data.price - 1.2345).abs() < f64::EPSILON);
    assert_eq!(served.data.pct, Some(0.56));
    assert_eq!(served.origin.source(), Some("fundgz"));
    assert!(!served.is_degraded());
}

#[tokio::test]
async fn when_a_source_returns_the_wrong_shape_the_next_source_serves() {
    // Given: A primary returning an unrelated payload and a correct backup
    let (_dir, _clock, orchestrator) = orchestrator();
    register_value(
        &orchestrator,
        &DataType::fund_realtime(),
        "primary",
        json!({"message": "maintenance"}),
    );
    register_value(
        &orchestrator,
        &DataType::fund_realtime(),
        "backup",
        json!({"code": "008888", "price": 1.0}),
    );

    // When: The latest price is requested
    let served = orchestrator
        .fund_latest_price("008888")
        .await
        .expect("quote");

    // Then: The primary was rejected and the backup served
    assert_eq!(served.origin.source(), Some("backup"));
    assert_eq!(served.attempts[0].outcome.label(), "rejected");
    assert_eq!(served.warnings.len(), 1);
}

#[tokio::test]
async fn when_a_fund_code_is_blank_the_request_is_rejected_before_any_source_runs() {
    let (_dir, _clock, orchestrator) = orchestrator();
    register_failing(&orchestrator, &DataType::fund_realtime(), "primary");

    let result = orchestrator.fund_latest_price("   ").await;

    assert!(matches!(result, Err(FetchError::Validation(_))));
    assert_eq!(orchestrator.list_sources(&DataType::fund_realtime())[0].fail_count, 0);
}

#[tokio::test]
async fn when_quotes_are_stale_and_sources_are_down_the_wrapper_reports_degraded() {
    // Given: A quote cached a while ago and a source that now fails
    let (_dir, clock, orchestrator) = orchestrator();
    orchestrator
        .cache()
        .set(
            "fund_realtime:code=008888",
            &json!({"code": "008888", "price": 1.0}),
            Duration::from_secs(60),
        )
        .await
        .expect("seed cache");
    clock.advance(Duration::from_secs(120));
    register_failing(&orchestrator, &DataType::fund_realtime(), "primary");

    // When: The latest price is requested
    let served = orchestrator
        .fund_latest_price("008888")
        .await
        .expect("stale quote");

    // Then: The stale quote is served and flagged
    assert_eq!(served.origin, Origin::StaleCache);
    assert!(served.is_degraded());
    assert!(served.cached_at.is_some());
}

// =============================================================================
// History, sector flow and news
// =============================================================================

#[tokio::test]
async fn when_history_has_no_points_it_counts_as_a_failure() {
    let (_dir, _clock, orchestrator) = orchestrator();
    register_value(
        &orchestrator,
        &DataType::fund_history(),
        "akshare",
        json!({"code": "008888", "points": []}),
    );

    let result = orchestrator.fund_history("008888", 30).await;

    let Err(FetchError::AllSourcesExhausted { attempts, .. }) = result else {
        panic!("expected exhaustion");
    };
    assert_eq!(attempts[0].outcome.label(), "rejected");
}

#[tokio::test]
async fn when_history_is_served_the_latest_point_is_last() {
    let (_dir, _clock, orchestrator) = orchestrator();
    register_value(
        &orchestrator,
        &DataType::fund_history(),
        "akshare",
        json!({
            "code": "008888",
            "points": [
                {"date": "2024-01-02", "close": 1.01},
                {"date": "2024-01-03", "close": 1.02}
            ]
        }),
    );

    let served = orchestrator
        .fund_history("008888", 30)
        .await
        .expect("history");

    assert_eq!(served.data.points.len(), 2);
    assert_eq!(
        served.data.latest().map(|point| point.date.as_str()),
        Some("2024-01-03")
    );
}

#[tokio::test]
async fn when_industry_boards_fail_concept_boards_serve_sector_flow() {
    // Given: Two board sources, the first down
    let (_dir, _clock, orchestrator) = orchestrator();
    register_failing(&orchestrator, &DataType::board_flow(), "akshare_industry");
    register_value(
        &orchestrator,
        &DataType::board_flow(),
        "akshare_concept",
        json!([
            {"name": "Semiconductors", "main_net": 12.5, "main_net_pct": 3.1},
            {"name": "Banks", "main_net": -4.0}
        ]),
    );

    // When: Today's industry flow is requested
    let served = orchestrator
        .sector_flow(FlowIndicator::Today, SectorType::Industry)
        .await
        .expect("flow");

    // Then: The concept source answered with decoded rows
    assert_eq!(served.origin.source(), Some("akshare_concept"));
    assert_eq!(served.data.len(), 2);
    assert_eq!(served.data[0].name, "Semiconductors");
    assert_eq!(served.data[1].main_net_pct, 0.0);
}

#[tokio::test]
async fn when_news_is_cached_a_second_request_is_served_from_cache() {
    let (_dir, _clock, orchestrator) = orchestrator();
    register_value(
        &orchestrator,
        &DataType::news(),
        "sina",
        json!([{"title": "Funds rally", "url": "https://example.com/a"}]),
    );

    let first = orchestrator.news("funds").await.expect("news");
    let second = orchestrator.news("funds").await.expect("news");

    assert_eq!(first.origin.source(), Some("sina"));
    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(second.data[0].title, "Funds rally");
}
