//! End-to-end reconciliation flows.
//!
//! - direction change -> order -> retry -> convergence
//! - flat close
//! - scans on a stale cache
//! - ops endpoints over the wired application

mod integration;
use integration::common::{harness, long, sol};

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use hypebot_core::{BotUpdate, NewBot, OrderSide};
use hypebot_engine::ExecutionStatus;
use rust_decimal_macros::dec;
use tower::ServiceExt;

#[tokio::test(start_paused = true)]
async fn test_direction_change_converges_after_retry() {
    let (mock, app) = harness();
    let bot = app
        .service()
        .create(NewBot::new("sol", sol()))
        .await
        .unwrap();

    let outcome = app
        .service()
        .update(bot.id, BotUpdate::direction(dec!(1)))
        .await
        .unwrap();
    assert_eq!(outcome.execution, Some(ExecutionStatus::Pending));

    let placed = mock.placed_orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[0].amount.inner(), dec!(100));
    assert_eq!(placed[0].leverage, 5);

    // The order fills before the retry fires.
    mock.set_position(long(dec!(4900), dec!(98)));
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(mock.placed_orders().len(), 1);
    assert!(app.scheduler().running_bots().is_empty());
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_going_flat_closes_position() {
    let (mock, app) = harness();
    let bot = app
        .service()
        .create(NewBot::new("sol", sol()))
        .await
        .unwrap();
    mock.set_position(long(dec!(2500), dec!(50)));

    let outcome = app
        .service()
        .update(bot.id, BotUpdate::direction(dec!(0)))
        .await
        .unwrap();
    assert_eq!(outcome.execution, Some(ExecutionStatus::Pending));

    let placed = mock.placed_orders();
    assert_eq!(placed[0].side, OrderSide::Sell);
    assert_eq!(placed[0].amount.inner(), dec!(50));

    mock.clear_position(&sol());
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(mock.placed_orders().len(), 1);
    app.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_scan_survives_exchange_outage_on_warm_cache() {
    let (mock, app) = harness();
    mock.set_position(long(dec!(5000), dec!(100)));
    let bot = app
        .service()
        .create(NewBot::new("sol", sol()))
        .await
        .unwrap();
    // Converges immediately and warms the cache.
    app.service()
        .update(bot.id, BotUpdate::direction(dec!(1)))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(120)).await;
    mock.fail_reads(true);

    let summary = app.scheduler().execute_all().await.unwrap();
    assert_eq!(summary.bots, 1);
    assert_eq!(summary.converged, 1);
    assert_eq!(summary.failed, 0);
    app.shutdown();
}

#[tokio::test]
async fn test_cron_endpoint_executes_every_bot() {
    let (mock, app) = harness();
    for name in ["a", "b"] {
        app.service()
            .create(NewBot::new(name, sol()))
            .await
            .unwrap();
    }

    let response = hypebot::ops::router(app.ops_state())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/cron/execute-bots")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["executed"], 2);
    assert_eq!(body["summary"]["converged"], 2);
    assert_eq!(mock.calls("create_order"), 0);
    app.shutdown();
}
