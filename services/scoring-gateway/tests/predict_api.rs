//! End-to-end router tests: requests go through the axum router exactly as
//! they would over a socket, against a registry fitted in-test.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;
use uuid::Uuid;

use scoring_gateway::routes::{app, AppState};
use serving_core::{
    FeatureFrame, FeatureValue, MeanRegressor, ModelRegistry, PredictionModel, Predictor,
    Preprocessor,
};

fn constant_model(id: &str, value: f64) -> PredictionModel {
    let mut frame = FeatureFrame::new(vec![
        "date".to_string(),
        "item".to_string(),
        "store".to_string(),
    ]);
    frame
        .push_row(vec![
            FeatureValue::Date(chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()),
            FeatureValue::Int(1),
            FeatureValue::Int(1),
        ])
        .unwrap();
    let mut model = PredictionModel::new(
        id,
        Preprocessor::date_features("date"),
        Predictor::Mean(MeanRegressor::default()),
    );
    model.fit(&frame, &[value]).unwrap();
    model
}

fn test_state() -> Arc<AppState> {
    let registry = ModelRegistry::new();
    registry.insert(constant_model("m1", 0.5));
    Arc::new(AppState { registry })
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_predict(state: Arc<AppState>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sales-forecasting/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn root_returns_welcome() {
    let (status, body) = get(test_state(), "/sales-forecasting").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Welcome to the Sales Forecasting AI Model service!"
    );
}

#[tokio::test]
async fn status_reports_up() {
    let (status, body) = get(test_state(), "/sales-forecasting/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "The app is up and running.");
}

#[tokio::test]
async fn models_endpoint_lists_registered_ids() {
    let (status, body) = get(test_state(), "/sales-forecasting/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"], serde_json::json!(["m1"]));
}

#[tokio::test]
async fn predict_single_request() {
    let (status, body) = post_predict(
        test_state(),
        serde_json::json!({"model_id": "m1", "date": "2023-01-01", "store": 1, "item": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    let rec = &predictions[0];
    assert_eq!(rec["prediction"], 0.5);
    assert_eq!(rec["date"], "2023-01-01");
    assert!(Uuid::parse_str(rec["prediction_id"].as_str().unwrap()).is_ok());
    assert!(rec["created_at"].as_str().unwrap().len() >= 23);
}

#[tokio::test]
async fn predict_batch_returns_one_record_per_request() {
    let (status, body) = post_predict(
        test_state(),
        serde_json::json!([
            {"model_id": "m1", "date": "2023-01-01", "store": 1, "item": 1},
            {"model_id": "m1", "date": "2023-01-02", "store": 2, "item": 2},
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predictions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_model_is_404_and_names_the_id() {
    let (status, body) = post_predict(
        test_state(),
        serde_json::json!([
            {"model_id": "m1", "date": "2023-01-01", "store": 1, "item": 1},
            {"model_id": "m2", "date": "2023-01-02", "store": 2, "item": 2},
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("m2"));
}

#[tokio::test]
async fn malformed_date_is_422_before_scoring() {
    let state = test_state();
    let (status, body) = post_predict(
        state.clone(),
        serde_json::json!({"model_id": "m1", "date": "not-a-date", "store": 1, "item": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("not-a-date"));
    assert_eq!(state.registry.prediction_count(), 0);
}

#[tokio::test]
async fn failed_batch_leaves_the_prediction_log_empty() {
    let state = test_state();
    let (status, _) = post_predict(
        state.clone(),
        serde_json::json!([
            {"model_id": "m1", "date": "2023-01-01", "store": 1, "item": 1},
            {"model_id": "missing", "date": "2023-01-02", "store": 2, "item": 2},
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(state.registry.prediction_count(), 0);
}
