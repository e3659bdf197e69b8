//! HTTP routes for the sales-forecasting scoring service.
//!
//! The request boundary validates the date field before anything reaches
//! the dispatcher; an unknown model id maps to 404, a malformed request to
//! 422, anything else to a generic 500.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use serving_core::error::ServingError;
use serving_core::{score, FeatureValue, ModelRegistry, ScoreRequest};

pub struct AppState {
    pub registry: ModelRegistry,
}

/// One sales-forecasting scoring request as it arrives over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesForecastRequest {
    pub model_id: String,
    pub date: String,
    pub store: i64,
    pub item: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictBody {
    Many(Vec<SalesForecastRequest>),
    One(SalesForecastRequest),
}

impl PredictBody {
    fn into_vec(self) -> Vec<SalesForecastRequest> {
        match self {
            Self::Many(reqs) => reqs,
            Self::One(req) => vec![req],
        }
    }
}

/// Permissive ISO-8601-ish date parse: plain date first, then common
/// datetime shapes.
fn parse_request_date(raw: &str) -> Result<NaiveDate, ServingError> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    Err(ServingError::Validation(format!(
        "invalid date value '{raw}'; pass a valid date with format 'yyyy-MM-dd'"
    )))
}

impl SalesForecastRequest {
    fn into_score_request(self) -> Result<ScoreRequest, ServingError> {
        let date = parse_request_date(&self.date)?;
        let mut features = BTreeMap::new();
        features.insert("date".to_string(), FeatureValue::Date(date));
        features.insert("store".to_string(), FeatureValue::Int(self.store));
        features.insert("item".to_string(), FeatureValue::Int(self.item));
        Ok(ScoreRequest { model_id: self.model_id, features })
    }
}

pub struct ApiError(ServingError);

impl From<ServingError> for ApiError {
    fn from(err: ServingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServingError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            ServingError::Validation(_) | ServingError::SchemaMismatch(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %self.0, "request failed unexpectedly");
            return (status, Json(json!({ "message": "An unexpected error occurred." })))
                .into_response();
        }
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sales-forecasting", get(read_root))
        .route("/sales-forecasting/status", get(app_status))
        .route("/sales-forecasting/models", get(list_models))
        .route("/sales-forecasting/predict", post(predict))
        .with_state(state)
}

async fn read_root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the Sales Forecasting AI Model service!" }))
}

async fn app_status() -> Json<serde_json::Value> {
    Json(json!({ "message": "The app is up and running." }))
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "models": state.registry.model_ids() }))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PredictBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let requests = body
        .into_vec()
        .into_iter()
        .map(SalesForecastRequest::into_score_request)
        .collect::<Result<Vec<_>, _>>()?;
    let count = requests.len();
    let records = score(&state.registry, requests)?;
    Ok(Json(json!({
        "message": format!("Scored {count} request(s)."),
        "predictions": records,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_datetime_dates_parse() {
        assert!(parse_request_date("2023-01-01").is_ok());
        assert!(parse_request_date("2023-01-01T12:30:00").is_ok());
        assert!(parse_request_date("2023-01-01 12:30:00").is_ok());
        assert!(parse_request_date("2023-01-01T12:30:00+02:00").is_ok());
    }

    #[test]
    fn garbage_date_is_a_validation_error() {
        assert!(matches!(
            parse_request_date("invalid-date"),
            Err(ServingError::Validation(_))
        ));
    }

    #[test]
    fn single_object_and_array_bodies_both_deserialize() {
        let single: PredictBody = serde_json::from_str(
            r#"{"model_id":"m1","date":"2023-01-01","store":1,"item":1}"#,
        )
        .unwrap();
        assert_eq!(single.into_vec().len(), 1);

        let many: PredictBody = serde_json::from_str(
            r#"[{"model_id":"m1","date":"2023-01-01","store":1,"item":1},
                {"model_id":"m1","date":"2023-01-02","store":2,"item":2}]"#,
        )
        .unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }
}
