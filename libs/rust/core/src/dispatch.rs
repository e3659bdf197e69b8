//! Batched scoring dispatcher.
//!
//! Accepts one request or many, groups them by model id, scores each group
//! against the registry, and returns enriched records. All model ids are
//! validated before any group is scored, so a missing model fails the whole
//! batch without committing partial results to the prediction log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, ServingError};
use crate::frame::{FeatureFrame, FeatureValue};
use crate::registry::ModelRegistry;

/// Fields the dispatcher owns; they are never treated as model features.
pub const RESERVED_FIELDS: [&str; 4] = ["model_id", "prediction_id", "prediction", "created_at"];

/// Timestamp format used for `created_at` (millisecond precision).
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One scoring request: a target model id plus named feature values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub model_id: String,
    #[serde(flatten)]
    pub features: BTreeMap<String, FeatureValue>,
}

/// A scored request, enriched with a generated id, the prediction, and a
/// creation timestamp. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub prediction_id: Uuid,
    pub model_id: String,
    #[serde(flatten)]
    pub features: BTreeMap<String, FeatureValue>,
    pub prediction: f64,
    pub created_at: String,
}

/// Singleton requests are promoted to a one-element batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Many(Vec<ScoreRequest>),
    One(ScoreRequest),
}

impl ScoreInput {
    pub fn into_requests(self) -> Vec<ScoreRequest> {
        match self {
            Self::Many(reqs) => reqs,
            Self::One(req) => vec![req],
        }
    }
}

impl From<ScoreRequest> for ScoreInput {
    fn from(req: ScoreRequest) -> Self {
        Self::One(req)
    }
}

impl From<Vec<ScoreRequest>> for ScoreInput {
    fn from(reqs: Vec<ScoreRequest>) -> Self {
        Self::Many(reqs)
    }
}

fn feature_keys(req: &ScoreRequest) -> BTreeSet<&str> {
    req.features
        .keys()
        .map(String::as_str)
        .filter(|k| !RESERVED_FIELDS.contains(k))
        .collect()
}

/// Scores a batch against the registry and appends the results to its
/// prediction log. Within-group row order is preserved; groups come back in
/// first-encounter order of their model ids.
pub fn score(registry: &ModelRegistry, input: impl Into<ScoreInput>) -> Result<Vec<ScoreRecord>> {
    let requests = input.into().into_requests();
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    // Feature columns are whatever the first request carries, minus the
    // reserved fields. Every request in the batch must agree.
    let columns: Vec<String> = feature_keys(&requests[0]).iter().map(|k| k.to_string()).collect();
    let expected: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
    for req in &requests[1..] {
        let got = feature_keys(req);
        if got != expected {
            return Err(ServingError::Validation(format!(
                "inconsistent feature fields in batch: expected {expected:?}, got {got:?}"
            )));
        }
    }

    // Partition by model id, preserving first-encounter order.
    let mut groups: Vec<(String, Vec<&ScoreRequest>)> = Vec::new();
    for req in &requests {
        match groups.iter_mut().find(|(id, _)| id == &req.model_id) {
            Some((_, members)) => members.push(req),
            None => groups.push((req.model_id.clone(), vec![req])),
        }
    }

    // Validate every model id up front: all-or-nothing, nothing is scored or
    // logged when any id is unknown.
    let mut resolved = Vec::with_capacity(groups.len());
    for (model_id, members) in &groups {
        let model = registry
            .get(model_id)
            .ok_or_else(|| ServingError::model_not_found(model_id.clone()))?;
        resolved.push((model, members));
    }

    let mut records = Vec::with_capacity(requests.len());
    for (model, members) in resolved {
        let feature_maps: Vec<BTreeMap<String, FeatureValue>> = members
            .iter()
            .map(|req| {
                req.features
                    .iter()
                    .filter(|(k, _)| !RESERVED_FIELDS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .collect();
        let frame = FeatureFrame::from_records(&columns, &feature_maps)?;
        let predictions = model.predict(&frame)?;
        debug!(model_id = %model.model_id, rows = predictions.len(), "scored sub-batch");

        // One shared timestamp per sub-batch.
        let created_at = Utc::now().format(CREATED_AT_FORMAT).to_string();
        for (req, (features, prediction)) in
            members.iter().zip(feature_maps.into_iter().zip(predictions))
        {
            records.push(ScoreRecord {
                prediction_id: Uuid::new_v4(),
                model_id: req.model_id.clone(),
                features,
                prediction,
                created_at: created_at.clone(),
            });
        }
    }

    // A non-finite prediction or nil id means some code path failed to fill
    // fields for a row subset.
    if records.iter().any(|r| !r.prediction.is_finite() || r.prediction_id.is_nil()) {
        return Err(ServingError::Internal(
            "scored batch contains missing or non-finite fields".to_string(),
        ));
    }

    registry.record(records.clone());
    Ok(records)
}
