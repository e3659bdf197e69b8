//! In-memory model registry and prediction log.
//!
//! Both are process-lifetime state with no persistence across restarts.
//! The original had no synchronization discipline at all; here the model
//! map and the log each sit behind a `parking_lot::RwLock` so a bulk
//! reload swaps the map atomically and concurrent appends cannot tear.
//! Model handles are `Arc`-shared, so inference never runs under a lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::dispatch::ScoreRecord;
use crate::error::Result;
use crate::model::PredictionModel;

#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<PredictionModel>>>,
    log: RwLock<Vec<ScoreRecord>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `dir` (non-recursive) for `*.json` artifacts and registers each
    /// under its self-reported model id. A corrupt or wrong-typed artifact is
    /// skipped with a warning rather than failing the whole load.
    ///
    /// With `overwrite` the staged map replaces the current one wholesale;
    /// otherwise it merges in, new entries winning on id collision. Returns
    /// the number of models loaded from disk.
    pub fn load_models(&self, dir: &Path, overwrite: bool) -> Result<usize> {
        let mut staged: HashMap<String, Arc<PredictionModel>> = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match PredictionModel::deserialize(&path) {
                Ok(model) => {
                    info!(path = %path.display(), model_id = %model.model_id, "loaded saved model");
                    staged.insert(model.model_id.clone(), Arc::new(model));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable model artifact");
                }
            }
        }

        let loaded = staged.len();
        if loaded == 0 {
            warn!(dir = %dir.display(), "no models found; train at least one first");
        }

        let mut models = self.models.write();
        if overwrite {
            *models = staged;
        } else {
            models.extend(staged);
        }
        Ok(loaded)
    }

    /// Registers a single fitted model, replacing any entry with the same id.
    pub fn insert(&self, model: PredictionModel) {
        self.models.write().insert(model.model_id.clone(), Arc::new(model));
    }

    /// Absence is a normal outcome, never an error.
    pub fn get(&self, model_id: &str) -> Option<Arc<PredictionModel>> {
        self.models.read().get(model_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Appends a batch of scoring results to the prediction log.
    /// Concatenation only: no deduplication, no reordering.
    pub fn record(&self, results: Vec<ScoreRecord>) {
        self.log.write().extend(results);
    }

    pub fn prediction_count(&self) -> usize {
        self.log.read().len()
    }

    pub fn predictions(&self) -> Vec<ScoreRecord> {
        self.log.read().clone()
    }
}
