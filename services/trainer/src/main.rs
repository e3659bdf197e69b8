//! Offline training harness: fits the sales-forecasting models and writes
//! their artifacts into the directory the scoring gateway loads from.

use anyhow::{Context, Result};
use tracing::info;

use serving_core::{
    init_tracing, load_config, LinearRegressor, MeanRegressor, PredictionModel, Predictor,
    Preprocessor,
};

mod dataset;

use dataset::SalesDataset;

const TRAIN_PCT: f64 = 0.8;
const SEED: u64 = 42;

fn main() -> Result<()> {
    init_tracing("trainer")?;
    let cfg = load_config("trainer")?;
    info!(?cfg, "config loaded");

    info!("generating synthetic sales data");
    let dataset = SalesDataset::generate(365, 10, 5, TRAIN_PCT, SEED);
    let (train_x, train_y) = dataset.training_split();
    let (test_x, test_y) = dataset.test_split();
    info!(rows = dataset.len(), train = train_y.len(), test = test_y.len(), "splits created");

    std::fs::create_dir_all(&cfg.model_dir)
        .with_context(|| format!("creating model dir {}", cfg.model_dir.display()))?;

    let candidates = [
        ("sales-mean", Predictor::Mean(MeanRegressor::default())),
        ("sales-linear", Predictor::Linear(LinearRegressor::default())),
    ];
    for (model_id, predictor) in candidates {
        info!(model_id, "training model");
        let mut model =
            PredictionModel::new(model_id, Preprocessor::date_features("date"), predictor);
        model.fit(&train_x, &train_y)?;

        let mape = model.evaluate(&test_x, &test_y)?;
        info!(model_id, mape, "model evaluated");

        let path = cfg.model_dir.join(format!("{model_id}.json"));
        model.serialize(&path)?;
        info!(model_id, path = %path.display(), "model artifact saved");
    }

    Ok(())
}
