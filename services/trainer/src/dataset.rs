//! Synthetic daily store/item sales with a deterministic train/test split.
//!
//! Stands in for the CSV the original harness trained on: a weak seasonal
//! signal plus per-store and per-item effects and noise, so a linear model
//! has something to recover and a constant model has a meaningful baseline.

use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use serving_core::{FeatureFrame, FeatureValue};

#[derive(Debug, Clone)]
pub struct SalesRow {
    pub date: NaiveDate,
    pub store: i64,
    pub item: i64,
    pub sales: f64,
}

pub struct SalesDataset {
    rows: Vec<SalesRow>,
    train_idx: Vec<usize>,
    test_idx: Vec<usize>,
}

impl SalesDataset {
    /// Generates `days` days of sales for every store/item pair, then splits
    /// by `train_pct` after a seeded shuffle.
    pub fn generate(days: u32, stores: i64, items: i64, train_pct: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid start date");
        let mut rows = Vec::new();
        for day in 0..days {
            let date = start + Duration::days(day as i64);
            let seasonal =
                5.0 * (2.0 * std::f64::consts::PI * date.ordinal() as f64 / 365.0).sin();
            for store in 1..=stores {
                for item in 1..=items {
                    let noise: f64 = rng.gen_range(-2.0..2.0);
                    let sales =
                        (20.0 + seasonal + 2.0 * store as f64 + 1.5 * item as f64 + noise).max(0.0);
                    rows.push(SalesRow { date, store, item, sales });
                }
            }
        }

        let mut indices: Vec<usize> = (0..rows.len()).collect();
        // Fisher-Yates with the same seeded rng keeps the split deterministic
        for i in (1..indices.len()).rev() {
            let j = rng.gen_range(0..=i);
            indices.swap(i, j);
        }
        let cut = ((rows.len() as f64) * train_pct).round() as usize;
        let (train_idx, test_idx) = indices.split_at(cut.min(indices.len()));
        Self { rows, train_idx: train_idx.to_vec(), test_idx: test_idx.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn training_split(&self) -> (FeatureFrame, Vec<f64>) {
        self.split(&self.train_idx)
    }

    pub fn test_split(&self) -> (FeatureFrame, Vec<f64>) {
        self.split(&self.test_idx)
    }

    fn split(&self, indices: &[usize]) -> (FeatureFrame, Vec<f64>) {
        let mut frame = FeatureFrame::new(vec![
            "date".to_string(),
            "store".to_string(),
            "item".to_string(),
        ]);
        let mut y = Vec::with_capacity(indices.len());
        for &i in indices {
            let row = &self.rows[i];
            frame
                .push_row(vec![
                    FeatureValue::Date(row.date),
                    FeatureValue::Int(row.store),
                    FeatureValue::Int(row.item),
                ])
                .expect("row arity matches frame columns");
            y.push(row.sales);
        }
        (frame, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_partitions_the_data() {
        let ds = SalesDataset::generate(30, 2, 3, 0.8, 42);
        assert_eq!(ds.len(), 30 * 2 * 3);
        let (train, train_y) = ds.training_split();
        let (test, test_y) = ds.test_split();
        assert_eq!(train.num_rows() + test.num_rows(), ds.len());
        assert_eq!(train.num_rows(), train_y.len());
        assert_eq!(test.num_rows(), test_y.len());
        assert_eq!(train.num_rows(), (ds.len() as f64 * 0.8).round() as usize);
    }

    #[test]
    fn same_seed_gives_the_same_split() {
        let a = SalesDataset::generate(10, 1, 2, 0.8, 42);
        let b = SalesDataset::generate(10, 1, 2, 0.8, 42);
        let (fa, ya) = a.training_split();
        let (fb, yb) = b.training_split();
        assert_eq!(fa.rows(), fb.rows());
        assert_eq!(ya, yb);
    }
}
