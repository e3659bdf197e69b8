//! Structured-row input for prediction models.
//!
//! `FeatureFrame` is the small, column-named table that flows between the
//! request boundary, the preprocessor, and the predictor. Predictors
//! themselves consume a plain numeric row-major matrix produced by the
//! preprocessing stage.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServingError};

/// Row-major numeric design matrix handed to predictors.
pub type Matrix = Vec<Vec<f64>>;

/// A single feature value. Untagged so JSON numbers and ISO dates map
/// directly: `1` -> Int, `0.5` -> Float, `"2023-01-01"` -> Date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl FeatureValue {
    /// Numeric view of the value. Dates have no direct numeric form; they
    /// must go through a date-aware preprocessor first.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            FeatureValue::Int(v) => Ok(*v as f64),
            FeatureValue::Float(v) => Ok(*v),
            FeatureValue::Date(d) => Err(ServingError::Validation(format!(
                "date value '{d}' cannot be used as a raw numeric feature"
            ))),
        }
    }

    pub fn as_date(&self) -> Result<NaiveDate> {
        match self {
            FeatureValue::Date(d) => Ok(*d),
            other => Err(ServingError::Validation(format!(
                "expected a date value, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    columns: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Builds a frame from name->value records, selecting `columns` from each
    /// record in order. A record missing one of the columns is an error.
    pub fn from_records(
        columns: &[String],
        records: &[BTreeMap<String, FeatureValue>],
    ) -> Result<Self> {
        let mut frame = Self::new(columns.to_vec());
        for record in records {
            let mut row = Vec::with_capacity(columns.len());
            for col in columns {
                let value = record.get(col).ok_or_else(|| {
                    ServingError::Validation(format!("missing feature column '{col}'"))
                })?;
                row.push(value.clone());
            }
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    pub fn push_row(&mut self, row: Vec<FeatureValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ServingError::Validation(format!(
                "row has {} values but the frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, FeatureValue)]) -> BTreeMap<String, FeatureValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn builds_from_records_in_column_order() {
        let columns = vec!["date".to_string(), "store".to_string(), "item".to_string()];
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let records = vec![record(&[
            ("store", FeatureValue::Int(1)),
            ("item", FeatureValue::Int(7)),
            ("date", FeatureValue::Date(date)),
        ])];
        let frame = FeatureFrame::from_records(&columns, &records).unwrap();
        assert_eq!(frame.num_rows(), 1);
        assert_eq!(frame.rows()[0][0], FeatureValue::Date(date));
        assert_eq!(frame.rows()[0][1], FeatureValue::Int(1));
        assert_eq!(frame.rows()[0][2], FeatureValue::Int(7));
    }

    #[test]
    fn missing_column_is_a_validation_error() {
        let columns = vec!["store".to_string(), "item".to_string()];
        let records = vec![record(&[("store", FeatureValue::Int(1))])];
        let err = FeatureFrame::from_records(&columns, &records).unwrap_err();
        assert!(matches!(err, ServingError::Validation(_)));
    }

    #[test]
    fn arity_mismatch_rejected() {
        let mut frame = FeatureFrame::new(vec!["a".to_string(), "b".to_string()]);
        let err = frame.push_row(vec![FeatureValue::Int(1)]).unwrap_err();
        assert!(matches!(err, ServingError::Validation(_)));
    }

    #[test]
    fn untagged_json_values_round_trip() {
        let parsed: Vec<FeatureValue> =
            serde_json::from_str(r#"[1, 0.5, "2023-01-01"]"#).unwrap();
        assert_eq!(parsed[0], FeatureValue::Int(1));
        assert_eq!(parsed[1], FeatureValue::Float(0.5));
        assert_eq!(
            parsed[2],
            FeatureValue::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
        );
    }
}
