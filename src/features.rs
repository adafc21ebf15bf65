//! Fitted feature transformations.
//!
//! A record goes through three artifacts learned at training time before it
//! reaches the model:
//!   - `CategoricalEncoder` turns label columns into integer codes
//!   - `MinMaxScaler` rescales every column with the learned bounds
//!   - `FeatureVectorizer` lays the named values out in a fixed column order
//!
//! `FeaturePipeline` chains them and yields a sparse `FeatureRow`.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{FieldValue, PatientRecord, CATEGORICAL_COLUMNS, COLUMNS};

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("unknown category '{value}' for field {field}")]
    UnknownCategory { field: String, value: String },
    #[error("encoder has no mapping for field {0}")]
    UnmappedField(String),
    #[error("expected {expected} columns, got {actual}")]
    ColumnMismatch { expected: usize, actual: usize },
    #[error("cannot fit {0} on an empty dataset")]
    EmptyDataset(&'static str),
}

impl FeatureError {
    /// True when the record itself is at fault rather than the artifacts.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, FeatureError::UnknownCategory { .. })
    }
}

/// Label to code mapping per categorical column.
///
/// Codes follow label-encoder numbering: the column's distinct labels sorted
/// lexicographically, counted from zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    classes: BTreeMap<String, Vec<String>>,
}

impl CategoricalEncoder {
    pub fn fit<'a, I>(records: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = &'a PatientRecord>,
    {
        let mut seen: BTreeMap<String, BTreeSet<String>> = CATEGORICAL_COLUMNS
            .iter()
            .map(|column| (column.to_string(), BTreeSet::new()))
            .collect();
        let mut rows = 0usize;
        for record in records {
            rows += 1;
            for (column, labels) in seen.iter_mut() {
                if let Some(label) = record.label(column) {
                    labels.insert(label.to_string());
                }
            }
        }
        if rows == 0 {
            return Err(FeatureError::EmptyDataset("categorical encoder"));
        }
        let classes = seen
            .into_iter()
            .map(|(column, labels)| (column, labels.into_iter().collect()))
            .collect();
        Ok(Self { classes })
    }

    /// Known labels of a column, in code order.
    pub fn classes(&self, column: &str) -> Option<&[String]> {
        self.classes.get(column).map(Vec::as_slice)
    }

    pub fn code(&self, column: &str, label: &str) -> Result<usize, FeatureError> {
        let classes = self
            .classes
            .get(column)
            .ok_or_else(|| FeatureError::UnmappedField(column.to_string()))?;
        classes
            .binary_search_by(|known| known.as_str().cmp(label))
            .map_err(|_| FeatureError::UnknownCategory {
                field: column.to_string(),
                value: label.to_string(),
            })
    }

    /// The record as a numeric row in `COLUMNS` order, labels replaced by codes.
    pub fn encode(&self, record: &PatientRecord) -> Result<Array1<f64>, FeatureError> {
        record
            .fields()
            .iter()
            .map(|(column, value)| match *value {
                FieldValue::Number(x) => Ok(x),
                FieldValue::Label(label) => self.code(column, label).map(|code| code as f64),
            })
            .collect()
    }

    pub fn encode_all(&self, records: &[PatientRecord]) -> Result<Array2<f64>, FeatureError> {
        let mut out = Array2::zeros((records.len(), COLUMNS.len()));
        for (record, mut row) in records.iter().zip(out.rows_mut()) {
            row.assign(&self.encode(record)?);
        }
        Ok(out)
    }
}

/// Per-column min/max bounds mapping each column linearly onto [0, 1].
///
/// Values outside the fitted bounds are not clipped. A constant column keeps
/// a scale of one and is only shifted by its minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl MinMaxScaler {
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Result<Self, FeatureError> {
        if min.len() != max.len() {
            return Err(FeatureError::ColumnMismatch {
                expected: min.len(),
                actual: max.len(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn fit(data: &Array2<f64>) -> Result<Self, FeatureError> {
        if data.nrows() == 0 {
            return Err(FeatureError::EmptyDataset("scaler"));
        }
        let min = data
            .axis_iter(Axis(1))
            .map(|column| column.fold(f64::INFINITY, |acc, &x| acc.min(x)))
            .collect();
        let max = data
            .axis_iter(Axis(1))
            .map(|column| column.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x)))
            .collect();
        Ok(Self { min, max })
    }

    pub fn n_columns(&self) -> usize {
        self.min.len()
    }

    pub fn transform(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, FeatureError> {
        if row.len() != self.n_columns() {
            return Err(FeatureError::ColumnMismatch {
                expected: self.n_columns(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(&x, (&lo, &hi))| {
                let range = hi - lo;
                if range == 0.0 {
                    x - lo
                } else {
                    (x - lo) / range
                }
            })
            .collect())
    }

    pub fn transform_all(&self, data: &Array2<f64>) -> Result<Array2<f64>, FeatureError> {
        let mut out = Array2::zeros(data.raw_dim());
        for (src, mut dst) in data.rows().into_iter().zip(out.rows_mut()) {
            dst.assign(&self.transform(src)?);
        }
        Ok(out)
    }
}

/// Numeric features keyed by name, as handed to the vectorizer.
pub type Sample = BTreeMap<String, f64>;

/// Names a scaled row by `COLUMNS` so it can be vectorized.
pub fn named_sample(row: ArrayView1<f64>) -> Sample {
    COLUMNS
        .iter()
        .zip(row.iter())
        .map(|(name, &x)| (name.to_string(), x))
        .collect()
}

/// Fixed vocabulary of feature names, sorted, each owning one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVectorizer {
    feature_names: Vec<String>,
}

impl FeatureVectorizer {
    pub fn fit(samples: &[Sample]) -> Result<Self, FeatureError> {
        if samples.is_empty() {
            return Err(FeatureError::EmptyDataset("vectorizer"));
        }
        let names: BTreeSet<String> = samples
            .iter()
            .flat_map(|sample| sample.keys().cloned())
            .collect();
        Ok(Self {
            feature_names: names.into_iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }

    /// Features outside the vocabulary are dropped.
    pub fn transform(&self, sample: &Sample) -> FeatureRow {
        let entries: BTreeMap<usize, f64> = sample
            .iter()
            .filter_map(|(name, &x)| {
                let index = self.feature_names.binary_search(name).ok()?;
                Some((index, x))
            })
            .collect();
        FeatureRow::from_entries(self.len(), entries)
    }
}

/// Sparse single-row feature matrix: ascending column indices of the
/// non-zero entries and their values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureRow {
    fn from_entries(dim: usize, entries: BTreeMap<usize, f64>) -> Self {
        let (indices, values) = entries.into_iter().filter(|&(_, x)| x != 0.0).unzip();
        Self { dim, indices, values }
    }

    pub fn from_dense(row: ArrayView1<f64>) -> Self {
        let entries = row.iter().copied().enumerate().collect();
        Self::from_entries(row.len(), entries)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, index: usize) -> f64 {
        self.indices
            .binary_search(&index)
            .map_or(0.0, |pos| self.values[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn to_dense(&self) -> Array1<f64> {
        let mut dense = Array1::zeros(self.dim);
        for (index, x) in self.iter() {
            dense[index] = x;
        }
        dense
    }
}

/// Encoder, scaler and vectorizer as fitted together at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePipeline {
    pub encoder: CategoricalEncoder,
    pub scaler: MinMaxScaler,
    pub vectorizer: FeatureVectorizer,
}

impl FeaturePipeline {
    pub fn new(
        encoder: CategoricalEncoder,
        scaler: MinMaxScaler,
        vectorizer: FeatureVectorizer,
    ) -> Self {
        Self {
            encoder,
            scaler,
            vectorizer,
        }
    }

    pub fn transform(&self, record: &PatientRecord) -> Result<FeatureRow, FeatureError> {
        let encoded = self.encoder.encode(record)?;
        self.transform_encoded(encoded.view())
    }

    /// Scale and vectorize a row the encoder already produced.
    pub fn transform_encoded(&self, encoded: ArrayView1<f64>) -> Result<FeatureRow, FeatureError> {
        let scaled = self.scaler.transform(encoded)?;
        Ok(self.vectorizer.transform(&named_sample(scaled.view())))
    }

    /// Dense feature matrix for a batch of encoded rows.
    pub fn matrix(&self, encoded: &Array2<f64>) -> Result<Array2<f64>, FeatureError> {
        let mut out = Array2::zeros((encoded.nrows(), self.vectorizer.len()));
        for (src, mut dst) in encoded.rows().into_iter().zip(out.rows_mut()) {
            dst.assign(&self.transform_encoded(src)?.to_dense());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use ndarray::array;

    #[test]
    fn encoder_codes_sorted_labels() {
        let encoder = CategoricalEncoder::fit(&fixtures::reference_records()).unwrap();
        assert_eq!(
            encoder.classes("ChestPainType").unwrap(),
            ["ASY", "ATA", "NAP", "TA"]
        );
        assert_eq!(encoder.code("ST_Slope", "Up"), Ok(2));
        assert_eq!(encoder.code("Sex", "F"), Ok(0));
    }

    #[test]
    fn encoder_rejects_unseen_label() {
        let encoder = CategoricalEncoder::fit(&fixtures::reference_records()).unwrap();
        let mut record = fixtures::sample_record();
        record.chest_pain_type = "XYZ".into();
        let err = encoder.encode(&record).unwrap_err();
        assert_eq!(
            err,
            FeatureError::UnknownCategory {
                field: "ChestPainType".into(),
                value: "XYZ".into()
            }
        );
        assert!(err.is_invalid_input());
    }

    #[test]
    fn encoder_keeps_numbers_and_column_order() {
        let encoder = CategoricalEncoder::fit(&fixtures::reference_records()).unwrap();
        let encoded = encoder.encode(&fixtures::sample_record()).unwrap();
        assert_eq!(
            encoded,
            array![40.0, 1.0, 1.0, 140.0, 289.0, 0.0, 1.0, 172.0, 0.0, 0.0, 2.0]
        );
    }

    #[test]
    fn encoder_needs_data() {
        let none: Vec<PatientRecord> = Vec::new();
        assert_eq!(
            CategoricalEncoder::fit(&none),
            Err(FeatureError::EmptyDataset("categorical encoder"))
        );
    }

    #[test]
    fn scaler_maps_fitted_range_onto_unit_interval() {
        let data = array![[10.0, 5.0, -1.0], [20.0, 5.0, 3.0], [15.0, 5.0, 1.0]];
        let scaler = MinMaxScaler::fit(&data).unwrap();
        assert_eq!((scaler.min[0], scaler.max[0]), (10.0, 20.0));
        let scaled = scaler.transform_all(&data).unwrap();
        assert_eq!(scaled.column(0).to_vec(), vec![0.0, 1.0, 0.5]);
        // constant column is shifted only
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
        assert_eq!(scaled.column(2).to_vec(), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn scaler_keeps_in_bounds_records_in_unit_interval() {
        let scaler = fixtures::reference_scaler();
        let encoder = CategoricalEncoder::fit(&fixtures::reference_records()).unwrap();
        for record in fixtures::reference_records() {
            let scaled = scaler.transform(encoder.encode(&record).unwrap().view()).unwrap();
            assert!(
                scaled.iter().all(|x| (0.0..=1.0).contains(x)),
                "{scaled:?} out of range"
            );
        }
    }

    #[test]
    fn scaler_does_not_clip() {
        let scaler = MinMaxScaler::new(vec![0.0], vec![10.0]).unwrap();
        assert_eq!(scaler.transform(array![15.0].view()).unwrap(), array![1.5]);
        assert_eq!(scaler.transform(array![-5.0].view()).unwrap(), array![-0.5]);
    }

    #[test]
    fn scaler_checks_width() {
        let scaler = MinMaxScaler::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        assert_eq!(
            scaler.transform(array![1.0, 2.0, 3.0].view()),
            Err(FeatureError::ColumnMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn vectorizer_sorts_vocabulary() {
        let vectorizer = FeatureVectorizer::fit(&[named_sample(Array1::<f64>::zeros(11).view())]).unwrap();
        assert_eq!(
            vectorizer.feature_names,
            [
                "Age",
                "ChestPainType",
                "Cholesterol",
                "ExerciseAngina",
                "FastingBS",
                "MaxHR",
                "Oldpeak",
                "RestingBP",
                "RestingECG",
                "ST_Slope",
                "Sex"
            ]
        );
    }

    #[test]
    fn vectorizer_drops_unknown_and_zero_features() {
        let samples = [
            Sample::from([("size".to_string(), 2.5), ("depth".to_string(), 1.0)]),
            Sample::from([("size".to_string(), 0.5), ("colour".to_string(), 3.0)]),
        ];
        let vectorizer = FeatureVectorizer::fit(&samples).unwrap();
        assert_eq!(vectorizer.feature_names, ["colour", "depth", "size"]);
        assert!(!vectorizer.is_empty());

        let sample = Sample::from([
            ("size".to_string(), 4.0),
            ("depth".to_string(), 0.0),
            ("weight".to_string(), 9.0),
        ]);
        let row = vectorizer.transform(&sample);
        assert_eq!(row.iter().collect::<Vec<_>>(), vec![(2, 4.0)]);
        assert_eq!(row.to_dense(), array![0.0, 0.0, 4.0]);
    }

    #[test]
    fn feature_row_is_sparse() {
        let row = FeatureRow::from_dense(array![0.0, 3.0, 0.0, 0.5].view());
        assert_eq!(row.dim(), 4);
        assert_eq!(row.iter().count(), 2);
        assert_eq!(row.get(1), 3.0);
        assert_eq!(row.get(2), 0.0);
        assert_eq!(row.iter().collect::<Vec<_>>(), vec![(1, 3.0), (3, 0.5)]);
        assert_eq!(row.to_dense(), array![0.0, 3.0, 0.0, 0.5]);
    }

    #[test]
    fn pipeline_orders_scaled_values_by_vocabulary() {
        let pipeline = fixtures::reference_pipeline();
        let row = pipeline.transform(&fixtures::sample_record()).unwrap();
        assert_eq!(row.dim(), 11);
        let dense = row.to_dense();
        let age = (40.0 - 28.0) / (77.0 - 28.0);
        assert!((dense[0] - age).abs() < 1e-12);
        // ST_Slope "Up" is the last of three codes
        assert_eq!(dense[9], 1.0);
        // ExerciseAngina "N" encodes to zero and stays out of the sparse row
        assert_eq!(row.get(3), 0.0);
    }

    #[test]
    fn pipeline_matrix_matches_single_rows() {
        let pipeline = fixtures::reference_pipeline();
        let records = fixtures::reference_records();
        let encoded = pipeline.encoder.encode_all(&records).unwrap();
        let matrix = pipeline.matrix(&encoded).unwrap();
        for (record, row) in records.iter().zip(matrix.rows()) {
            assert_eq!(pipeline.transform(record).unwrap().to_dense(), row);
        }
    }
}
