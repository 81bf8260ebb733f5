use std::cmp::Ordering;

use log::info;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

use super::error::PredictorError;
use super::scaler::StandardScaler;
use super::utils::euclidean_distance;
use crate::dataset::CarRecord;

/// Default number of neighbors shown next to a prediction.
pub const DEFAULT_NEIGHBORS: usize = 5;

/// A reference record together with its distance from the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCar {
    #[serde(flatten)]
    pub record: CarRecord,
    pub distance: f64,
}

/// Reference records pre-scaled with the same scaler as the model input.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    records: Vec<CarRecord>,
    scaled: Array2<f64>,
    feature_names: Vec<String>,
}

impl SimilarityIndex {
    /// Scales every record's features in the scaler's fit order. Records lacking
    /// any of those features are left out of the candidate set.
    pub fn build(records: &[CarRecord], scaler: &StandardScaler) -> Result<Self, PredictorError> {
        let feature_names = scaler.feature_names.clone();
        let mut kept = Vec::with_capacity(records.len());
        let mut raw = Vec::with_capacity(records.len() * feature_names.len());

        for record in records {
            let values: Option<Vec<f64>> = feature_names.iter().map(|name| record.feature(name)).collect();
            if let Some(values) = values {
                raw.extend(values);
                kept.push(record.clone());
            }
        }

        let skipped = records.len() - kept.len();
        if skipped > 0 {
            info!("Excluded {} reference rows missing one of {:?}", skipped, feature_names);
        }

        let matrix = Array2::from_shape_vec((kept.len(), feature_names.len()), raw)?;
        let scaled = scaler.transform(&matrix)?;
        info!("Built similarity index over {} rows", kept.len());

        Ok(Self {
            records: kept,
            scaled,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Returns the `k` closest records by Euclidean distance, nearest first.
    /// Equal distances keep dataset order.
    pub fn nearest(&self, query: ArrayView1<f64>, k: usize) -> Result<Vec<SimilarCar>, PredictorError> {
        if query.len() != self.feature_names.len() {
            return Err(PredictorError::PredictionError(format!(
                "Similarity query has {} features, index has {}",
                query.len(),
                self.feature_names.len()
            )));
        }

        let distances: Array1<f64> = self
            .scaled
            .axis_iter(Axis(0))
            .map(|row| euclidean_distance(query, row))
            .collect();

        let mut order: Vec<usize> = (0..distances.len()).collect();
        order.sort_by(|&a, &b| distances[a].partial_cmp(&distances[b]).unwrap_or(Ordering::Equal));

        Ok(order
            .into_iter()
            .take(k)
            .map(|i| SimilarCar {
                record: self.records[i].clone(),
                distance: distances[i],
            })
            .collect())
    }
}
