use std::collections::HashMap;

use log::{debug, warn};
use ndarray::Array1;

use super::error::PredictorError;
use super::scaler::StandardScaler;

/// A categorical field encoded as one indicator column per vocabulary entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotGroup {
    /// Name of the request field holding the category, e.g. `brand`
    pub field: String,
    /// Column name prefix, e.g. `brand_`
    pub prefix: String,
    /// The closed vocabulary, in training column order
    pub vocabulary: Vec<String>,
}

impl OneHotGroup {
    pub fn column_for(&self, category: &str) -> String {
        format!("{}{}", self.prefix, category)
    }
}

/// The exact ordered column schema a trained model expects at inference time.
///
/// Raw numeric columns always come first, followed by the one-hot columns of the
/// optional categorical group. The scaler subset is recorded separately because the
/// scaler may have been fit on the numeric columns in a different order than they
/// appear in the model input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureContract {
    columns: Vec<String>,
    numeric: Vec<String>,
    scaler_order: Vec<String>,
    one_hot: Option<OneHotGroup>,
    positions: HashMap<String, usize>,
}

impl FeatureContract {
    /// Creates a contract of raw numeric columns. The scaler order defaults to the
    /// column order.
    pub fn new(numeric: &[&str]) -> Self {
        let numeric: Vec<String> = numeric.iter().map(|s| s.to_string()).collect();
        let mut contract = Self {
            columns: Vec::new(),
            scaler_order: numeric.clone(),
            numeric,
            one_hot: None,
            positions: HashMap::new(),
        };
        contract.reindex();
        contract
    }

    /// Records the order the scaler was fit on.
    pub fn with_scaler_order(mut self, order: &[&str]) -> Self {
        self.scaler_order = order.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Appends one indicator column per vocabulary entry, named `<prefix><entry>`.
    pub fn with_one_hot(mut self, field: &str, prefix: &str, vocabulary: &[&str]) -> Self {
        self.one_hot = Some(OneHotGroup {
            field: field.to_string(),
            prefix: prefix.to_string(),
            vocabulary: vocabulary.iter().map(|s| s.to_string()).collect(),
        });
        self.reindex();
        self
    }

    fn reindex(&mut self) {
        self.columns = self.numeric.clone();
        if let Some(group) = &self.one_hot {
            self.columns
                .extend(group.vocabulary.iter().map(|entry| group.column_for(entry)));
        }
        self.positions = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
    }

    /// Checks the contract is internally consistent: no duplicate columns and a
    /// scaler order that is a permutation of the numeric columns.
    pub fn validate(&self) -> Result<(), PredictorError> {
        if self.numeric.is_empty() {
            return Err(PredictorError::BuildError("Contract has no numeric columns".into()));
        }
        if self.positions.len() != self.columns.len() {
            return Err(PredictorError::BuildError("Contract has duplicate column names".into()));
        }
        let mut scaler_sorted = self.scaler_order.clone();
        let mut numeric_sorted = self.numeric.clone();
        scaler_sorted.sort();
        numeric_sorted.sort();
        if scaler_sorted != numeric_sorted {
            return Err(PredictorError::BuildError(format!(
                "Scaler order {:?} is not a permutation of numeric columns {:?}",
                self.scaler_order, self.numeric
            )));
        }
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric
    }

    pub fn scaler_order(&self) -> &[String] {
        &self.scaler_order
    }

    pub fn one_hot(&self) -> Option<&OneHotGroup> {
        self.one_hot.as_ref()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Builds the dense model input in contract order.
    ///
    /// Every numeric column must be present and finite. The categorical value sets
    /// its matching indicator column to one; a value outside the vocabulary leaves
    /// every indicator at zero and is reported through
    /// [`FeatureVector::unmatched_category`].
    pub fn build_vector(&self, raw: &RawFeatures) -> Result<FeatureVector, PredictorError> {
        let mut values = Array1::zeros(self.columns.len());

        for (position, name) in self.numeric.iter().enumerate() {
            let value = raw.numeric(name).ok_or_else(|| {
                PredictorError::ValidationError(format!("Missing required field '{}'", name))
            })?;
            if !value.is_finite() {
                return Err(PredictorError::ValidationError(format!(
                    "Field '{}' must be a finite number",
                    name
                )));
            }
            values[position] = value;
        }

        let mut unmatched_category = None;
        if let Some(group) = &self.one_hot {
            let category = raw.category(&group.field).ok_or_else(|| {
                PredictorError::ValidationError(format!("Missing required field '{}'", group.field))
            })?;
            match self.position(&group.column_for(category)) {
                Some(position) => values[position] = 1.0,
                None => {
                    warn!(
                        "Unrecognized {} '{}': no indicator column matches, encoding as all zeros",
                        group.field, category
                    );
                    unmatched_category = Some(category.to_string());
                }
            }
        }

        Ok(FeatureVector { values, unmatched_category })
    }

    /// Scales the numeric subset of `vector` in place, in scaler order, leaving the
    /// indicator columns untouched. Returns the scaled subset in scaler order.
    pub fn scale_vector(
        &self,
        vector: &mut FeatureVector,
        scaler: &StandardScaler,
    ) -> Result<Array1<f64>, PredictorError> {
        let positions = self
            .scaler_order
            .iter()
            .map(|name| {
                self.position(name).ok_or_else(|| {
                    PredictorError::PredictionError(format!("Scaler column '{}' not in contract", name))
                })
            })
            .collect::<Result<Vec<usize>, _>>()?;

        let subset = Array1::from_iter(positions.iter().map(|&p| vector.values[p]));
        let scaled = scaler.transform_row(subset.view())?;
        for (&position, &value) in positions.iter().zip(scaled.iter()) {
            vector.values[position] = value;
        }
        debug!("Scaled subset {:?} -> {:?}", subset, scaled);
        Ok(scaled)
    }
}

/// User-supplied values keyed by field name, already coerced to their types.
#[derive(Debug, Clone, Default)]
pub struct RawFeatures {
    numeric: HashMap<String, f64>,
    categorical: HashMap<String, String>,
}

impl RawFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(name.into(), value);
        self
    }

    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(name.into(), value.into());
        self
    }

    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.numeric.get(name).copied()
    }

    pub fn category(&self, name: &str) -> Option<&str> {
        self.categorical.get(name).map(String::as_str)
    }
}

/// A dense vector in contract order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Array1<f64>,
    /// The categorical value that matched no indicator column, if any
    pub unmatched_category: Option<String>,
}
