use serde::{Deserialize, Serialize};

use super::error::PredictorError;

/// Maps labels to contiguous indices over a sorted, de-duplicated class list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = values.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn transform(&self, label: &str) -> Result<usize, PredictorError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| PredictorError::ValidationError(format!("Unseen label '{}'", label)))
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str, PredictorError> {
        self.classes.get(index).map(String::as_str).ok_or_else(|| {
            PredictorError::PredictionError(format!(
                "Class index {} out of range for {} classes",
                index,
                self.classes.len()
            ))
        })
    }

    /// Checks the classes are sorted and unique, as `transform` relies on it.
    pub fn validate(&self) -> Result<(), PredictorError> {
        if self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PredictorError::ArtifactError(
                "Label encoder classes must be sorted and unique".into(),
            ));
        }
        Ok(())
    }
}
