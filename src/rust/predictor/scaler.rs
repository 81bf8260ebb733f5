use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::error::PredictorError;

/// Mean/variance standardization fitted offline.
///
/// `feature_names` records the column order the scaler was fit on; inputs must be
/// supplied in exactly that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(feature_names: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, PredictorError> {
        let scaler = Self { feature_names, mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Checks that names, means and scales line up and are usable.
    pub fn validate(&self) -> Result<(), PredictorError> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(PredictorError::ArtifactError("Scaler has no features".into()));
        }
        if self.mean.len() != n || self.scale.len() != n {
            return Err(PredictorError::ArtifactError(format!(
                "Scaler shape mismatch: {} names, {} means, {} scales",
                n,
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(pos) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(PredictorError::ArtifactError(format!(
                "Scaler mean for '{}' is not finite",
                self.feature_names[pos]
            )));
        }
        if let Some(pos) = self.scale.iter().position(|s| !s.is_finite() || *s < 0.0) {
            return Err(PredictorError::ArtifactError(format!(
                "Scaler scale for '{}' must be a non-negative finite number",
                self.feature_names[pos]
            )));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    // Zero-variance features are only centred.
    fn effective_scale(&self, i: usize) -> f64 {
        if self.scale[i] == 0.0 {
            1.0
        } else {
            self.scale[i]
        }
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, PredictorError> {
        if row.len() != self.n_features() {
            return Err(PredictorError::PredictionError(format!(
                "Scaler expects {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok(Array1::from_iter(
            row.iter()
                .enumerate()
                .map(|(i, &x)| (x - self.mean[i]) / self.effective_scale(i)),
        ))
    }

    /// Transforms every row of `x`.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, PredictorError> {
        let mut out = Array2::zeros(x.raw_dim());
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            out.row_mut(i).assign(&self.transform_row(row)?);
        }
        Ok(out)
    }

    pub fn inverse_transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, PredictorError> {
        if row.len() != self.n_features() {
            return Err(PredictorError::PredictionError(format!(
                "Scaler expects {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok(Array1::from_iter(
            row.iter()
                .enumerate()
                .map(|(i, &z)| z * self.effective_scale(i) + self.mean[i]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scaler() -> StandardScaler {
        StandardScaler::new(
            vec!["year".into(), "max_power".into(), "mileage".into()],
            vec![2014.0, 91.0, 19.0],
            vec![4.0, 35.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_transform_row() {
        let scaled = scaler().transform_row(array![2018.0, 126.0, 15.0].view()).unwrap();
        assert_eq!(scaled.to_vec(), vec![1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_transform_matrix_matches_rows() {
        let s = scaler();
        let x = array![[2018.0, 126.0, 15.0], [2014.0, 91.0, 19.0]];
        let scaled = s.transform(&x).unwrap();
        assert_eq!(scaled.row(0).to_vec(), vec![1.0, 1.0, -1.0]);
        assert_eq!(scaled.row(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_inverse_transform() {
        let s = scaler();
        let row = array![2016.5, 100.0, 17.25];
        let back = s.inverse_transform_row(s.transform_row(row.view()).unwrap().view()).unwrap();
        for (a, b) in back.iter().zip(row.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_wrong_width_rejected() {
        assert!(scaler().transform_row(array![2018.0, 126.0].view()).is_err());
    }

    #[test]
    fn test_zero_scale_only_centres() {
        let s = StandardScaler::new(vec!["seats".into()], vec![5.0], vec![0.0]).unwrap();
        assert_eq!(s.transform_row(array![7.0].view()).unwrap().to_vec(), vec![2.0]);
    }

    #[test]
    fn test_validation() {
        assert!(StandardScaler::new(vec!["a".into()], vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(StandardScaler::new(vec!["a".into()], vec![f64::NAN], vec![1.0]).is_err());
        assert!(StandardScaler::new(vec!["a".into()], vec![0.0], vec![-1.0]).is_err());
        assert!(StandardScaler::new(vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_json_format() {
        let json = r#"{"feature_names":["year"],"mean":[2014.0],"scale":[4.0]}"#;
        let s: StandardScaler = serde_json::from_str(json).unwrap();
        assert_eq!(s.feature_names, vec!["year"]);
        assert!(s.validate().is_ok());
    }
}
