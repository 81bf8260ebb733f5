use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use super::error::PredictorError;
use super::utils::softmax;

/// Whether an estimator produces a continuous value or a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Regression,
    Classification,
}

/// Raw estimator output before any target decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorOutput {
    Value(f64),
    Class { index: usize, probabilities: Vec<f64> },
}

/// Shared shape checks for the linear-family models below.
pub(crate) trait LinearModel {
    /// Number of input features the model was fit on
    fn n_features(&self) -> usize;

    /// Verifies the stored parameters are consistent and finite
    fn validate(&self) -> Result<(), PredictorError>;

    fn check_input(&self, x: ArrayView1<f64>) -> Result<(), PredictorError> {
        if x.len() != self.n_features() {
            return Err(PredictorError::PredictionError(format!(
                "Estimator expects {} features, got {}",
                self.n_features(),
                x.len()
            )));
        }
        Ok(())
    }
}

fn check_finite(name: &str, values: &[f64]) -> Result<(), PredictorError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PredictorError::ModelError(format!("{} contains non-finite values", name)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel for LinearRegression {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn validate(&self) -> Result<(), PredictorError> {
        if self.coef.is_empty() {
            return Err(PredictorError::ModelError("Linear model has no coefficients".into()));
        }
        check_finite("coef", &self.coef)?;
        check_finite("intercept", &[self.intercept])
    }
}

impl LinearRegression {
    pub fn predict(&self, x: ArrayView1<f64>) -> Result<f64, PredictorError> {
        self.check_input(x)?;
        Ok(x.dot(&ArrayView1::from(&self.coef[..])) + self.intercept)
    }
}

/// Linear regression over polynomial features without a bias column.
///
/// Feature expansion order: all degree-1 terms, then for each higher degree the
/// monomials of non-decreasing index tuples in lexicographic order, e.g. for three
/// inputs at degree 2: `x0 x1 x2 x0² x0x1 x0x2 x1² x1x2 x2²`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialRegression {
    pub degree: usize,
    pub n_inputs: usize,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel for PolynomialRegression {
    fn n_features(&self) -> usize {
        self.n_inputs
    }

    fn validate(&self) -> Result<(), PredictorError> {
        if self.degree == 0 || self.n_inputs == 0 {
            return Err(PredictorError::ModelError("Polynomial degree and inputs must be positive".into()));
        }
        let expected = polynomial_terms(self.n_inputs, self.degree).len();
        if self.coef.len() != expected {
            return Err(PredictorError::ModelError(format!(
                "Polynomial model of degree {} over {} inputs needs {} coefficients, found {}",
                self.degree,
                self.n_inputs,
                expected,
                self.coef.len()
            )));
        }
        check_finite("coef", &self.coef)?;
        check_finite("intercept", &[self.intercept])
    }
}

impl PolynomialRegression {
    pub fn expand(&self, x: ArrayView1<f64>) -> Array1<f64> {
        polynomial_terms(self.n_inputs, self.degree)
            .iter()
            .map(|term| term.iter().map(|&i| x[i]).product::<f64>())
            .collect()
    }

    pub fn predict(&self, x: ArrayView1<f64>) -> Result<f64, PredictorError> {
        self.check_input(x)?;
        let expanded = self.expand(x);
        Ok(expanded.dot(&ArrayView1::from(&self.coef[..])) + self.intercept)
    }
}

/// Index tuples of every monomial up to `degree`, in expansion order.
pub(crate) fn polynomial_terms(n_inputs: usize, degree: usize) -> Vec<Vec<usize>> {
    fn extend(start: usize, n: usize, remaining: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if remaining == 0 {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            extend(i, n, remaining - 1, current, out);
            current.pop();
        }
    }

    let mut terms = Vec::new();
    for d in 1..=degree {
        extend(0, n_inputs, d, &mut Vec::with_capacity(d), &mut terms);
    }
    terms
}

/// Multinomial logistic regression. A single coefficient row is treated as a
/// binary model with the row scoring the positive (second) class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearModel for LogisticRegression {
    fn n_features(&self) -> usize {
        self.coef.first().map(Vec::len).unwrap_or(0)
    }

    fn validate(&self) -> Result<(), PredictorError> {
        if self.coef.is_empty() || self.n_features() == 0 {
            return Err(PredictorError::ModelError("Logistic model has no coefficients".into()));
        }
        if self.coef.len() != self.intercept.len() {
            return Err(PredictorError::ModelError(format!(
                "Logistic model has {} coefficient rows but {} intercepts",
                self.coef.len(),
                self.intercept.len()
            )));
        }
        if let Some(row) = self.coef.iter().position(|r| r.len() != self.n_features()) {
            return Err(PredictorError::ModelError(format!("Coefficient row {} has the wrong width", row)));
        }
        for row in &self.coef {
            check_finite("coef", row)?;
        }
        check_finite("intercept", &self.intercept)
    }
}

impl LogisticRegression {
    pub fn n_classes(&self) -> usize {
        if self.coef.len() == 1 {
            2
        } else {
            self.coef.len()
        }
    }

    pub fn predict_proba(&self, x: ArrayView1<f64>) -> Result<Vec<f64>, PredictorError> {
        self.check_input(x)?;
        let scores: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| x.dot(&ArrayView1::from(&row[..])) + b)
            .collect();
        if let Some(class) = scores.iter().position(|s| !s.is_finite()) {
            return Err(PredictorError::PredictionError(format!(
                "Score for class {} is not finite",
                class
            )));
        }

        let probabilities = if scores.len() == 1 {
            let positive = 1.0 / (1.0 + (-scores[0]).exp());
            vec![1.0 - positive, positive]
        } else {
            softmax(&scores)
        };
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(PredictorError::PredictionError("Class probabilities are not finite".into()));
        }
        Ok(probabilities)
    }
}

/// A trained, immutable estimator as persisted in an artifact file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Linear(LinearRegression),
    Polynomial(PolynomialRegression),
    Logistic(LogisticRegression),
}

impl Estimator {
    pub fn task(&self) -> TaskKind {
        match self {
            Self::Linear(_) | Self::Polynomial(_) => TaskKind::Regression,
            Self::Logistic(_) => TaskKind::Classification,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Self::Linear(m) => m.n_features(),
            Self::Polynomial(m) => m.n_features(),
            Self::Logistic(m) => m.n_features(),
        }
    }

    /// Number of classes for classifiers, `None` for regressors.
    pub fn n_classes(&self) -> Option<usize> {
        match self {
            Self::Logistic(m) => Some(m.n_classes()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), PredictorError> {
        match self {
            Self::Linear(m) => m.validate(),
            Self::Polynomial(m) => m.validate(),
            Self::Logistic(m) => m.validate(),
        }
    }

    pub fn predict(&self, x: ArrayView1<f64>) -> Result<EstimatorOutput, PredictorError> {
        match self {
            Self::Linear(m) => m.predict(x).map(EstimatorOutput::Value),
            Self::Polynomial(m) => m.predict(x).map(EstimatorOutput::Value),
            Self::Logistic(m) => {
                let probabilities = m.predict_proba(x)?;
                // First maximum wins on ties
                let index = probabilities
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, &p)| if p > probabilities[best] { i } else { best });
                Ok(EstimatorOutput::Class { index, probabilities })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_predict() {
        let model = Estimator::Linear(LinearRegression { coef: vec![0.5, 0.25, -0.1], intercept: 13.0 });
        match model.predict(array![1.0, 2.0, -1.0].view()).unwrap() {
            EstimatorOutput::Value(v) => assert!((v - 14.1).abs() < 1e-12),
            other => panic!("unexpected output {:?}", other),
        }
        assert_eq!(model.task(), TaskKind::Regression);
    }

    #[test]
    fn test_polynomial_term_order() {
        let terms = polynomial_terms(3, 2);
        assert_eq!(
            terms,
            vec![
                vec![0], vec![1], vec![2],
                vec![0, 0], vec![0, 1], vec![0, 2],
                vec![1, 1], vec![1, 2], vec![2, 2],
            ]
        );
    }

    #[test]
    fn test_polynomial_predict() {
        let model = PolynomialRegression {
            degree: 2,
            n_inputs: 2,
            // x0 x1 x0² x0x1 x1²
            coef: vec![1.0, 0.0, 0.0, 2.0, 0.0],
            intercept: 0.5,
        };
        assert!(model.validate().is_ok());
        assert_eq!(model.expand(array![2.0, 3.0].view()).to_vec(), vec![2.0, 3.0, 4.0, 6.0, 9.0]);
        assert_eq!(model.predict(array![2.0, 3.0].view()).unwrap(), 2.0 + 12.0 + 0.5);
    }

    #[test]
    fn test_polynomial_coef_count_checked() {
        let model = PolynomialRegression { degree: 2, n_inputs: 3, coef: vec![1.0; 3], intercept: 0.0 };
        assert!(matches!(model.validate(), Err(PredictorError::ModelError(_))));
    }

    #[test]
    fn test_logistic_multinomial() {
        let model = Estimator::Logistic(LogisticRegression {
            coef: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, -1.0]],
            intercept: vec![0.0, 0.0, 0.0],
        });
        match model.predict(array![0.2, 1.5].view()).unwrap() {
            EstimatorOutput::Class { index, probabilities } => {
                assert_eq!(index, 1);
                assert_eq!(probabilities.len(), 3);
                assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_logistic_binary() {
        let model = LogisticRegression { coef: vec![vec![2.0]], intercept: vec![0.0] };
        assert_eq!(model.n_classes(), 2);
        let probs = model.predict_proba(array![0.0].view()).unwrap();
        assert_eq!(probs, vec![0.5, 0.5]);
    }

    #[test]
    fn test_logistic_overflow_is_an_error() {
        let model = Estimator::Logistic(LogisticRegression {
            coef: vec![vec![10.0], vec![-10.0], vec![0.0]],
            intercept: vec![0.0, 0.0, 0.0],
        });
        let result = model.predict(array![1e308].view());
        assert!(matches!(result, Err(PredictorError::PredictionError(_))), "got {:?}", result);

        let binary = LogisticRegression { coef: vec![vec![10.0]], intercept: vec![0.0] };
        assert!(binary.predict_proba(array![1e308].view()).is_err());
    }

    #[test]
    fn test_logistic_shape_validation() {
        let model = LogisticRegression { coef: vec![vec![1.0, 2.0], vec![1.0]], intercept: vec![0.0, 0.0] };
        assert!(model.validate().is_err());
        let model = LogisticRegression { coef: vec![vec![1.0]], intercept: vec![] };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_wrong_input_width() {
        let model = Estimator::Linear(LinearRegression { coef: vec![1.0, 1.0], intercept: 0.0 });
        assert!(matches!(
            model.predict(array![1.0].view()),
            Err(PredictorError::PredictionError(_))
        ));
    }

    #[test]
    fn test_tagged_json() {
        let json = r#"{"kind":"polynomial","degree":2,"n_inputs":1,"coef":[1.0,2.0],"intercept":0.0}"#;
        let model: Estimator = serde_json::from_str(json).unwrap();
        assert!(matches!(model, Estimator::Polynomial(_)));
        assert!(model.validate().is_ok());
    }
}
