//! Flattened conditional probability tables.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BayesError;

/// A flattened conditional probability table: one block of `levels` values per parent
/// configuration, the node's own level varying fastest.
///
/// Values are weights, not probabilities. The engine normalizes each block, so
/// `[20, 80]` and `[0.2, 0.8]` describe the same prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution {
    values: Vec<f64>,
}

impl Distribution {
    pub fn new(values: Vec<f64>) -> Result<Self, BayesError> {
        if values.is_empty() {
            return Err(BayesError::InvalidDistribution(
                "distribution should not be empty".to_string(),
            ));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(BayesError::InvalidDistribution(format!(
                "values must be finite and non-negative, got {bad}"
            )));
        }
        Ok(Distribution { values })
    }

    /// Builds a distribution from integer or floating point weights.
    pub fn from_weights<I, T>(weights: I) -> Result<Self, BayesError>
    where
        I: IntoIterator<Item = T>,
        T: Into<f64>,
    {
        Distribution::new(weights.into_iter().map(Into::into).collect())
    }

    /// Uniform belief over `levels` outcomes. `levels` must be non-zero.
    pub fn uniform(levels: usize) -> Self {
        let value = 1.0 / levels as f64;
        Distribution {
            values: vec![value; levels],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<Vec<f64>> for Distribution {
    type Error = BayesError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Distribution::new(values)
    }
}

impl fmt::Display for Distribution {
    /// `5, 95, 1, 99`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_from_integer_weights() {
        let dist = Distribution::from_weights([20, 80]).unwrap();
        assert_eq!(dist.values(), &[20.0, 80.0]);
        assert_eq!(dist.to_string(), "20, 80");
    }

    #[test]
    fn test_fractional_values_render_verbatim() {
        let dist = Distribution::new(vec![0.25, 0.75]).unwrap();
        assert_eq!(dist.to_string(), "0.25, 0.75");
    }

    #[test]
    fn test_rejects_empty_and_negative() {
        assert!(matches!(
            Distribution::new(Vec::new()),
            Err(BayesError::InvalidDistribution(_))
        ));
        assert!(matches!(
            Distribution::from_weights([1.0, -0.5]),
            Err(BayesError::InvalidDistribution(_))
        ));
        assert!(matches!(
            Distribution::from_weights([1.0, f64::NAN]),
            Err(BayesError::InvalidDistribution(_))
        ));
    }

    #[test]
    fn test_uniform_sums_to_one() {
        let dist = Distribution::uniform(3);
        assert_eq!(dist.len(), 3);
        let total: f64 = dist.values().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
