use crate::ml::error::MlError;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization: `(x - mean) / std`.
///
/// Constant columns get a scale of 1 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self, MlError> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::Training("cannot fit scaler on zero rows".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, MlError> {
        if x.ncols() != self.n_features() {
            return Err(MlError::PredictionFailure(format!(
                "scaler expects {} columns, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.scale)
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, MlError> {
        if row.len() != self.n_features() {
            return Err(MlError::PredictionFailure(format!(
                "scaler expects {} values, got {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok((&row - &self.mean) / &self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_standardizes_columns() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();

        let col0: Vec<f64> = scaled.column(0).to_vec();
        let std = (8.0f64 / 3.0).sqrt();
        assert!((col0[0] + 2.0 / std).abs() < 1e-12);
        assert!(col0[1].abs() < 1e-12);

        // constant column maps to zero
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_row_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0, 3.0]]).unwrap();
        let row = array![1.0, 2.0];
        assert!(matches!(
            scaler.transform_row(row.view()),
            Err(MlError::PredictionFailure(_))
        ));
    }

    #[test]
    fn test_fit_on_empty_matrix_fails() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(&x).is_err());
    }
}
