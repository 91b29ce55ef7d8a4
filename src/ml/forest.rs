use crate::ml::error::MlError;
use crate::ml::trainer::CancellationFlag;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

/// One tree and the feature columns it was grown on
#[derive(Serialize, Deserialize)]
struct SubspaceTree {
    features: Vec<usize>,
    tree: Tree,
}

impl SubspaceTree {
    fn vote(&self, row: ArrayView1<f64>) -> Result<i32, MlError> {
        let values: Vec<f64> = self.features.iter().map(|&j| row[j]).collect();
        let x = DenseMatrix::new(1, self.features.len(), values, false);
        let prediction = self
            .tree
            .predict(&x)
            .map_err(|e| MlError::PredictionFailure(format!("tree prediction failed: {}", e)))?;

        prediction
            .first()
            .copied()
            .ok_or_else(|| MlError::PredictionFailure("tree returned no prediction".to_string()))
    }
}

/// Binary random forest built from smartcore decision trees.
///
/// Every tree sees a class-balanced bootstrap of the training rows and a
/// random subset of the columns. The positive-class probability is the share
/// of trees voting for class 1.
#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<SubspaceTree>,
    n_features: usize,
    params: ForestParams,
}

impl RandomForest {
    /// Fit on `x` with labels in {0, 1}. Both classes must be present.
    pub fn fit(
        x: &Array2<f64>,
        y: &[i32],
        params: ForestParams,
        cancel: &CancellationFlag,
    ) -> Result<Self, MlError> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MlError::Training(format!(
                "{} rows but {} labels",
                n_samples,
                y.len()
            )));
        }
        if params.n_trees == 0 || n_features == 0 {
            return Err(MlError::Training(
                "forest needs at least one tree and one feature".to_string(),
            ));
        }

        let positives: Vec<usize> = (0..n_samples).filter(|&i| y[i] == 1).collect();
        let negatives: Vec<usize> = (0..n_samples).filter(|&i| y[i] != 1).collect();
        if positives.is_empty() || negatives.is_empty() {
            return Err(MlError::SingleClassData);
        }

        let subspace = subspace_size(n_features);
        let per_class = (n_samples / 2).max(1);

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                if cancel.is_cancelled() {
                    return Err(MlError::Cancelled);
                }

                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_idx as u64));

                let mut features =
                    rand::seq::index::sample(&mut rng, n_features, subspace).into_vec();
                features.sort_unstable();

                let mut rows = Vec::with_capacity(per_class * 2);
                for class_rows in [&negatives, &positives] {
                    for _ in 0..per_class {
                        rows.push(class_rows[rng.gen_range(0..class_rows.len())]);
                    }
                }

                let mut data = Vec::with_capacity(rows.len() * features.len());
                for &i in &rows {
                    for &j in &features {
                        data.push(x[[i, j]]);
                    }
                }
                let tree_x = DenseMatrix::new(rows.len(), features.len(), data, false);
                let tree_y: Vec<i32> = rows.iter().map(|&i| i32::from(y[i] == 1)).collect();

                let tree_params = DecisionTreeClassifierParameters::default()
                    .with_max_depth(params.max_depth)
                    .with_min_samples_leaf(params.min_samples_leaf)
                    .with_criterion(SplitCriterion::Gini);

                let tree = DecisionTreeClassifier::fit(&tree_x, &tree_y, tree_params).map_err(
                    |e| MlError::Training(format!("failed to fit tree {}: {}", tree_idx, e)),
                )?;

                Ok(SubspaceTree { features, tree })
            })
            .collect::<Result<Vec<_>, MlError>>()?;

        Ok(Self {
            trees,
            n_features,
            params,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Share of trees voting "leak" for one scaled row
    pub fn predict_proba(&self, row: ArrayView1<f64>) -> Result<f64, MlError> {
        if row.len() != self.n_features {
            return Err(MlError::PredictionFailure(format!(
                "forest expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        if self.trees.is_empty() {
            return Err(MlError::PredictionFailure("forest has no trees".to_string()));
        }

        let mut votes = 0usize;
        for tree in &self.trees {
            if tree.vote(row)? == 1 {
                votes += 1;
            }
        }

        Ok(votes as f64 / self.trees.len() as f64)
    }

    /// Hard labels (probability > 0.5) for every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<i32>, MlError> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_proba(row).map(|p| i32::from(p > 0.5)))
            .collect()
    }
}

impl std::fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomForest")
            .field("n_trees", &self.trees.len())
            .field("n_features", &self.n_features)
            .field("params", &self.params)
            .finish()
    }
}

/// Columns per tree: ceil(sqrt(n_features))
fn subspace_size(n_features: usize) -> usize {
    ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every column separates leak rows from the rest
    fn separable_data(n: usize, width: usize) -> (Array2<f64>, Vec<i32>) {
        let mut x = Array2::<f64>::zeros((n, width));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let leak = i % 4 == 0;
            for j in 0..width {
                x[[i, j]] = if leak { 900.0 + j as f64 } else { 100.0 + (i % 7) as f64 };
            }
            y.push(i32::from(leak));
        }
        (x, y)
    }

    fn params(seed: u64) -> ForestParams {
        ForestParams {
            n_trees: 25,
            max_depth: 6,
            min_samples_leaf: 1,
            seed,
        }
    }

    #[test]
    fn test_subspace_size() {
        assert_eq!(subspace_size(17), 5);
        assert_eq!(subspace_size(16), 4);
        assert_eq!(subspace_size(1), 1);
    }

    #[test]
    fn test_fit_and_predict_separable() {
        let (x, y) = separable_data(40, 4);
        let forest = RandomForest::fit(&x, &y, params(7), &CancellationFlag::new()).unwrap();

        assert_eq!(forest.n_trees(), 25);
        let predictions = forest.predict(&x).unwrap();
        assert_eq!(predictions, y);

        let p = forest.predict_proba(x.row(0)).unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert!(p > 0.5);
    }

    #[test]
    fn test_same_seed_same_votes() {
        let (x, y) = separable_data(40, 6);
        let a = RandomForest::fit(&x, &y, params(3), &CancellationFlag::new()).unwrap();
        let b = RandomForest::fit(&x, &y, params(3), &CancellationFlag::new()).unwrap();

        for row in x.rows() {
            assert_eq!(a.predict_proba(row).unwrap(), b.predict_proba(row).unwrap());
        }
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::<f64>::ones((10, 3));
        let y = vec![1; 10];
        assert!(matches!(
            RandomForest::fit(&x, &y, params(1), &CancellationFlag::new()),
            Err(MlError::SingleClassData)
        ));
    }

    #[test]
    fn test_cancelled_fit() {
        let (x, y) = separable_data(20, 3);
        let cancel = CancellationFlag::new();
        cancel.cancel();
        assert!(matches!(
            RandomForest::fit(&x, &y, params(1), &cancel),
            Err(MlError::Cancelled)
        ));
    }

    #[test]
    fn test_wrong_width_is_prediction_failure() {
        let (x, y) = separable_data(20, 3);
        let forest = RandomForest::fit(&x, &y, params(1), &CancellationFlag::new()).unwrap();
        let narrow = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            forest.predict_proba(narrow.row(0)),
            Err(MlError::PredictionFailure(_))
        ));
    }
}
