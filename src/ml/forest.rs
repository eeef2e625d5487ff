use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use super::ModelError;

/// Number of candidate features per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(k) => *k,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    /// Reweight classes inversely to their frequency: `n / (2 * n_c)`.
    pub balanced_class_weight: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            balanced_class_weight: true,
            seed: 42,
        }
    }
}

/// Bagged ensemble of [`DecisionTree`]s. Trees are trained in parallel,
/// each with its own RNG seeded from `params.seed` and its index, so a
/// given seed always produces the same forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: ForestParams) -> Result<Self, ModelError> {
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::InvalidParams(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(ModelError::InvalidParams("n_estimators must be > 0".into()));
        }

        let n_features = x[0].len();
        if let Some(row) = x.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::FeatureMismatch {
                expected: n_features,
                got: row.len(),
            });
        }

        let n_bad = y.iter().filter(|&&v| v == 1).count();
        let n_good = y.len() - n_bad;
        if n_bad == 0 {
            return Err(ModelError::SingleClass("good"));
        }
        if n_good == 0 {
            return Err(ModelError::SingleClass("bad"));
        }

        let class_weight = if params.balanced_class_weight {
            let n = y.len() as f64;
            [n / (2.0 * n_good as f64), n / (2.0 * n_bad as f64)]
        } else {
            [1.0, 1.0]
        };

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: params.max_features.resolve(n_features),
        };

        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, i));
                let counts = if params.bootstrap {
                    bootstrap_counts(x.len(), &mut rng)
                } else {
                    vec![1.0; x.len()]
                };
                let weights: Vec<f64> = counts
                    .iter()
                    .zip(y)
                    .map(|(c, &label)| c * class_weight[label as usize])
                    .collect();
                DecisionTree::fit(x, y, &weights, &tree_params, &mut rng)
            })
            .collect();

        tracing::debug!(
            trees = trees.len(),
            n_features,
            max_features = tree_params.max_features,
            "Random forest fitted"
        );

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean P(bad) across trees.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        rows.par_iter().map(|r| self.predict_proba(r)).collect()
    }

    /// Class prediction (1 = bad) at the 0.5 threshold.
    pub fn predict(&self, row: &[f64]) -> Result<u8, ModelError> {
        Ok(u8::from(self.predict_proba(row)? > 0.5))
    }

    /// Mean of the per-tree normalised impurity importances.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, v) in out.iter_mut().zip(tree.importances()) {
                *acc += v;
            }
        }
        let n = self.trees.len().max(1) as f64;
        out.iter_mut().for_each(|v| *v /= n);
        out
    }
}

fn tree_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn bootstrap_counts(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut counts = vec![0.0; n];
    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1.0;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> (Vec<Vec<f64>>, Vec<u8>) {
        // bad iff x0 + x1 > 100, with a minority of bad rows.
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..60 {
            for j in [0.0, 20.0, 90.0] {
                let a = i as f64;
                x.push(vec![a, j, (i % 3) as f64]);
                y.push(u8::from(a + j > 100.0));
            }
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 25,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Fixed(50).resolve(9), 9);
        assert_eq!(MaxFeatures::All.resolve(4), 4);
    }

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = dataset();
        let forest = RandomForest::fit(&x, &y, small_params()).unwrap();

        assert_eq!(forest.n_trees(), 25);
        assert!(forest.predict_proba(&[59.0, 90.0, 0.0]).unwrap() > 0.5);
        assert!(forest.predict_proba(&[5.0, 0.0, 0.0]).unwrap() < 0.5);

        let correct = x
            .iter()
            .zip(&y)
            .filter(|(row, label)| forest.predict(row).unwrap() == **label)
            .count();
        assert!(correct as f64 / y.len() as f64 > 0.9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = dataset();
        let a = RandomForest::fit(&x, &y, small_params()).unwrap();
        let b = RandomForest::fit(&x, &y, small_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_single_class() {
        let x = vec![vec![1.0], vec![2.0]];
        let y = vec![0, 0];
        assert!(matches!(
            RandomForest::fit(&x, &y, small_params()),
            Err(ModelError::SingleClass(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (x, y) = dataset();
        let forest = RandomForest::fit(&x, &y, small_params()).unwrap();
        assert!(matches!(
            forest.predict_proba(&[1.0]),
            Err(ModelError::FeatureMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = dataset();
        let forest = RandomForest::fit(&x, &y, small_params()).unwrap();
        let imp = forest.feature_importances();
        assert_eq!(imp.len(), 3);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // the third column carries no signal
        assert!(imp[2] < imp[0]);
    }
}
