use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Candidate features drawn at each split.
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        /// Weighted share of the bad class in this leaf.
        p_bad: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Binary CART classifier with Gini impurity and per-sample weights.
/// Nodes live in an arena; the root is index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Weighted impurity decrease per feature, normalised to sum to 1.
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Fit on the rows of `x` with a non-zero weight. Weights combine
    /// bootstrap counts and class weights.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        weights: &[f64],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            y,
            weights,
            params,
            n_features,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };

        let root: Vec<usize> = (0..x.len()).filter(|&i| weights[i] > 0.0).collect();
        builder.grow(root, 0, rng);

        let total: f64 = builder.importances.iter().sum();
        if total > 0.0 {
            for v in &mut builder.importances {
                *v /= total;
            }
        }

        Self {
            nodes: builder.nodes,
            importances: builder.importances,
        }
    }

    /// P(bad) for one feature vector.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { p_bad } => return *p_bad,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    weights: &'a [f64],
    params: &'a TreeParams,
    n_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn gini(good: f64, bad: f64) -> f64 {
    let total = good + bad;
    if total <= 0.0 {
        return 0.0;
    }
    let pg = good / total;
    let pb = bad / total;
    1.0 - pg * pg - pb * pb
}

impl Builder<'_> {
    fn class_weights(&self, idx: &[usize]) -> (f64, f64) {
        idx.iter().fold((0.0, 0.0), |(good, bad), &i| {
            if self.y[i] == 1 {
                (good, bad + self.weights[i])
            } else {
                (good + self.weights[i], bad)
            }
        })
    }

    fn grow(&mut self, idx: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let (good, bad) = self.class_weights(&idx);
        let total = good + bad;
        let node_id = self.nodes.len();
        let p_bad = if total > 0.0 { bad / total } else { 0.5 };
        self.nodes.push(Node::Leaf { p_bad });

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || idx.len() < self.params.min_samples_split.max(2)
            || good <= 0.0
            || bad <= 0.0
        {
            return node_id;
        }

        let Some(best) = self.best_split(&idx, good, bad, rng) else {
            return node_id;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);
        if left.is_empty() || right.is_empty() {
            return node_id;
        }

        self.importances[best.feature] += best.gain;

        let left_id = self.grow(left, depth + 1, rng);
        let right_id = self.grow(right, depth + 1, rng);
        self.nodes[node_id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_id,
            right: right_id,
        };
        node_id
    }

    fn best_split(
        &self,
        idx: &[usize],
        good: f64,
        bad: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        if self.n_features == 0 {
            return None;
        }
        let total = good + bad;
        let parent = total * gini(good, bad);
        let k = self.params.max_features.clamp(1, self.n_features);
        let mut best: Option<SplitCandidate> = None;

        for feature in sample(rng, self.n_features, k).into_iter() {
            let mut sorted = idx.to_vec();
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let (mut left_good, mut left_bad) = (0.0, 0.0);
            for pair in sorted.windows(2) {
                let (cur, next) = (pair[0], pair[1]);
                if self.y[cur] == 1 {
                    left_bad += self.weights[cur];
                } else {
                    left_good += self.weights[cur];
                }

                let v = self.x[cur][feature];
                let v_next = self.x[next][feature];
                if v_next <= v {
                    continue;
                }

                let right_good = good - left_good;
                let right_bad = bad - left_bad;
                let w_left = left_good + left_bad;
                let w_right = right_good + right_bad;
                if w_left <= 0.0 || w_right <= 0.0 {
                    continue;
                }

                let children = w_left * gini(left_good, left_bad) + w_right * gini(right_good, right_bad);
                let gain = parent - children;

                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = (v + v_next) / 2.0;
                    // Midpoint of adjacent floats can round up to v_next.
                    if threshold >= v_next {
                        threshold = v;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}
