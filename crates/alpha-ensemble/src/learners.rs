//! The four per-instrument learners (spec §4.8): Ridge on the linear
//! feature set, and GBM/RandomForest/XGBoost on the nonlinear set.
//!
//! `smartcore` ships a single gradient-boosted-tree implementation
//! (`xgboost::XGRegressor`); the GBM and XGBoost slots are both backed by it
//! with distinct hyperparameter profiles (GBM: shallow, high learning rate,
//! few rounds, no L2; XGBoost: deeper, lower learning rate, L1/L2 via
//! `gamma`/`lambda`) rather than duplicating a second boosted-tree engine.
//! Ridge and RandomForest are hand-rolled here rather than taken from
//! `smartcore::linear`/`smartcore::ensemble` because this workspace already
//! carries the same two building blocks (ridge-shrunk OLS via `nalgebra`,
//! variance-reduction regression trees) in `equilibrium-rate::fiscal_augmented`
//! and `feature-selector::tree`, and reusing that idiom keeps one way of
//! doing ridge/tree regression in the crate rather than two.

use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::xgboost::{XGRegressor, XGRegressorParameters};

/// A fitted model that can score a single feature row.
pub trait FittedLearner: Send + Sync {
    fn predict_one(&self, row: &[f64]) -> f64;
}

/// Ridge regression with standardised inputs (spec §4.8: `alpha` selected
/// by CV from `{1, 5, 10, 20, 50}`).
pub struct RidgeModel {
    means: Vec<f64>,
    stds: Vec<f64>,
    intercept: f64,
    coeffs: DVector<f64>,
}

pub fn fit_ridge(rows: &[Vec<f64>], y: &[f64], lambda: f64) -> Option<RidgeModel> {
    let n = rows.len();
    if n == 0 {
        return None;
    }
    let p = rows[0].len();
    let mut means = vec![0.0; p];
    let mut stds = vec![1.0; p];
    for j in 0..p {
        let col: Vec<f64> = rows.iter().map(|r| r[j]).collect();
        let mean = col.iter().sum::<f64>() / n as f64;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std = var.sqrt().max(1e-8);
        means[j] = mean;
        stds[j] = std;
    }

    let flat: Vec<f64> = rows
        .iter()
        .flat_map(|r| r.iter().enumerate().map(|(j, v)| (v - means[j]) / stds[j]))
        .collect();
    let x = DMatrix::from_row_slice(n, p, &flat);
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let y_centred = DVector::from_vec(y.iter().map(|v| v - y_mean).collect());

    let mut xtx = x.transpose() * &x;
    for i in 0..p {
        xtx[(i, i)] += lambda;
    }
    let xty = x.transpose() * &y_centred;
    let coeffs = xtx.try_inverse()? * xty;

    Some(RidgeModel {
        means,
        stds,
        intercept: y_mean,
        coeffs,
    })
}

impl FittedLearner for RidgeModel {
    fn predict_one(&self, row: &[f64]) -> f64 {
        let mut acc = self.intercept;
        for (j, &v) in row.iter().enumerate() {
            let z = (v - self.means[j]) / self.stds[j];
            acc += z * self.coeffs[j];
        }
        acc
    }
}

/// A small variance-reduction regression tree, grounded on
/// `feature-selector::tree`'s `Tree` shape but carrying leaf means for
/// prediction rather than only an importance accumulator.
enum Tree {
    Leaf(f64),
    Split { feature: usize, threshold: f64, left: Box<Tree>, right: Box<Tree> },
}

fn leaf_mean(ys: &[f64]) -> f64 {
    if ys.is_empty() {
        0.0
    } else {
        ys.iter().sum::<f64>() / ys.len() as f64
    }
}

fn variance(ys: &[f64]) -> f64 {
    if ys.len() < 2 {
        return 0.0;
    }
    let m = leaf_mean(ys);
    ys.iter().map(|v| (v - m).powi(2)).sum::<f64>() / ys.len() as f64
}

fn build_tree(rows: &[Vec<f64>], ys: &[f64], depth: usize, max_depth: usize, rng: &mut ChaCha8Rng) -> Tree {
    if depth >= max_depth || rows.len() < 10 || variance(ys) < 1e-10 {
        return Tree::Leaf(leaf_mean(ys));
    }
    let p = rows[0].len();
    let mut features: Vec<usize> = (0..p).collect();
    features.shuffle(rng);
    let n_candidates = (p as f64).sqrt().ceil().max(1.0) as usize;

    let mut best: Option<(usize, f64, f64)> = None;
    for &feature in features.iter().take(n_candidates.max(1)) {
        let mut values: Vec<f64> = rows.iter().map(|r| r[feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for w in values.windows(2) {
            let threshold = (w[0] + w[1]) / 2.0;
            let left_ys: Vec<f64> = rows
                .iter()
                .zip(ys)
                .filter(|(r, _)| r[feature] <= threshold)
                .map(|(_, y)| *y)
                .collect();
            let right_ys: Vec<f64> = rows
                .iter()
                .zip(ys)
                .filter(|(r, _)| r[feature] > threshold)
                .map(|(_, y)| *y)
                .collect();
            if left_ys.len() < 3 || right_ys.len() < 3 {
                continue;
            }
            let weighted = (left_ys.len() as f64 * variance(&left_ys) + right_ys.len() as f64 * variance(&right_ys))
                / rows.len() as f64;
            if best.map(|(_, _, v)| weighted < v).unwrap_or(true) {
                best = Some((feature, threshold, weighted));
            }
        }
    }

    let Some((feature, threshold, _)) = best else {
        return Tree::Leaf(leaf_mean(ys));
    };

    let mut left_rows = Vec::new();
    let mut left_ys = Vec::new();
    let mut right_rows = Vec::new();
    let mut right_ys = Vec::new();
    for (r, &y) in rows.iter().zip(ys) {
        if r[feature] <= threshold {
            left_rows.push(r.clone());
            left_ys.push(y);
        } else {
            right_rows.push(r.clone());
            right_ys.push(y);
        }
    }

    Tree::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left_rows, &left_ys, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(&right_rows, &right_ys, depth + 1, max_depth, rng)),
    }
}

fn predict_tree(tree: &Tree, row: &[f64]) -> f64 {
    match tree {
        Tree::Leaf(v) => *v,
        Tree::Split { feature, threshold, left, right } => {
            if row[*feature] <= *threshold {
                predict_tree(left, row)
            } else {
                predict_tree(right, row)
            }
        }
    }
}

pub struct RandomForestModel {
    trees: Vec<Tree>,
}

pub fn fit_random_forest(rows: &[Vec<f64>], ys: &[f64], n_trees: usize, max_depth: usize, seed: u64) -> Option<RandomForestModel> {
    if rows.is_empty() {
        return None;
    }
    let n = rows.len();
    let mut built = Vec::with_capacity(n_trees);
    for t in 0..n_trees {
        let mut bag_rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(t as u64 + 1));
        let mut idx: Vec<usize> = (0..n).collect();
        idx.shuffle(&mut bag_rng);
        idx.truncate(n);
        let bag_rows: Vec<Vec<f64>> = idx.iter().map(|&i| rows[i].clone()).collect();
        let bag_ys: Vec<f64> = idx.iter().map(|&i| ys[i]).collect();
        built.push(build_tree(&bag_rows, &bag_ys, 0, max_depth, &mut bag_rng));
    }
    Some(RandomForestModel { trees: built })
}

impl FittedLearner for RandomForestModel {
    fn predict_one(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| predict_tree(t, row)).sum::<f64>() / self.trees.len() as f64
    }
}

/// Hyperparameter profile for one of the two boosted-tree slots.
#[derive(Debug, Clone, Copy)]
pub struct BoostedTreeConfig {
    pub gamma: f64,
    pub lambda: f64,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_child_weight: usize,
    pub n_estimators: usize,
    pub subsample: f64,
}

impl BoostedTreeConfig {
    /// GBM slot: shallow trees, high learning rate, few rounds, no shrinkage.
    pub fn gbm_default() -> Self {
        Self {
            gamma: 0.0,
            lambda: 0.0,
            learning_rate: 0.3,
            max_depth: 3,
            min_child_weight: 3,
            n_estimators: 50,
            subsample: 0.9,
        }
    }

    /// XGBoost slot: deeper trees, lower learning rate, more rounds, L1/L2.
    pub fn xgboost_default() -> Self {
        Self {
            gamma: 0.1,
            lambda: 1.0,
            learning_rate: 0.05,
            max_depth: 5,
            min_child_weight: 5,
            n_estimators: 150,
            subsample: 0.8,
        }
    }
}

pub struct BoostedTreeModel {
    model: XGRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
    n_features: usize,
}

pub fn fit_boosted_tree(rows: &[Vec<f64>], y: &[f64], config: BoostedTreeConfig, seed: u64) -> Option<BoostedTreeModel> {
    if rows.is_empty() {
        return None;
    }
    let n_features = rows[0].len();
    let x_rows: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
    let x = DenseMatrix::from_2d_array(&x_rows).ok()?;
    let parameters = XGRegressorParameters::default()
        .with_gamma(config.gamma)
        .with_lambda(config.lambda)
        .with_learning_rate(config.learning_rate)
        .with_max_depth(config.max_depth)
        .with_min_child_weight(config.min_child_weight)
        .with_n_estimators(config.n_estimators)
        .with_seed(seed)
        .with_subsample(config.subsample);
    let model = XGRegressor::fit(&x, &y.to_vec(), parameters).ok()?;
    Some(BoostedTreeModel { model, n_features })
}

impl FittedLearner for BoostedTreeModel {
    fn predict_one(&self, row: &[f64]) -> f64 {
        let x = match DenseMatrix::from_2d_array(&[&row[..self.n_features.min(row.len())]]) {
            Ok(m) => m,
            Err(_) => return 0.0,
        };
        self.model.predict(&x).ok().and_then(|v| v.first().copied()).unwrap_or(0.0)
    }
}
