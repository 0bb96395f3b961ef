//! A dense, name-carrying feature matrix and target vector for one
//! instrument at one decision date (spec §4.7). Built from `FeatureMatrix`
//! and `InstrumentReturns` panels by the caller (the production engine),
//! restricted to rows where every selected feature and the target are
//! observed — this crate only ever sees a complete rectangular matrix.

#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    /// Row-major: `rows[i][j]` is feature `j` for observation `i`.
    pub rows: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl Dataset {
    pub fn n(&self) -> usize {
        self.rows.len()
    }

    pub fn p(&self) -> usize {
        self.feature_names.len()
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[j]).collect()
    }

    /// Winsorise X and y at 5/95 (spec §4.7 step 1). Passthrough columns
    /// with fewer than 10 rows, matching `macro_core::series::winsorise`.
    pub fn winsorised(&self) -> Dataset {
        let y = winsorise_vec(&self.y);
        let mut rows = vec![vec![0.0; self.p()]; self.n()];
        for j in 0..self.p() {
            let col = winsorise_vec(&self.column(j));
            for i in 0..self.n() {
                rows[i][j] = col[i];
            }
        }
        Dataset {
            feature_names: self.feature_names.clone(),
            rows,
            y,
        }
    }

    /// Subsample rows by index (used for bootstrap stability selection).
    pub fn subsample(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    /// Standardise every column using its own training mean/std (floor
    /// 1e-8 to avoid division by zero on a constant column).
    pub fn standardised(&self) -> (Dataset, Vec<(f64, f64)>) {
        let mut stats = Vec::with_capacity(self.p());
        let mut rows = vec![vec![0.0; self.p()]; self.n()];
        for j in 0..self.p() {
            let col = self.column(j);
            let mean = col.iter().sum::<f64>() / col.len().max(1) as f64;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len().max(1) as f64;
            let std = var.sqrt().max(1e-8);
            stats.push((mean, std));
            for i in 0..self.n() {
                rows[i][j] = (self.rows[i][j] - mean) / std;
            }
        }
        (
            Dataset {
                feature_names: self.feature_names.clone(),
                rows,
                y: self.y.clone(),
            },
            stats,
        )
    }
}

pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len().max(1) as f64
}

fn winsorise_vec(xs: &[f64]) -> Vec<f64> {
    if xs.len() < 10 {
        return xs.to_vec();
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lo = quantile(&sorted, 0.05);
    let hi = quantile(&sorted, 0.95);
    xs.iter().map(|v| v.clamp(lo, hi)).collect()
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}
