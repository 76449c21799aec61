//! 二分类逻辑回归
//!
//! 全批量梯度下降，L2 正则 (C = 1.0)，在标准化后的特征上训练。

use serde::{Deserialize, Serialize};

use super::features::{FEATURE_COUNT, FeatureVector};

#[derive(Debug, Clone, Copy)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    /// 正则强度的倒数
    pub c: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_iter: 2000,
            tolerance: 1e-6,
            c: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegression {
    pub fn fit(rows: &[FeatureVector], labels: &[bool], params: LogisticParams) -> Self {
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        let mut intercept = 0.0;
        let n = rows.len().max(1) as f64;

        for iter in 0..params.max_iter {
            let mut grad_w = [0.0; FEATURE_COUNT];
            let mut grad_b = 0.0;

            for (row, label) in rows.iter().zip(labels) {
                let z = dot(&coefficients, row) + intercept;
                let err = sigmoid(z) - if *label { 1.0 } else { 0.0 };
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }

            let mut max_grad = (grad_b / n).abs();
            for (g, w) in grad_w.iter_mut().zip(&coefficients) {
                *g = *g / n + w / (params.c * n);
                max_grad = max_grad.max(g.abs());
            }

            for (w, g) in coefficients.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * g;
            }
            intercept -= params.learning_rate * grad_b / n;

            if max_grad < params.tolerance {
                tracing::debug!("Logistic regression converged after {} iterations", iter + 1);
                break;
            }
        }

        Self {
            coefficients,
            intercept,
        }
    }

    pub fn predict_proba(&self, row: &FeatureVector) -> f64 {
        sigmoid(dot(&self.coefficients, row) + self.intercept)
    }

    pub fn is_valid(&self) -> bool {
        self.coefficients.len() == FEATURE_COUNT
            && self.coefficients.iter().all(|c| c.is_finite())
            && self.intercept.is_finite()
    }
}

fn dot(w: &[f64], x: &FeatureVector) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}
