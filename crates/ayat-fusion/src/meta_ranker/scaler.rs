//! 标准化 (零均值、单位方差)

use serde::{Deserialize, Serialize};

use super::features::{FEATURE_COUNT, FeatureVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    /// 总体标准差，方差为 0 的特征记为 1.0
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut scale = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((s, x), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std == 0.0 || !std.is_finite() { 1.0 } else { std };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in out.iter_mut().enumerate() {
            *value = (row[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    pub fn is_valid(&self) -> bool {
        self.mean.len() == FEATURE_COUNT
            && self.scale.len() == FEATURE_COUNT
            && self.scale.iter().all(|s| *s != 0.0 && s.is_finite())
            && self.mean.iter().all(|m| m.is_finite())
    }
}
