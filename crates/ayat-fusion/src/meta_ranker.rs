//! 元排序器
//!
//! 以三个模型的相似度分数和长度特征训练逻辑回归相关性分类器，
//! 作为可学习的融合策略。训练是离线批处理，不在请求路径上进行；
//! 训练好的模型加载一次后只读共享。

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;

use ayat_core::{AyatError, Result};

pub mod artifact;
pub mod features;
pub mod logistic;
pub mod scaler;

pub use artifact::*;
pub use features::*;
pub use logistic::*;
pub use scaler::*;

/// 训练/测试划分的随机种子
pub const SPLIT_SEED: u64 = 42;
/// 测试集比例
pub const TEST_FRACTION: f64 = 0.2;
/// 相关性判定阈值
pub const RELEVANCE_CUTOFF: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    #[serde(alias = "w2v_score")]
    pub w2v: f64,
    #[serde(alias = "ft_score")]
    pub ft: f64,
    #[serde(alias = "glove_score")]
    pub glove: f64,
    pub query_token_count: usize,
    pub candidate_length: usize,
    pub is_relevant: bool,
}

impl TrainingSample {
    pub fn features(&self) -> FeatureVector {
        build_features(
            self.w2v,
            self.ft,
            self.glove,
            self.query_token_count,
            self.candidate_length,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub accuracy: f64,
    pub train_count: usize,
    pub test_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevancePrediction {
    pub relevance_score: f64,
    pub is_relevant: bool,
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// 训练好的标准化器 + 分类器，即持久化的模型文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRankerModel {
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub classifier: LogisticRegression,
    pub trained: bool,
}

impl MetaRankerModel {
    pub fn is_valid(&self) -> bool {
        self.feature_names.len() == FEATURE_COUNT
            && self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .all(|(a, b)| a == b)
            && self.scaler.is_valid()
            && self.classifier.is_valid()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetaRanker {
    model: Option<MetaRankerModel>,
    params: Option<LogisticParams>,
}

impl MetaRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: LogisticParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn from_model(model: MetaRankerModel) -> Self {
        Self {
            model: Some(model),
            params: None,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.as_ref().is_some_and(|m| m.trained)
    }

    pub fn model(&self) -> Option<&MetaRankerModel> {
        self.model.as_ref()
    }

    /// 按固定种子 80/20 划分，在训练集上拟合标准化器和分类器，返回测试集准确率。
    ///
    /// 样本太少无法留出测试集时，准确率在训练集上计算且 `test_count` 为 0。
    pub fn train(&mut self, samples: &[TrainingSample]) -> Result<TrainingSummary> {
        if samples.is_empty() {
            return Err(AyatError::InsufficientData(
                "no training samples provided".to_string(),
            ));
        }

        let mut indices: Vec<usize> = (0..samples.len()).collect();
        let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
        indices.shuffle(&mut rng);

        let mut test_count = (samples.len() as f64 * TEST_FRACTION).ceil() as usize;
        if test_count >= samples.len() {
            test_count = 0;
        }
        let (test_idx, train_idx) = indices.split_at(test_count);

        let train_rows: Vec<FeatureVector> = train_idx.iter().map(|i| samples[*i].features()).collect();
        let train_labels: Vec<bool> = train_idx.iter().map(|i| samples[*i].is_relevant).collect();

        let scaler = StandardScaler::fit(&train_rows);
        let scaled: Vec<FeatureVector> = train_rows.iter().map(|r| scaler.transform(r)).collect();
        let classifier = LogisticRegression::fit(&scaled, &train_labels, self.params.unwrap_or_default());

        let model = MetaRankerModel {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler,
            classifier,
            trained: true,
        };

        let eval_idx = if test_idx.is_empty() { train_idx } else { test_idx };
        let correct = eval_idx
            .iter()
            .filter(|i| {
                let sample = &samples[**i];
                let p = model
                    .classifier
                    .predict_proba(&model.scaler.transform(&sample.features()));
                (p > RELEVANCE_CUTOFF) == sample.is_relevant
            })
            .count();

        let summary = TrainingSummary {
            accuracy: correct as f64 / eval_idx.len() as f64,
            train_count: train_idx.len(),
            test_count,
        };
        tracing::info!(
            "Trained meta-ranker: accuracy={:.4} train={} test={}",
            summary.accuracy,
            summary.train_count,
            summary.test_count
        );

        self.model = Some(model);
        Ok(summary)
    }

    pub fn predict_relevance(
        &self,
        w2v: f64,
        ft: f64,
        glove: f64,
        query_token_count: usize,
        candidate_length: usize,
    ) -> Result<RelevancePrediction> {
        let model = self
            .model
            .as_ref()
            .filter(|m| m.trained)
            .ok_or(AyatError::ModelNotTrained)?;

        let features = build_features(w2v, ft, glove, query_token_count, candidate_length);
        let relevance_score = model
            .classifier
            .predict_proba(&model.scaler.transform(&features));

        Ok(RelevancePrediction {
            relevance_score,
            is_relevant: relevance_score > RELEVANCE_CUTOFF,
            features: features.to_vec(),
        })
    }

    /// 按系数绝对值降序排列的特征重要性，仅用于诊断
    pub fn feature_importance(&self) -> Result<Vec<FeatureImportance>> {
        let model = self
            .model
            .as_ref()
            .filter(|m| m.trained)
            .ok_or(AyatError::ModelNotTrained)?;

        let mut importance: Vec<FeatureImportance> = model
            .feature_names
            .iter()
            .zip(&model.classifier.coefficients)
            .map(|(name, coef)| FeatureImportance {
                feature: name.clone(),
                importance: coef.abs(),
            })
            .collect();
        importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(importance)
    }

    pub fn save(&self, store: &dyn ArtifactStore, path: &Path) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .filter(|m| m.trained)
            .ok_or(AyatError::ModelNotTrained)?;
        store.save(model, path)
    }

    pub fn load(store: &dyn ArtifactStore, path: &Path) -> Result<Self> {
        Ok(Self::from_model(store.load(path)?))
    }
}
