//! 配置管理

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AyatError, Result};
use crate::types::{FusionMethod, ModelKind};

/// 单次融合请求的配置，请求期间不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub method: FusionMethod,
    /// 参与融合的模型及其权重
    pub model_weights: BTreeMap<ModelKind, f32>,
    /// 各模型的检索阈值，缺省表示该模型不做过滤
    #[serde(default)]
    pub model_thresholds: BTreeMap<ModelKind, f32>,
    pub voting_bonus: f32,
    /// `None` 表示不截断
    pub limit: Option<usize>,
    /// `None` 表示使用自适应阈值
    pub threshold: Option<f32>,
    /// 各模型预取数量 = limit * over_fetch_factor
    pub over_fetch_factor: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            method: FusionMethod::Weighted,
            model_weights: ModelKind::ALL.iter().map(|k| (*k, 1.0)).collect(),
            model_thresholds: BTreeMap::new(),
            voting_bonus: 0.1,
            limit: Some(10),
            threshold: None,
            over_fetch_factor: 3,
        }
    }
}

impl FusionConfig {
    pub fn new(method: FusionMethod) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// 只保留给定模型，权重为 1.0
    pub fn with_models(mut self, models: &[ModelKind]) -> Self {
        self.model_weights = models.iter().map(|k| (*k, 1.0)).collect();
        self.model_thresholds.retain(|k, _| models.contains(k));
        self
    }

    pub fn with_model(mut self, kind: ModelKind, weight: f32, threshold: Option<f32>) -> Self {
        self.model_weights.insert(kind, weight);
        match threshold {
            Some(t) => {
                self.model_thresholds.insert(kind, t);
            }
            None => {
                self.model_thresholds.remove(&kind);
            }
        }
        self
    }

    pub fn with_method(mut self, method: FusionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, threshold: Option<f32>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_voting_bonus(mut self, bonus: f32) -> Self {
        self.voting_bonus = bonus;
        self
    }

    pub fn models(&self) -> impl Iterator<Item = ModelKind> + '_ {
        self.model_weights.keys().copied()
    }

    pub fn weight(&self, kind: ModelKind) -> f32 {
        self.model_weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn model_threshold(&self, kind: ModelKind) -> Option<f32> {
        self.model_thresholds.get(&kind).copied()
    }

    /// 各模型的预取数量
    pub fn fetch_limit(&self) -> usize {
        match self.limit {
            Some(limit) => limit.saturating_mul(self.over_fetch_factor),
            None => usize::MAX,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_weights.is_empty() {
            return Err(invalid("at least one model must participate"));
        }
        for (kind, weight) in &self.model_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(invalid(format!("weight for {} must be finite and >= 0, got {}", kind, weight)));
            }
        }
        if self.model_weights.values().all(|w| *w == 0.0) {
            return Err(invalid("all model weights are zero"));
        }
        for (kind, threshold) in &self.model_thresholds {
            if !self.model_weights.contains_key(kind) {
                return Err(invalid(format!("threshold given for non-participating model {}", kind)));
            }
            if !threshold.is_finite() || !(-1.0..=1.0).contains(threshold) {
                return Err(invalid(format!("threshold for {} must be within [-1, 1], got {}", kind, threshold)));
            }
        }
        if !self.voting_bonus.is_finite() || self.voting_bonus < 0.0 {
            return Err(invalid(format!("voting_bonus must be >= 0, got {}", self.voting_bonus)));
        }
        if self.limit == Some(0) {
            return Err(invalid("limit must be positive"));
        }
        if self.over_fetch_factor == 0 {
            return Err(invalid("over_fetch_factor must be positive"));
        }
        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() {
                return Err(invalid(format!("threshold must be finite, got {}", threshold)));
            }
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> AyatError {
    AyatError::InvalidConfiguration(reason.into())
}

/// 单个嵌入模型的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub vectors_path: PathBuf,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub threshold: Option<f32>,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionDefaults {
    #[serde(default = "default_voting_bonus")]
    pub voting_bonus: f32,
    #[serde(default = "default_limit")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default = "default_over_fetch")]
    pub over_fetch_factor: usize,
}

fn default_voting_bonus() -> f32 {
    0.1
}
fn default_limit() -> Option<usize> {
    Some(10)
}
fn default_over_fetch() -> usize {
    3
}

impl Default for FusionDefaults {
    fn default() -> Self {
        Self {
            voting_bonus: default_voting_bonus(),
            limit: default_limit(),
            threshold: None,
            over_fetch_factor: default_over_fetch(),
        }
    }
}

/// 主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AyatConfig {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub fusion: FusionDefaults,
    #[serde(default = "default_meta_ranker_path")]
    pub meta_ranker_path: PathBuf,
    #[serde(default = "default_ground_truth_path")]
    pub ground_truth_path: PathBuf,
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/corpus.jsonl")
}
fn default_meta_ranker_path() -> PathBuf {
    PathBuf::from("data/meta_ranker.json")
}
fn default_ground_truth_path() -> PathBuf {
    PathBuf::from("data/ground_truth.json")
}
fn default_results_path() -> PathBuf {
    PathBuf::from("data/evaluation_results.json")
}

impl Default for AyatConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            models: Vec::new(),
            fusion: FusionDefaults::default(),
            meta_ranker_path: default_meta_ranker_path(),
            ground_truth_path: default_ground_truth_path(),
            results_path: default_results_path(),
        }
    }
}

impl AyatConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| invalid(format!("failed to read {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| invalid(format!("failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ayat")
            .join("config.json")
    }

    pub fn validate(&self) -> Result<()> {
        for (i, model) in self.models.iter().enumerate() {
            if self.models[..i].iter().any(|m| m.kind == model.kind) {
                return Err(invalid(format!("model {} configured twice", model.kind)));
            }
        }
        Ok(())
    }

    pub fn model(&self, kind: ModelKind) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.kind == kind)
    }

    pub fn fusion_config(&self, method: FusionMethod) -> Result<FusionConfig> {
        let config = FusionConfig {
            method,
            model_weights: self.models.iter().map(|m| (m.kind, m.weight)).collect(),
            model_thresholds: self
                .models
                .iter()
                .filter_map(|m| m.threshold.map(|t| (m.kind, t)))
                .collect(),
            voting_bonus: self.fusion.voting_bonus,
            limit: self.fusion.limit,
            threshold: self.fusion.threshold,
            over_fetch_factor: self.fusion.over_fetch_factor,
        };
        config.validate()?;
        Ok(config)
    }
}
