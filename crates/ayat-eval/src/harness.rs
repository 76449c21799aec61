//! 评估执行器

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use ayat_core::{AyatError, DocRef, FusionConfig, FusionMethod, ModelKind, Result, tokenize};
use ayat_fusion::{ADAPTIVE_FALLBACK_THRESHOLD, FusionEngine, TrainingSample, estimate};

use crate::cache::{CacheKey, EvaluationCache};
use crate::metrics::{Metrics, compute_metrics};
use crate::ports::{GroundTruthStore, ResultSink};
use crate::training::collect_training_samples;

/// 被评估的检索方法：单个模型或一种融合策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalMethod {
    Model(ModelKind),
    Fusion(FusionMethod),
}

impl EvalMethod {
    pub fn all() -> Vec<EvalMethod> {
        ModelKind::ALL
            .into_iter()
            .map(EvalMethod::Model)
            .chain(FusionMethod::ALL.into_iter().map(EvalMethod::Fusion))
            .collect()
    }

    pub fn ensemble() -> Vec<EvalMethod> {
        FusionMethod::ALL.into_iter().map(EvalMethod::Fusion).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvalMethod::Model(kind) => kind.as_str(),
            EvalMethod::Fusion(method) => method.as_str(),
        }
    }

    /// 展示名称
    pub fn label(&self) -> &'static str {
        match self {
            EvalMethod::Model(ModelKind::Word2Vec) => "Word2Vec",
            EvalMethod::Model(ModelKind::FastText) => "FastText",
            EvalMethod::Model(ModelKind::Glove) => "GloVe",
            EvalMethod::Fusion(FusionMethod::Weighted) => "Weighted Fusion",
            EvalMethod::Fusion(FusionMethod::Voting) => "Voting Fusion",
            EvalMethod::Fusion(FusionMethod::Meta) => "Meta-Ranker Fusion",
        }
    }
}

impl fmt::Display for EvalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvalMethod {
    type Err = AyatError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(kind) = s.parse::<ModelKind>() {
            return Ok(EvalMethod::Model(kind));
        }
        s.parse::<FusionMethod>()
            .map(EvalMethod::Fusion)
            .map_err(|_| AyatError::InvalidConfiguration(format!("unknown evaluation method: {}", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub run_id: String,
    pub query_id: String,
    pub method: String,
    pub label: String,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub found_count: usize,
    pub exec_time_secs: f64,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationFailure {
    pub method: String,
    pub label: String,
    pub error: String,
    pub error_kind: String,
}

impl EvaluationFailure {
    fn new(method: EvalMethod, error: &AyatError) -> Self {
        Self {
            method: method.as_str().to_string(),
            label: method.label().to_string(),
            error: error.to_string(),
            error_kind: error.kind().to_string(),
        }
    }
}

/// 单个方法的评估结果：指标记录或错误记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationOutcome {
    Success(EvaluationResult),
    Failure(EvaluationFailure),
}

impl EvaluationOutcome {
    pub fn method(&self) -> &str {
        match self {
            EvaluationOutcome::Success(r) => &r.method,
            EvaluationOutcome::Failure(f) => &f.method,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            EvaluationOutcome::Success(r) => &r.label,
            EvaluationOutcome::Failure(f) => &f.label,
        }
    }

    pub fn result(&self) -> Option<&EvaluationResult> {
        match self {
            EvaluationOutcome::Success(r) => Some(r),
            EvaluationOutcome::Failure(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result().is_some()
    }
}

/// 集成对比报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub query_id: String,
    pub outcomes: Vec<EvaluationOutcome>,
    pub best_precision: Option<String>,
    pub best_recall: Option<String>,
    pub best_f1: Option<String>,
    pub fastest: Option<String>,
}

impl ComparisonReport {
    fn from_outcomes(query_id: &str, outcomes: Vec<EvaluationOutcome>) -> Self {
        let results: Vec<&EvaluationResult> = outcomes.iter().filter_map(|o| o.result()).collect();

        // 严格比较，同分时保留先出现的方法
        let best_by = |value: fn(&EvaluationResult) -> f64, higher: bool| -> Option<String> {
            let mut best: Option<&EvaluationResult> = None;
            for &r in &results {
                let better = match best {
                    None => true,
                    Some(b) if higher => value(r) > value(b),
                    Some(b) => value(r) < value(b),
                };
                if better {
                    best = Some(r);
                }
            }
            best.map(|r| r.label.clone())
        };

        Self {
            query_id: query_id.to_string(),
            best_precision: best_by(|r| r.metrics.precision, true),
            best_recall: best_by(|r| r.metrics.recall, true),
            best_f1: best_by(|r| r.metrics.f1, true),
            fastest: best_by(|r| r.exec_time_secs, false),
            outcomes,
        }
    }
}

pub struct EvaluationHarness {
    engine: Arc<FusionEngine>,
    ground_truth: Arc<dyn GroundTruthStore>,
    sink: Arc<dyn ResultSink>,
    cache: EvaluationCache,
}

impl EvaluationHarness {
    pub fn new(
        engine: Arc<FusionEngine>,
        ground_truth: Arc<dyn GroundTruthStore>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            engine,
            ground_truth,
            sink,
            cache: EvaluationCache::new(),
        }
    }

    pub fn engine(&self) -> &Arc<FusionEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    /// 开始新一轮评估：丢弃上一轮的缓存结果
    pub fn begin_run(&self) {
        tracing::debug!("Clearing {} cached evaluation results", self.cache.len());
        self.cache.clear();
    }

    fn relevant_documents(&self, query_id: &str) -> Result<BTreeSet<DocRef>> {
        let relevant = self.ground_truth.get_relevant_documents(query_id)?;
        if relevant.is_empty() {
            return Err(AyatError::NoGroundTruth(query_id.to_string()));
        }
        Ok(relevant)
    }

    /// 依次评估各方法；单个方法失败记录为错误项，不中断整批
    pub fn evaluate(
        &self,
        query_id: &str,
        query_text: &str,
        methods: &[EvalMethod],
        config: &FusionConfig,
    ) -> Result<Vec<EvaluationOutcome>> {
        let relevant = self.relevant_documents(query_id)?;
        config.validate()?;

        let run_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Evaluating query {} with {} methods (run {})",
            query_id,
            methods.len(),
            run_id
        );

        let mut outcomes = Vec::with_capacity(methods.len());
        for &method in methods {
            let outcome = self
                .evaluate_one(&run_id, query_id, query_text, method, config, &relevant)
                .unwrap_or_else(|e| {
                    tracing::warn!("Evaluation of {} failed for query {}: {}", method, query_id, e);
                    EvaluationOutcome::Failure(EvaluationFailure::new(method, &e))
                });
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// 一次运行三种融合策略并给出最优配置
    pub fn compare(
        &self,
        query_id: &str,
        query_text: &str,
        config: &FusionConfig,
    ) -> Result<ComparisonReport> {
        let outcomes = self.evaluate(query_id, query_text, &EvalMethod::ensemble(), config)?;
        Ok(ComparisonReport::from_outcomes(query_id, outcomes))
    }

    /// 按查询真值收集元排序器训练样本
    pub fn training_samples(
        &self,
        query_id: &str,
        query_text: &str,
        config: &FusionConfig,
    ) -> Result<Vec<TrainingSample>> {
        let relevant = self.relevant_documents(query_id)?;
        collect_training_samples(&self.engine, query_text, &relevant, config)
    }

    fn evaluate_one(
        &self,
        run_id: &str,
        query_id: &str,
        query_text: &str,
        method: EvalMethod,
        config: &FusionConfig,
        relevant: &BTreeSet<DocRef>,
    ) -> Result<EvaluationOutcome> {
        let start = Instant::now();
        let found = self.run_method(query_text, method, config)?;
        let exec_time_secs = start.elapsed().as_secs_f64();

        let found_set: BTreeSet<DocRef> = found.iter().copied().collect();
        let metrics = compute_metrics(&found_set, relevant);

        self.sink.add_evaluation_result(
            query_id,
            method.as_str(),
            metrics.precision,
            metrics.recall,
            metrics.f1,
            exec_time_secs,
        )?;

        tracing::debug!(
            "{} on {}: precision {:.3}, recall {:.3}, f1 {:.3}",
            method,
            query_id,
            metrics.precision,
            metrics.recall,
            metrics.f1
        );

        Ok(EvaluationOutcome::Success(EvaluationResult {
            run_id: run_id.to_string(),
            query_id: query_id.to_string(),
            method: method.as_str().to_string(),
            label: method.label().to_string(),
            metrics,
            found_count: found_set.len(),
            exec_time_secs,
            evaluated_at: Utc::now(),
        }))
    }

    fn run_method(
        &self,
        query_text: &str,
        method: EvalMethod,
        config: &FusionConfig,
    ) -> Result<Arc<Vec<DocRef>>> {
        match method {
            EvalMethod::Model(kind) => {
                let threshold = config.threshold.or(config.model_threshold(kind));
                let key = CacheKey::new(query_text, kind.as_str(), config.limit, threshold);
                self.cache.get_or_try_insert(key, || {
                    let provider = self.engine.registry().get(kind)?;
                    let tokens = tokenize(query_text);
                    let limit = config.limit.unwrap_or(usize::MAX);
                    let mut found = match threshold {
                        Some(t) => provider.search(&tokens, limit, Some(t))?,
                        None => {
                            // 没有固定阈值时与融合路径一致：预取后按自适应阈值过滤
                            let pool = provider.search(&tokens, config.fetch_limit(), None)?;
                            let scores: Vec<f32> = pool.iter().map(|c| c.score).collect();
                            let adaptive = estimate(&scores, ADAPTIVE_FALLBACK_THRESHOLD);
                            tracing::debug!("{}: adaptive threshold {:.4} over {} candidates", kind, adaptive, scores.len());
                            pool.into_iter().filter(|c| c.score >= adaptive).collect()
                        }
                    };
                    found.truncate(limit);
                    Ok(found.into_iter().map(|c| c.reference).collect())
                })
            }
            EvalMethod::Fusion(fusion) => {
                let key = CacheKey::new(query_text, fusion.as_str(), config.limit, config.threshold);
                self.cache.get_or_try_insert(key, || {
                    let fusion_config = config.clone().with_method(fusion);
                    let fused = self.engine.fuse(query_text, &fusion_config)?;
                    Ok(fused.into_iter().map(|r| r.reference).collect())
                })
            }
        }
    }
}
