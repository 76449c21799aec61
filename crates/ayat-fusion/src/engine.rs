//! 融合引擎
//!
//! 流程：各模型按预取数量检索 → 合并候选 → 按策略计算融合分数
//! → 按固定或自适应阈值过滤 → 降序排序并截断。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ayat_core::{
    AyatError, CandidateResult, Corpus, DocRef, FusedResult, FusionConfig, FusionMethod,
    ModelKind, Result, tokenize,
};
use ayat_vector::ModelRegistry;

use crate::meta_ranker::MetaRanker;
use crate::threshold::estimate;

/// 投票策略下每个模型的固定阈值
pub const VOTING_MODEL_THRESHOLD: f32 = 0.5;
/// 自适应阈值无法估计时的回退值
pub const ADAPTIVE_FALLBACK_THRESHOLD: f32 = 0.5;

/// 各模型的候选集合
#[derive(Debug, Clone, Default)]
pub struct ModelCandidates {
    pub per_model: BTreeMap<ModelKind, Vec<CandidateResult>>,
    /// 检索失败、按空结果处理的模型
    pub failed: Vec<ModelKind>,
}

impl ModelCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ModelKind, candidates: Vec<CandidateResult>) -> Self {
        self.per_model.insert(kind, candidates);
        self
    }

    pub fn with_failure(mut self, kind: ModelKind) -> Self {
        self.failed.push(kind);
        self
    }

    pub fn succeeded(&self) -> usize {
        self.per_model.len()
    }
}

/// 对某个模型实际生效的检索阈值
pub fn effective_model_threshold(config: &FusionConfig, kind: ModelKind) -> Option<f32> {
    match config.method {
        FusionMethod::Voting => Some(VOTING_MODEL_THRESHOLD),
        FusionMethod::Weighted | FusionMethod::Meta => config.model_threshold(kind),
    }
}

struct MergedEntry {
    document_id: usize,
    reference: DocRef,
    scores: BTreeMap<ModelKind, f32>,
    returned_by: Vec<ModelKind>,
}

pub struct FusionEngine {
    registry: Arc<ModelRegistry>,
    corpus: Arc<Corpus>,
    meta_ranker: Option<Arc<MetaRanker>>,
}

impl FusionEngine {
    pub fn new(registry: Arc<ModelRegistry>, corpus: Arc<Corpus>) -> Self {
        Self {
            registry,
            corpus,
            meta_ranker: None,
        }
    }

    pub fn with_meta_ranker(mut self, meta_ranker: Arc<MetaRanker>) -> Self {
        self.meta_ranker = Some(meta_ranker);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    pub fn meta_ranker(&self) -> Option<&Arc<MetaRanker>> {
        self.meta_ranker.as_ref()
    }

    pub fn fuse(&self, query_text: &str, config: &FusionConfig) -> Result<Vec<FusedResult>> {
        config.validate()?;
        let tokens = tokenize(query_text);
        let candidates = self.collect_candidates(&tokens, config)?;
        self.fuse_candidates(&candidates, tokens.len(), config)
    }

    /// 逐个模型检索；单个模型失败按空结果处理，全部失败时返回 `NoModelAvailable`
    pub fn collect_candidates(
        &self,
        query_tokens: &[String],
        config: &FusionConfig,
    ) -> Result<ModelCandidates> {
        let fetch_limit = config.fetch_limit();
        let mut candidates = ModelCandidates::new();

        for kind in config.models() {
            let threshold = effective_model_threshold(config, kind);
            let result = self
                .registry
                .get(kind)
                .and_then(|provider| provider.search(query_tokens, fetch_limit, threshold));

            match result {
                Ok(found) => {
                    tracing::debug!("{} returned {} candidates", kind, found.len());
                    candidates.per_model.insert(kind, found);
                }
                Err(e) => {
                    tracing::warn!("Model {} failed during fusion, treating as empty: {}", kind, e);
                    candidates.failed.push(kind);
                }
            }
        }

        if candidates.succeeded() == 0 {
            return Err(AyatError::NoModelAvailable);
        }
        Ok(candidates)
    }

    pub fn fuse_candidates(
        &self,
        candidates: &ModelCandidates,
        query_token_count: usize,
        config: &FusionConfig,
    ) -> Result<Vec<FusedResult>> {
        let merged = merge(candidates, config);

        let scored: Vec<(MergedEntry, f32, usize)> = match config.method {
            FusionMethod::Weighted | FusionMethod::Voting => merged
                .into_iter()
                .filter_map(|entry| {
                    let (score, contributors) = weighted_score(&entry, config)?;
                    Some((entry, score, contributors))
                })
                .collect(),
            FusionMethod::Meta => {
                let ranker = self.meta_ranker.as_ref().ok_or(AyatError::ModelNotTrained)?;
                let mut scored = Vec::with_capacity(merged.len());
                for entry in merged {
                    let contributors = entry.returned_by.len();
                    let score = |kind: ModelKind| entry.scores.get(&kind).copied().unwrap_or(0.0) as f64;
                    let prediction = ranker.predict_relevance(
                        score(ModelKind::Word2Vec),
                        score(ModelKind::FastText),
                        score(ModelKind::Glove),
                        query_token_count,
                        self.corpus.token_count(entry.document_id),
                    )?;
                    scored.push((entry, prediction.relevance_score as f32, contributors));
                }
                scored
            }
        };

        let threshold = match config.threshold {
            Some(t) => t,
            None => {
                let scores: Vec<f32> = scored.iter().map(|(_, s, _)| *s).collect();
                let t = estimate(&scores, ADAPTIVE_FALLBACK_THRESHOLD);
                tracing::debug!("Adaptive threshold {:.4} over {} fused scores", t, scores.len());
                t
            }
        };

        let mut fused: Vec<FusedResult> = scored
            .into_iter()
            .filter(|(_, score, _)| *score >= threshold)
            .map(|(entry, fused_score, contributing_model_count)| FusedResult {
                document_id: entry.document_id,
                reference: entry.reference,
                fused_score,
                individual_scores: entry.scores,
                contributing_model_count,
            })
            .collect();

        // 稳定排序，同分保持首次出现的顺序
        fused.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(limit) = config.limit {
            fused.truncate(limit);
        }

        tracing::debug!(
            "{} fusion kept {} results at threshold {:.4}",
            config.method,
            fused.len(),
            threshold
        );
        Ok(fused)
    }
}

/// 按模型顺序、排名顺序合并；每个参与模型都有分数，未返回该文档的模型记 0.0
fn merge(candidates: &ModelCandidates, config: &FusionConfig) -> Vec<MergedEntry> {
    let mut entries: Vec<MergedEntry> = Vec::new();
    let mut index: HashMap<usize, usize> = HashMap::new();

    for kind in config.models() {
        let Some(found) = candidates.per_model.get(&kind) else {
            continue;
        };
        for candidate in found {
            let slot = *index.entry(candidate.document_id).or_insert_with(|| {
                entries.push(MergedEntry {
                    document_id: candidate.document_id,
                    reference: candidate.reference,
                    scores: config.models().map(|k| (k, 0.0)).collect(),
                    returned_by: Vec::new(),
                });
                entries.len() - 1
            });
            let entry = &mut entries[slot];
            entry.scores.insert(kind, candidate.score);
            if !entry.returned_by.contains(&kind) {
                entry.returned_by.push(kind);
            }
        }
    }

    entries
}

/// 加权平均 + 投票加分；没有有效贡献模型时返回 `None`
fn weighted_score(entry: &MergedEntry, config: &FusionConfig) -> Option<(f32, usize)> {
    let mut weighted_sum = 0.0f32;
    let mut weight_sum = 0.0f32;
    let mut contributors = 0usize;
    let mut nonzero = 0usize;

    for kind in &entry.returned_by {
        let weight = config.weight(*kind);
        if weight <= 0.0 {
            continue;
        }
        let score = entry.scores.get(kind).copied().unwrap_or(0.0);
        weighted_sum += weight * score;
        weight_sum += weight;
        contributors += 1;
        if score != 0.0 {
            nonzero += 1;
        }
    }

    if contributors == 0 {
        return None;
    }

    let mut score = weighted_sum / weight_sum;
    if nonzero >= 2 {
        score += config.voting_bonus;
    }
    Some((score, contributors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_ranker::TrainingSample;
    use ayat_core::VerseRecord;
    use ayat_vector::{EmbeddingProvider, MemoryStore, StoreStats, WordVectors};

    fn corpus(n: u32) -> Arc<Corpus> {
        Arc::new(
            Corpus::from_records((1..=n).map(|verse| VerseRecord {
                surah: 2,
                verse,
                text: format!("verse number {}", verse),
            }))
            .unwrap(),
        )
    }

    fn candidate(kind: ModelKind, verse: u32, score: f32) -> CandidateResult {
        CandidateResult {
            document_id: verse as usize - 1,
            reference: DocRef::new(2, verse).unwrap(),
            score,
            source_model: kind,
        }
    }

    fn engine() -> FusionEngine {
        FusionEngine::new(Arc::new(ModelRegistry::new()), corpus(10))
    }

    fn refs(results: &[FusedResult]) -> Vec<String> {
        results.iter().map(|r| r.reference.to_string()).collect()
    }

    fn two_model_config() -> FusionConfig {
        FusionConfig::default()
            .with_models(&[ModelKind::Word2Vec, ModelKind::FastText])
            .with_threshold(Some(0.0))
    }

    /// A 被两个模型以 0.6 返回，B 只被一个模型以 0.65 返回
    fn bonus_candidates() -> ModelCandidates {
        ModelCandidates::new()
            .with(
                ModelKind::Word2Vec,
                vec![candidate(ModelKind::Word2Vec, 1, 0.6), candidate(ModelKind::Word2Vec, 2, 0.65)],
            )
            .with(ModelKind::FastText, vec![candidate(ModelKind::FastText, 1, 0.6)])
    }

    #[test]
    fn test_weighted_without_bonus_prefers_single_higher_score() {
        let config = two_model_config().with_voting_bonus(0.0);
        let fused = engine().fuse_candidates(&bonus_candidates(), 2, &config).unwrap();
        assert_eq!(refs(&fused), vec!["2:2", "2:1"]);
        assert!((fused[0].fused_score - 0.65).abs() < 1e-6);
        assert!((fused[1].fused_score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_voting_bonus_flips_ranking() {
        let config = two_model_config().with_voting_bonus(0.1);
        let fused = engine().fuse_candidates(&bonus_candidates(), 2, &config).unwrap();
        assert_eq!(refs(&fused), vec!["2:1", "2:2"]);
        assert!((fused[0].fused_score - 0.7).abs() < 1e-6);
        assert_eq!(fused[0].contributing_model_count, 2);
        assert_eq!(fused[1].contributing_model_count, 1);
    }

    #[test]
    fn test_weighted_average_uses_contributing_weights_only() {
        let config = FusionConfig::default()
            .with_models(&[ModelKind::Word2Vec, ModelKind::FastText, ModelKind::Glove])
            .with_model(ModelKind::Word2Vec, 3.0, None)
            .with_model(ModelKind::FastText, 1.0, None)
            .with_voting_bonus(0.0)
            .with_threshold(Some(0.0));
        let candidates = ModelCandidates::new()
            .with(ModelKind::Word2Vec, vec![candidate(ModelKind::Word2Vec, 3, 0.8)])
            .with(ModelKind::FastText, vec![candidate(ModelKind::FastText, 3, 0.4)])
            .with(ModelKind::Glove, vec![]);

        let fused = engine().fuse_candidates(&candidates, 1, &config).unwrap();
        // (3 * 0.8 + 1 * 0.4) / 4，GloVe 没有返回，不计入分母
        assert!((fused[0].fused_score - 0.7).abs() < 1e-6);
        assert_eq!(fused[0].score_for(ModelKind::Glove), 0.0);
        assert_eq!(fused[0].individual_scores.len(), 3);
    }

    #[test]
    fn test_zero_score_does_not_earn_bonus() {
        let config = two_model_config().with_voting_bonus(0.5);
        let candidates = ModelCandidates::new()
            .with(ModelKind::Word2Vec, vec![candidate(ModelKind::Word2Vec, 1, 0.4)])
            .with(ModelKind::FastText, vec![candidate(ModelKind::FastText, 1, 0.0)]);
        let fused = engine().fuse_candidates(&candidates, 1, &config).unwrap();
        assert!((fused[0].fused_score - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_limit_and_ordering() {
        let config = two_model_config()
            .with_voting_bonus(0.0)
            .with_threshold(Some(0.3))
            .with_limit(Some(2));
        let candidates = ModelCandidates::new().with(
            ModelKind::Word2Vec,
            vec![
                candidate(ModelKind::Word2Vec, 1, 0.2),
                candidate(ModelKind::Word2Vec, 2, 0.9),
                candidate(ModelKind::Word2Vec, 3, 0.5),
                candidate(ModelKind::Word2Vec, 4, 0.7),
            ],
        );
        let fused = engine().fuse_candidates(&candidates, 1, &config).unwrap();
        assert_eq!(refs(&fused), vec!["2:2", "2:4"]);

        let unbounded = config.clone().with_limit(None);
        let fused = engine().fuse_candidates(&candidates, 1, &unbounded).unwrap();
        assert_eq!(refs(&fused), vec!["2:2", "2:4", "2:3"]);
        assert!(fused.iter().all(|r| r.fused_score >= 0.3));
        assert!(fused.windows(2).all(|w| w[0].fused_score >= w[1].fused_score));
    }

    #[test]
    fn test_fewer_qualifying_than_limit_returns_all() {
        let config = two_model_config().with_threshold(Some(0.1)).with_limit(Some(10));
        let fused = engine().fuse_candidates(&bonus_candidates(), 2, &config).unwrap();
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_adaptive_threshold_applies_75th_percentile() {
        let config = FusionConfig::default()
            .with_models(&[ModelKind::Word2Vec])
            .with_threshold(None)
            .with_limit(None);
        let candidates = ModelCandidates::new().with(
            ModelKind::Word2Vec,
            vec![
                candidate(ModelKind::Word2Vec, 1, 0.1),
                candidate(ModelKind::Word2Vec, 2, 0.2),
                candidate(ModelKind::Word2Vec, 3, 0.3),
                candidate(ModelKind::Word2Vec, 4, 0.4),
                candidate(ModelKind::Word2Vec, 5, 0.5),
            ],
        );
        // 第 75 百分位 = 0.4
        let fused = engine().fuse_candidates(&candidates, 1, &config).unwrap();
        assert_eq!(refs(&fused), vec!["2:5", "2:4"]);
    }

    #[test]
    fn test_adaptive_threshold_all_zero_uses_fallback() {
        let config = FusionConfig::default()
            .with_models(&[ModelKind::Word2Vec])
            .with_threshold(None);
        let candidates = ModelCandidates::new().with(
            ModelKind::Word2Vec,
            vec![candidate(ModelKind::Word2Vec, 1, 0.0), candidate(ModelKind::Word2Vec, 2, 0.0)],
        );
        let fused = engine().fuse_candidates(&candidates, 1, &config).unwrap();
        assert!(fused.is_empty());
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let config = two_model_config().with_voting_bonus(0.0);
        let candidates = ModelCandidates::new()
            .with(ModelKind::Word2Vec, vec![candidate(ModelKind::Word2Vec, 5, 0.5)])
            .with(ModelKind::FastText, vec![candidate(ModelKind::FastText, 2, 0.5)]);
        let fused = engine().fuse_candidates(&candidates, 1, &config).unwrap();
        assert_eq!(refs(&fused), vec!["2:5", "2:2"]);
    }

    #[test]
    fn test_meta_requires_trained_ranker() {
        let config = two_model_config().with_method(FusionMethod::Meta);
        assert!(matches!(
            engine().fuse_candidates(&bonus_candidates(), 2, &config),
            Err(AyatError::ModelNotTrained)
        ));

        let engine = engine().with_meta_ranker(Arc::new(MetaRanker::new()));
        assert!(matches!(
            engine.fuse_candidates(&bonus_candidates(), 2, &config),
            Err(AyatError::ModelNotTrained)
        ));
    }

    #[test]
    fn test_meta_uses_relevance_score_without_bonus() {
        let samples: Vec<TrainingSample> = (0..40)
            .map(|i| {
                let relevant = i % 2 == 0;
                let s = if relevant { 0.8 } else { 0.1 } + (i % 5) as f64 * 0.01;
                TrainingSample {
                    w2v: s,
                    ft: s,
                    glove: s,
                    query_token_count: 2,
                    candidate_length: 3,
                    is_relevant: relevant,
                }
            })
            .collect();
        let mut ranker = MetaRanker::new();
        ranker.train(&samples).unwrap();
        let ranker = Arc::new(ranker);

        let config = two_model_config()
            .with_method(FusionMethod::Meta)
            .with_voting_bonus(0.3);
        let engine = engine().with_meta_ranker(ranker.clone());
        let fused = engine.fuse_candidates(&bonus_candidates(), 2, &config).unwrap();

        assert_eq!(fused.len(), 2);
        for result in &fused {
            let expected = ranker
                .predict_relevance(
                    result.score_for(ModelKind::Word2Vec) as f64,
                    result.score_for(ModelKind::FastText) as f64,
                    0.0,
                    2,
                    3,
                )
                .unwrap()
                .relevance_score as f32;
            assert_eq!(result.fused_score, expected);
        }
    }

    struct FailingProvider(ModelKind);

    impl EmbeddingProvider for FailingProvider {
        fn kind(&self) -> ModelKind {
            self.0
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn search(&self, _: &[String], _: usize, _: Option<f32>) -> Result<Vec<CandidateResult>> {
            Err(AyatError::ModelNotLoaded(self.0.to_string()))
        }
        fn document_vector(&self, _: usize) -> Option<&[f32]> {
            None
        }
        fn stats(&self) -> StoreStats {
            StoreStats {
                vocabulary_size: 0,
                dimensions: 2,
                total_documents: 0,
                indexed_documents: 0,
            }
        }
    }

    fn live_engine(failing: &[ModelKind]) -> FusionEngine {
        let corpus = Arc::new(
            Corpus::from_records(
                [("mercy light", 1), ("light", 2), ("mercy", 3), ("guidance", 4)]
                    .into_iter()
                    .map(|(text, verse)| VerseRecord {
                        surah: 1,
                        verse,
                        text: text.to_string(),
                    }),
            )
            .unwrap(),
        );
        let mut registry = ModelRegistry::new();
        for kind in ModelKind::ALL {
            if failing.contains(&kind) {
                registry.register_ready(Arc::new(FailingProvider(kind)));
            } else {
                let mut words = WordVectors::new(2);
                words.insert("mercy", vec![1.0, 0.0]).unwrap();
                words.insert("light", vec![0.0, 1.0]).unwrap();
                words.insert("guidance", vec![0.6, 0.8]).unwrap();
                registry.register_ready(Arc::new(MemoryStore::build(kind, words, corpus.clone())));
            }
        }
        FusionEngine::new(Arc::new(registry), corpus)
    }

    #[test]
    fn test_fuse_end_to_end() {
        let engine = live_engine(&[]);
        let config = FusionConfig::default().with_threshold(Some(0.5)).with_voting_bonus(0.1);
        let fused = engine.fuse("Mercy", &config).unwrap();

        assert_eq!(fused[0].reference.to_string(), "1:3");
        assert!((fused[0].fused_score - 1.1).abs() < 1e-5);
        assert_eq!(fused[0].contributing_model_count, 3);
        assert!(fused.iter().all(|r| r.fused_score >= 0.5));
    }

    #[test]
    fn test_failed_model_is_absorbed() {
        let engine = live_engine(&[ModelKind::FastText]);
        let config = FusionConfig::default().with_threshold(Some(0.0));
        let fused = engine.fuse("mercy", &config).unwrap();

        assert!(!fused.is_empty());
        assert!(fused.iter().all(|r| r.score_for(ModelKind::FastText) == 0.0));
        assert!(fused.iter().all(|r| r.individual_scores.contains_key(&ModelKind::FastText)));
    }

    #[test]
    fn test_all_models_failing() {
        let engine = live_engine(&ModelKind::ALL);
        let result = engine.fuse("mercy", &FusionConfig::default());
        assert!(matches!(result, Err(AyatError::NoModelAvailable)));

        // 未注册的模型同样视为失败
        let engine = FusionEngine::new(Arc::new(ModelRegistry::new()), corpus(1));
        assert!(matches!(
            engine.fuse("mercy", &FusionConfig::default()),
            Err(AyatError::NoModelAvailable)
        ));
    }

    #[test]
    fn test_unknown_query_tokens_give_empty_result() {
        let engine = live_engine(&[]);
        let fused = engine.fuse("zzz", &FusionConfig::default()).unwrap();
        assert!(fused.is_empty());
    }

    #[test]
    fn test_invalid_config_raises_immediately() {
        let engine = live_engine(&[]);
        let config = FusionConfig::default().with_limit(Some(0));
        assert!(matches!(
            engine.fuse("mercy", &config),
            Err(AyatError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_voting_forces_model_threshold() {
        let config = FusionConfig::new(FusionMethod::Voting)
            .with_model(ModelKind::Glove, 1.0, Some(0.9));
        assert_eq!(effective_model_threshold(&config, ModelKind::Glove), Some(0.5));
        assert_eq!(effective_model_threshold(&config, ModelKind::Word2Vec), Some(0.5));

        let weighted = config.clone().with_method(FusionMethod::Weighted);
        assert_eq!(effective_model_threshold(&weighted, ModelKind::Glove), Some(0.9));
        assert_eq!(effective_model_threshold(&weighted, ModelKind::Word2Vec), None);
    }

    #[test]
    fn test_voting_filters_candidates_below_half() {
        let engine = live_engine(&[]);
        // "light" 与 1:3 ("mercy") 的相似度为 0，与 1:4 ("guidance") 为 0.8
        let config = FusionConfig::new(FusionMethod::Voting)
            .with_threshold(Some(0.0))
            .with_voting_bonus(0.0);
        let fused = engine.fuse("light", &config).unwrap();
        assert!(fused.iter().all(|r| r.reference.to_string() != "1:3"));
        assert_eq!(fused[0].reference.to_string(), "1:2");
    }
}
