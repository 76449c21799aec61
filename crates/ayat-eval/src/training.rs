//! 元排序器训练样本收集

use std::collections::{BTreeSet, HashMap};

use ayat_core::{DocRef, FusionConfig, FusionMethod, ModelKind, Result, tokenize};
use ayat_fusion::{FusionEngine, TrainingSample};

/// 对一个查询运行各模型，候选取并集，每个候选生成一条样本。
/// 未返回该候选的模型分数记 0。
pub fn collect_training_samples(
    engine: &FusionEngine,
    query_text: &str,
    ground_truth: &BTreeSet<DocRef>,
    config: &FusionConfig,
) -> Result<Vec<TrainingSample>> {
    let config = config.clone().with_method(FusionMethod::Weighted);
    config.validate()?;

    let tokens = tokenize(query_text);
    let candidates = engine.collect_candidates(&tokens, &config)?;

    let mut order: Vec<(usize, DocRef)> = Vec::new();
    let mut scores: HashMap<usize, [f64; 3]> = HashMap::new();
    for (kind, found) in &candidates.per_model {
        let slot = match kind {
            ModelKind::Word2Vec => 0,
            ModelKind::FastText => 1,
            ModelKind::Glove => 2,
        };
        for candidate in found {
            let entry = scores.entry(candidate.document_id).or_insert_with(|| {
                order.push((candidate.document_id, candidate.reference));
                [0.0; 3]
            });
            entry[slot] = candidate.score as f64;
        }
    }

    let samples: Vec<TrainingSample> = order
        .into_iter()
        .map(|(id, reference)| {
            let [w2v, ft, glove] = scores.get(&id).copied().unwrap_or([0.0; 3]);
            TrainingSample {
                w2v,
                ft,
                glove,
                query_token_count: tokens.len(),
                candidate_length: engine.corpus().token_count(id),
                is_relevant: ground_truth.contains(&reference),
            }
        })
        .collect();

    tracing::debug!(
        "Collected {} training samples ({} relevant) for {:?}",
        samples.len(),
        samples.iter().filter(|s| s.is_relevant).count(),
        query_text
    );
    Ok(samples)
}
