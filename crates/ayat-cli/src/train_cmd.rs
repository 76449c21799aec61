//! 元排序器训练与诊断命令

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use ayat_core::AyatConfig;
use ayat_fusion::{JsonArtifactStore, MetaRanker, TrainingSample};

use crate::app::print_json;

pub fn train(config: &AyatConfig, samples: &Path, output: Option<&Path>) -> Result<()> {
    let content = fs::read_to_string(samples)
        .with_context(|| format!("failed to read {}", samples.display()))?;
    let samples: Vec<TrainingSample> = serde_json::from_str(&content)?;

    let mut ranker = MetaRanker::new();
    let summary = ranker.train(&samples)?;

    let output = output.unwrap_or(config.meta_ranker_path.as_path());
    ranker.save(&JsonArtifactStore, output)?;
    print_json(&summary)
}

pub fn importance(config: &AyatConfig, model: Option<&Path>) -> Result<()> {
    let path = model.unwrap_or(config.meta_ranker_path.as_path());
    let ranker = MetaRanker::load(&JsonArtifactStore, path)?;
    print_json(&ranker.feature_importance()?)
}
