//! 评估命令

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ayat_core::{AyatConfig, FusionMethod};
use ayat_eval::{EvalMethod, EvaluationHarness, InMemoryGroundTruth, JsonFileResultSink};
use ayat_fusion::TrainingSample;

use crate::FusionOverrides;
use crate::app::{build_engine, fusion_config, print_json};

fn harness(config: &AyatConfig) -> Result<EvaluationHarness> {
    let engine = build_engine(config)?;
    let ground_truth = InMemoryGroundTruth::load_json(&config.ground_truth_path)?;
    let sink = JsonFileResultSink::new(config.results_path.clone());
    Ok(EvaluationHarness::new(
        Arc::new(engine),
        Arc::new(ground_truth),
        Arc::new(sink),
    ))
}

pub fn evaluate(
    config: &AyatConfig,
    query_id: &str,
    query: &str,
    methods: &[String],
    overrides: &FusionOverrides,
) -> Result<()> {
    let methods: Vec<EvalMethod> = if methods.is_empty() {
        EvalMethod::all()
    } else {
        methods
            .iter()
            .map(|m| m.parse::<EvalMethod>())
            .collect::<ayat_core::Result<_>>()?
    };

    let fusion = fusion_config(config, FusionMethod::Weighted, overrides)?;
    let outcomes = harness(config)?.evaluate(query_id, query, &methods, &fusion)?;

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        tracing::warn!("{} of {} methods failed", failed, outcomes.len());
    }
    print_json(&outcomes)
}

pub fn compare(
    config: &AyatConfig,
    query_id: &str,
    query: &str,
    overrides: &FusionOverrides,
) -> Result<()> {
    let fusion = fusion_config(config, FusionMethod::Weighted, overrides)?;
    let report = harness(config)?.compare(query_id, query, &fusion)?;
    print_json(&report)
}

pub fn samples(
    config: &AyatConfig,
    query_id: &str,
    query: &str,
    output: Option<&Path>,
    overrides: &FusionOverrides,
) -> Result<()> {
    let fusion = fusion_config(config, FusionMethod::Weighted, overrides)?;
    let collected = harness(config)?.training_samples(query_id, query, &fusion)?;

    let Some(output) = output else {
        return print_json(&collected);
    };

    let total = append_samples(output, collected)?;
    println!("{} samples in {}", total, output.display());
    Ok(())
}

/// 追加到 JSON 数组文件，返回文件中的样本总数
fn append_samples(path: &Path, samples: Vec<TrainingSample>) -> Result<usize> {
    let mut all: Vec<TrainingSample> = if path.exists() {
        serde_json::from_str(&fs::read_to_string(path)?)?
    } else {
        Vec::new()
    };
    all.extend(samples);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&all)?)?;
    Ok(all.len())
}
