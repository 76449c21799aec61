//! 命令共用的装配逻辑

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use ayat_core::{AyatConfig, Corpus, FusionConfig, FusionMethod};
use ayat_fusion::{FusionEngine, JsonArtifactStore, MetaRanker};
use ayat_vector::ModelRegistry;

use crate::FusionOverrides;

/// 加载语料、注册模型并预热；元排序器文件存在时一并加载
pub fn build_engine(config: &AyatConfig) -> Result<FusionEngine> {
    let corpus = Corpus::load_jsonl(&config.corpus_path)
        .with_context(|| format!("failed to load corpus {}", config.corpus_path.display()))?;
    let corpus = Arc::new(corpus);

    let registry = ModelRegistry::from_config(config, corpus.clone());
    let ready = registry.warm_up();
    tracing::info!("{}/{} models ready", ready, config.models.len());

    let mut engine = FusionEngine::new(Arc::new(registry), corpus);
    if config.meta_ranker_path.exists() {
        match MetaRanker::load(&JsonArtifactStore, &config.meta_ranker_path) {
            Ok(ranker) => engine = engine.with_meta_ranker(Arc::new(ranker)),
            Err(e) => tracing::warn!("Meta-ranker unavailable: {}", e),
        }
    }
    Ok(engine)
}

pub fn fusion_config(
    config: &AyatConfig,
    method: FusionMethod,
    overrides: &FusionOverrides,
) -> Result<FusionConfig> {
    let mut fusion = config.fusion_config(method)?;

    if overrides.unbounded {
        fusion.limit = None;
    } else if let Some(limit) = overrides.limit {
        fusion.limit = Some(limit);
    }
    if overrides.adaptive {
        fusion.threshold = None;
    } else if let Some(threshold) = overrides.threshold {
        fusion.threshold = Some(threshold);
    }
    if let Some(bonus) = overrides.voting_bonus {
        fusion.voting_bonus = bonus;
    }

    fusion.validate()?;
    Ok(fusion)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayat_core::{AyatError, ModelConfig, ModelKind};
    use clap::Parser;

    fn config() -> AyatConfig {
        let mut config = AyatConfig::default();
        config.models = ModelKind::ALL
            .into_iter()
            .map(|kind| ModelConfig {
                kind,
                vectors_path: format!("vectors/{}.txt", kind).into(),
                weight: 1.0,
                threshold: None,
            })
            .collect();
        config.fusion.limit = Some(10);
        config.fusion.threshold = Some(0.4);
        config.fusion.voting_bonus = 0.1;
        config
    }

    fn invalid_configuration(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<AyatError>(),
            Some(AyatError::InvalidConfiguration(_))
        )
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let fusion = fusion_config(&config(), FusionMethod::Voting, &FusionOverrides::default()).unwrap();
        assert_eq!(fusion.method, FusionMethod::Voting);
        assert_eq!(fusion.limit, Some(10));
        assert_eq!(fusion.threshold, Some(0.4));
        assert_eq!(fusion.voting_bonus, 0.1);
    }

    #[test]
    fn test_unbounded_wins_over_limit() {
        let overrides = FusionOverrides {
            limit: Some(5),
            unbounded: true,
            ..Default::default()
        };
        let fusion = fusion_config(&config(), FusionMethod::Weighted, &overrides).unwrap();
        assert_eq!(fusion.limit, None);

        let overrides = FusionOverrides {
            limit: Some(5),
            ..Default::default()
        };
        let fusion = fusion_config(&config(), FusionMethod::Weighted, &overrides).unwrap();
        assert_eq!(fusion.limit, Some(5));
    }

    #[test]
    fn test_adaptive_clears_configured_threshold() {
        let overrides = FusionOverrides {
            adaptive: true,
            threshold: Some(0.9),
            ..Default::default()
        };
        let fusion = fusion_config(&config(), FusionMethod::Weighted, &overrides).unwrap();
        assert_eq!(fusion.threshold, None);

        let overrides = FusionOverrides {
            threshold: Some(0.9),
            ..Default::default()
        };
        let fusion = fusion_config(&config(), FusionMethod::Weighted, &overrides).unwrap();
        assert_eq!(fusion.threshold, Some(0.9));
    }

    #[test]
    fn test_voting_bonus_override() {
        let overrides = FusionOverrides {
            voting_bonus: Some(0.25),
            ..Default::default()
        };
        let fusion = fusion_config(&config(), FusionMethod::Weighted, &overrides).unwrap();
        assert_eq!(fusion.voting_bonus, 0.25);
    }

    #[test]
    fn test_merged_config_is_revalidated() {
        let zero_limit = FusionOverrides {
            limit: Some(0),
            ..Default::default()
        };
        let err = fusion_config(&config(), FusionMethod::Weighted, &zero_limit).unwrap_err();
        assert!(invalid_configuration(&err));

        let negative_bonus = FusionOverrides {
            voting_bonus: Some(-1.0),
            ..Default::default()
        };
        let err = fusion_config(&config(), FusionMethod::Weighted, &negative_bonus).unwrap_err();
        assert!(invalid_configuration(&err));

        let nan_threshold = FusionOverrides {
            threshold: Some(f32::NAN),
            ..Default::default()
        };
        let err = fusion_config(&config(), FusionMethod::Weighted, &nan_threshold).unwrap_err();
        assert!(invalid_configuration(&err));
    }

    #[test]
    fn test_no_models_configured() {
        let err = fusion_config(&AyatConfig::default(), FusionMethod::Weighted, &FusionOverrides::default())
            .unwrap_err();
        assert!(invalid_configuration(&err));
    }

    #[test]
    fn test_conflicting_flags_rejected_by_parser() {
        assert!(crate::Cli::try_parse_from(["ayat", "fuse", "mercy", "--limit", "5", "--unbounded"]).is_err());
        assert!(crate::Cli::try_parse_from(["ayat", "fuse", "mercy", "--threshold", "0.3", "--adaptive"]).is_err());
        assert!(crate::Cli::try_parse_from(["ayat", "fuse", "mercy", "--adaptive", "--voting-bonus", "0.2"]).is_ok());
    }
}
