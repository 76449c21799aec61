//! 融合检索命令

use anyhow::Result;

use ayat_core::{AyatConfig, FusionMethod};

use crate::FusionOverrides;
use crate::app::{build_engine, fusion_config, print_json};

pub fn run(config: &AyatConfig, query: &str, method: &str, overrides: &FusionOverrides) -> Result<()> {
    let method: FusionMethod = method.parse()?;
    let fusion = fusion_config(config, method, overrides)?;
    let engine = build_engine(config)?;

    let results = engine.fuse(query, &fusion)?;
    tracing::info!("{} fusion returned {} verses", method, results.len());
    print_json(&results)
}
