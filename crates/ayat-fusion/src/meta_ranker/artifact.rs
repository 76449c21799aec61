//! 元排序器模型持久化
//!
//! JSON 序列化保留每个 `f64` 的全部位，保存后再加载得到完全相同的预测。

use std::fs;
use std::path::Path;

use ayat_core::{AyatError, Result};

use super::MetaRankerModel;

pub trait ArtifactStore: Send + Sync {
    fn save(&self, model: &MetaRankerModel, path: &Path) -> Result<()>;
    fn load(&self, path: &Path) -> Result<MetaRankerModel>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArtifactStore;

impl ArtifactStore for JsonArtifactStore {
    fn save(&self, model: &MetaRankerModel, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(model)?;
        fs::write(path, json)?;
        tracing::info!("Saved meta-ranker to {}", path.display());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<MetaRankerModel> {
        let content = fs::read_to_string(path)?;
        let model: MetaRankerModel = serde_json::from_str(&content)?;
        if !model.is_valid() {
            return Err(AyatError::Parse(format!(
                "meta-ranker artifact {} has an unexpected shape",
                path.display()
            )));
        }
        tracing::info!("Loaded meta-ranker from {}", path.display());
        Ok(model)
    }
}
