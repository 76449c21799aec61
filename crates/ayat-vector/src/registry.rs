//! 嵌入模型注册表
//!
//! 每个模型一个槽位，生命周期为 未初始化 → 加载中 → 就绪 | 失败。
//! 首次 `get` 时通过注册的加载器加载，并发首次访问也只加载一次；
//! 失败状态是终态，之后的访问直接返回 `ModelNotLoaded`。

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ayat_core::{AyatConfig, AyatError, Corpus, ModelKind, Result};

use crate::store::{EmbeddingProvider, MemoryStore};
use crate::types::WordVectors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ModelState {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

/// 模型加载器
pub trait ModelLoader: Send + Sync {
    fn load(&self, kind: ModelKind) -> Result<Arc<dyn EmbeddingProvider>>;
}

impl<F> ModelLoader for F
where
    F: Fn(ModelKind) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync,
{
    fn load(&self, kind: ModelKind) -> Result<Arc<dyn EmbeddingProvider>> {
        self(kind)
    }
}

/// 从词向量文件构建内存存储
pub struct FileModelLoader {
    vectors_path: PathBuf,
    corpus: Arc<Corpus>,
}

impl FileModelLoader {
    pub fn new(vectors_path: impl Into<PathBuf>, corpus: Arc<Corpus>) -> Self {
        Self {
            vectors_path: vectors_path.into(),
            corpus,
        }
    }
}

impl ModelLoader for FileModelLoader {
    fn load(&self, kind: ModelKind) -> Result<Arc<dyn EmbeddingProvider>> {
        let words = WordVectors::load(&self.vectors_path)?;
        Ok(Arc::new(MemoryStore::build(kind, words, self.corpus.clone())))
    }
}

struct ModelSlot {
    loader: Arc<dyn ModelLoader>,
    loading: AtomicBool,
    cell: OnceCell<std::result::Result<Arc<dyn EmbeddingProvider>, String>>,
}

impl ModelSlot {
    fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            loading: AtomicBool::new(false),
            cell: OnceCell::new(),
        }
    }

    fn ready(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            loader: Arc::new(|kind: ModelKind| -> Result<Arc<dyn EmbeddingProvider>> {
                Err(AyatError::ModelNotLoaded(format!("{} was preloaded and has no loader", kind)))
            }),
            loading: AtomicBool::new(false),
            cell: OnceCell::with_value(Ok(provider)),
        }
    }
}

#[derive(Default)]
pub struct ModelRegistry {
    slots: BTreeMap<ModelKind, ModelSlot>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ModelKind, loader: impl ModelLoader + 'static) -> &mut Self {
        self.slots.insert(kind, ModelSlot::new(Arc::new(loader)));
        self
    }

    /// 注册一个已加载好的模型
    pub fn register_ready(&mut self, provider: Arc<dyn EmbeddingProvider>) -> &mut Self {
        self.slots.insert(provider.kind(), ModelSlot::ready(provider));
        self
    }

    pub fn from_config(config: &AyatConfig, corpus: Arc<Corpus>) -> Self {
        let mut registry = Self::new();
        for model in &config.models {
            registry.register(
                model.kind,
                FileModelLoader::new(model.vectors_path.clone(), corpus.clone()),
            );
        }
        registry
    }

    pub fn kinds(&self) -> Vec<ModelKind> {
        self.slots.keys().copied().collect()
    }

    pub fn state(&self, kind: ModelKind) -> ModelState {
        let Some(slot) = self.slots.get(&kind) else {
            return ModelState::Uninitialized;
        };
        match slot.cell.get() {
            Some(Ok(_)) => ModelState::Ready,
            Some(Err(reason)) => ModelState::Failed(reason.clone()),
            None if slot.loading.load(Ordering::Acquire) => ModelState::Loading,
            None => ModelState::Uninitialized,
        }
    }

    pub fn get(&self, kind: ModelKind) -> Result<Arc<dyn EmbeddingProvider>> {
        let slot = self
            .slots
            .get(&kind)
            .ok_or_else(|| AyatError::ModelNotLoaded(format!("{} is not registered", kind)))?;

        let loaded = slot.cell.get_or_init(|| {
            slot.loading.store(true, Ordering::Release);
            tracing::info!("Loading {} model", kind);
            let result = slot.loader.load(kind).map_err(|e| {
                tracing::warn!("Failed to load {} model: {}", kind, e);
                e.to_string()
            });
            slot.loading.store(false, Ordering::Release);
            result
        });

        match loaded {
            Ok(provider) => Ok(provider.clone()),
            Err(reason) => Err(AyatError::ModelNotLoaded(format!("{}: {}", kind, reason))),
        }
    }

    /// 预加载所有已注册模型，返回就绪的模型数量
    pub fn warm_up(&self) -> usize {
        self.slots
            .keys()
            .filter(|kind| self.get(**kind).is_ok())
            .count()
    }
}
