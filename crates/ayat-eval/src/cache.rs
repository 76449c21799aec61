//! 评估缓存
//!
//! 键为精确的 (查询文本, 方法, limit, 阈值)。只在进程内有效，运行期间不失效，
//! 正确性依赖查询与配置在运行内不变。并发下可能重复计算同一个键，但不会损坏。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ayat_core::{DocRef, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query_text: String,
    pub model: String,
    pub limit: Option<usize>,
    /// 按位比较，避免浮点相等的歧义
    threshold_bits: Option<u32>,
}

impl CacheKey {
    pub fn new(
        query_text: impl Into<String>,
        model: impl Into<String>,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Self {
        Self {
            query_text: query_text.into(),
            model: model.into(),
            limit,
            threshold_bits: threshold.map(f32::to_bits),
        }
    }

    pub fn threshold(&self) -> Option<f32> {
        self.threshold_bits.map(f32::from_bits)
    }
}

#[derive(Debug, Default)]
pub struct EvaluationCache {
    entries: Mutex<HashMap<CacheKey, Arc<Vec<DocRef>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<DocRef>>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    /// 命中时直接返回缓存结果；未命中时计算并缓存，计算失败不缓存
    pub fn get_or_try_insert<F>(&self, key: CacheKey, compute: F) -> Result<Arc<Vec<DocRef>>>
    where
        F: FnOnce() -> Result<Vec<DocRef>>,
    {
        if let Some(found) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Evaluation cache hit for {} / {:?}", key.model, key.query_text);
            return Ok(found);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let found = Arc::new(compute()?);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.entry(key).or_insert(found).clone())
    }

    /// 开始新一轮评估前清空缓存和计数
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
