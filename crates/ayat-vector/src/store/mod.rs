//! 向量检索抽象层实现

mod memory;

use ayat_core::{CandidateResult, ModelKind, Result};

pub use memory::MemoryStore;

use super::types::StoreStats;

/// 单个嵌入模型的检索接口
///
/// `search` 返回按相似度降序排列的候选，同分时按文档加载顺序；
/// 查询中没有已知词时返回空列表而不是错误。`threshold` 为 `None`
/// 时不做任何过滤，自适应阈值由调用方负责。
pub trait EmbeddingProvider: Send + Sync {
    fn kind(&self) -> ModelKind;
    fn dimensions(&self) -> usize;
    fn search(
        &self,
        query_tokens: &[String],
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<CandidateResult>>;
    /// 文档的归一化向量，没有已知词的文档返回 `None`
    fn document_vector(&self, document_id: usize) -> Option<&[f32]>;
    fn stats(&self) -> StoreStats;
}
