//! Ayat Vector - 词向量检索层
//!
//! 每个嵌入模型 (word2vec / fastText / GloVe) 对应一个独立的向量空间：
//! - 词向量加载 (word2vec 文本格式 / GloVe)
//! - 基于余弦相似度的最近邻检索
//! - 模型注册表，首次使用时加载且只加载一次

pub mod registry;
pub mod store;
pub mod types;

pub use registry::*;
pub use store::*;
pub use types::*;
