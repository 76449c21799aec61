//! Ayat Fusion - 多模型融合排序
//!
//! 将多个独立训练的词向量模型的检索结果融合为一个排序列表：
//! - 加权平均 (每模型阈值 + 跨模型投票加分)
//! - 投票 (每模型阈值固定为 0.5)
//! - 元排序器 (逻辑回归相关性分类器)
//!
//! 未给定固定阈值时，按融合分数分布自适应估计阈值。

pub mod engine;
pub mod meta_ranker;
pub mod threshold;

pub use engine::*;
pub use meta_ranker::*;
pub use threshold::*;
