//! Ayat Eval - 检索质量评估
//!
//! 将各检索方法的结果与人工标注的真值比较，计算精确率、召回率和 F1：
//! - 每个方法依次执行，单个方法失败记录为错误项，不中断整批评估
//! - 同一次运行内按 (查询文本, 方法, limit, 阈值) 缓存检索结果
//! - 集成对比模式一次运行三种融合策略并给出最优配置

pub mod cache;
pub mod harness;
pub mod metrics;
pub mod ports;
pub mod training;

pub use cache::*;
pub use harness::*;
pub use metrics::*;
pub use ports::*;
pub use training::*;
