//! Ayat Core - 核心类型和抽象
//!
//! 提供经文检索的基础类型、错误处理、分词、语料加载和配置。

pub mod config;
pub mod corpus;
pub mod error;
pub mod tokenize;
pub mod types;

pub use config::*;
pub use corpus::*;
pub use error::*;
pub use tokenize::*;
pub use types::*;
