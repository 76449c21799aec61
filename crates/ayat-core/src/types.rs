//! 检索数据模型

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AyatError, Result};

/// 经文引用 `"<surah>:<verse>"`，均为从 1 开始的整数
///
/// 融合结果与真值的交集依赖该格式的精确字符串相等，因此解析时拒绝
/// 空白、前导零和零值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocRef {
    pub surah: u32,
    pub verse: u32,
}

impl DocRef {
    pub fn new(surah: u32, verse: u32) -> Result<Self> {
        if surah == 0 || verse == 0 {
            return Err(AyatError::Parse(format!(
                "document reference must be 1-based, got {}:{}",
                surah, verse
            )));
        }
        Ok(Self { surah, verse })
    }
}

fn parse_component(part: &str, whole: &str) -> Result<u32> {
    let valid = !part.is_empty()
        && part.bytes().all(|b| b.is_ascii_digit())
        && !(part.len() > 1 && part.starts_with('0'));
    if !valid {
        return Err(AyatError::Parse(format!(
            "invalid document reference: {:?}",
            whole
        )));
    }
    part.parse::<u32>()
        .map_err(|e| AyatError::Parse(format!("invalid document reference {:?}: {}", whole, e)))
}

impl FromStr for DocRef {
    type Err = AyatError;

    fn from_str(s: &str) -> Result<Self> {
        let (surah, verse) = s
            .split_once(':')
            .ok_or_else(|| AyatError::Parse(format!("invalid document reference: {:?}", s)))?;
        DocRef::new(parse_component(surah, s)?, parse_component(verse, s)?)
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surah, self.verse)
    }
}

impl TryFrom<String> for DocRef {
    type Error = AyatError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DocRef> for String {
    fn from(value: DocRef) -> Self {
        value.to_string()
    }
}

/// 嵌入模型类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[serde(alias = "w2v")]
    Word2Vec,
    #[serde(alias = "ft")]
    FastText,
    Glove,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Word2Vec, ModelKind::FastText, ModelKind::Glove];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Word2Vec => "word2vec",
            ModelKind::FastText => "fasttext",
            ModelKind::Glove => "glove",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = AyatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "word2vec" | "w2v" => Ok(ModelKind::Word2Vec),
            "fasttext" | "ft" => Ok(ModelKind::FastText),
            "glove" => Ok(ModelKind::Glove),
            other => Err(AyatError::InvalidModelType(other.to_string())),
        }
    }
}

/// 融合策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    #[default]
    Weighted,
    Voting,
    Meta,
}

impl FusionMethod {
    pub const ALL: [FusionMethod; 3] = [FusionMethod::Weighted, FusionMethod::Voting, FusionMethod::Meta];

    pub fn as_str(&self) -> &'static str {
        match self {
            FusionMethod::Weighted => "weighted",
            FusionMethod::Voting => "voting",
            FusionMethod::Meta => "meta",
        }
    }
}

impl fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FusionMethod {
    type Err = AyatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "weighted" => Ok(FusionMethod::Weighted),
            "voting" => Ok(FusionMethod::Voting),
            "meta" => Ok(FusionMethod::Meta),
            other => Err(AyatError::InvalidConfiguration(format!(
                "unknown fusion method: {}",
                other
            ))),
        }
    }
}

/// 经文文档，加载后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// 加载顺序编号，同分时按此排序
    pub id: usize,
    pub reference: DocRef,
    pub text: String,
    pub tokens: Vec<String>,
}

/// 单个模型的候选结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub document_id: usize,
    pub reference: DocRef,
    pub score: f32,
    pub source_model: ModelKind,
}

/// 融合后的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    pub document_id: usize,
    pub reference: DocRef,
    pub fused_score: f32,
    /// 每个参与模型的原始分数，未返回该文档的模型为 0.0
    pub individual_scores: BTreeMap<ModelKind, f32>,
    pub contributing_model_count: usize,
}

impl FusedResult {
    pub fn score_for(&self, kind: ModelKind) -> f32 {
        self.individual_scores.get(&kind).copied().unwrap_or(0.0)
    }
}
