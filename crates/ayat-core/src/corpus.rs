//! 经文语料
//!
//! 语料从 JSON Lines 文件加载，每行一条 `{"surah":2,"verse":255,"text":"..."}`。
//! 文档编号按文件顺序分配，作为检索同分时的确定性排序依据。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{AyatError, Result};
use crate::tokenize::tokenize;
use crate::types::{DocRef, Document};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerseRecord {
    pub surah: u32,
    pub verse: u32,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
    by_ref: HashMap<DocRef, usize>,
}

impl Corpus {
    pub fn from_records(records: impl IntoIterator<Item = VerseRecord>) -> Result<Self> {
        let mut corpus = Corpus::default();
        for record in records {
            let reference = DocRef::new(record.surah, record.verse)?;
            if corpus.by_ref.contains_key(&reference) {
                return Err(AyatError::Parse(format!(
                    "duplicate document reference {}",
                    reference
                )));
            }
            let id = corpus.documents.len();
            let tokens = tokenize(&record.text);
            corpus.by_ref.insert(reference, id);
            corpus.documents.push(Document {
                id,
                reference,
                text: record.text,
                tokens,
            });
        }
        Ok(corpus)
    }

    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: VerseRecord = serde_json::from_str(line).map_err(|e| {
                AyatError::Parse(format!("{}:{}: {}", path.display(), line_no + 1, e))
            })?;
            records.push(record);
        }
        let corpus = Self::from_records(records)?;
        tracing::info!("Loaded {} documents from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn find(&self, reference: &DocRef) -> Option<&Document> {
        self.by_ref.get(reference).and_then(|id| self.documents.get(*id))
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn token_count(&self, id: usize) -> usize {
        self.get(id).map(|d| d.tokens.len()).unwrap_or(0)
    }
}
