//! 内存向量存储

use std::sync::Arc;

use ayat_core::{CandidateResult, Corpus, ModelKind, Result};

use crate::EmbeddingProvider;
use crate::types::{StoreStats, WordVectors, dot_product};

/// 内存向量存储
///
/// 文档向量在构建时计算一次，之后只读。所有向量都已 L2 归一化，
/// 余弦相似度即点积。
pub struct MemoryStore {
    kind: ModelKind,
    words: WordVectors,
    corpus: Arc<Corpus>,
    doc_vectors: Vec<Option<Vec<f32>>>,
}

impl MemoryStore {
    pub fn build(kind: ModelKind, words: WordVectors, corpus: Arc<Corpus>) -> Self {
        let doc_vectors: Vec<Option<Vec<f32>>> = corpus
            .documents()
            .iter()
            .map(|doc| words.mean_normalized(doc.tokens.iter().map(|t| t.as_str())))
            .collect();

        let indexed = doc_vectors.iter().filter(|v| v.is_some()).count();
        tracing::info!(
            "Built {} store: {}/{} documents have vectors",
            kind,
            indexed,
            corpus.len()
        );

        Self {
            kind,
            words,
            corpus,
            doc_vectors,
        }
    }

    pub fn query_vector(&self, query_tokens: &[String]) -> Option<Vec<f32>> {
        self.words
            .mean_normalized(query_tokens.iter().map(|t| t.as_str()))
    }
}

impl EmbeddingProvider for MemoryStore {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn dimensions(&self) -> usize {
        self.words.dimensions()
    }

    fn search(
        &self,
        query_tokens: &[String],
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<CandidateResult>> {
        let Some(query) = self.query_vector(query_tokens) else {
            tracing::debug!("{}: no known query tokens", self.kind);
            return Ok(Vec::new());
        };

        let mut results: Vec<CandidateResult> = self
            .doc_vectors
            .iter()
            .enumerate()
            .filter_map(|(id, vector)| {
                let vector = vector.as_ref()?;
                let doc = self.corpus.get(id)?;
                Some(CandidateResult {
                    document_id: id,
                    reference: doc.reference,
                    score: dot_product(&query, vector),
                    source_model: self.kind,
                })
            })
            .filter(|c| threshold.is_none_or(|t| c.score >= t))
            .collect();

        // 稳定排序，同分保持加载顺序
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }

    fn document_vector(&self, document_id: usize) -> Option<&[f32]> {
        self.doc_vectors
            .get(document_id)
            .and_then(|v| v.as_deref())
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            vocabulary_size: self.words.len(),
            dimensions: self.words.dimensions(),
            total_documents: self.corpus.len(),
            indexed_documents: self.doc_vectors.iter().filter(|v| v.is_some()).count(),
        }
    }
}
