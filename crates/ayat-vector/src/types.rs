//! 词向量类型定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ayat_core::{AyatError, Result, tokenize};

/// 预训练词向量表
#[derive(Debug, Clone, Default)]
pub struct WordVectors {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectors {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
        }
    }

    /// 插入一个词向量，词条按分词规则归一化；重复词保留先出现的
    pub fn insert(&mut self, word: &str, vector: Vec<f32>) -> Result<bool> {
        if vector.len() != self.dimensions {
            return Err(AyatError::Parse(format!(
                "vector for {:?} has {} dimensions, expected {}",
                word,
                vector.len(),
                self.dimensions
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(AyatError::Parse(format!("vector for {:?} is not finite", word)));
        }
        let mut tokens = tokenize(word);
        if tokens.len() != 1 {
            return Ok(false);
        }
        let key = tokens.remove(0);
        if self.vectors.contains_key(&key) {
            return Ok(false);
        }
        self.vectors.insert(key, vector);
        Ok(true)
    }

    /// 解析 word2vec 文本格式或 GloVe 格式，首行 `<count> <dim>` 可选
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut table: Option<WordVectors> = None;
        let mut skipped = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else {
                continue;
            };
            let rest: Vec<&str> = parts.collect();

            if line_no == 0 && rest.len() == 1 {
                if let (Ok(_), Ok(dim)) = (word.parse::<usize>(), rest[0].parse::<usize>()) {
                    table = Some(WordVectors::new(dim));
                    continue;
                }
            }

            let vector = rest
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| AyatError::Parse(format!("line {}: {}", line_no + 1, e)))?;

            let table = table.get_or_insert_with(|| WordVectors::new(vector.len()));
            if !table
                .insert(word, vector)
                .map_err(|e| AyatError::Parse(format!("line {}: {}", line_no + 1, e)))?
            {
                skipped += 1;
            }
        }

        let table = table.unwrap_or_default();
        if table.dimensions == 0 {
            return Err(AyatError::Parse("word vector file declares zero dimensions".to_string()));
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} duplicate or non-token word vector entries", skipped);
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        tracing::info!(
            "Loaded {} word vectors ({} dims) from {}",
            table.len(),
            table.dimensions,
            path.display()
        );
        Ok(table)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(|v| v.as_slice())
    }

    /// 已知词向量的均值并做 L2 归一化，没有已知词时返回 `None`
    pub fn mean_normalized<'a>(&self, tokens: impl IntoIterator<Item = &'a str>) -> Option<Vec<f32>> {
        let mut sum = vec![0.0f32; self.dimensions];
        let mut known = 0usize;
        for token in tokens {
            if let Some(v) = self.get(token) {
                for (acc, x) in sum.iter_mut().zip(v) {
                    *acc += x;
                }
                known += 1;
            }
        }
        if known == 0 {
            return None;
        }
        for x in sum.iter_mut() {
            *x /= known as f32;
        }
        l2_normalize(sum)
    }
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// 零向量无法归一化，返回 `None`
pub fn l2_normalize(mut v: Vec<f32>) -> Option<Vec<f32>> {
    let norm = magnitude(&v);
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Some(v)
}

/// 存储统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub vocabulary_size: usize,
    pub dimensions: usize,
    pub total_documents: usize,
    pub indexed_documents: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_with_header() {
        let data = "2 3\nmercy 1 0 0\nlight 0 1 0\n";
        let table = WordVectors::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(table.dimensions(), 3);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("light"), Some(&[0.0, 1.0, 0.0][..]));
    }

    #[test]
    fn test_parse_glove_without_header() {
        let data = "Mercy 0.5 0.5\nlight -0.5 0.5\n";
        let table = WordVectors::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(table.dimensions(), 2);
        assert!(table.get("mercy").is_some());
    }

    #[test]
    fn test_parse_rejects_dimension_mismatch() {
        let data = "a 1 2 3\nb 1 2\n";
        assert!(WordVectors::from_reader(Cursor::new(data)).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        let data = "a 1 x\n";
        let err = WordVectors::from_reader(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_duplicate_words_keep_first() {
        let data = "light 1 0\nLight 0 1\n";
        let table = WordVectors::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("light"), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_mean_normalized() {
        let mut table = WordVectors::new(2);
        table.insert("a", vec![2.0, 0.0]).unwrap();
        table.insert("b", vec![0.0, 2.0]).unwrap();

        let v = table.mean_normalized(["a", "b", "unknown"]).unwrap();
        let expected = 1.0 / 2.0f32.sqrt();
        assert!((v[0] - expected).abs() < 1e-6);
        assert!((v[1] - expected).abs() < 1e-6);

        assert!(table.mean_normalized(["unknown"]).is_none());
    }

    #[test]
    fn test_mean_of_opposite_vectors_is_none() {
        let mut table = WordVectors::new(2);
        table.insert("up", vec![0.0, 1.0]).unwrap();
        table.insert("down", vec![0.0, -1.0]).unwrap();
        assert!(table.mean_normalized(["up", "down"]).is_none());
    }
}
