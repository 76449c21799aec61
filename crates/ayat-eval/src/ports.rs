//! 外部协作方接口：真值存储与评估结果持久化

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use ayat_core::{AyatError, DocRef, Result};

/// 真值存储
pub trait GroundTruthStore: Send + Sync {
    /// 未知查询返回空集合
    fn get_relevant_documents(&self, query_id: &str) -> Result<BTreeSet<DocRef>>;
}

/// 评估结果持久化
pub trait ResultSink: Send + Sync {
    fn add_evaluation_result(
        &self,
        query_id: &str,
        method: &str,
        precision: f64,
        recall: f64,
        f1: f64,
        exec_time: f64,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryGroundTruth {
    queries: HashMap<String, BTreeSet<DocRef>>,
}

impl InMemoryGroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, query_id: impl Into<String>, refs: impl IntoIterator<Item = DocRef>) -> &mut Self {
        self.queries
            .entry(query_id.into())
            .or_default()
            .extend(refs);
        self
    }

    /// 文件格式：`{"<query_id>": ["2:255", ...]}`
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let queries: HashMap<String, BTreeSet<DocRef>> = serde_json::from_str(&content)?;
        tracing::info!("Loaded ground truth for {} queries from {}", queries.len(), path.display());
        Ok(Self { queries })
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl GroundTruthStore for InMemoryGroundTruth {
    fn get_relevant_documents(&self, query_id: &str) -> Result<BTreeSet<DocRef>> {
        Ok(self.queries.get(query_id).cloned().unwrap_or_default())
    }
}

/// 持久化的评估记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvaluation {
    pub id: String,
    pub query_id: String,
    pub method: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub exec_time_secs: f64,
    pub recorded_at: DateTime<Utc>,
}

impl StoredEvaluation {
    fn new(query_id: &str, method: &str, precision: f64, recall: f64, f1: f64, exec_time: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query_id: query_id.to_string(),
            method: method.to_string(),
            precision,
            recall,
            f1,
            exec_time_secs: exec_time,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryResultSink {
    records: Mutex<Vec<StoredEvaluation>>,
}

impl InMemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StoredEvaluation> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ResultSink for InMemoryResultSink {
    fn add_evaluation_result(
        &self,
        query_id: &str,
        method: &str,
        precision: f64,
        recall: f64,
        f1: f64,
        exec_time: f64,
    ) -> Result<()> {
        let record = StoredEvaluation::new(query_id, method, precision, recall, f1, exec_time);
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }
}

/// 追加写入 JSON 数组文件
pub struct JsonFileResultSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn load_all(&self) -> Result<Vec<StoredEvaluation>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            AyatError::Parse(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }
}

impl ResultSink for JsonFileResultSink {
    fn add_evaluation_result(
        &self,
        query_id: &str,
        method: &str,
        precision: f64,
        recall: f64,
        f1: f64,
        exec_time: f64,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.load_all()?;
        records.push(StoredEvaluation::new(query_id, method, precision, recall, f1, exec_time));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_ground_truth() {
        let mut gt = InMemoryGroundTruth::new();
        gt.insert("q1", ["2:255".parse().unwrap(), "3:18".parse().unwrap()]);

        assert_eq!(gt.get_relevant_documents("q1").unwrap().len(), 2);
        assert!(gt.get_relevant_documents("missing").unwrap().is_empty());
    }

    #[test]
    fn test_load_ground_truth_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gt.json");
        fs::write(&path, r#"{"q1": ["2:255", "2:256"], "q2": []}"#).unwrap();

        let gt = InMemoryGroundTruth::load_json(&path).unwrap();
        assert_eq!(gt.len(), 2);
        let refs = gt.get_relevant_documents("q1").unwrap();
        assert!(refs.contains(&"2:256".parse().unwrap()));
    }

    #[test]
    fn test_load_ground_truth_rejects_bad_refs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gt.json");
        fs::write(&path, r#"{"q1": ["2 : 255"]}"#).unwrap();
        assert!(InMemoryGroundTruth::load_json(&path).is_err());
    }

    #[test]
    fn test_json_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileResultSink::new(dir.path().join("out").join("results.json"));

        sink.add_evaluation_result("q1", "weighted", 0.5, 0.25, 0.33, 0.01).unwrap();
        sink.add_evaluation_result("q1", "glove", 1.0, 0.5, 0.66, 0.02).unwrap();

        let records = sink.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].method, "weighted");
        assert_eq!(records[1].precision, 1.0);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn test_in_memory_sink() {
        let sink = InMemoryResultSink::new();
        sink.add_evaluation_result("q", "meta", 0.1, 0.2, 0.3, 0.4).unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].exec_time_secs, 0.4);
    }
}
