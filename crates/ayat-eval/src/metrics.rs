//! 信息检索指标

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use ayat_core::DocRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub true_positives: Vec<DocRef>,
    pub false_positives: Vec<DocRef>,
    pub false_negatives: Vec<DocRef>,
}

impl Metrics {
    pub fn tp(&self) -> usize {
        self.true_positives.len()
    }

    pub fn fp(&self) -> usize {
        self.false_positives.len()
    }

    pub fn fn_count(&self) -> usize {
        self.false_negatives.len()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 { num as f64 / den as f64 } else { 0.0 }
}

/// 按集合计算指标，引用列表按 (surah, verse) 排序
pub fn compute_metrics(found: &BTreeSet<DocRef>, ground_truth: &BTreeSet<DocRef>) -> Metrics {
    let true_positives: Vec<DocRef> = found.intersection(ground_truth).copied().collect();
    let false_positives: Vec<DocRef> = found.difference(ground_truth).copied().collect();
    let false_negatives: Vec<DocRef> = ground_truth.difference(found).copied().collect();

    let tp = true_positives.len();
    let fp = false_positives.len();
    let fn_ = false_negatives.len();

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    // 分母保留 1e-8，与历史指标数值保持一致
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall + 1e-8)
    } else {
        0.0
    };

    Metrics {
        precision,
        recall,
        f1,
        accuracy: ratio(tp, tp + fp + fn_),
        true_positives,
        false_positives,
        false_negatives,
    }
}
