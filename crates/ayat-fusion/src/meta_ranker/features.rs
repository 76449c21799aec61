//! 元排序器特征
//!
//! 特征向量固定 12 维，顺序不可变：保存的模型系数按此顺序对应。

pub const FEATURE_COUNT: usize = 12;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "w2v_score",
    "ft_score",
    "glove_score",
    "query_token_count",
    "candidate_length",
    "w2v_x_ft",
    "w2v_x_glove",
    "ft_x_glove",
    "mean_score",
    "std_score",
    "max_score",
    "min_score",
];

pub type FeatureVector = [f64; FEATURE_COUNT];

pub fn build_features(
    w2v: f64,
    ft: f64,
    glove: f64,
    query_token_count: usize,
    candidate_length: usize,
) -> FeatureVector {
    let scores = [w2v, ft, glove];
    let mean = scores.iter().sum::<f64>() / 3.0;
    // 总体标准差
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / 3.0;
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);

    [
        w2v,
        ft,
        glove,
        query_token_count as f64,
        candidate_length as f64,
        w2v * ft,
        w2v * glove,
        ft * glove,
        mean,
        variance.sqrt(),
        max,
        min,
    ]
}
