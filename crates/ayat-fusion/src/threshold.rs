//! 自适应阈值

/// 自适应阈值使用的百分位
pub const ADAPTIVE_PERCENTILE: f64 = 75.0;

/// 按分数分布估计阈值：取第 75 百分位 (线性插值)。
///
/// 分数为空、百分位为 NaN 或恰好为 0 时返回 `fallback`，避免全零分布放入无关结果。
pub fn estimate(scores: &[f32], fallback: f32) -> f32 {
    match percentile(scores, ADAPTIVE_PERCENTILE) {
        Some(p) if !p.is_nan() && p != 0.0 => p as f32,
        _ => fallback,
    }
}

/// 线性插值百分位，任一分数为 NaN 时结果为 NaN
pub fn percentile(scores: &[f32], q: f64) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Some(f64::NAN);
    }

    let mut sorted: Vec<f64> = scores.iter().map(|s| *s as f64).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let fraction = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * fraction)
}
