use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// 向量长度对齐方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMode {
    /// 截断到两者中较短的长度
    #[default]
    Truncate,
    /// 截断或补零到固定长度，仅用于旧版比较方式
    TruncateOrPad(usize),
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn magnitude(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// 计算余弦相似度，范围为 [-1, 1]
///
/// 任意一个向量的模不大于 0 时方向无定义，直接返回 0
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let (ma2, mb2) = (dot(a, a), dot(b, b));
    if ma2 <= 0.0 || mb2 <= 0.0 {
        return 0.0;
    }
    // NOTE: 先相乘再开方，保证 a == b 时结果严格等于 1
    (dot(a, b) / (ma2 * mb2).sqrt()).clamp(-1.0, 1.0)
}

/// 将余弦相似度从 [-1, 1] 映射到 [0, 1]
#[inline]
pub fn to_unit_interval(cos: f64) -> f64 {
    (cos + 1.0) / 2.0
}

/// 对齐两个向量的长度
///
/// 无需复制时直接返回原切片
pub fn reconcile_lengths<'a>(
    a: &'a [f64],
    b: &'a [f64],
    mode: LengthMode,
) -> (Cow<'a, [f64]>, Cow<'a, [f64]>) {
    match mode {
        LengthMode::Truncate => {
            let n = a.len().min(b.len());
            (Cow::Borrowed(&a[..n]), Cow::Borrowed(&b[..n]))
        }
        LengthMode::TruncateOrPad(n) => (fit_to(a, n), fit_to(b, n)),
    }
}

fn fit_to(v: &[f64], n: usize) -> Cow<'_, [f64]> {
    if v.len() >= n {
        Cow::Borrowed(&v[..n])
    } else {
        let mut padded = Vec::with_capacity(n);
        padded.extend_from_slice(v);
        padded.resize(n, 0.0);
        Cow::Owned(padded)
    }
}

/// 先对齐长度，再计算余弦相似度
pub fn reconciled_cosine(a: &[f64], b: &[f64], mode: LengthMode) -> f64 {
    let (a, b) = reconcile_lengths(a, b, mode);
    cosine_similarity(&a, &b)
}

/// 先对齐长度，再将余弦相似度映射到 [0, 1]
///
/// 任意一个向量的模不大于 0 时没有相似度可言，返回 0 而不是映射后的 0.5
pub fn unit_similarity(a: &[f64], b: &[f64], mode: LengthMode) -> f64 {
    let (a, b) = reconcile_lengths(a, b, mode);
    if magnitude(&a) <= 0.0 || magnitude(&b) <= 0.0 {
        return 0.0;
    }
    to_unit_interval(cosine_similarity(&a, &b))
}
