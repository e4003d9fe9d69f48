use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::vector::{LengthMode, unit_similarity};

/// 人脸在原图中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRect {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self { left, top, width, height }
    }

    /// 右下角坐标
    pub fn bottom_right(&self) -> (i32, i32) {
        (self.left + self.width, self.top + self.height)
    }
}

/// 单张人脸的特征描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor {
    pub rect: FaceRect,
    pub features: Vec<f64>,
}

impl FaceDescriptor {
    pub fn new(rect: FaceRect, features: Vec<f64>) -> Self {
        Self { rect, features }
    }
}

/// 人脸相似度曲线
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FaceCurve {
    /// 不做额外处理
    #[default]
    Linear,
    /// 分段惩罚：低于 0.95 乘 0.1，低于 0.98 乘 0.3，只有几乎一致的人脸保持高分
    Tiered,
}

impl FaceCurve {
    pub fn apply(self, similarity: f64) -> f64 {
        match self {
            Self::Linear => similarity,
            Self::Tiered if similarity < 0.95 => similarity * 0.1,
            Self::Tiered if similarity < 0.98 => similarity * 0.3,
            Self::Tiered => similarity,
        }
    }
}

/// 人脸匹配结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// 相似度，范围 [0, 1]
    pub score: f64,
    /// 查询图片中的人脸序号
    pub query_face: usize,
    /// 库中图片的人脸序号
    pub stored_face: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FaceMatcher {
    pub curve: FaceCurve,
}

impl FaceMatcher {
    pub fn new(curve: FaceCurve) -> Self {
        Self { curve }
    }

    /// 两张人脸的相似度，范围 [0, 1]，任意一张人脸特征为零向量时为 0
    pub fn pair_similarity(&self, a: &[f64], b: &[f64]) -> f64 {
        self.curve.apply(unit_similarity(a, b, LengthMode::Truncate))
    }

    /// 两组人脸中最相似的一对，任意一组为空时返回 `None`
    ///
    /// 只要有一对人脸相似，就认为两张图片中有同一个人，不考虑其他人脸
    pub fn best_match(&self, query: &[FaceDescriptor], stored: &[FaceDescriptor]) -> Option<FaceMatch> {
        let mut best: Option<FaceMatch> = None;
        for (i, q) in query.iter().enumerate() {
            for (j, s) in stored.iter().enumerate() {
                let score = self.pair_similarity(&q.features, &s.features);
                if best.is_none_or(|b| score > b.score) {
                    best = Some(FaceMatch { score, query_face: i, stored_face: j });
                }
            }
        }
        best
    }

    /// 两组人脸的相似度，任意一组为空时返回 0
    pub fn face_similarity(&self, query: &[FaceDescriptor], stored: &[FaceDescriptor]) -> f64 {
        self.best_match(query, stored).map_or(0.0, |m| m.score)
    }
}
