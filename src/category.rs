//! 基于特征向量分段统计的粗分类
//!
//! 这是手工调出来的启发式规则，不是训练出来的分类器。
//! 分段位置是和特征提取器之间的固定约定，不能随意改动：
//!
//! | 分段 | 范围 |
//! |---|---|
//! | 主色 | `[0, 30)` |
//! | 颜色特征 | `[30, 50)` |
//! | 纹理 | `[50, 75)` |
//! | 形状 | `[75, 90)` |
//! | 光照 | `[90, 100)` |
//! | 边缘 | `[100, 120)` |
//! | 空间分布 | `[120, 160)` |

use std::fmt;
use std::ops::Range;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DOMINANT_COLORS: Range<usize> = 0..30;
pub const COLOR_FEATURES: Range<usize> = 30..50;
pub const TEXTURE: Range<usize> = 50..75;
pub const SHAPE: Range<usize> = 75..90;
pub const LIGHTING: Range<usize> = 90..100;
pub const EDGES: Range<usize> = 100..120;
pub const SPATIAL: Range<usize> = 120..160;

/// 分段分类所需的最小向量长度
pub const MIN_VECTOR_LEN: usize = SPATIAL.end;

/// 最高分低于该值时视为无法判断
pub const MIN_CATEGORY_SCORE: f64 = 0.3;

/// 末尾附带分类分数时的分数个数：flower, animal, jewelry, human, rabbit, deer
pub const EMBEDDED_SCORES: usize = 6;

/// 动物子类型的最低分数
pub const SUBTYPE_MIN_SCORE: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryLabel {
    Flower,
    Animal,
    Jewelry,
    Human,
    Unknown,
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Flower => "FLOWER",
            Self::Animal => "ANIMAL",
            Self::Jewelry => "JEWELRY",
            Self::Human => "HUMAN",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimalSubtype {
    Rabbit,
    Deer,
}

impl fmt::Display for AnimalSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rabbit => "RABBIT",
            Self::Deer => "DEER",
        })
    }
}

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub label: CategoryLabel,
    /// 置信度，范围 [0, 1]
    pub confidence: f64,
    /// 仅在 `classify_embedded` 判定为 ANIMAL 时可能有值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<AnimalSubtype>,
}

impl Category {
    pub const UNKNOWN: Self = Self { label: CategoryLabel::Unknown, confidence: 0.0, subtype: None };

    fn new(label: CategoryLabel, confidence: f64) -> Self {
        Self { label, confidence, subtype: None }
    }
}

/// 分类方案
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CategoryScheme {
    /// 按分段统计规则打分
    #[default]
    Bands,
    /// 读取特征向量末尾附带的分类分数
    Embedded,
}

impl CategoryScheme {
    pub fn classify(self, vector: &[f64], has_faces: bool) -> Category {
        if has_faces {
            return Category::new(CategoryLabel::Human, 1.0);
        }
        match self {
            Self::Bands => classify(vector),
            Self::Embedded => classify_embedded(vector),
        }
    }
}

/// 分段统计量
struct Band<'a>(&'a [f64]);

impl Band<'_> {
    fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    fn mean(&self) -> f64 {
        self.sum() / self.0.len() as f64
    }

    /// 总体标准差
    fn std(&self) -> f64 {
        let mean = self.mean();
        let var = self.0.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / self.0.len() as f64;
        var.sqrt()
    }

    fn max(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

struct Bands<'a> {
    dominant: Band<'a>,
    color: Band<'a>,
    texture: Band<'a>,
    shape: Band<'a>,
    lighting: Band<'a>,
    edges: Band<'a>,
    spatial: Band<'a>,
}

impl<'a> Bands<'a> {
    fn split(v: &'a [f64]) -> Self {
        Self {
            dominant: Band(&v[DOMINANT_COLORS]),
            color: Band(&v[COLOR_FEATURES]),
            texture: Band(&v[TEXTURE]),
            shape: Band(&v[SHAPE]),
            lighting: Band(&v[LIGHTING]),
            edges: Band(&v[EDGES]),
            spatial: Band(&v[SPATIAL]),
        }
    }

    fn flower_score(&self) -> f64 {
        let mut score = 0.0;
        // 颜色饱和
        if self.color.sum() > 4.0 {
            score += 0.4;
        }
        // 主色分布分散
        if self.dominant.std() > 0.25 {
            score += 0.3;
        }
        // 花瓣轮廓
        if self.shape.mean() > 0.4 {
            score += 0.3;
        }
        score
    }

    fn animal_score(&self) -> f64 {
        let mut score = 0.0;
        // 毛发纹理
        if self.texture.sum() > 6.0 {
            score += 0.4;
        }
        if self.edges.sum() > 4.0 {
            score += 0.3;
        }
        // 自然光
        let lighting = self.lighting.mean();
        if lighting > 0.1 && lighting < 0.5 {
            score += 0.3;
        }
        score
    }

    fn jewelry_score(&self) -> f64 {
        let mut score = 0.0;
        // 高光
        if self.lighting.max() > 0.8 {
            score += 0.4;
        }
        // 切面边缘锐利
        if self.edges.std() > 0.4 {
            score += 0.3;
        }
        // 纯色背景上的小物体
        if self.spatial.mean() < 0.2 && self.spatial.max() > 0.6 {
            score += 0.3;
        }
        score
    }
}

/// 从候选中选出分数最高的类别，同分时取靠前的
fn pick(scores: &[(CategoryLabel, f64)], min_score: f64) -> Category {
    let mut best = scores[0];
    for &(label, score) in &scores[1..] {
        if score > best.1 {
            best = (label, score);
        }
    }
    let confidence = best.1.min(1.0);
    if best.1 < min_score {
        return Category::new(CategoryLabel::Unknown, confidence);
    }
    Category::new(best.0, confidence)
}

/// 根据特征向量分段统计判断图片类别
///
/// 长度不足 [`MIN_VECTOR_LEN`] 时返回 `(UNKNOWN, 0.0)`。
/// HUMAN 类别不在这里判断，见 [`CategoryScheme::classify`]。
pub fn classify(vector: &[f64]) -> Category {
    if vector.len() < MIN_VECTOR_LEN {
        return Category::UNKNOWN;
    }
    let bands = Bands::split(vector);
    pick(
        &[
            (CategoryLabel::Flower, bands.flower_score()),
            (CategoryLabel::Animal, bands.animal_score()),
            (CategoryLabel::Jewelry, bands.jewelry_score()),
        ],
        MIN_CATEGORY_SCORE,
    )
}

/// 读取特征向量末尾附带的 6 个分类分数
///
/// 分数顺序为 `[flower, animal, jewelry, human, rabbit, deer]`，
/// 判定为 ANIMAL 时再根据后两个分数判断子类型。
pub fn classify_embedded(vector: &[f64]) -> Category {
    if vector.len() < EMBEDDED_SCORES {
        return Category::UNKNOWN;
    }
    let tail = &vector[vector.len() - EMBEDDED_SCORES..];
    let mut category = pick(
        &[
            (CategoryLabel::Flower, tail[0]),
            (CategoryLabel::Animal, tail[1]),
            (CategoryLabel::Jewelry, tail[2]),
            (CategoryLabel::Human, tail[3]),
        ],
        f64::NEG_INFINITY,
    );
    category.confidence = category.confidence.max(0.0);
    if category.label == CategoryLabel::Animal {
        category.subtype = animal_subtype(tail[4], tail[5]);
    }
    category
}

fn animal_subtype(rabbit: f64, deer: f64) -> Option<AnimalSubtype> {
    if rabbit > deer && rabbit > SUBTYPE_MIN_SCORE {
        Some(AnimalSubtype::Rabbit)
    } else if deer > rabbit && deer > SUBTYPE_MIN_SCORE {
        Some(AnimalSubtype::Deer)
    } else {
        None
    }
}
