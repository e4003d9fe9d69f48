use serde::{Deserialize, Serialize};

use crate::category::{Category, CategoryLabel, CategoryScheme};
use crate::policy::SearchPolicy;
use crate::vector::{LengthMode, unit_similarity};

/// 类别门控的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// 未启用门控
    Disabled,
    /// 置信度不足或类别未知，分数不变
    Inconclusive,
    /// 类别不同，分数置 0
    Blocked,
    /// 类别相同，分数放大
    Boosted,
}

/// 类别门控参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gating {
    pub min_confidence: f64,
    pub boost: f64,
    pub scheme: CategoryScheme,
}

/// 整体相似度及其组成
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualScore {
    /// 最终分数，范围 [0, 1]
    pub score: f64,
    /// 门控之前的分数
    pub raw: f64,
    pub gate: Gate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_category: Option<Category>,
}

/// 比较两个整体特征向量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualMatcher {
    /// 严格程度，相似度会被提升到这个幂次，越大低分被压得越低
    pub strictness_exponent: f64,
    pub length_mode: LengthMode,
    pub gating: Option<Gating>,
}

impl Default for VisualMatcher {
    fn default() -> Self {
        Self::from(&SearchPolicy::default())
    }
}

impl From<&SearchPolicy> for VisualMatcher {
    fn from(policy: &SearchPolicy) -> Self {
        let gating = policy.category_gating().then(|| Gating {
            min_confidence: policy.min_category_confidence(),
            boost: policy.category_boost(),
            scheme: policy.category_scheme(),
        });
        Self {
            strictness_exponent: policy.strictness_exponent(),
            length_mode: policy.length_mode(),
            gating,
        }
    }
}

impl VisualMatcher {
    /// 不做门控时的相似度：余弦映射到 [0, 1] 后取幂，零向量为 0
    pub fn raw_similarity(&self, a: &[f64], b: &[f64]) -> f64 {
        unit_similarity(a, b, self.length_mode).powf(self.strictness_exponent)
    }

    /// 两个特征向量的相似度，范围 [0, 1]
    pub fn visual_similarity(&self, a: &[f64], b: &[f64]) -> f64 {
        self.score(a, false, b, false).score
    }

    /// 计算相似度并返回门控细节
    ///
    /// `a_faces`/`b_faces` 表示图片中是否有人脸，用于判定 HUMAN 类别
    pub fn score(&self, a: &[f64], a_faces: bool, b: &[f64], b_faces: bool) -> VisualScore {
        let raw = self.raw_similarity(a, b);
        let Some(gating) = self.gating else {
            return VisualScore {
                score: raw,
                raw,
                gate: Gate::Disabled,
                query_category: None,
                stored_category: None,
            };
        };

        let ca = gating.scheme.classify(a, a_faces);
        let cb = gating.scheme.classify(b, b_faces);
        let (gate, score) = apply_gate(&gating, ca, cb, raw);
        VisualScore { score, raw, gate, query_category: Some(ca), stored_category: Some(cb) }
    }
}

fn apply_gate(gating: &Gating, a: Category, b: Category, raw: f64) -> (Gate, f64) {
    let unknown = a.label == CategoryLabel::Unknown || b.label == CategoryLabel::Unknown;
    let confident = a.confidence >= gating.min_confidence && b.confidence >= gating.min_confidence;
    if unknown || !confident {
        (Gate::Inconclusive, raw)
    } else if a.label != b.label {
        (Gate::Blocked, 0.0)
    } else {
        (Gate::Boosted, (raw * gating.boost).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{SPATIAL, TEXTURE};
    use crate::category::tests::{animal_vector, flower_vector};

    fn unit(len: usize, i: usize) -> Vec<f64> {
        let mut v = vec![0.0; len];
        v[i] = 1.0;
        v
    }

    fn gated() -> VisualMatcher {
        let policy = SearchPolicy::builder().category_gating(true).build().unwrap();
        VisualMatcher::from(&policy)
    }

    /// 在空间分布分段加上相同的大分量，让两个向量的余弦相似度很高
    fn with_shared_spatial(mut v: Vec<f64>) -> Vec<f64> {
        v[SPATIAL].iter_mut().for_each(|x| *x = 5.0);
        v
    }

    #[test]
    fn test_identical_unit_vectors() {
        let m = VisualMatcher::default();
        let q = unit(160, 0);
        assert!(m.visual_similarity(&q, &q) >= 0.95);
        assert_eq!(gated().visual_similarity(&q, &q), 1.0);
    }

    #[test]
    fn test_orthogonal_unit_vectors() {
        let m = VisualMatcher::default();
        let s = m.visual_similarity(&unit(160, 0), &unit(160, 1));
        assert!(s <= 0.5);
        assert!((s - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_zero_vector_is_not_similar() {
        let m = VisualMatcher::default();
        let zero = vec![0.0; 160];
        assert_eq!(m.visual_similarity(&unit(160, 0), &zero), 0.0);
        assert_eq!(m.visual_similarity(&zero, &zero), 0.0);
        assert_eq!(gated().visual_similarity(&zero, &flower_vector()), 0.0);
    }

    #[test]
    fn test_exponent_controls_strictness() {
        let a = [1.0, 0.2, 0.0];
        let b = [0.3, 1.0, 0.1];
        let square = VisualMatcher { strictness_exponent: 2.0, ..Default::default() };
        let cube = VisualMatcher { strictness_exponent: 3.0, ..Default::default() };
        assert!(cube.visual_similarity(&a, &b) < square.visual_similarity(&a, &b));
        // 完全相同时两者都为 1
        assert_eq!(cube.visual_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_symmetric() {
        let a = [0.4, -0.3, 2.0, 1.1, 0.0, 9.0];
        let b = [1.0, 0.7, -1.5, 0.2, 3.3];
        let m = VisualMatcher::default();
        assert_eq!(m.visual_similarity(&a, &b), m.visual_similarity(&b, &a));
        let g = gated();
        assert_eq!(
            g.visual_similarity(&flower_vector(), &animal_vector()),
            g.visual_similarity(&animal_vector(), &flower_vector())
        );
    }

    #[test]
    fn test_gating_blocks_different_categories() {
        let flower = with_shared_spatial(flower_vector());
        let animal = with_shared_spatial(animal_vector());
        let raw = VisualMatcher::default().visual_similarity(&flower, &animal);
        assert!(raw > 0.8);

        let s = gated().score(&flower, false, &animal, false);
        assert_eq!(s.gate, Gate::Blocked);
        assert_eq!(s.score, 0.0);
        assert_eq!(s.raw, raw);
    }

    #[test]
    fn test_gating_boosts_same_category() {
        let a = flower_vector();
        let mut b = flower_vector();
        b[0] = 0.0;
        b[1] = 1.0;
        let s = gated().score(&a, false, &b, false);
        assert_eq!(s.gate, Gate::Boosted);
        assert!(s.score >= s.raw);
        assert!(s.score <= 1.0);
    }

    #[test]
    fn test_gating_inconclusive_for_unknown() {
        let q = unit(160, 0);
        let s = gated().score(&q, false, &flower_vector(), false);
        assert_eq!(s.gate, Gate::Inconclusive);
        assert_eq!(s.score, s.raw);
    }

    #[test]
    fn test_gating_inconclusive_below_floor() {
        let policy = SearchPolicy::builder()
            .category_gating(true)
            .min_category_confidence(1.0)
            .build()
            .unwrap();
        let m = VisualMatcher::from(&policy);
        // 去掉纹理后动物分数只有 0.6
        let mut weak = animal_vector();
        weak[TEXTURE].iter_mut().for_each(|x| *x = 0.0);
        let s = m.score(&weak, false, &flower_vector(), false);
        assert_eq!(s.gate, Gate::Inconclusive);
    }

    #[test]
    fn test_faces_classify_as_human() {
        let flower = with_shared_spatial(flower_vector());
        let s = gated().score(&flower, true, &flower, false);
        assert_eq!(s.query_category.unwrap().label, CategoryLabel::Human);
        assert_eq!(s.gate, Gate::Blocked);
    }

    #[test]
    fn test_disabled_gate() {
        let s = VisualMatcher::default().score(&flower_vector(), false, &animal_vector(), false);
        assert_eq!(s.gate, Gate::Disabled);
        assert!(s.query_category.is_none());
    }
}
