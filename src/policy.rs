//! 搜索策略
//!
//! 不同部署对阈值的要求差别很大，所有参数都集中在 [`SearchPolicy`] 中，
//! 构建时校验，搜索过程中不再变化。默认值：
//!
//! | 参数 | 默认值 |
//! |---|---|
//! | `mode` | `combined` |
//! | `strictness_exponent` | 2.0 |
//! | `category_gating` | false |
//! | `min_category_confidence` | 0.5 |
//! | `category_boost` | 5.0 |
//! | `category_scheme` | `bands` |
//! | `face_match_threshold` | 0.6 |
//! | `face_boost` | 1.2 |
//! | `face_curve` | `linear` |
//! | `admission` | `split { low: 0.75, high: 0.85 }` |
//! | `length_mode` | `truncate` |

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::category::CategoryScheme;
use crate::error::ConfigError;
use crate::face::FaceCurve;
use crate::vector::LengthMode;

/// 搜索模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// 只比较整体特征
    VisualOnly,
    /// 只比较人脸
    FaceOnly,
    /// 整体特征和人脸结合
    #[default]
    Combined,
}

/// 结果准入阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionThreshold {
    /// 所有结果使用同一个阈值
    Single(f64),
    /// 人脸匹配成功时使用 low，否则使用 high
    Split { low: f64, high: f64 },
}

impl AdmissionThreshold {
    pub fn threshold(&self, has_face_match: bool) -> f64 {
        match *self {
            Self::Single(t) => t,
            Self::Split { low, .. } if has_face_match => low,
            Self::Split { high, .. } => high,
        }
    }

    pub fn admits(&self, score: f64, has_face_match: bool) -> bool {
        score >= self.threshold(has_face_match)
    }
}

impl Default for AdmissionThreshold {
    fn default() -> Self {
        Self::Split { low: 0.75, high: 0.85 }
    }
}

/// 经过校验的搜索策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyBuilder")]
pub struct SearchPolicy {
    mode: SearchMode,
    strictness_exponent: f64,
    category_gating: bool,
    min_category_confidence: f64,
    category_boost: f64,
    category_scheme: CategoryScheme,
    face_match_threshold: f64,
    face_boost: f64,
    face_curve: FaceCurve,
    admission: AdmissionThreshold,
    length_mode: LengthMode,
}

impl SearchPolicy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn strictness_exponent(&self) -> f64 {
        self.strictness_exponent
    }

    pub fn category_gating(&self) -> bool {
        self.category_gating
    }

    pub fn min_category_confidence(&self) -> f64 {
        self.min_category_confidence
    }

    pub fn category_boost(&self) -> f64 {
        self.category_boost
    }

    pub fn category_scheme(&self) -> CategoryScheme {
        self.category_scheme
    }

    pub fn face_match_threshold(&self) -> f64 {
        self.face_match_threshold
    }

    pub fn face_boost(&self) -> f64 {
        self.face_boost
    }

    pub fn face_curve(&self) -> FaceCurve {
        self.face_curve
    }

    pub fn admission(&self) -> AdmissionThreshold {
        self.admission
    }

    pub fn length_mode(&self) -> LengthMode {
        self.length_mode
    }

    /// 转换回构建器，用于在已有策略的基础上修改参数
    pub fn to_builder(&self) -> PolicyBuilder {
        PolicyBuilder {
            mode: self.mode,
            strictness_exponent: self.strictness_exponent,
            category_gating: self.category_gating,
            min_category_confidence: self.min_category_confidence,
            category_boost: self.category_boost,
            category_scheme: self.category_scheme,
            face_match_threshold: self.face_match_threshold,
            face_boost: self.face_boost,
            face_curve: self.face_curve,
            admission: self.admission,
            length_mode: self.length_mode,
        }
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        PolicyBuilder::default().build().expect("default policy must be valid")
    }
}

/// [`SearchPolicy`] 构建器，也是策略文件的反序列化格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyBuilder {
    mode: SearchMode,
    strictness_exponent: f64,
    category_gating: bool,
    min_category_confidence: f64,
    category_boost: f64,
    category_scheme: CategoryScheme,
    face_match_threshold: f64,
    face_boost: f64,
    face_curve: FaceCurve,
    admission: AdmissionThreshold,
    length_mode: LengthMode,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            strictness_exponent: 2.0,
            category_gating: false,
            min_category_confidence: 0.5,
            category_boost: 5.0,
            category_scheme: CategoryScheme::default(),
            face_match_threshold: 0.6,
            face_boost: 1.2,
            face_curve: FaceCurve::default(),
            admission: AdmissionThreshold::default(),
            length_mode: LengthMode::default(),
        }
    }
}

impl PolicyBuilder {
    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn strictness_exponent(mut self, exponent: f64) -> Self {
        self.strictness_exponent = exponent;
        self
    }

    pub fn category_gating(mut self, enabled: bool) -> Self {
        self.category_gating = enabled;
        self
    }

    pub fn min_category_confidence(mut self, confidence: f64) -> Self {
        self.min_category_confidence = confidence;
        self
    }

    pub fn category_boost(mut self, boost: f64) -> Self {
        self.category_boost = boost;
        self
    }

    pub fn category_scheme(mut self, scheme: CategoryScheme) -> Self {
        self.category_scheme = scheme;
        self
    }

    pub fn face_match_threshold(mut self, threshold: f64) -> Self {
        self.face_match_threshold = threshold;
        self
    }

    pub fn face_boost(mut self, boost: f64) -> Self {
        self.face_boost = boost;
        self
    }

    pub fn face_curve(mut self, curve: FaceCurve) -> Self {
        self.face_curve = curve;
        self
    }

    pub fn admission(mut self, admission: AdmissionThreshold) -> Self {
        self.admission = admission;
        self
    }

    pub fn length_mode(mut self, mode: LengthMode) -> Self {
        self.length_mode = mode;
        self
    }

    /// 校验参数并生成策略
    pub fn build(self) -> Result<SearchPolicy, ConfigError> {
        if !(self.strictness_exponent.is_finite() && self.strictness_exponent > 0.0) {
            return Err(ConfigError::InvalidExponent(self.strictness_exponent));
        }
        unit("min_category_confidence", self.min_category_confidence)?;
        non_negative("category_boost", self.category_boost)?;
        unit("face_match_threshold", self.face_match_threshold)?;
        non_negative("face_boost", self.face_boost)?;
        match self.admission {
            AdmissionThreshold::Single(t) => unit("admission threshold", t)?,
            AdmissionThreshold::Split { low, high } => {
                unit("low admission threshold", low)?;
                unit("high admission threshold", high)?;
                if low > high {
                    return Err(ConfigError::InvertedThresholds { low, high });
                }
            }
        }
        if self.length_mode == LengthMode::TruncateOrPad(0) {
            return Err(ConfigError::ZeroCanonicalLength);
        }

        Ok(SearchPolicy {
            mode: self.mode,
            strictness_exponent: self.strictness_exponent,
            category_gating: self.category_gating,
            min_category_confidence: self.min_category_confidence,
            category_boost: self.category_boost,
            category_scheme: self.category_scheme,
            face_match_threshold: self.face_match_threshold,
            face_boost: self.face_boost,
            face_curve: self.face_curve,
            admission: self.admission,
            length_mode: self.length_mode,
        })
    }
}

impl TryFrom<PolicyBuilder> for SearchPolicy {
    type Error = ConfigError;

    fn try_from(builder: PolicyBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotNonNegative { name, value })
    }
}

fn unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    non_negative(name, value)?;
    if value > 1.0 {
        return Err(ConfigError::OutOfUnitRange { name, value });
    }
    Ok(())
}
