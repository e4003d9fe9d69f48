//! 图片相似度评分与分类
//!
//! 输入是特征提取器给出的整体特征向量和人脸特征，不处理图片本身。
//! 入口是 [`SearchRanker`]：对整个图片集合评分、排序并按 [`SearchPolicy`] 决定哪些结果展示给用户。

pub mod category;
pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod extractor;
pub mod face;
pub mod metrics;
pub mod policy;
pub mod ranker;
pub mod record;
pub mod utils;
pub mod vector;
pub mod visual;

pub use category::{Category, CategoryLabel, CategoryScheme};
pub use config::Opts;
pub use error::{ConfigError, InputError, ParseError, RecordError, SearchError};
pub use face::{FaceCurve, FaceDescriptor, FaceMatcher, FaceRect};
pub use policy::{AdmissionThreshold, PolicyBuilder, SearchMode, SearchPolicy};
pub use ranker::{CancelToken, RankOutput, SearchRanker};
pub use record::{ImageRecord, QueryBundle, ScoredMatch};
pub use visual::VisualMatcher;
