use std::path::PathBuf;

use thiserror::Error;

/// 查询本身不可用，整个搜索直接终止
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("query feature vector is missing")]
    MissingVector,
    #[error("query feature vector is empty")]
    EmptyVector,
    #[error("no faces in query, face-only search needs at least one face descriptor")]
    NoFaces,
    #[error("query face descriptor #{0} is empty")]
    EmptyFace(usize),
}

/// 单条记录无法评分，记录日志后跳过
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("record {0} has no feature vector")]
    MissingVector(String),
    #[error("record {0} has an empty feature vector")]
    EmptyVector(String),
    #[error("record {id}: face count {count} does not match {descriptors} face descriptors")]
    FaceCountMismatch { id: String, count: usize, descriptors: usize },
    #[error("record {id}: has_faces = {has_faces} but face count is {count}")]
    FaceFlagMismatch { id: String, has_faces: bool, count: usize },
    #[error("record {id}: face {index} has an empty descriptor")]
    EmptyFace { id: String, index: usize },
    #[error("record {0} produced a non-finite score")]
    NonFiniteScore(String),
}

/// 策略配置非法，在构建策略时即拒绝
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a finite non-negative number, got {value}")]
    NotNonNegative { name: &'static str, value: f64 },
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("strictness exponent must be finite and greater than 0, got {0}")]
    InvalidExponent(f64),
    #[error("canonical length for truncate_or_pad must be greater than 0")]
    ZeroCanonicalLength,
    #[error("low admission threshold {low} is greater than high threshold {high}")]
    InvertedThresholds { low: f64, high: f64 },
}

/// 特征提取器输出格式错误
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("line {line}: invalid number {value:?}")]
    InvalidNumber { line: usize, value: String },
    #[error("line {line}: face rectangle must have exactly 4 integers, got {got}")]
    BadRectangle { line: usize, got: usize },
    #[error("line {line}: malformed face line {content:?}")]
    MalformedFace { line: usize, content: String },
    #[error("line {line}: unexpected line {content:?}")]
    UnexpectedLine { line: usize, content: String },
    #[error("FACES_DETECTED says {declared} faces but {found} FACE_ lines were found")]
    FaceCountMismatch { declared: usize, found: usize },
    #[error("feature vector is empty")]
    EmptyVector,
}

/// 搜索过程中可能返回给调用方的错误
#[derive(Debug, Error, PartialEq)]
pub enum SearchError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("search cancelled")]
    Cancelled,
}

/// 图片集合文件读写错误
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("failed to access collection file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to serialize record {id}: {source}")]
    Serialize { id: String, source: serde_json::Error },
}
