use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressStyle;
use log::debug;

use crate::extractor::{parse_faces, parse_feature_vector};
use crate::face::FaceDescriptor;
use crate::record::{ImageRecord, QueryBundle};

/// 整体特征文件后缀
pub const FEATURES_EXT: &str = "features";
/// 人脸特征文件后缀，与整体特征文件同名
pub const FACES_EXT: &str = "faces";

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {per_sec} {msg}",
    )
    .expect("invalid progress bar template")
    .progress_chars("##-")
}

/// 特征文件对应的图片路径，即去掉后缀
pub fn image_path(features: &Path) -> PathBuf {
    features.with_extension("")
}

/// 读取特征文件，以及旁边的人脸文件（如果存在）
pub fn read_descriptors(features: &Path) -> Result<(Vec<f64>, Vec<FaceDescriptor>)> {
    let text = fs::read_to_string(features)
        .with_context(|| format!("读取特征文件失败: {}", features.display()))?;
    let vector = parse_feature_vector(&text)
        .with_context(|| format!("解析特征文件失败: {}", features.display()))?;

    let faces_path = features.with_extension(FACES_EXT);
    let faces = if faces_path.is_file() {
        let text = fs::read_to_string(&faces_path)
            .with_context(|| format!("读取人脸文件失败: {}", faces_path.display()))?;
        parse_faces(&text).with_context(|| format!("解析人脸文件失败: {}", faces_path.display()))?
    } else {
        vec![]
    };
    debug!("{}: {} dims, {} faces", features.display(), vector.len(), faces.len());

    Ok((vector, faces))
}

pub fn read_query(features: &Path) -> Result<QueryBundle> {
    let (vector, faces) = read_descriptors(features)?;
    Ok(QueryBundle::new(Some(vector), faces))
}

pub fn read_record(id: impl Into<String>, features: &Path) -> Result<ImageRecord> {
    let (vector, faces) = read_descriptors(features)?;
    let path = image_path(features);
    Ok(ImageRecord::new(id, path.to_string_lossy(), Some(vector), faces))
}
