//! 特征提取器的输出格式
//!
//! 整体特征提取器输出一行逗号分隔的浮点数。人脸检测器输出：
//!
//! ```text
//! FACES_DETECTED:2
//! FACE_0:12,40,64,64|0.013,-0.2,...
//! FACE_1:300,28,58,58|0.101,0.044,...
//! ```
//!
//! 没有人脸时只输出一行 `NO_FACES`。

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;
use crate::face::{FaceDescriptor, FaceRect};

const FACES_DETECTED: &str = "FACES_DETECTED:";
const NO_FACES: &str = "NO_FACES";

static RE_FACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^FACE_(\d+):([^|]*)\|(.*)$").expect("failed to build regex"));

/// 非空行及其行号（从 1 开始）
fn lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().map(|(i, l)| (i + 1, l.trim())).filter(|(_, l)| !l.is_empty())
}

fn parse_csv(line: usize, s: &str) -> Result<Vec<f64>, ParseError> {
    s.split(',')
        .map(|v| {
            let v = v.trim();
            v.parse::<f64>().map_err(|_| ParseError::InvalidNumber { line, value: v.to_string() })
        })
        .collect()
}

/// 解析整体特征向量
pub fn parse_feature_vector(text: &str) -> Result<Vec<f64>, ParseError> {
    let mut lines = lines(text);
    let Some((line, content)) = lines.next() else {
        return Err(ParseError::EmptyVector);
    };
    if let Some((line, content)) = lines.next() {
        return Err(ParseError::UnexpectedLine { line, content: content.to_string() });
    }
    parse_csv(line, content)
}

/// 解析人脸检测器的输出，没有人脸时返回空列表
pub fn parse_faces(text: &str) -> Result<Vec<FaceDescriptor>, ParseError> {
    let mut lines = lines(text);
    let declared = match lines.next() {
        None => return Ok(vec![]),
        Some((_, NO_FACES)) => {
            if let Some((line, content)) = lines.next() {
                return Err(ParseError::UnexpectedLine { line, content: content.to_string() });
            }
            return Ok(vec![]);
        }
        Some((line, content)) => match content.strip_prefix(FACES_DETECTED) {
            Some(n) => n.trim().parse::<usize>().map_err(|_| ParseError::InvalidNumber {
                line,
                value: n.trim().to_string(),
            })?,
            None => {
                return Err(ParseError::UnexpectedLine { line, content: content.to_string() });
            }
        },
    };

    let faces = lines
        .map(|(line, content)| parse_face_line(line, content))
        .collect::<Result<Vec<_>, _>>()?;
    if faces.len() != declared {
        return Err(ParseError::FaceCountMismatch { declared, found: faces.len() });
    }
    Ok(faces)
}

fn parse_face_line(line: usize, content: &str) -> Result<FaceDescriptor, ParseError> {
    if !content.starts_with("FACE_") {
        return Err(ParseError::UnexpectedLine { line, content: content.to_string() });
    }
    let malformed = || ParseError::MalformedFace { line, content: content.to_string() };
    let caps = RE_FACE.captures(content).ok_or_else(malformed)?;

    let rect = caps[2]
        .split(',')
        .map(|v| {
            let v = v.trim();
            v.parse::<i32>().map_err(|_| ParseError::InvalidNumber { line, value: v.to_string() })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let &[left, top, width, height] = rect.as_slice() else {
        return Err(ParseError::BadRectangle { line, got: rect.len() });
    };

    if caps[3].trim().is_empty() {
        return Err(malformed());
    }
    let features = parse_csv(line, &caps[3])?;
    Ok(FaceDescriptor::new(FaceRect::new(left, top, width, height), features))
}

fn write_csv(out: &mut String, values: &[f64]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{v}");
    }
}

/// 输出整体特征向量
pub fn render_feature_vector(vector: &[f64]) -> String {
    let mut out = String::new();
    write_csv(&mut out, vector);
    out.push('\n');
    out
}

/// 按人脸检测器的格式输出人脸特征
pub fn render_faces(faces: &[FaceDescriptor]) -> String {
    if faces.is_empty() {
        return format!("{NO_FACES}\n");
    }
    let mut out = format!("{FACES_DETECTED}{}\n", faces.len());
    for (i, face) in faces.iter().enumerate() {
        let r = &face.rect;
        let _ = write!(out, "FACE_{i}:{},{},{},{}|", r.left, r.top, r.width, r.height);
        write_csv(&mut out, &face.features);
        out.push('\n');
    }
    out
}
