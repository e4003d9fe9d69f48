use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::category::Category;
use crate::error::{InputError, RecordError};
use crate::face::FaceDescriptor;
use crate::visual::Gate;

/// 库中的一张图片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 图片 ID
    pub id: String,
    /// 图片路径，由存储层管理
    pub path: String,
    /// 整体特征向量
    pub vector: Option<Vec<f64>>,
    /// 是否检测到人脸
    #[serde(default)]
    pub has_faces: bool,
    /// 人脸数量
    #[serde(default)]
    pub face_count: usize,
    /// 人脸特征，没有人脸时为空
    #[serde(default)]
    pub faces: Vec<FaceDescriptor>,
}

impl ImageRecord {
    /// 创建记录，人脸标记和数量由人脸列表推出
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        vector: Option<Vec<f64>>,
        faces: Vec<FaceDescriptor>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            vector,
            has_faces: !faces.is_empty(),
            face_count: faces.len(),
            faces,
        }
    }

    /// 检查人脸标记、人脸数量与人脸列表是否一致，且每张人脸都有特征
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.face_count != self.faces.len() {
            return Err(RecordError::FaceCountMismatch {
                id: self.id.clone(),
                count: self.face_count,
                descriptors: self.faces.len(),
            });
        }
        if self.has_faces != (self.face_count > 0) {
            return Err(RecordError::FaceFlagMismatch {
                id: self.id.clone(),
                has_faces: self.has_faces,
                count: self.face_count,
            });
        }
        if let Some(index) = self.faces.iter().position(|f| f.features.is_empty()) {
            return Err(RecordError::EmptyFace { id: self.id.clone(), index });
        }
        Ok(())
    }

    /// 返回非空的整体特征向量
    pub fn require_vector(&self) -> Result<&[f64], RecordError> {
        match &self.vector {
            None => Err(RecordError::MissingVector(self.id.clone())),
            Some(v) if v.is_empty() => Err(RecordError::EmptyVector(self.id.clone())),
            Some(v) => Ok(v),
        }
    }
}

/// 每次搜索时新生成的查询描述，不会被保存
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryBundle {
    pub vector: Option<Vec<f64>>,
    #[serde(default)]
    pub faces: Vec<FaceDescriptor>,
}

impl QueryBundle {
    pub fn new(vector: Option<Vec<f64>>, faces: Vec<FaceDescriptor>) -> Self {
        Self { vector, faces }
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// 返回非空的整体特征向量
    pub fn require_vector(&self) -> Result<&[f64], InputError> {
        match &self.vector {
            None => Err(InputError::MissingVector),
            Some(v) if v.is_empty() => Err(InputError::EmptyVector),
            Some(v) => Ok(v),
        }
    }

    /// 检查人脸特征是否可用
    pub fn require_faces(&self) -> Result<&[FaceDescriptor], InputError> {
        if self.faces.is_empty() {
            return Err(InputError::NoFaces);
        }
        if let Some(i) = self.faces.iter().position(|f| f.features.is_empty()) {
            return Err(InputError::EmptyFace(i));
        }
        Ok(&self.faces)
    }
}

/// 单条评分结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch<'a> {
    #[serde(serialize_with = "record_ref")]
    pub record: &'a ImageRecord,
    /// 最终相似度，范围 [0, 1]
    pub score: f64,
    pub visual: Option<f64>,
    pub face: Option<f64>,
    pub has_face_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<Gate>,
}

/// 输出结果时只保留记录的 ID 和路径
fn record_ref<S: Serializer>(record: &&ImageRecord, serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("ImageRecord", 2)?;
    s.serialize_field("id", &record.id)?;
    s.serialize_field("path", &record.path)?;
    s.end()
}
