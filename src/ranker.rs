use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{InputError, RecordError, SearchError};
use crate::face::{FaceDescriptor, FaceMatcher};
use crate::policy::{SearchMode, SearchPolicy};
use crate::record::{ImageRecord, QueryBundle, ScoredMatch};
use crate::visual::VisualMatcher;

/// 取消搜索的标记，可以在其他线程中触发
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 一次搜索的输出
#[derive(Debug, Clone, Default, Serialize)]
pub struct RankOutput<'a> {
    /// 通过准入阈值的结果，按分数降序
    pub results: Vec<ScoredMatch<'a>>,
    /// 所有成功评分的记录，按分数降序
    pub all_scores: Vec<ScoredMatch<'a>>,
    /// 因数据错误被跳过的记录数量
    pub skipped: usize,
}

impl RankOutput<'_> {
    /// 最高分，没有任何评分时为 `None`
    pub fn max_score(&self) -> Option<f64> {
        self.all_scores.first().map(|m| m.score)
    }
}

/// 校验过的查询
struct Query<'q> {
    vector: Option<&'q [f64]>,
    /// 参与人脸评分的人脸，`visual_only` 模式下为空
    faces: &'q [FaceDescriptor],
    /// 查询图片本身是否有人脸，用于类别判定
    has_faces: bool,
}

/// 对整个图片集合评分并排序
#[derive(Debug, Clone)]
pub struct SearchRanker {
    policy: SearchPolicy,
    visual: VisualMatcher,
    face: FaceMatcher,
}

impl Default for SearchRanker {
    fn default() -> Self {
        Self::new(SearchPolicy::default())
    }
}

impl SearchRanker {
    pub fn new(policy: SearchPolicy) -> Self {
        let visual = VisualMatcher::from(&policy);
        let face = FaceMatcher::new(policy.face_curve());
        Self { policy, visual, face }
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    pub fn visual_matcher(&self) -> &VisualMatcher {
        &self.visual
    }

    pub fn face_matcher(&self) -> &FaceMatcher {
        &self.face
    }

    /// 在集合中搜索与查询相似的图片
    ///
    /// 查询本身不可用时返回 [`InputError`]，单条记录的错误只会被记录并跳过。
    pub fn rank<'a>(
        &self,
        query: &QueryBundle,
        collection: &'a [ImageRecord],
    ) -> Result<RankOutput<'a>, SearchError> {
        self.rank_with_cancel(query, collection, &CancelToken::new())
    }

    /// 同 [`SearchRanker::rank`]，每条记录评分前检查一次取消标记
    pub fn rank_with_cancel<'a>(
        &self,
        query: &QueryBundle,
        collection: &'a [ImageRecord],
        cancel: &CancelToken,
    ) -> Result<RankOutput<'a>, SearchError> {
        let query = self.check_query(query)?;
        debug!("ranking {} records in {:?} mode", collection.len(), self.policy.mode());
        let instant = Instant::now();

        let scored = collection
            .par_iter()
            .map(|record| {
                if cancel.is_cancelled() {
                    return Err(SearchError::Cancelled);
                }
                Ok(self.score_record(&query, record))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self.finish(scored);
        debug!("rank time: {:.2}s", instant.elapsed().as_secs_f32());
        Ok(output)
    }

    /// 顺序评分，适用于逐条读取的记录流
    pub fn rank_iter<'a, I>(&self, query: &QueryBundle, records: I) -> Result<RankOutput<'a>, SearchError>
    where
        I: IntoIterator<Item = &'a ImageRecord>,
    {
        let query = self.check_query(query)?;
        let scored = records.into_iter().map(|record| self.score_record(&query, record));
        Ok(self.finish(scored))
    }

    fn check_query<'q>(&self, query: &'q QueryBundle) -> Result<Query<'q>, InputError> {
        let vector = match self.policy.mode() {
            SearchMode::FaceOnly => None,
            SearchMode::VisualOnly | SearchMode::Combined => Some(query.require_vector()?),
        };
        let faces: &[FaceDescriptor] = match self.policy.mode() {
            SearchMode::FaceOnly => query.require_faces()?,
            SearchMode::Combined if query.has_faces() => query.require_faces()?,
            SearchMode::Combined | SearchMode::VisualOnly => &[],
        };
        Ok(Query { vector, faces, has_faces: query.has_faces() })
    }

    /// 单条记录评分，`face_only` 模式下没有人脸的记录返回 `Ok(None)`
    fn score_record<'a>(
        &self,
        query: &Query<'_>,
        record: &'a ImageRecord,
    ) -> Result<Option<ScoredMatch<'a>>, RecordError> {
        record.validate()?;
        if self.policy.mode() == SearchMode::FaceOnly && !record.has_faces {
            return Ok(None);
        }

        let visual = match query.vector {
            Some(q) => {
                let stored = record.require_vector()?;
                Some(self.visual.score(q, query.has_faces, stored, record.has_faces))
            }
            None => None,
        };
        let face = match self.policy.mode() {
            SearchMode::VisualOnly => None,
            SearchMode::FaceOnly | SearchMode::Combined => {
                Some(self.face.face_similarity(query.faces, &record.faces))
            }
        };
        let has_face_match = face.is_some_and(|f| f > self.policy.face_match_threshold());

        let score = match (visual.map(|v| v.score), face) {
            (Some(v), Some(f)) if has_face_match => v.max(f * self.policy.face_boost()).min(1.0),
            (Some(v), _) => v,
            (None, f) => f.unwrap_or(0.0),
        };
        let components = [Some(score), visual.map(|v| v.score), face];
        if components.into_iter().flatten().any(|s| !s.is_finite()) {
            return Err(RecordError::NonFiniteScore(record.id.clone()));
        }

        Ok(Some(ScoredMatch {
            record,
            score,
            visual: visual.map(|v| v.score),
            face,
            has_face_match,
            query_category: visual.and_then(|v| v.query_category),
            stored_category: visual.and_then(|v| v.stored_category),
            gate: visual.map(|v| v.gate),
        }))
    }

    fn finish<'a, I>(&self, scored: I) -> RankOutput<'a>
    where
        I: IntoIterator<Item = Result<Option<ScoredMatch<'a>>, RecordError>>,
    {
        let admission = self.policy.admission();
        let mut output = RankOutput::default();
        for item in scored {
            match item {
                Ok(Some(m)) => {
                    if admission.admits(m.score, m.has_face_match) {
                        output.results.push(m.clone());
                    }
                    output.all_scores.push(m);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("skipping record: {}", e);
                    output.skipped += 1;
                }
            }
        }
        // 稳定排序，分数相同时保持集合中的顺序
        output.results.sort_by(|a, b| b.score.total_cmp(&a.score));
        output.all_scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        output
    }
}
