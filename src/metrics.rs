use std::sync::LazyLock;

use prometheus::*;

use crate::policy::SearchMode;
use crate::ranker::RankOutput;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imsim_search_count", "count of searches", &["mode", "size"]).unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "imsim_search_duration",
        "duration of the per-query ranking in seconds",
        &["mode", "size"]
    )
    .unwrap()
});

static METRIC_SEARCH_SKIPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "imsim_search_skipped_records",
        "count of records skipped because of malformed data",
        &["mode"]
    )
    .unwrap()
});

static METRIC_SEARCH_MAX_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "imsim_search_max_score",
        "max score of the per-query ranking",
        &["mode"],
        (1..=20).map(|x| x as f64 * 0.05).collect()
    )
    .unwrap()
});

/// 记录一次搜索的指标
pub fn observe_search(mode: SearchMode, collection_size: usize, output: &RankOutput, duration: f32) {
    let mode = mode_label(mode);
    let size = to_fixed_size(collection_size);

    METRIC_SEARCH_COUNT.with_label_values(&[mode, size]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[mode, size]).observe(duration as f64);
    METRIC_SEARCH_SKIPPED.with_label_values(&[mode]).inc_by(output.skipped as u64);
    if let Some(score) = output.max_score() {
        METRIC_SEARCH_MAX_SCORE.with_label_values(&[mode]).observe(score);
    }
}

/// 推送所有指标到 pushgateway
pub fn push(url: &str, instance: &str, auth: Option<(String, String)>) -> Result<()> {
    push_metrics(
        "imsim",
        labels! {
            "instance".to_string() => instance.to_string(),
        },
        url,
        gather(),
        auth.map(|(username, password)| BasicAuthentication { username, password }),
    )
}

fn mode_label(mode: SearchMode) -> &'static str {
    match mode {
        SearchMode::VisualOnly => "visual_only",
        SearchMode::FaceOnly => "face_only",
        SearchMode::Combined => "combined",
    }
}

/// 将集合大小调整到几个固定值
fn to_fixed_size(size: usize) -> &'static str {
    if size <= 1_000 {
        "1k"
    } else if size <= 10_000 {
        "10k"
    } else if size <= 100_000 {
        "100k"
    } else if size <= 1_000_000 {
        "1m"
    } else {
        "1m+"
    }
}
