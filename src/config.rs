use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use log::debug;

use crate::category::CategoryScheme;
use crate::cli::*;
use crate::face::FaceCurve;
use crate::policy::{AdmissionThreshold, PolicyBuilder, SearchMode, SearchPolicy};
use crate::vector::LengthMode;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "imsim", "imsim").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone, Default)]
pub struct PolicyOptions {
    /// 搜索策略文件（JSON），默认读取配置目录下的 policy.json，命令行参数会覆盖文件中的值
    #[arg(long, value_name = "FILE")]
    pub policy: Option<PathBuf>,
    /// 搜索模式
    #[arg(short, long, value_enum)]
    pub mode: Option<SearchMode>,
    /// 整体相似度的幂次，越大越严格
    #[arg(short = 'e', long, value_name = "EXP")]
    pub strictness_exponent: Option<f64>,
    /// 启用类别门控：类别不同的图片分数直接置 0
    #[arg(long, overrides_with = "no_category_gating")]
    pub category_gating: bool,
    /// 关闭类别门控，覆盖策略文件中的设置
    #[arg(long, overrides_with = "category_gating")]
    pub no_category_gating: bool,
    /// 类别门控要求的最低置信度
    #[arg(long, value_name = "CONF")]
    pub min_category_confidence: Option<f64>,
    /// 类别相同时的分数放大倍数
    #[arg(long, value_name = "BOOST")]
    pub category_boost: Option<f64>,
    /// 分类方案
    #[arg(long, value_enum)]
    pub category_scheme: Option<CategoryScheme>,
    /// 人脸相似度超过该值时视为同一个人
    #[arg(long, value_name = "THRESHOLD")]
    pub face_threshold: Option<f64>,
    /// 人脸匹配成功时人脸分数的放大倍数
    #[arg(long, value_name = "BOOST")]
    pub face_boost: Option<f64>,
    /// 人脸相似度曲线
    #[arg(long, value_enum)]
    pub face_curve: Option<FaceCurve>,
    /// 所有结果使用同一个准入阈值
    #[arg(short, long, value_name = "THRESHOLD", conflicts_with_all = ["low_threshold", "high_threshold"])]
    pub threshold: Option<f64>,
    /// 人脸匹配成功时的准入阈值
    #[arg(long, value_name = "THRESHOLD", requires = "high_threshold")]
    pub low_threshold: Option<f64>,
    /// 没有人脸匹配时的准入阈值
    #[arg(long, value_name = "THRESHOLD", requires = "low_threshold")]
    pub high_threshold: Option<f64>,
    /// 将特征向量截断或补零到固定长度后再比较，不指定则截断到较短的长度
    #[arg(long, value_name = "LEN")]
    pub canonical_length: Option<usize>,
}

impl PolicyOptions {
    /// 读取策略文件并应用命令行参数
    pub fn load(&self, conf_dir: &ConfDir) -> anyhow::Result<SearchPolicy> {
        let path = match &self.policy {
            Some(path) => Some(path.clone()),
            None => Some(conf_dir.policy()).filter(|p| p.is_file()),
        };
        let builder = match path {
            Some(path) => {
                debug!("loading policy from {}", path.display());
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("读取策略文件失败: {}", path.display()))?;
                serde_json::from_str::<PolicyBuilder>(&text)
                    .with_context(|| format!("解析策略文件失败: {}", path.display()))?
            }
            None => PolicyBuilder::default(),
        };
        Ok(self.apply(builder).build()?)
    }

    fn apply(&self, mut builder: PolicyBuilder) -> PolicyBuilder {
        if let Some(mode) = self.mode {
            builder = builder.mode(mode);
        }
        if let Some(exponent) = self.strictness_exponent {
            builder = builder.strictness_exponent(exponent);
        }
        if self.category_gating {
            builder = builder.category_gating(true);
        } else if self.no_category_gating {
            builder = builder.category_gating(false);
        }
        if let Some(confidence) = self.min_category_confidence {
            builder = builder.min_category_confidence(confidence);
        }
        if let Some(boost) = self.category_boost {
            builder = builder.category_boost(boost);
        }
        if let Some(scheme) = self.category_scheme {
            builder = builder.category_scheme(scheme);
        }
        if let Some(threshold) = self.face_threshold {
            builder = builder.face_match_threshold(threshold);
        }
        if let Some(boost) = self.face_boost {
            builder = builder.face_boost(boost);
        }
        if let Some(curve) = self.face_curve {
            builder = builder.face_curve(curve);
        }
        if let Some(t) = self.threshold {
            builder = builder.admission(AdmissionThreshold::Single(t));
        }
        if let (Some(low), Some(high)) = (self.low_threshold, self.high_threshold) {
            builder = builder.admission(AdmissionThreshold::Split { low, high });
        }
        if let Some(n) = self.canonical_length {
            builder = builder.length_mode(LengthMode::TruncateOrPad(n));
        }
        builder
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imsim", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imsim 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 添加图片特征到集合
    Add(AddCommand),
    /// 从集合中搜索相似图片
    Search(SearchCommand),
    /// 判断图片类别
    Classify(ClassifyCommand),
    /// 比较两张图片的相似度
    Compare(CompareCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回图片集合文件的路径
    pub fn collection(&self) -> PathBuf {
        self.path.join("collection.jsonl")
    }

    /// 返回默认搜索策略文件的路径
    pub fn policy(&self) -> PathBuf {
        self.path.join("policy.json")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}
