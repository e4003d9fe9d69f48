use std::path::PathBuf;
use std::slice;

use anyhow::bail;
use clap::Parser;
use serde_json::json;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat, PolicyOptions};
use crate::ranker::SearchRanker;
use crate::utils::{read_query, read_record};

#[derive(Parser, Debug, Clone)]
pub struct CompareCommand {
    #[command(flatten)]
    pub policy: PolicyOptions,
    /// 第一张图片的特征文件，作为查询
    pub a: PathBuf,
    /// 第二张图片的特征文件
    pub b: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for CompareCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let ranker = SearchRanker::new(self.policy.load(&opts.conf_dir)?);
        let query = block_in_place(|| read_query(&self.a))?;
        let record = block_in_place(|| read_record("b", &self.b))?;

        let output = ranker.rank(&query, slice::from_ref(&record))?;
        if output.skipped > 0 {
            bail!("无法比较 {}", self.b.display());
        }
        let Some(m) = output.all_scores.first() else {
            bail!("{} 中没有人脸，无法按人脸比较", self.b.display());
        };
        let admitted = !output.results.is_empty();
        let best_face = ranker.face_matcher().best_match(&query.faces, &record.faces);

        match self.output_format {
            OutputFormat::Json => {
                let value = json!({
                    "score": m.score,
                    "visual": m.visual,
                    "face": m.face,
                    "best_face": best_face,
                    "has_face_match": m.has_face_match,
                    "gate": m.gate,
                    "query_category": m.query_category,
                    "stored_category": m.stored_category,
                    "admitted": admitted,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Table => {
                println!("score\t{:.4}", m.score);
                if let Some(visual) = m.visual {
                    println!("visual\t{:.4}", visual);
                }
                if let Some(face) = m.face {
                    println!("face\t{:.4}", face);
                }
                if let Some(best) = best_face {
                    println!("faces\t#{} <-> #{}", best.query_face, best.stored_face);
                }
                println!("face_match\t{}", m.has_face_match);
                if let (Some(a), Some(b)) = (m.query_category, m.stored_category) {
                    println!("category\t{} / {}", a.label, b.label);
                }
                println!("admitted\t{}", admitted);
            }
        }
        Ok(())
    }
}
