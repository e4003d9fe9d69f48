use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::task::{block_in_place, spawn_blocking};

use crate::cli::SubCommandExtend;
use crate::collection::Collection;
use crate::config::{Opts, OutputFormat, PolicyOptions};
use crate::metrics;
use crate::ranker::SearchRanker;
use crate::record::ScoredMatch;
use crate::utils::read_query;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub policy: PolicyOptions,
    /// 查询图片的特征文件
    pub features: PathBuf,
    /// 显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
    /// 显示所有评分，包括未通过准入阈值的结果
    #[arg(long)]
    pub all: bool,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
    /// 搜索完成后推送指标到该 prometheus pushgateway 地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME", default_value = "imsim")]
    pub prometheus_instance: String,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let policy = self.policy.load(&opts.conf_dir)?;
        debug!("policy: {:?}", policy);

        let query = block_in_place(|| read_query(&self.features))?;
        let collection = block_in_place(|| Collection::load(opts.conf_dir.collection()))?;
        if collection.is_empty() {
            warn!("集合为空，请先使用 add 添加图片");
        }

        let ranker = SearchRanker::new(policy);
        let start = Instant::now();
        let mut output = block_in_place(|| ranker.rank(&query, collection.records()))?;
        let elapsed = start.elapsed().as_secs_f32();
        // 集合文件中无法解析的行也算作跳过
        output.skipped += collection.skipped_lines();

        metrics::observe_search(ranker.policy().mode(), collection.len(), &output, elapsed);
        if output.skipped > 0 {
            warn!("跳过 {} 条无效记录", output.skipped);
        }
        info!("搜索完成，{} 条结果，耗时 {:.3}s", output.results.len(), elapsed);

        let matches = if self.all { &output.all_scores } else { &output.results };
        let matches = &matches[..matches.len().min(self.count)];
        print_result(matches, output.skipped, elapsed, self.output_format)?;

        if let Some(url) = self.prometheus_push.clone() {
            self.push_metrics(url).await;
        }

        Ok(())
    }
}

impl SearchCommand {
    async fn push_metrics(&self, url: String) {
        let instance = self.prometheus_instance.clone();
        let auth = match self.prometheus_auth.as_deref().map(parse_auth).transpose() {
            Ok(auth) => auth,
            Err(e) => {
                error!("推送指标失败: {e}");
                return;
            }
        };
        let r = spawn_blocking(move || metrics::push(&url, &instance, auth)).await;
        match r {
            Ok(Ok(())) => debug!("metrics pushed"),
            Ok(Err(e)) => error!("推送指标失败: {e}"),
            Err(e) => error!("推送指标失败: {e}"),
        }
    }
}

fn parse_auth(s: &str) -> Result<(String, String)> {
    let (username, password) = s.split_once(':').context("认证信息格式应为 username:password")?;
    Ok((username.to_string(), password.to_string()))
}

fn print_result(
    matches: &[ScoredMatch],
    skipped: usize,
    elapsed: f32,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = json!({
                "time": elapsed,
                "skipped": skipped,
                "result": matches,
            });
            println!("{}", serde_json::to_string_pretty(&value)?)
        }
        OutputFormat::Table => {
            for m in matches {
                println!("{:.2}\t{}", m.score, m.record.path);
            }
        }
    }
    Ok(())
}
