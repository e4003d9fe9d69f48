use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressIterator};
use log::info;
use rayon::prelude::*;
use regex::Regex;
use tokio::task::block_in_place;
use walkdir::WalkDir;

use crate::cli::SubCommandExtend;
use crate::collection::Collection;
use crate::config::Opts;
use crate::record::ImageRecord;
use crate::utils::{self, FEATURES_EXT, pb_style};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// 特征文件所在目录，也可以是单个特征文件
    ///
    /// 每个 `<图片>.features` 保存一行整体特征，同名的 `<图片>.faces` 保存人脸检测器的输出
    pub path: PathBuf,
    /// 扫描的特征文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = FEATURES_EXT)]
    pub suffix: String,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let re_suf = format!("(?i)^({})$", self.suffix.replace(',', "|"));
        let re_suf = Regex::new(&re_suf).with_context(|| format!("无效的后缀: {}", self.suffix))?;

        let collection_path = opts.conf_dir.collection();
        let collection = block_in_place(|| Collection::load(&collection_path))?;

        let entries = scan_features(&self.path, &re_suf);

        let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());
        let parsed = block_in_place(|| {
            entries
                .par_iter()
                .progress_with(pb.clone())
                .map(|entry| (entry, utils::read_descriptors(entry)))
                .collect::<Vec<_>>()
        });

        let mut next_id = collection.next_id();
        let mut records = Vec::with_capacity(parsed.len());
        for (entry, result) in parsed {
            let (vector, faces) = match result {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    pb.println(format!("读取特征失败: {e:#}"));
                    continue;
                }
            };
            let path = utils::image_path(entry).to_string_lossy().to_string();
            let added = records.iter().any(|r: &ImageRecord| r.path == path);
            if added || collection.contains_path(&path) {
                pb.set_message(format!("跳过图片: {}", path));
                continue;
            }
            records.push(ImageRecord::new(next_id.to_string(), path, Some(vector), faces));
            next_id += 1;
        }

        block_in_place(|| Collection::append(&collection_path, &records))?;

        pb.finish_with_message("图片添加完成");
        info!("添加 {} 张图片，集合中共 {} 张", records.len(), collection.len() + records.len());

        Ok(())
    }
}

/// 扫描目录下所有符合后缀的特征文件，按路径排序
fn scan_features(path: &Path, re_suf: &Regex) -> Vec<PathBuf> {
    info!("开始扫描目录: {}", path.display());
    let pb = ProgressBar::no_length().with_style(pb_style());
    let mut entries = WalkDir::new(path)
        .into_iter()
        .progress_with(pb)
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let ext = path.extension()?;
            (path.is_file() && re_suf.is_match(&ext.to_string_lossy())).then(|| path.to_path_buf())
        })
        .collect::<Vec<_>>();
    entries.sort();
    info!("扫描完成，共 {} 个特征文件", entries.len());
    entries
}
