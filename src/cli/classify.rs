use std::path::PathBuf;

use clap::Parser;
use tokio::task::block_in_place;

use crate::category::CategoryScheme;
use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat};
use crate::utils::read_descriptors;

#[derive(Parser, Debug, Clone)]
pub struct ClassifyCommand {
    /// 图片的特征文件，同名的 .faces 文件存在时有人脸的图片判定为 HUMAN
    pub features: PathBuf,
    /// 分类方案
    #[arg(long, value_enum, default_value_t = CategoryScheme::Bands)]
    pub scheme: CategoryScheme,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ClassifyCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let (vector, faces) = block_in_place(|| read_descriptors(&self.features))?;
        let category = self.scheme.classify(&vector, !faces.is_empty());

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&category)?),
            OutputFormat::Table => match category.subtype {
                Some(subtype) => {
                    println!("{}\t{:.2}\t{}", category.label, category.confidence, subtype)
                }
                None => println!("{}\t{:.2}", category.label, category.confidence),
            },
        }
        Ok(())
    }
}
