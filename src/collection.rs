use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use log::{debug, warn};

use crate::error::CollectionError;
use crate::record::ImageRecord;

/// 以 JSON Lines 格式保存的图片集合，每行一条 [`ImageRecord`]
#[derive(Debug, Clone, Default)]
pub struct Collection {
    records: Vec<ImageRecord>,
    /// 无法解析而被忽略的行数
    skipped_lines: usize,
}

impl Collection {
    /// 读取集合文件，文件不存在时返回空集合
    ///
    /// 无法解析的行会被忽略，只有记录级别的检查留给搜索时处理。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CollectionError> {
        let path = path.as_ref();
        let io_err = |source| CollectionError::Io { path: path.to_path_buf(), source };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("collection {} does not exist yet", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(io_err(e)),
        };

        let mut collection = Self::default();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ImageRecord>(&line) {
                Ok(record) => collection.records.push(record),
                Err(e) => {
                    warn!("{}:{}: ignoring malformed record: {}", path.display(), i + 1, e);
                    collection.skipped_lines += 1;
                }
            }
        }
        debug!("loaded {} records from {}", collection.records.len(), path.display());
        Ok(collection)
    }

    /// 追加记录到集合文件，必要时创建目录
    pub fn append(path: impl AsRef<Path>, records: &[ImageRecord]) -> Result<(), CollectionError> {
        let path = path.as_ref();
        let io_err = |source| CollectionError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|source| CollectionError::Serialize { id: record.id.clone(), source })?;
            writeln!(writer, "{line}").map_err(io_err)?;
        }
        writer.flush().map_err(io_err)
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// 下一个可用的数字 ID
    pub fn next_id(&self) -> u64 {
        self.records.iter().filter_map(|r| r.id.parse::<u64>().ok()).max().map_or(1, |id| id + 1)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.records.iter().any(|r| r.path == path)
    }

    pub fn push(&mut self, record: ImageRecord) {
        self.records.push(record);
    }
}
