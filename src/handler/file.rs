//! 文件日志处理器 - 按大小轮转的追加写入
//!
//! 单次写入前先判断投影大小（当前偏移 + 待写字节），会越界则先轮转：
//! 备份链逐位后移（.N 被删除，.k 改名 .k+1），当前文件改名为 .1，
//! 再打开新的空文件。只有大小触发轮转，跨天不触发。

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use chrono::Local;

use crate::handler::{HandlerType, LogProcessor};
use crate::config::{LogRecord, RelayConfig, Severity};

/// 文件日志处理器
///
/// writer 为 None 表示上一次轮转/打开失败，下一次写入会尝试重新打开
pub struct FileProcessor {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    max_size: u64,
    backup_count: usize,
}

impl FileProcessor {
    /// 建立日志目录并打开当前日志文件
    ///
    /// {date} 占位符在此处解析一次，之后的写入不再重算
    pub fn new(config: &RelayConfig) -> Result<Self, String> {
        fs::create_dir_all(&config.log_directory)
            .map_err(|e| format!("无法创建日志目录 {}: {}", config.log_directory.display(), e))?;

        let filename = resolve_filename(&config.filename_pattern);
        let path = config.log_directory.join(filename);
        let (writer, current_size) = open_current(&path)?;

        Ok(Self {
            path,
            writer: Some(writer),
            current_size,
            max_size: config.max_file_size,
            backup_count: config.backup_count,
        })
    }

    /// 当前日志文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 格式化一行输出：`时间戳 - 级别 - 消息`
    fn format_line(record: &LogRecord, severity: Severity) -> String {
        format!(
            "{} - {} - {}\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            severity,
            record.raw_message
        )
    }

    /// 备份链后移并重新打开空的当前文件
    ///
    /// 先关闭当前句柄再改名，避免对打开中的文件做重命名
    fn rotate(&mut self) -> Result<(), String> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| format!("轮转前刷新失败 {}: {}", self.path.display(), e))?;
        }
        self.writer = None;

        if self.backup_count == 0 {
            // 无备份链时直接清掉当前文件
            fs::remove_file(&self.path)
                .map_err(|e| format!("无法删除日志文件 {}: {}", self.path.display(), e))?;
        } else {
            let oldest = backup_path(&self.path, self.backup_count);
            if oldest.exists() {
                fs::remove_file(&oldest)
                    .map_err(|e| format!("无法删除最旧备份 {}: {}", oldest.display(), e))?;
            }
            for index in (1..self.backup_count).rev() {
                let source = backup_path(&self.path, index);
                if source.exists() {
                    let target = backup_path(&self.path, index + 1);
                    fs::rename(&source, &target)
                        .map_err(|e| format!("无法后移备份 {}: {}", source.display(), e))?;
                }
            }
            fs::rename(&self.path, backup_path(&self.path, 1))
                .map_err(|e| format!("无法归档当前文件 {}: {}", self.path.display(), e))?;
        }

        let (writer, current_size) = open_current(&self.path)?;
        self.writer = Some(writer);
        self.current_size = current_size;
        Ok(())
    }
}

impl LogProcessor for FileProcessor {
    fn name(&self) -> &'static str {
        "file"
    }

    fn kind(&self) -> HandlerType {
        HandlerType::File
    }

    fn process(&mut self, record: &LogRecord, severity: Severity) -> Result<(), String> {
        // 上一次失败后句柄缺失：尝试重新打开，失败则本次写入报错计数
        if self.writer.is_none() {
            let (writer, current_size) = open_current(&self.path)?;
            self.writer = Some(writer);
            self.current_size = current_size;
        }

        let line = Self::format_line(record, severity);
        let pending = line.len() as u64;

        // 投影大小严格超过上限才轮转，恰好等于不轮转。
        // 空文件不轮转：单条超限记录直接写入，避免产生空备份。
        if self.current_size > 0 && self.current_size + pending > self.max_size {
            self.rotate()?;
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| format!("日志文件未打开: {}", self.path.display()))?;
        writer
            .write_all(line.as_bytes())
            .map_err(|e| format!("写入日志文件失败 {}: {}", self.path.display(), e))?;
        self.current_size += pending;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), String> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| format!("刷新日志文件失败 {}: {}", self.path.display(), e))?;
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), String> {
        self.flush()?;
        self.writer = None;
        Ok(())
    }
}

/// 以追加模式打开当前文件并读出已有偏移
fn open_current(path: &Path) -> Result<(BufWriter<File>, u64), String> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("无法打开日志文件 {}: {}", path.display(), e))?;
    let size = file
        .metadata()
        .map_err(|e| format!("无法读取日志文件元数据 {}: {}", path.display(), e))?
        .len();
    Ok((BufWriter::new(file), size))
}

/// 解析文件名模式中的 {date} 占位符
fn resolve_filename(pattern: &str) -> String {
    let date = Local::now().format("%Y%m%d").to_string();
    pattern.replace("{date}", &date)
}

/// 第 index 个备份的路径：基础文件名加 `.index` 后缀
fn backup_path(base: &Path, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_filename_date_token() {
        let resolved = resolve_filename("console_{date}.log");
        assert!(resolved.starts_with("console_"));
        assert!(resolved.ends_with(".log"));
        assert!(!resolved.contains("{date}"));
        // %Y%m%d 固定 8 位数字
        let digits = &resolved["console_".len()..resolved.len() - ".log".len()];
        assert_eq!(digits.len(), 8);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_backup_path_suffix() {
        let base = PathBuf::from("/tmp/console.log");
        assert_eq!(backup_path(&base, 1), PathBuf::from("/tmp/console.log.1"));
        assert_eq!(backup_path(&base, 12), PathBuf::from("/tmp/console.log.12"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let mut config = RelayConfig::default();
        // 以普通文件作为父目录，create_dir_all 必然失败
        config.log_directory = PathBuf::from("/dev/null/logs");
        assert!(FileProcessor::new(&config).is_err());
    }
}
