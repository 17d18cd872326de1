//! 配置模块

use serde::{Serialize, Deserialize};
use std::path::PathBuf;
use chrono::{DateTime, Local};

/// 日志严重级别，按紧急程度升序排列
///
/// 派生的 `Ord` 依赖变体声明顺序：Debug < Info < Warning < Error < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// 获取级别标签
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// 转换为 syslog 协议数值级别（RFC 5424 Severity）
    pub const fn to_syslog_level(&self) -> u8 {
        match self {
            Severity::Debug => 7,
            Severity::Info => 6,
            Severity::Warning => 4,
            Severity::Error => 3,
            Severity::Critical => 2,
        }
    }

    /// 从 syslog 数值级别还原，未映射的级别归入 Info
    pub const fn from_syslog_level(level: u8) -> Severity {
        match level {
            0 | 1 | 2 => Severity::Critical,
            3 => Severity::Error,
            4 | 5 => Severity::Warning,
            7 => Severity::Debug,
            _ => Severity::Info,
        }
    }

    /// 从级别标签解析
    pub fn from_label(label: &str) -> Option<Severity> {
        match label {
            "DEBUG" => Some(Severity::Debug),
            "INFO" => Some(Severity::Info),
            "WARNING" => Some(Severity::Warning),
            "ERROR" => Some(Severity::Error),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志记录 - 提交时创建，之后不再修改
///
/// severity 为 None 时由工作线程在分发前惰性分类
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub raw_message: String,
    pub severity: Option<Severity>,
}

impl LogRecord {
    /// 以当前时间创建未分类的记录
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            timestamp: Local::now(),
            raw_message: message.into(),
            severity: None,
        }
    }

    /// 以当前时间创建已标记级别的记录
    pub fn with_severity<S: Into<String>>(message: S, severity: Severity) -> Self {
        Self {
            timestamp: Local::now(),
            raw_message: message.into(),
            severity: Some(severity),
        }
    }
}

/// 中继配置 - 每一代加载一次，运行期间不可变
///
/// 重载时整体替换，不对运行中的字段做局部修改
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 总开关
    pub enabled: bool,
    /// 是否启用文件日志
    pub file_logging_enabled: bool,
    /// 日志目录
    pub log_directory: PathBuf,
    /// 文件名模式，支持 {date} 占位符（建立文件时解析一次，不随写入重算）
    pub filename_pattern: String,
    /// 单个日志文件的大小上限（字节）
    pub max_file_size: u64,
    /// 备份文件数量（.1 .. .N）
    pub backup_count: usize,
    /// 是否启用 syslog 转发
    pub syslog_enabled: bool,
    /// syslog 服务器地址
    pub syslog_host: String,
    /// syslog 服务器端口
    pub syslog_port: u16,
    /// syslog facility 编码（0-23）
    pub syslog_facility: u8,
    /// syslog 标签中的应用名
    pub syslog_app_name: String,
    /// 最低记录级别，低于该级别的记录被丢弃
    pub min_severity: Severity,
    /// 缓冲区容量（条数），写满后驱逐最旧记录
    pub buffer_max_size: usize,
    /// 工作线程排空间隔（秒）
    pub processing_interval_secs: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_logging_enabled: true,
            log_directory: PathBuf::from("./logs"),
            filename_pattern: "console_{date}.log".to_string(),
            max_file_size: 10 * 1024 * 1024, // 10MB
            backup_count: 5,
            syslog_enabled: false,
            syslog_host: "127.0.0.1".to_string(),
            syslog_port: 514,
            syslog_facility: crate::syslog::FACILITY_USER,
            syslog_app_name: "ConsoleRelay".to_string(),
            min_severity: Severity::Debug,
            buffer_max_size: 10_000,
            processing_interval_secs: 0.1,
        }
    }
}

impl RelayConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        // 验证缓冲区容量
        if self.buffer_max_size == 0 {
            return Err("配置错误: 缓冲区容量不能为 0".to_string());
        }

        // 验证文件大小上限
        if self.max_file_size == 0 {
            return Err("配置错误: 文件大小上限不能为 0".to_string());
        }

        // 验证文件名模式
        if self.filename_pattern.trim().is_empty() {
            return Err("配置错误: 文件名模式不能为空".to_string());
        }

        // 验证 facility 范围
        if self.syslog_facility > 23 {
            return Err(format!(
                "配置错误: syslog facility 必须在 0-23 之间 (当前为 {})",
                self.syslog_facility
            ));
        }

        // 验证排空间隔
        if !self.processing_interval_secs.is_finite() || self.processing_interval_secs <= 0.0 {
            return Err("配置错误: 排空间隔必须为正数".to_string());
        }
        if self.processing_interval_secs > 60.0 {
            return Err("配置错误: 排空间隔过长 (最大 60秒)".to_string());
        }

        // 验证 syslog 地址
        if self.syslog_enabled && self.syslog_host.trim().is_empty() {
            return Err("配置错误: 启用 syslog 时服务器地址不能为空".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_severity_syslog_mapping() {
        assert_eq!(Severity::Debug.to_syslog_level(), 7);
        assert_eq!(Severity::Info.to_syslog_level(), 6);
        assert_eq!(Severity::Warning.to_syslog_level(), 4);
        assert_eq!(Severity::Error.to_syslog_level(), 3);
        assert_eq!(Severity::Critical.to_syslog_level(), 2);

        for severity in [
            Severity::Debug,
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
        ] {
            assert_eq!(Severity::from_syslog_level(severity.to_syslog_level()), severity);
        }
    }

    #[test]
    fn test_severity_label_roundtrip() {
        for severity in [
            Severity::Debug,
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
        ] {
            assert_eq!(Severity::from_label(severity.as_str()), Some(severity));
        }
        assert_eq!(Severity::from_label("VERBOSE"), None);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = RelayConfig::default();
        config.buffer_max_size = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.max_file_size = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.syslog_facility = 24;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.processing_interval_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.filename_pattern = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
