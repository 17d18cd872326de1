//! 日志处理器模块

use crate::config::{LogRecord, Severity};

/// 处理器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    File,
    Udp,
}

/// 日志处理器 trait - 各个处理器实现具体的处理逻辑
///
/// 处理器只被工作线程持有和驱动，错误通过返回值上报给工作线程计数，
/// 绝不向外传播
pub trait LogProcessor: Send + 'static {
    /// 处理器名称
    fn name(&self) -> &'static str;

    /// 处理器类型
    fn kind(&self) -> HandlerType;

    /// 处理单条日志记录
    fn process(&mut self, record: &LogRecord, severity: Severity) -> Result<(), String>;

    /// 刷新操作
    fn flush(&mut self) -> Result<(), String>;

    /// 清理资源
    fn cleanup(&mut self) -> Result<(), String>;
}

pub mod file;
pub mod udp;

pub use file::FileProcessor;
pub use udp::UdpProcessor;
