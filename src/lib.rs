//! relay_logger - 故障安全的控制台日志中继
//!
//! 捕获外部生产者（如编辑器控制台）的原始文本行，按严重级别分类后
//! 同时转发到按大小轮转的本地文件和远端 UDP syslog 服务器。
//!
//! 设计约束：submit 永不阻塞生产者；网络与文件系统故障在各自的输出
//! 路径内就地消化，只计数、不传播；缓冲区写满时驱逐最旧记录换取
//! 有界内存。
//!
//! # 使用示例
//!
//! ```no_run
//! use relay_logger::{LogRelay, RelayConfig};
//!
//! let relay = LogRelay::new();
//! relay.start(RelayConfig::default()).expect("配置无效");
//!
//! relay.submit("plugin loaded");
//! relay.submit("ERROR: failed to index project");
//!
//! let status = relay.status();
//! println!("队列深度: {}", status.queue_depth);
//! relay.stop();
//! ```

pub mod config;
pub mod classify;
pub mod syslog;
pub mod buffer;
pub mod handler;
pub mod worker;
pub mod core;

// 重新导出主要类型
pub use crate::core::{LogRelay, StatusSnapshot};
pub use config::{LogRecord, RelayConfig, Severity};
pub use classify::classify;
pub use syslog::{SyslogCodec, SyslogFrame, FACILITY_USER};
pub use buffer::LogBuffer;
pub use handler::{FileProcessor, HandlerType, LogProcessor, UdpProcessor};
pub use worker::{LogWorker, SinkStatus, WorkerState};
