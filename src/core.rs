//! 中继核心模块 - 显式持有的日志中继服务
//!
//! 一个 LogRelay 实例拥有完整的生命周期（start/stop/reload），不依赖
//! 全局状态。每次 start 构建一代新的（配置, 工作线程, 处理器），reload
//! 整体替换，绝不对运行中的一代做局部修改。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::buffer::LogBuffer;
use crate::config::{LogRecord, RelayConfig};
use crate::worker::{LogWorker, SinkStatus, WorkerState};

/// 未配置时的缓冲区容量，start 时按配置调整
const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// 中继状态快照
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// 工作线程状态
    pub state: WorkerState,
    /// 当前排队的记录数
    pub queue_depth: usize,
    /// 因溢出被驱逐的记录总数
    pub queue_dropped: u64,
    /// 文件输出路径状态
    pub file: SinkStatus,
    /// syslog 输出路径状态
    pub syslog: SinkStatus,
    /// 当前生效的配置
    pub config: Option<Arc<RelayConfig>>,
}

/// 日志中继 - 生产者唯一的入口
pub struct LogRelay {
    buffer: Arc<LogBuffer>,
    worker: Mutex<Option<LogWorker>>,
    active_config: ArcSwapOption<RelayConfig>,
    accepting: AtomicBool,
}

impl LogRelay {
    /// 创建尚未启动的中继
    ///
    /// 未启动时 submit 依旧入队（容量内），待 start 后统一冲刷
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(LogBuffer::new(DEFAULT_BUFFER_CAPACITY)),
            worker: Mutex::new(None),
            active_config: ArcSwapOption::const_empty(),
            accepting: AtomicBool::new(true),
        }
    }

    /// 提交一行原始文本
    ///
    /// 常数时间、永不阻塞、永不失败。空白行被忽略；中继被配置为禁用时
    /// 为空操作
    pub fn submit(&self, text: &str) {
        if !self.accepting.load(Ordering::Relaxed) {
            return;
        }
        let line = text.trim();
        if line.is_empty() {
            return;
        }
        self.buffer.push(LogRecord::new(line));
    }

    /// 以给定配置启动一代新的管道
    ///
    /// 配置校验失败同步返回错误；已在运行时拒绝（请用 reload）
    pub fn start(&self, config: RelayConfig) -> Result<(), String> {
        config.validate()?;

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err("中继已在运行，请先 stop() 或改用 reload()".to_string());
        }

        self.accepting.store(config.enabled, Ordering::Relaxed);
        if !config.enabled {
            // 总开关关闭：只记录配置回显，不启动工作线程
            self.active_config.store(Some(Arc::new(config)));
            return Ok(());
        }

        self.buffer.set_capacity(config.buffer_max_size);
        let config = Arc::new(config);
        *worker = Some(LogWorker::spawn(config.clone(), self.buffer.clone()));
        self.active_config.store(Some(config));
        Ok(())
    }

    /// 停止当前一代：有限期的最终排空、刷新并关闭处理器
    ///
    /// 幂等：对已停止的中继调用是空操作
    pub fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.shutdown();
        }
    }

    /// 以新配置整体重建管道
    ///
    /// 先校验再停止：配置无效时当前一代不受影响继续运行
    pub fn reload(&self, config: RelayConfig) -> Result<(), String> {
        config.validate()?;
        self.stop();
        self.start(config)
    }

    /// 请求运行中的工作线程立即排空并刷新
    pub fn flush(&self) {
        if let Some(worker) = self.worker.lock().as_ref() {
            worker.flush();
        }
    }

    /// 当前状态快照：状态、队列深度、每个输出路径的计数与最近错误、配置回显
    pub fn status(&self) -> StatusSnapshot {
        let config = self.active_config.load_full();
        let file_enabled = config
            .as_ref()
            .map(|c| c.file_logging_enabled)
            .unwrap_or(false);
        let syslog_enabled = config.as_ref().map(|c| c.syslog_enabled).unwrap_or(false);

        let worker = self.worker.lock();
        let (state, file, syslog) = match worker.as_ref() {
            Some(worker) => (
                worker.state(),
                worker.stats().file.snapshot(file_enabled),
                worker.stats().udp.snapshot(syslog_enabled),
            ),
            None => (
                WorkerState::Stopped,
                SinkStatus {
                    enabled: file_enabled,
                    ..SinkStatus::default()
                },
                SinkStatus {
                    enabled: syslog_enabled,
                    ..SinkStatus::default()
                },
            ),
        };

        StatusSnapshot {
            state,
            queue_depth: self.buffer.len(),
            queue_dropped: self.buffer.dropped(),
            file,
            syslog,
            config,
        }
    }
}

impl Default for LogRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogRelay {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_before_start_queues() {
        let relay = LogRelay::new();
        relay.submit("queued before start");
        relay.submit("   ");
        relay.submit("");

        // 空白行被忽略，有效行在队列中等待下一次 start
        assert_eq!(relay.status().queue_depth, 1);
        assert_eq!(relay.status().state, WorkerState::Stopped);
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let relay = LogRelay::new();
        let mut config = RelayConfig::default();
        config.buffer_max_size = 0;
        assert!(relay.start(config).is_err());
        assert_eq!(relay.status().state, WorkerState::Stopped);
    }

    #[test]
    fn test_disabled_config_is_noop() {
        let relay = LogRelay::new();
        let mut config = RelayConfig::default();
        config.enabled = false;
        relay.start(config).unwrap();

        relay.submit("dropped silently");
        assert_eq!(relay.status().queue_depth, 0);
        assert_eq!(relay.status().state, WorkerState::Stopped);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let relay = LogRelay::new();
        relay.stop();
        relay.stop();
        assert_eq!(relay.status().state, WorkerState::Stopped);
    }
}
