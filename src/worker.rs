//! 日志工作线程 - 周期性排空缓冲区并分发到各处理器
//!
//! 状态机：Stopped → Running → Stopping → Stopped，不跳转。
//! 停止是协作式的：只在迭代边界检查停止信号，收到后做一次有限期的
//! 最终排空（已入队的记录不被静默丢弃），再刷新并清理处理器。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use crossbeam_channel::{Sender, Receiver, RecvTimeoutError, unbounded};
use parking_lot::Mutex;

use crate::buffer::LogBuffer;
use crate::classify;
use crate::config::RelayConfig;
use crate::handler::{FileProcessor, HandlerType, LogProcessor, UdpProcessor};

/// 单次排空的批量上限
pub const MAX_DRAIN_BATCH: usize = 512;

/// 关闭时最终排空的时限
const SHUTDOWN_FLUSH_DEADLINE: Duration = Duration::from_secs(2);

/// 工作线程命令
enum WorkerCommand {
    /// 立即排空并刷新处理器
    Flush,
    /// 停止工作线程
    Shutdown,
}

/// 工作线程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
    Stopping,
}

impl WorkerState {
    const fn as_u8(self) -> u8 {
        match self {
            WorkerState::Stopped => 0,
            WorkerState::Running => 1,
            WorkerState::Stopping => 2,
        }
    }

    const fn from_u8(value: u8) -> WorkerState {
        match value {
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Stopped => f.write_str("stopped"),
            WorkerState::Running => f.write_str("running"),
            WorkerState::Stopping => f.write_str("stopping"),
        }
    }
}

/// 单个处理器的计数器
#[derive(Default)]
pub struct SinkCounters {
    processed: AtomicU64,
    errors: AtomicU64,
    degraded: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl SinkCounters {
    fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, message: String) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(message);
    }

    fn mark_degraded(&self, message: String) {
        self.degraded.store(true, Ordering::Relaxed);
        self.record_failure(message);
    }

    /// 生成带启用标记的状态快照
    pub fn snapshot(&self, enabled: bool) -> SinkStatus {
        SinkStatus {
            enabled,
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

/// 单个处理器的状态快照
#[derive(Debug, Clone, Default)]
pub struct SinkStatus {
    pub enabled: bool,
    pub processed: u64,
    pub errors: u64,
    pub degraded: bool,
    pub last_error: Option<String>,
}

/// 管道统计 - 工作线程吞掉的一切错误都在这里汇总
#[derive(Default)]
pub struct PipelineStats {
    pub file: SinkCounters,
    pub udp: SinkCounters,
}

impl PipelineStats {
    fn counters(&self, kind: HandlerType) -> &SinkCounters {
        match kind {
            HandlerType::File => &self.file,
            HandlerType::Udp => &self.udp,
        }
    }
}

/// 日志工作线程句柄
pub struct LogWorker {
    sender: Sender<WorkerCommand>,
    worker_thread: Option<thread::JoinHandle<()>>,
    state: Arc<AtomicU8>,
    stats: Arc<PipelineStats>,
}

impl LogWorker {
    /// 构建处理器并启动工作线程
    ///
    /// 单个处理器构建失败只降级对应的输出路径，另一条路径与
    /// 工作线程本身照常运行
    pub fn spawn(config: Arc<RelayConfig>, buffer: Arc<LogBuffer>) -> Self {
        let stats = Arc::new(PipelineStats::default());
        let mut handlers: Vec<Box<dyn LogProcessor>> = Vec::new();

        if config.file_logging_enabled {
            match FileProcessor::new(&config) {
                Ok(processor) => handlers.push(Box::new(processor)),
                Err(e) => {
                    stats.file.mark_degraded(e.clone());
                    eprintln!("文件处理器初始化失败: {}", e);
                }
            }
        }

        if config.syslog_enabled {
            match UdpProcessor::new(&config) {
                Ok(processor) => handlers.push(Box::new(processor)),
                Err(e) => {
                    stats.udp.mark_degraded(e.clone());
                    eprintln!("UDP处理器初始化失败: {}", e);
                }
            }
        }

        let (sender, receiver) = unbounded();
        let state = Arc::new(AtomicU8::new(WorkerState::Running.as_u8()));

        let worker_thread = {
            let config = config.clone();
            let state = state.clone();
            let stats = stats.clone();
            thread::spawn(move || {
                Self::worker_loop(handlers, buffer, config, stats, state, receiver);
            })
        };

        Self {
            sender,
            worker_thread: Some(worker_thread),
            state,
            stats,
        }
    }

    /// 工作线程主循环
    fn worker_loop(
        mut handlers: Vec<Box<dyn LogProcessor>>,
        buffer: Arc<LogBuffer>,
        config: Arc<RelayConfig>,
        stats: Arc<PipelineStats>,
        state: Arc<AtomicU8>,
        receiver: Receiver<WorkerCommand>,
    ) {
        let interval = Duration::from_secs_f64(config.processing_interval_secs);

        loop {
            match receiver.recv_timeout(interval) {
                // 周期到点：排空一批
                Err(RecvTimeoutError::Timeout) => {
                    Self::drain_once(&mut handlers, &buffer, &config, &stats);
                }

                Ok(WorkerCommand::Flush) => {
                    Self::drain_once(&mut handlers, &buffer, &config, &stats);
                    for handler in &mut handlers {
                        if let Err(e) = handler.flush() {
                            stats.counters(handler.kind()).record_failure(e);
                        }
                    }
                }

                Ok(WorkerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    state.store(WorkerState::Stopping.as_u8(), Ordering::SeqCst);

                    // 有限期的最终排空：清掉已入队的记录，超时则放弃剩余
                    let deadline = Instant::now() + SHUTDOWN_FLUSH_DEADLINE;
                    while !buffer.is_empty() && Instant::now() < deadline {
                        Self::drain_once(&mut handlers, &buffer, &config, &stats);
                    }

                    for handler in &mut handlers {
                        if let Err(e) = handler.flush() {
                            stats.counters(handler.kind()).record_failure(e);
                        }
                        if let Err(e) = handler.cleanup() {
                            stats.counters(handler.kind()).record_failure(e);
                        }
                    }
                    break;
                }
            }
        }

        state.store(WorkerState::Stopped.as_u8(), Ordering::SeqCst);
    }

    /// 排空一批记录：分类、按最低级别过滤、独立分发给每个处理器
    fn drain_once(
        handlers: &mut [Box<dyn LogProcessor>],
        buffer: &LogBuffer,
        config: &RelayConfig,
        stats: &PipelineStats,
    ) {
        for record in buffer.drain(MAX_DRAIN_BATCH) {
            let severity = record
                .severity
                .unwrap_or_else(|| classify::classify(&record.raw_message));

            if severity < config.min_severity {
                continue;
            }

            // 处理器之间互不影响：一个失败只计数，不阻断另一个
            for handler in handlers.iter_mut() {
                match handler.process(&record, severity) {
                    Ok(()) => stats.counters(handler.kind()).record_success(),
                    Err(e) => stats.counters(handler.kind()).record_failure(e),
                }
            }
        }
    }

    /// 当前状态
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// 管道统计
    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// 请求立即排空并刷新
    pub fn flush(&self) {
        let _ = self.sender.send(WorkerCommand::Flush);
    }

    /// 发送停止命令并等待工作线程结束
    pub fn shutdown(mut self) {
        let _ = self.sender.send(WorkerCommand::Shutdown);
        if let Some(thread) = self.worker_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for LogWorker {
    fn drop(&mut self) {
        // 发送停止命令
        let _ = self.sender.send(WorkerCommand::Shutdown);

        // 等待工作线程结束
        if let Some(thread) = self.worker_thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogRecord, Severity};

    /// 测试处理器
    struct TestProcessor {
        kind: HandlerType,
        processed: Arc<Mutex<Vec<(String, Severity)>>>,
        fail: bool,
    }

    impl LogProcessor for TestProcessor {
        fn name(&self) -> &'static str {
            "test"
        }

        fn kind(&self) -> HandlerType {
            self.kind
        }

        fn process(&mut self, record: &LogRecord, severity: Severity) -> Result<(), String> {
            if self.fail {
                return Err("模拟失败".to_string());
            }
            self.processed.lock().push((record.raw_message.clone(), severity));
            Ok(())
        }

        fn flush(&mut self) -> Result<(), String> {
            Ok(())
        }

        fn cleanup(&mut self) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn test_drain_filters_by_min_severity() {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let mut handlers: Vec<Box<dyn LogProcessor>> = vec![Box::new(TestProcessor {
            kind: HandlerType::File,
            processed: processed.clone(),
            fail: false,
        })];

        let mut config = RelayConfig::default();
        config.min_severity = Severity::Error;
        let buffer = LogBuffer::new(16);
        buffer.push(LogRecord::new("ERROR: broken"));
        buffer.push(LogRecord::new("just info"));
        buffer.push(LogRecord::new("CRITICAL: very broken"));

        let stats = PipelineStats::default();
        LogWorker::drain_once(&mut handlers, &buffer, &config, &stats);

        let seen = processed.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("ERROR: broken".to_string(), Severity::Error));
        assert_eq!(seen[1], ("CRITICAL: very broken".to_string(), Severity::Critical));
    }

    #[test]
    fn test_handler_failure_does_not_skip_others() {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let mut handlers: Vec<Box<dyn LogProcessor>> = vec![
            Box::new(TestProcessor {
                kind: HandlerType::Udp,
                processed: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            }),
            Box::new(TestProcessor {
                kind: HandlerType::File,
                processed: processed.clone(),
                fail: false,
            }),
        ];

        let config = RelayConfig::default();
        let buffer = LogBuffer::new(16);
        buffer.push(LogRecord::new("WARNING: disk space low"));

        let stats = PipelineStats::default();
        LogWorker::drain_once(&mut handlers, &buffer, &config, &stats);

        // 失败只计入统计，另一个处理器照常收到记录
        assert_eq!(stats.udp.snapshot(true).errors, 1);
        assert_eq!(stats.file.snapshot(true).processed, 1);
        assert_eq!(processed.lock().len(), 1);
    }

    #[test]
    fn test_pretagged_severity_wins_over_classifier() {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let mut handlers: Vec<Box<dyn LogProcessor>> = vec![Box::new(TestProcessor {
            kind: HandlerType::File,
            processed: processed.clone(),
            fail: false,
        })];

        let config = RelayConfig::default();
        let buffer = LogBuffer::new(16);
        // 文本看起来像 error，但提交方已标记为 Debug
        buffer.push(LogRecord::with_severity("error-shaped text", Severity::Debug));

        let stats = PipelineStats::default();
        LogWorker::drain_once(&mut handlers, &buffer, &config, &stats);

        assert_eq!(processed.lock()[0].1, Severity::Debug);
    }
}
