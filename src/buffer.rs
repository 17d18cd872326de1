//! 有界日志缓冲区 - 生产者与工作线程之间唯一的共享结构
//!
//! push 永不阻塞、永不失败：写满时先驱逐最旧的一条再放入新记录
//! （偏向保留最新数据，便于实时排障）。溢出不是错误，只计数。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;

use crate::config::LogRecord;

struct BufferInner {
    queue: VecDeque<LogRecord>,
    capacity: usize,
}

/// 线程安全的有界 FIFO 缓冲区
pub struct LogBuffer {
    inner: Mutex<BufferInner>,
    dropped: AtomicU64,
}

impl LogBuffer {
    /// 创建指定容量的缓冲区
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BufferInner {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
            }),
            dropped: AtomicU64::new(0),
        }
    }

    /// 放入一条记录，写满时驱逐最旧的一条
    pub fn push(&self, record: LogRecord) {
        let mut inner = self.inner.lock();
        if inner.queue.len() >= inner.capacity {
            inner.queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        inner.queue.push_back(record);
    }

    /// 按先进先出顺序取出至多 max 条记录
    pub fn drain(&self, max: usize) -> Vec<LogRecord> {
        let mut inner = self.inner.lock();
        let count = inner.queue.len().min(max);
        inner.queue.drain(..count).collect()
    }

    /// 调整容量，缩小时驱逐最旧的记录
    pub fn set_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        let mut inner = self.inner.lock();
        inner.capacity = capacity;
        while inner.queue.len() > capacity {
            inner.queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 当前排队的记录数
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// 缓冲区是否为空
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// 因溢出被驱逐的记录总数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
