//! UDP syslog 处理器 - 发后即忘
//!
//! 每条记录编码为一个 syslog 数据报发出，不等待确认（协议层不存在确认），
//! 不做同步重试：失败的数据报就此丢失，下个周期的新消息自然构成重试。
//! 任何网络错误只通过返回值交给工作线程计数，绝不影响调用方。

use std::io;
use std::sync::Arc;
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;

use crate::handler::{HandlerType, LogProcessor};
use crate::config::{LogRecord, RelayConfig, Severity};
use crate::syslog::{self, SyslogCodec};

/// UDP连接池
///
/// 按目标地址缓存已连接的套接字；发送失败时将其驱逐，
/// 下次发送重新绑定并重新解析地址
pub struct UdpConnectionPool {
    connections: DashMap<String, Arc<UdpSocket>>,
    runtime: Runtime,
}

impl UdpConnectionPool {
    /// 创建新的连接池
    pub fn new() -> Result<Self, String> {
        let runtime = Runtime::new().map_err(|e| format!("无法创建 tokio 运行时: {}", e))?;
        Ok(Self {
            connections: DashMap::new(),
            runtime,
        })
    }

    /// 获取或创建UDP连接
    async fn get_connection(&self, addr: &str) -> io::Result<Arc<UdpSocket>> {
        if let Some(socket) = self.connections.get(addr) {
            return Ok(socket.clone());
        }

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;
        let socket = Arc::new(socket);
        self.connections.insert(addr.to_string(), socket.clone());
        Ok(socket)
    }

    /// 发送数据
    async fn send_data(&self, addr: &str, data: &[u8]) -> io::Result<()> {
        let socket = self.get_connection(addr).await?;
        socket.send(data).await?;
        Ok(())
    }

    /// 驱逐指定地址的缓存连接
    fn evict(&self, addr: &str) {
        self.connections.remove(addr);
    }

    /// 清理连接
    fn cleanup(&self) {
        self.connections.clear();
    }
}

/// UDP syslog 处理器
pub struct UdpProcessor {
    pool: UdpConnectionPool,
    addr: String,
    facility: u8,
    app_name: String,
    hostname: String,
    pid: u32,
}

impl UdpProcessor {
    /// 创建新的UDP处理器
    ///
    /// 运行时创建失败会返回错误，调用方据此将 syslog 转发降级，
    /// 文件日志不受影响
    pub fn new(config: &RelayConfig) -> Result<Self, String> {
        Ok(Self {
            pool: UdpConnectionPool::new()?,
            addr: format!("{}:{}", config.syslog_host, config.syslog_port),
            facility: config.syslog_facility,
            app_name: config.syslog_app_name.clone(),
            hostname: syslog::local_hostname().to_string(),
            pid: std::process::id(),
        })
    }
}

impl LogProcessor for UdpProcessor {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn kind(&self) -> HandlerType {
        HandlerType::Udp
    }

    fn process(&mut self, record: &LogRecord, severity: Severity) -> Result<(), String> {
        let datagram = SyslogCodec::encode_record(
            record,
            severity,
            self.facility,
            &self.hostname,
            &self.app_name,
            self.pid,
        );

        let result = self
            .pool
            .runtime
            .block_on(self.pool.send_data(&self.addr, &datagram));

        if let Err(e) = result {
            self.pool.evict(&self.addr);
            return Err(format!("UDP 发送失败 {}: {}", self.addr, e));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), String> {
        // UDP 无缓冲，无需刷新
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), String> {
        self.pool.cleanup();
        Ok(())
    }
}
