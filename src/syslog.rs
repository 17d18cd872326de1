//! syslog 数据报编解码工具
//!
//! 按 `<PRI>timestamp hostname app[pid]: LEVEL - message` 格式组包，
//! PRI = facility * 8 + 级别。编码是纯变换，绝不失败：不可编码的
//! 控制字符被替换，超长消息按字符边界截断以保持在典型 MTU 之内。

use once_cell::sync::Lazy;

use crate::config::{LogRecord, Severity};

/// user-level 消息的 facility 编码
pub const FACILITY_USER: u8 = 1;

/// 数据报大小上限（字节），留出典型以太网 MTU 的余量
pub const MAX_DATAGRAM_BYTES: usize = 1400;

/// 本机主机名，进程内解析一次
static HOSTNAME: Lazy<String> = Lazy::new(|| {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .map(|name| sanitize_token(name.trim()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
});

/// 获取缓存的本机主机名
pub fn local_hostname() -> &'static str {
    HOSTNAME.as_str()
}

/// 解码后的 syslog 数据报
#[derive(Debug, Clone)]
pub struct SyslogFrame {
    pub facility: u8,
    pub severity: Severity,
    pub timestamp: String,
    pub hostname: String,
    pub app_name: String,
    pub pid: u32,
    pub message: String,
}

/// syslog 数据报编解码器
pub struct SyslogCodec;

impl SyslogCodec {
    /// 将日志记录编码为 syslog 数据报
    pub fn encode_record(
        record: &LogRecord,
        severity: Severity,
        facility: u8,
        hostname: &str,
        app_name: &str,
        pid: u32,
    ) -> Vec<u8> {
        let pri = (facility as u16) * 8 + severity.to_syslog_level() as u16;
        let timestamp = record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f%:z");
        let header = format!(
            "<{}>{} {} {}[{}]: {} - ",
            pri,
            timestamp,
            sanitize_token(hostname),
            sanitize_token(app_name),
            pid,
            severity
        );

        let message = sanitize_message(&record.raw_message);
        let budget = MAX_DATAGRAM_BYTES.saturating_sub(header.len());
        let message = truncate_at_char_boundary(&message, budget);

        let mut datagram = header.into_bytes();
        datagram.extend_from_slice(message.as_bytes());
        datagram
    }

    /// 解码 syslog 数据报，还原 facility、级别、标签与消息正文
    pub fn decode_datagram(data: &[u8]) -> Result<SyslogFrame, String> {
        let text = String::from_utf8_lossy(data);

        let rest = text
            .strip_prefix('<')
            .ok_or_else(|| "数据报缺少 PRI 起始符".to_string())?;
        let (pri_text, rest) = rest
            .split_once('>')
            .ok_or_else(|| "数据报缺少 PRI 结束符".to_string())?;
        let pri: u16 = pri_text
            .parse()
            .map_err(|_| format!("无效的 PRI 值: {}", pri_text))?;
        if pri >= 24 * 8 {
            return Err(format!("PRI 值超出范围: {}", pri));
        }
        let facility = (pri / 8) as u8;
        let level = (pri % 8) as u8;

        let mut parts = rest.splitn(4, ' ');
        let timestamp = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or_else(|| "数据报缺少时间戳".to_string())?;
        let hostname = parts
            .next()
            .ok_or_else(|| "数据报缺少主机名".to_string())?;
        let tag = parts
            .next()
            .ok_or_else(|| "数据报缺少应用标签".to_string())?;
        let body = parts
            .next()
            .ok_or_else(|| "数据报缺少消息正文".to_string())?;

        let tag = tag
            .strip_suffix(':')
            .ok_or_else(|| format!("应用标签缺少结束冒号: {}", tag))?;
        let (app_name, pid_text) = tag
            .split_once('[')
            .ok_or_else(|| format!("应用标签缺少进程号: {}", tag))?;
        let pid: u32 = pid_text
            .strip_suffix(']')
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| format!("无效的进程号: {}", pid_text))?;

        // 正文格式为 "LEVEL - message"，级别标签缺失时回退到 PRI 里的数值级别
        let (severity, message) = match body.split_once(" - ") {
            Some((label, message)) => (
                Severity::from_label(label).unwrap_or(Severity::from_syslog_level(level)),
                message,
            ),
            None => (Severity::from_syslog_level(level), body),
        };

        Ok(SyslogFrame {
            facility,
            severity,
            timestamp: timestamp.to_string(),
            hostname: hostname.to_string(),
            app_name: app_name.to_string(),
            pid,
            message: message.to_string(),
        })
    }
}

/// 清洗头部字段：空白与控制字符替换为 '-'，保证字段不破坏分隔结构
fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .map(|c| {
            if c.is_whitespace() || c.is_control() || c == '[' || c == ']' {
                '-'
            } else {
                c
            }
        })
        .collect()
}

/// 清洗消息正文：换行等控制字符替换为空格，数据报必须是单行
fn sanitize_message(message: &str) -> String {
    message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// 按字符边界截断，绝不切断多字节字符
fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = 0;
    for (index, c) in text.char_indices() {
        let next = index + c.len_utf8();
        if next > max_bytes {
            break;
        }
        end = next;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SEVERITIES: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    #[test]
    fn test_encode_decode_roundtrip() {
        for severity in ALL_SEVERITIES {
            let record = LogRecord::new("plugin host answered in 3ms");
            let datagram =
                SyslogCodec::encode_record(&record, severity, FACILITY_USER, "build-host", "ConsoleRelay", 4242);
            let frame = SyslogCodec::decode_datagram(&datagram).unwrap();

            assert_eq!(frame.severity, severity);
            assert_eq!(frame.message, "plugin host answered in 3ms");
            assert_eq!(frame.facility, FACILITY_USER);
            assert_eq!(frame.hostname, "build-host");
            assert_eq!(frame.app_name, "ConsoleRelay");
            assert_eq!(frame.pid, 4242);
        }
    }

    #[test]
    fn test_pri_encoding() {
        let record = LogRecord::new("boom");
        let datagram = SyslogCodec::encode_record(&record, Severity::Error, 3, "host", "app", 1);
        // PRI = 3 * 8 + 3 = 27
        assert!(datagram.starts_with(b"<27>"));
    }

    #[test]
    fn test_control_characters_replaced() {
        let record = LogRecord::new("line one\nline two\ttabbed");
        let datagram =
            SyslogCodec::encode_record(&record, Severity::Info, FACILITY_USER, "host", "app", 1);
        let frame = SyslogCodec::decode_datagram(&datagram).unwrap();
        assert_eq!(frame.message, "line one line two tabbed");
    }

    #[test]
    fn test_oversized_message_truncated() {
        let record = LogRecord::new("x".repeat(4 * MAX_DATAGRAM_BYTES));
        let datagram =
            SyslogCodec::encode_record(&record, Severity::Info, FACILITY_USER, "host", "app", 1);
        assert!(datagram.len() <= MAX_DATAGRAM_BYTES);
        // 截断后仍是可解码的合法数据报
        assert!(SyslogCodec::decode_datagram(&datagram).is_ok());
    }

    #[test]
    fn test_multibyte_truncation_keeps_char_boundary() {
        let record = LogRecord::new("级".repeat(MAX_DATAGRAM_BYTES));
        let datagram =
            SyslogCodec::encode_record(&record, Severity::Info, FACILITY_USER, "host", "app", 1);
        assert!(datagram.len() <= MAX_DATAGRAM_BYTES);
        assert!(std::str::from_utf8(&datagram).is_ok());
    }

    #[test]
    fn test_malformed_datagrams_rejected() {
        assert!(SyslogCodec::decode_datagram(b"no pri here").is_err());
        assert!(SyslogCodec::decode_datagram(b"<999>too big").is_err());
        assert!(SyslogCodec::decode_datagram(b"<13>only-timestamp").is_err());
    }
}
