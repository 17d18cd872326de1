//! 严重级别分类器
//!
//! 对原始文本行做大小写不敏感的关键字扫描，按紧急程度从高到低逐档匹配，
//! 第一个命中的档位即为结果。同时包含 "warning" 和 "critical" 的行
//! 归为 Critical。纯函数，无 I/O。

use crate::config::Severity;

/// Critical 档关键字（含宿主进程中止措辞）
const CRITICAL_MARKERS: &[&str] = &["CRITICAL", "FATAL", "PANIC"];

/// Error 档关键字
const ERROR_MARKERS: &[&str] = &["ERROR", "EXCEPTION", "TRACEBACK"];

/// Warning 档关键字（"WARN" 同时覆盖 "WARNING"）
const WARNING_MARKERS: &[&str] = &["WARN"];

/// Debug 档关键字
const DEBUG_MARKERS: &[&str] = &["DEBUG"];

/// 对一行文本分类严重级别
pub fn classify(text: &str) -> Severity {
    let upper = text.to_uppercase();

    if contains_any(&upper, CRITICAL_MARKERS) {
        Severity::Critical
    } else if contains_any(&upper, ERROR_MARKERS) {
        Severity::Error
    } else if contains_any(&upper, WARNING_MARKERS) {
        Severity::Warning
    } else if contains_any(&upper, DEBUG_MARKERS) {
        Severity::Debug
    } else {
        Severity::Info
    }
}

fn contains_any(upper: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| upper.contains(marker))
}
