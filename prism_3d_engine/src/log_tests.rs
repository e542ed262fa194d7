//! Unit tests for log.rs

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, MemoryLogger};
use crate::prism3d::Engine;
use serial_test::serial;
use std::time::SystemTime;

fn entry(severity: LogSeverity, message: &str) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "prism3d::test".to_string(),
        message: message.to_string(),
        file: None,
        line: None,
    }
}

// ============================================================================
// LOG SEVERITY
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace, LogSeverity::Debug, LogSeverity::Info,
        LogSeverity::Warn, LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Warn.label(), "WARN ");
}

// ============================================================================
// DEFAULT LOGGER
// ============================================================================

#[test]
fn test_default_logger_min_severity() {
    let logger = DefaultLogger::new(LogSeverity::Warn);
    assert_eq!(logger.min_severity(), LogSeverity::Warn);
    // Below threshold: silently dropped
    logger.log(&entry(LogSeverity::Debug, "hidden"));
    // At threshold: printed
    logger.log(&entry(LogSeverity::Error, "shown"));
}

#[test]
fn test_default_logger_with_file_line() {
    let logger = DefaultLogger::default();
    let mut e = entry(LogSeverity::Error, "compile failed");
    e.file = Some("shader.rs");
    e.line = Some(42);
    logger.log(&e);
}

// ============================================================================
// MEMORY LOGGER
// ============================================================================

#[test]
fn test_memory_logger_collects_entries() {
    let logger = MemoryLogger::new();
    logger.log(&entry(LogSeverity::Info, "one"));
    logger.log(&entry(LogSeverity::Warn, "two"));
    logger.log(&entry(LogSeverity::Warn, "three"));

    assert_eq!(logger.entries().len(), 3);
    assert_eq!(logger.count_at(LogSeverity::Warn), 2);
    assert!(logger.contains("thr"));
    assert!(!logger.contains("four"));

    logger.clear();
    assert!(logger.entries().is_empty());
}

#[test]
fn test_memory_logger_clones_share_storage() {
    let logger = MemoryLogger::new();
    let clone = logger.clone();
    clone.log(&entry(LogSeverity::Info, "shared"));
    assert!(logger.contains("shared"));
}

// ============================================================================
// MACROS THROUGH THE GLOBAL LOGGER
// ============================================================================

#[test]
#[serial]
fn test_macros_route_through_engine_logger() {
    let logger = MemoryLogger::new();
    Engine::set_logger(logger.clone());

    crate::engine_trace!("prism3d::test", "t {}", 1);
    crate::engine_debug!("prism3d::test", "d {}", 2);
    crate::engine_info!("prism3d::test", "i {}", 3);
    crate::engine_warn!("prism3d::test", "w {}", 4);
    crate::engine_error!("prism3d::test", "e {}", 5);

    let entries = logger.entries_from("prism3d::test");
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].severity, LogSeverity::Trace);
    assert_eq!(entries[3].message, "w 4");
    assert_eq!(entries[4].source, "prism3d::test");
    assert!(entries[4].line.is_some());
    assert!(entries[2].file.is_none());

    Engine::reset_logger();
}
