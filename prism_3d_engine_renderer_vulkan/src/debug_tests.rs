//! Unit tests for debug.rs (no GPU required)

use super::*;

const ERROR: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
const WARNING: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
const INFO: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::INFO;

fn config(severity: ValidationSeverity) -> Config {
    Config { severity, ..Config::default() }
}

#[test]
fn test_severity_filter() {
    let errors = config(ValidationSeverity::ErrorsOnly);
    assert!(passes_severity(&errors, ERROR));
    assert!(!passes_severity(&errors, WARNING));

    let default = Config::default();
    assert!(passes_severity(&default, WARNING));
    assert!(!passes_severity(&default, INFO));

    assert!(passes_severity(&config(ValidationSeverity::All), INFO));
}

#[test]
fn test_category_filter() {
    let config = Config { show_performance: false, ..Config::default() };
    assert!(passes_category(&config, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
    assert!(!passes_category(&config, vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE));
    assert!(passes_category(&config, vk::DebugUtilsMessageTypeFlagsEXT::GENERAL));
    assert_eq!(category(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL), "General");
}

#[test]
fn test_repeated_messages_are_grouped() {
    let mut tracker = MessageTracker::default();
    assert_eq!(tracker.track_message("layout mismatch"), 1);
    assert_eq!(tracker.track_message("layout mismatch"), 2);
    assert_eq!(tracker.track_message("missing barrier"), 1);
    assert_eq!(tracker.repeated(), 1);
}

#[test]
fn test_file_line_marks_repeats() {
    let first = file_line("ERROR", "Validation", 1, "VUID-1", "bad layout");
    assert!(first.starts_with("[VULKAN ERROR] [Validation]\n"));
    assert!(first.contains("Message ID: VUID-1"));

    let third = file_line("WARNING", "Performance", 3, "VUID-2", "slow path");
    assert!(third.starts_with("[VULKAN WARNING] [Performance] [x3]\n"));
}

#[test]
fn test_stats_count_by_severity() {
    let tracker = ValidationStatsTracker::new();
    tracker.count(ERROR);
    tracker.count(WARNING);
    tracker.count(WARNING);
    tracker.count(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE);

    let stats = tracker.get_stats();
    assert_eq!(stats, ValidationStats { errors: 1, warnings: 2, info: 0, verbose: 1 });
    assert_eq!(stats.total(), 4);

    tracker.reset();
    assert_eq!(tracker.get_stats().total(), 0);
}
