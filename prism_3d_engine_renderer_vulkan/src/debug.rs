/// Vulkan Debug Messenger - validation layer messages with colored output
///
/// The callback filters by severity and category, counts what it shows,
/// groups repeated messages and writes them to stderr and/or a log file.
/// Only installed when the crate is built with `vulkan-validation`.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Global debug configuration (shared across callbacks)
static DEBUG_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Identical messages are grouped by text
static MESSAGE_TRACKER: Mutex<Option<MessageTracker>> = Mutex::new(None);

/// Which severities reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Debug configuration for the callback
#[derive(Debug, Clone)]
pub struct Config {
    pub severity: ValidationSeverity,
    /// Also append plain-text messages to this file
    pub log_file: Option<PathBuf>,
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
    pub enable_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            severity: ValidationSeverity::ErrorsAndWarnings,
            log_file: None,
            show_general: true,
            show_validation: true,
            show_performance: true,
            enable_stats: true,
        }
    }
}

/// Counts of messages shown since the configuration was installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn count(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct MessageTracker {
    messages: FxHashMap<String, u32>,
}

impl MessageTracker {
    /// Occurrences of `message` so far, this one included
    fn track_message(&mut self, message: &str) -> u32 {
        let count = self.messages.entry(message.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn repeated(&self) -> usize {
        self.messages.values().filter(|&&count| count > 1).count()
    }
}

/// Install the callback configuration and reset the statistics
pub fn init_debug_config(config: Config) {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(MessageTracker::default());
    }
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = Some(config);
    }
}

/// Whether a configuration has been installed
pub(crate) fn has_debug_config() -> bool {
    DEBUG_CONFIG.lock().map(|config| config.is_some()).unwrap_or(false)
}

/// Severity of the installed configuration, the default when none is
pub(crate) fn current_severity() -> ValidationSeverity {
    DEBUG_CONFIG
        .lock()
        .ok()
        .and_then(|config| config.as_ref().map(|config| config.severity))
        .unwrap_or(Config::default().severity)
}

/// Drop the configuration; later messages are ignored
pub(crate) fn cleanup_debug_config() {
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = None;
    }
}

pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        let repeated = tracker.as_ref().map(MessageTracker::repeated).unwrap_or(0);
        if repeated > 0 {
            println!("\n  {} message(s) appeared multiple times", repeated);
        }
    }
    println!("{}\n", "====================================".bright_blue().bold());
}

fn passes_severity(config: &Config, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    match config.severity {
        ValidationSeverity::ErrorsOnly => severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
        ValidationSeverity::ErrorsAndWarnings => {
            severity.intersects(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING)
        }
        ValidationSeverity::All => true,
    }
}

fn category(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn passes_category(config: &Config, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> bool {
    match category(message_type) {
        "Validation" => config.show_validation,
        "Performance" => config.show_performance,
        _ => config.show_general,
    }
}

fn severity_label(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> &'static str {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        "ERROR"
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        "WARNING"
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        "INFO"
    } else {
        "VERBOSE"
    }
}

/// Plain-text form written to the log file
fn file_line(severity: &str, category: &str, repeat: u32, message_id: &str, message: &str) -> String {
    let repeat = if repeat > 1 { format!(" [x{}]", repeat) } else { String::new() };
    format!("[VULKAN {}] [{}]{}\n  ├─ Message ID: {}\n  └─ {}\n", severity, category, repeat, message_id, message)
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Vulkan debug messenger callback
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let config = match DEBUG_CONFIG.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(config) => config.clone(),
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };
    if !passes_severity(&config, message_severity) || !passes_category(&config, message_type) {
        return vk::FALSE;
    }

    let callback_data = &*p_callback_data;
    let message_id = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let mut occurrences = 1;
    if config.enable_stats {
        VALIDATION_STATS.count(message_severity);
        if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
            occurrences = tracker.get_or_insert_with(MessageTracker::default).track_message(&message);
        }
    }

    let severity = severity_label(message_severity);
    let severity_colored = match severity {
        "ERROR" => severity.red().bold(),
        "WARNING" => severity.yellow().bold(),
        "INFO" => severity.cyan(),
        _ => severity.bright_black(),
    };
    let category = category(message_type);
    let repeat = if occurrences > 1 { format!(" [x{}]", occurrences) } else { String::new() };

    eprint!(
        "{} {} [{}]{}\n  ├─ {}: {}\n  └─ {}\n",
        "[VULKAN".bright_blue().bold(),
        format!("{}]", severity_colored).bright_blue().bold(),
        category.bright_black(),
        repeat.yellow(),
        "Message ID".bright_black(),
        message_id.white(),
        message.white()
    );

    if let Some(path) = &config.log_file {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", file_line(severity, category, occurrences, &message_id, &message));
        }
    }

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
