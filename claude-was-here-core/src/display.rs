use std::io::IsTerminal;

use colored::Colorize;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// Stderr verbosity ladder; quiet wins over verbose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Info,
    Debug,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

struct DisplayState {
    verbosity: Verbosity,
}

static STATE: Lazy<Mutex<DisplayState>> = Lazy::new(|| {
    Mutex::new(DisplayState {
        verbosity: Verbosity::Normal,
    })
});

/// Configure the process-wide logger. ANSI sequences are disabled when stderr
/// is not a TTY or the caller passed `--no-ansi`.
pub fn init(verbosity: Verbosity, no_ansi: bool) {
    if no_ansi || !std::io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
    STATE.lock().verbosity = verbosity;
}

pub fn verbosity() -> Verbosity {
    STATE.lock().verbosity
}

fn enabled(level: LogLevel) -> bool {
    let verbosity = verbosity();
    match level {
        LogLevel::Error => true,
        LogLevel::Warn => verbosity >= Verbosity::Normal,
        LogLevel::Info => verbosity >= Verbosity::Info,
        LogLevel::Debug => verbosity >= Verbosity::Debug,
    }
}

pub fn log(level: LogLevel, message: &str) {
    if !enabled(level) {
        return;
    }

    match level {
        LogLevel::Error => eprintln!("{} {message}", "error:".red().bold()),
        LogLevel::Warn => eprintln!("{} {message}", "warning:".yellow()),
        LogLevel::Info => eprintln!("{message}"),
        LogLevel::Debug => eprintln!("{} {message}", "debug:".dimmed()),
    }
}

pub fn error(message: &str) {
    log(LogLevel::Error, message);
}

pub fn warn(message: &str) {
    log(LogLevel::Warn, message);
}

pub fn info(message: &str) {
    log(LogLevel::Info, message);
}

pub fn debug(message: &str) {
    log(LogLevel::Debug, message);
}
