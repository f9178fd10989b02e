use std::fmt;
use std::sync::Arc;

/// Named origin attached to every log event a binder emits, so output from
/// several models sharing one subscriber can be told apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogSource {
    name: Arc<str>,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSource {
    pub const DEFAULT_NAME: &'static str = "default";

    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let source = &*self.name;
        match level {
            LogLevel::Trace => tracing::trace!(source, "{}", message),
            LogLevel::Debug => tracing::debug!(source, "{}", message),
            LogLevel::Info => tracing::info!(source, "{}", message),
            LogLevel::Warn => tracing::warn!(source, "{}", message),
            LogLevel::Error => tracing::error!(source, "{}", message),
        }
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl Default for LogSource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Returns `log`, or the default source with a warning when none was given.
pub(crate) fn resolve(log: Option<&LogSource>, context: &str) -> LogSource {
    match log {
        Some(log) => log.clone(),
        None => {
            let fallback = LogSource::default();
            fallback.warn(&format!("No log source given for {context}, using '{}'", fallback));
            fallback
        }
    }
}
