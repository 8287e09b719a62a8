use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "docstore.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (trace, debug, info, warn, error, or `target=level` lists)
    pub level: String,
    /// Write to stderr
    pub console: bool,
    /// Also write to a rolling file in this directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub rotation: LogRotation,
    /// JSON lines instead of the human-readable format
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            directory: None,
            rotation: LogRotation::Daily,
            json: false,
        }
    }
}

impl LogConfig {
    /// Set the log directory (enables file output)
    pub fn with_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.directory = Some(dir.into());
        self
    }

    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Env filter for the configured level, `info` if it does not parse
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as file logging is needed;
/// dropping it flushes and stops the background writer.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = config.env_filter();

    let (file_writer, guard) = match config.directory {
        Some(ref dir) => {
            ensure_log_dir(dir)?;
            let appender = match config.rotation {
                LogRotation::Daily => rolling::daily(dir, LOG_FILE_NAME),
                LogRotation::Hourly => rolling::hourly(dir, LOG_FILE_NAME),
                LogRotation::Never => rolling::never(dir, LOG_FILE_NAME),
            };
            let (writer, guard) = non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Neither console nor file: warnings still go to stderr
    let installed = match (config.console, file_writer, config.json) {
        (true, Some(file), false) => builder.with_writer(std::io::stderr.and(file)).try_init(),
        (true, Some(file), true) => builder
            .json()
            .with_writer(std::io::stderr.and(file))
            .try_init(),
        (false, Some(file), false) => builder.with_ansi(false).with_writer(file).try_init(),
        (false, Some(file), true) => builder.json().with_writer(file).try_init(),
        (true, None, false) => builder.with_writer(std::io::stderr).try_init(),
        (true, None, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, None, _) => tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    tracing::info!(
        level = %config.level,
        console = config.console,
        directory = ?config.directory,
        "Logging initialized"
    );

    Ok(guard)
}

fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let config = LogConfig::default()
            .with_level("docstore=debug")
            .with_console(false)
            .with_rotation(LogRotation::Never)
            .with_log_dir("/tmp/docstore-logs");

        assert_eq!(config.level, "docstore=debug");
        assert!(!config.console);
        assert_eq!(config.rotation, LogRotation::Never);
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/docstore-logs")));
    }

    #[test]
    fn test_init_logging_creates_directory_and_rejects_second_init() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("logs");
        let config = LogConfig::default()
            .with_console(false)
            .with_rotation(LogRotation::Never)
            .with_log_dir(&dir);

        let guard = init_logging(&config).unwrap();
        assert!(guard.is_some());
        assert!(dir.exists());

        assert!(init_logging(&LogConfig::default()).is_err());
    }
}
