//! Subscriber setup for the binary.
//!
//! Console output goes to stderr at `logging.level` (`RUST_LOG` wins when
//! set). With `logging.file` on, every run also writes a plain-text DEBUG log
//! to `paths.log_dir/logs_<YYYYmmdd_HHMMSS>_<case>.log`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::Settings;

/// Crate logs at DEBUG, dependencies at INFO.
const FILE_FILTER: &str = "info,evidex=debug";

/// Installs the global subscriber and returns the log file path, if any.
///
/// Calling this twice keeps the first subscriber.
pub fn init_logging(settings: &Settings) -> io::Result<Option<PathBuf>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let (file_layer, log_path) = if settings.logging.file {
        let path = log_file_path(&settings.paths.log_dir, &settings.case_name, Local::now());
        let file = open_log_file(&path)?;
        let layer = fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .with_filter(EnvFilter::new(FILE_FILTER));
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(log_path)
}

/// `<log_dir>/logs_<YYYYmmdd_HHMMSS>_<case>.log`
pub fn log_file_path(log_dir: &Path, case_name: &str, at: DateTime<Local>) -> PathBuf {
    let case: String = case_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    log_dir.join(format!("logs_{}_{case}.log", at.format("%Y%m%d_%H%M%S")))
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}
