//! # Loggers
//!
//! Installs the process-wide `tracing` subscriber: a console layer plus a
//! non-blocking file layer under a log directory.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Sets up console and file logging for `app_name`.
///
/// `level` is an `EnvFilter` directive (`"info"`, `"lib_runtime=debug"`, ...);
/// `RUST_LOG` takes precedence when set. Keep the returned guard alive for
/// the lifetime of the process or buffered file output is lost.
pub fn setup_logging(log_dir: &Path, level: &str, app_name: &str) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    // Clean up old log files, keeping only the most recent one
    cleanup_old_logs(log_dir, app_name)?;

    let log_file_name = format!(
        "{}_{}.log",
        app_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let file_appender = tracing_appender::rolling::never(log_dir, log_file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;

    Ok(guard)
}

/// Deletes every `<app_name>_*.log` file in `log_dir` except the newest.
/// Returns the paths that were removed.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}_", app_name);
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| {
            let path = e.path();
            path.extension().is_some_and(|ext| ext == "log")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect();

    // Newest first; unreadable timestamps sort last
    entries.sort_by_key(|e| {
        std::cmp::Reverse(e.metadata().and_then(|m| m.modified()).ok())
    });

    let mut removed = Vec::new();
    for entry in entries.iter().skip(1) {
        match fs::remove_file(entry.path()) {
            Ok(()) => removed.push(entry.path()),
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", entry.path(), e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let file = File::create(dir.join(name)).unwrap();
        let modified = SystemTime::now() - Duration::from_secs(age_secs);
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn keeps_only_the_newest_log_of_the_app() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pipeline_2026-01-01_00-00-00.log", 300);
        touch(dir.path(), "pipeline_2026-01-02_00-00-00.log", 200);
        touch(dir.path(), "pipeline_2026-01-03_00-00-00.log", 100);
        touch(dir.path(), "other_2026-01-01_00-00-00.log", 500);
        touch(dir.path(), "pipeline_notes.txt", 500);

        let removed = cleanup_old_logs(dir.path(), "pipeline").unwrap();
        assert_eq!(removed.len(), 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "other_2026-01-01_00-00-00.log",
                "pipeline_2026-01-03_00-00-00.log",
                "pipeline_notes.txt",
            ]
        );
    }

    #[test]
    fn setup_creates_the_directory_and_a_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = setup_logging(&log_dir, "debug", "lib_runtime_test").unwrap();
        tracing::info!("logger ready");
        drop(guard);

        let files: Vec<_> = fs::read_dir(&log_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
