//! Logging setup and a progress sink that writes to the log.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use log::{LevelFilter, debug, info, warn};
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use crate::progress::{ProgressEvent, ProgressSink};
use crate::scheduler::{JobId, JobStatus};

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {m}{n}";

/// Routes log output to stderr and to `log_file`.
///
/// Creates the log file's directory if needed. Fails if a logger is
/// already installed.
pub fn init_file_logging(log_file: &Path, log_level: LevelFilter) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(log_file)?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;

    Ok(())
}

/// Progress sink that logs events.
///
/// Job progress is throttled to every 10% plus the 25/50/75 milestones so
/// long streaming jobs do not flood the log.
#[derive(Debug, Default)]
pub struct LogProgressSink {
    last_logged: Mutex<HashMap<JobId, u8>>,
}

impl LogProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn should_log(&self, job_id: JobId, percent: u8) -> bool {
        let Ok(mut last_logged) = self.last_logged.lock() else {
            return false;
        };
        let should_log = match last_logged.get(&job_id) {
            None => true,
            Some(&last) => {
                percent == 100
                    || percent >= last.saturating_add(10)
                    || ([25, 50, 75].contains(&percent) && percent > last)
            }
        };
        if should_log {
            last_logged.insert(job_id, percent);
        }
        should_log
    }

    fn forget(&self, job_id: JobId) {
        if let Ok(mut last_logged) = self.last_logged.lock() {
            last_logged.remove(&job_id);
        }
    }
}

impl ProgressSink for LogProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::JobStarted {
                job_id,
                name,
                category,
                method,
            } => info!("{job_id} started: {name} ({category}) with '{method}'"),
            ProgressEvent::JobProgress { job_id, percent } => {
                if self.should_log(job_id, percent) {
                    info!("{job_id} progress: {percent}%");
                }
            }
            ProgressEvent::JobFinished { job_id, status } => {
                self.forget(job_id);
                match status {
                    JobStatus::Completed => debug!("{job_id} finished"),
                    JobStatus::Failed => warn!("{job_id} failed"),
                    JobStatus::Cancelled => info!("{job_id} cancelled"),
                }
            }
            ProgressEvent::BatchProgress {
                completed,
                total,
                percent,
            } => info!("Batch progress: {completed}/{total} jobs ({percent}%)"),
            ProgressEvent::StateChanged { job_id, state } => debug!("{job_id} is now {state:?}"),
            ProgressEvent::Warning { job_id, warning } => warn!("{job_id}: {warning}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_throttling() {
        let sink = LogProgressSink::new();
        let job = JobId(1);
        assert!(sink.should_log(job, 0));
        assert!(!sink.should_log(job, 4));
        assert!(sink.should_log(job, 10));
        assert!(!sink.should_log(job, 19));
        assert!(sink.should_log(job, 25));
        assert!(!sink.should_log(job, 26));
        assert!(sink.should_log(job, 100));
    }

    #[test]
    fn test_finished_job_forgotten() {
        let sink = LogProgressSink::new();
        let job = JobId(3);
        assert!(sink.should_log(job, 40));
        sink.on_event(ProgressEvent::JobFinished {
            job_id: job,
            status: JobStatus::Completed,
        });
        assert!(sink.should_log(job, 41));
    }

    #[test]
    fn test_init_file_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("logs").join("squash.log");
        // A logger may already be installed by another test; only the
        // directory creation is guaranteed.
        let _ = init_file_logging(&log_file, LevelFilter::Debug);
        assert!(log_file.parent().unwrap().is_dir());
    }
}
