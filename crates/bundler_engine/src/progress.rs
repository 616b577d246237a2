use engine_logging::{engine_info, engine_trace, engine_warn};

use crate::{EngineEvent, JobOutcome};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Reports job completions as `[i/n]` log lines; byte progress goes to trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Progress(progress) => {
                engine_trace!(
                    "job {} {:?} bytes={:?}",
                    progress.job_id,
                    progress.stage,
                    progress.bytes
                );
            }
            EngineEvent::JobCompleted {
                job_id,
                total,
                label,
                result,
            } => match result {
                Ok(JobOutcome::Written { bytes }) => {
                    engine_info!("[{}/{}] done: {} ({} bytes)", job_id, total, label, bytes);
                }
                Ok(JobOutcome::Skipped) => {
                    engine_info!("[{}/{}] skipped: {}", job_id, total, label);
                }
                Err(message) => {
                    engine_warn!("[{}/{}] failed: {}: {}", job_id, total, label, message);
                }
            },
        }
    }
}
