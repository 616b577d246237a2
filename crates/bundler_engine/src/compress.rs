//! Compression stage: shell out to Ghostscript for every merged file, with a
//! single aggressive pass for outputs that are still too large.
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bundler_core::{CompressOutcome, CompressSummary, CompressionJob, QualityProfile, RetryPolicy};
use engine_logging::{engine_debug, engine_info, engine_warn};
use serde::Deserialize;
use tokio::process::Command;

use crate::inputs::scan_pdfs;
use crate::persist::{ensure_output_dir, PersistError, StagedFile};
use crate::pool::run_pool;
use crate::progress::ProgressSink;
use crate::settings::duration_secs;
use crate::{EngineEvent, JobId, JobOutcome, JobProgress, Stage, StageError};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressSettings {
    /// `None` picks `min(available_parallelism, 4)`.
    pub workers: Option<usize>,
    pub program: PathBuf,
    /// Upper bound for a single Ghostscript run.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Copy the input unchanged when compressing it fails.
    pub keep_original_on_failure: bool,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            workers: None,
            program: PathBuf::from("gs"),
            timeout: Duration::from_secs(600),
            retry: RetryPolicy::default(),
            keep_original_on_failure: false,
        }
    }
}

impl CompressSettings {
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("compressor failed (exit code {}): {stderr}", exit_code(.code))]
    ExitStatus { code: Option<i32>, stderr: String },
    #[error("compressor produced no output at {path}")]
    MissingOutput { path: PathBuf },
    #[error("compressor timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

impl From<PersistError> for CompressionError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Io(err) => CompressionError::Io(err),
            other => CompressionError::Io(io::Error::other(other.to_string())),
        }
    }
}

/// Rewrites `input` into `output` at the given quality.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        profile: QualityProfile,
    ) -> Result<(), CompressionError>;
}

/// Runs the Ghostscript `pdfwrite` device as a child process.
#[derive(Debug, Clone)]
pub struct GhostscriptCompressor {
    program: PathBuf,
    timeout: Duration,
}

impl GhostscriptCompressor {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &CompressSettings) -> Self {
        Self::new(settings.program.clone(), settings.timeout)
    }
}

/// Command line for one Ghostscript run.
pub fn ghostscript_args(profile: QualityProfile, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-sDEVICE=pdfwrite".into(),
        "-dCompatibilityLevel=1.4".into(),
    ];
    match profile {
        QualityProfile::Aggressive => {
            let dpi = profile.image_dpi();
            args.push("-dPDFSETTINGS=/screen".into());
            for kind in ["Color", "Gray", "Mono"] {
                args.push(format!("-d{kind}ImageResolution={dpi}").into());
                args.push(format!("-dDownsample{kind}Images=true").into());
            }
            args.push("-dColorConversionStrategy=/Gray".into());
            args.push("-dDetectDuplicateImages=true".into());
            args.push("-dCompressFonts=true".into());
        }
        preset => args.push(format!("-dPDFSETTINGS=/{}", preset.name()).into()),
    }
    args.extend(["-dNOPAUSE", "-dQUIET", "-dBATCH"].map(OsString::from));

    let mut target = OsString::from("-sOutputFile=");
    target.push(output);
    args.push(target);
    args.push(input.into());
    args
}

#[async_trait]
impl Compressor for GhostscriptCompressor {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        profile: QualityProfile,
    ) -> Result<(), CompressionError> {
        let child = Command::new(&self.program)
            .args(ghostscript_args(profile, input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompressionError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let finished = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CompressionError::Timeout {
                seconds: self.timeout.as_secs(),
            })??;

        if !finished.status.success() {
            return Err(CompressionError::ExitStatus {
                code: finished.status.code(),
                stderr: String::from_utf8_lossy(&finished.stderr).trim().to_string(),
            });
        }
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(CompressionError::MissingOutput {
                path: output.to_path_buf(),
            }),
        }
    }
}

/// Compression pool: one job per PDF in the input directory, written under
/// the same file name in the output directory.
pub struct CompressionPool {
    compressor: Arc<dyn Compressor>,
    sink: Arc<dyn ProgressSink>,
    workers: usize,
    retry: RetryPolicy,
    keep_original_on_failure: bool,
}

impl CompressionPool {
    pub fn new(
        compressor: Arc<dyn Compressor>,
        sink: Arc<dyn ProgressSink>,
        settings: &CompressSettings,
    ) -> Self {
        Self {
            compressor,
            sink,
            workers: settings.workers(),
            retry: settings.retry,
            keep_original_on_failure: settings.keep_original_on_failure,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn compress_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        profile: QualityProfile,
    ) -> Result<CompressSummary, StageError> {
        let found = scan_pdfs(input_dir)?;
        if found.is_empty() {
            engine_warn!("No PDF files found in {}", input_dir.display());
            return Ok(CompressSummary::default());
        }
        ensure_output_dir(output_dir)?;

        let jobs: Vec<CompressionJob> = found
            .iter()
            .filter_map(|pdf| pdf.path())
            .filter_map(|input| {
                let name = input.file_name()?;
                Some(CompressionJob::new(
                    input,
                    output_dir.join(name),
                    profile,
                    self.retry,
                ))
            })
            .collect();
        engine_info!(
            "Compressing {} PDF files from {} at {} quality with {} workers",
            jobs.len(),
            input_dir.display(),
            profile,
            self.workers
        );

        let total = jobs.len();
        let compressor = Arc::clone(&self.compressor);
        let sink = Arc::clone(&self.sink);
        let keep_original = self.keep_original_on_failure;
        let outcomes = run_pool(jobs, self.workers, move |job_id, job| {
            let compressor = Arc::clone(&compressor);
            let sink = Arc::clone(&sink);
            async move {
                compress_one(
                    compressor.as_ref(),
                    sink.as_ref(),
                    job_id,
                    total,
                    job,
                    keep_original,
                )
                .await
            }
        })
        .await?;

        let summary: CompressSummary = outcomes.into_iter().collect();
        engine_info!(
            "Compressed {} files ({} retried, {} failed): {:.2}MB -> {:.2}MB",
            summary.compressed,
            summary.retried,
            summary.failed,
            summary.bytes_in as f64 / MIB,
            summary.bytes_out as f64 / MIB
        );
        if let Some(percent) = summary.reduction_percent() {
            engine_info!("Overall size reduction: {:.2}%", percent);
        }
        Ok(summary)
    }
}

async fn compress_one(
    compressor: &dyn Compressor,
    sink: &dyn ProgressSink,
    job_id: JobId,
    total: usize,
    job: CompressionJob,
    keep_original: bool,
) -> CompressOutcome {
    let label = job
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    sink.emit(EngineEvent::Progress(JobProgress {
        job_id,
        stage: Stage::Compressing,
        bytes: None,
    }));

    let result = match file_len(job.input()).await {
        Ok(original) => run_job(compressor, &job)
            .await
            .map(|(compressed, retried)| (original, compressed, retried)),
        Err(err) => Err(err),
    };

    match result {
        Ok((original, compressed, retried)) => {
            engine_info!(
                "Compressed {} from {:.2}MB to {:.2}MB ({:.2}% reduction)",
                label,
                original as f64 / MIB,
                compressed as f64 / MIB,
                reduction(original, compressed)
            );
            sink.emit(EngineEvent::JobCompleted {
                job_id,
                total,
                label,
                result: Ok(JobOutcome::Written { bytes: compressed }),
            });
            CompressOutcome::Compressed {
                original,
                compressed,
                retried,
            }
        }
        Err(err) => {
            if keep_original {
                match tokio::fs::copy(&job.input, &job.output).await {
                    Ok(_) => engine_info!("Copied {} unchanged", label),
                    Err(copy_err) => engine_warn!("Could not copy {} unchanged: {}", label, copy_err),
                }
            }
            sink.emit(EngineEvent::JobCompleted {
                job_id,
                total,
                label,
                result: Err(err.to_string()),
            });
            CompressOutcome::Failed
        }
    }
}

/// Compress once, and once more with the fallback profile when the policy
/// asks for it. Returns the size that was kept and whether a retry ran.
async fn run_job(
    compressor: &dyn Compressor,
    job: &CompressionJob,
) -> Result<(u64, bool), CompressionError> {
    let first = StagedFile::new(&job.output)?;
    compressor
        .compress(job.input(), first.path(), job.profile)
        .await?;
    let first_size = file_len(first.path()).await?;

    let Some(fallback) = job.fallback_for(first_size) else {
        first.commit()?;
        return Ok((first_size, false));
    };

    engine_info!(
        "{} is still {:.2}MB, retrying with {} profile",
        job.output.display(),
        first_size as f64 / MIB,
        fallback
    );
    let second = StagedFile::new(&job.output)?;
    let kept = match compressor.compress(job.input(), second.path(), fallback).await {
        Ok(()) => {
            let second_size = file_len(second.path()).await?;
            if job.retry.keep_fallback(first_size, second_size) {
                engine_debug!("Keeping {} result ({} bytes)", fallback, second_size);
                (second, second_size)
            } else {
                engine_info!("First pass was smaller, keeping it");
                (first, first_size)
            }
        }
        Err(err) => {
            engine_warn!("{} pass failed, keeping first pass: {}", fallback, err);
            (first, first_size)
        }
    };

    let (staged, size) = kept;
    staged.commit()?;
    Ok((size, true))
}

async fn file_len(path: &Path) -> Result<u64, CompressionError> {
    Ok(tokio::fs::metadata(path).await?.len())
}

fn reduction(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}
