use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use bundler_core::{DownloadJob, DownloadOutcome, DownloadSummary, PdfRef};
use engine_logging::{engine_debug, engine_info, engine_warn};
use serde::Deserialize;
use url::Url;

use crate::fetch::Fetcher;
use crate::filename::destination_file_name;
use crate::persist::{ensure_output_dir, StagedFile};
use crate::pool::run_pool;
use crate::progress::ProgressSink;
use crate::{EngineEvent, FailureKind, FetchError, JobId, JobOutcome, StageError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub workers: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self { workers: 10 }
    }
}

/// Map remote references to destination files in `output_dir`. URLs whose
/// file name is already taken by an earlier URL are returned separately;
/// local references need no download and are left out.
pub fn plan_downloads(pdfs: Vec<PdfRef>, output_dir: &Path) -> (Vec<DownloadJob>, Vec<Url>) {
    let mut names = HashSet::new();
    let mut jobs = Vec::with_capacity(pdfs.len());
    let mut collisions = Vec::new();
    for url in pdfs.iter().filter_map(PdfRef::url).cloned() {
        let name = destination_file_name(&url);
        if names.insert(name.clone()) {
            jobs.push(DownloadJob::new(url, output_dir.join(name)));
        } else {
            collisions.push(url);
        }
    }
    (jobs, collisions)
}

/// Download pool: fetches every remote reference into `output_dir` on a
/// fixed number of workers. Individual failures are counted, never propagated.
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn ProgressSink>,
    workers: usize,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: Arc<dyn ProgressSink>, workers: usize) -> Self {
        Self {
            fetcher,
            sink,
            workers,
        }
    }

    pub async fn download_all(
        &self,
        pdfs: Vec<PdfRef>,
        output_dir: &Path,
    ) -> Result<DownloadSummary, StageError> {
        ensure_output_dir(output_dir)?;

        let (jobs, collisions) = plan_downloads(pdfs, output_dir);
        for url in &collisions {
            engine_warn!("Skipping {}: file name already used by another link", url);
        }
        engine_info!(
            "Downloading {} PDF files to {} with {} workers",
            jobs.len(),
            output_dir.display(),
            self.workers
        );

        let total = jobs.len();
        let fetcher = Arc::clone(&self.fetcher);
        let sink = Arc::clone(&self.sink);
        let outcomes = run_pool(jobs, self.workers, move |job_id, job| {
            let fetcher = Arc::clone(&fetcher);
            let sink = Arc::clone(&sink);
            async move { download_one(fetcher.as_ref(), sink.as_ref(), job_id, total, job).await }
        })
        .await?;

        let mut summary: DownloadSummary = outcomes.into_iter().collect();
        summary.skipped += collisions.len();
        engine_info!(
            "Downloaded {}, skipped {}, failed {} ({} bytes)",
            summary.downloaded,
            summary.skipped,
            summary.failed,
            summary.bytes
        );
        Ok(summary)
    }
}

async fn download_one(
    fetcher: &dyn Fetcher,
    sink: &dyn ProgressSink,
    job_id: JobId,
    total: usize,
    job: DownloadJob,
) -> DownloadOutcome {
    let label = job.file_name();
    let report = |result: Result<JobOutcome, String>| {
        sink.emit(EngineEvent::JobCompleted {
            job_id,
            total,
            label: label.clone(),
            result,
        })
    };

    if is_present(&job.destination).await {
        engine_debug!("{} already present, not fetching {}", label, job.url);
        report(Ok(JobOutcome::Skipped));
        return DownloadOutcome::Skipped;
    }

    match fetch_into_place(fetcher, sink, job_id, &job).await {
        Ok(bytes) => {
            report(Ok(JobOutcome::Written { bytes }));
            DownloadOutcome::Downloaded { bytes }
        }
        Err(err) => {
            report(Err(format!("{} ({})", err, job.url)));
            DownloadOutcome::Failed
        }
    }
}

async fn fetch_into_place(
    fetcher: &dyn Fetcher,
    sink: &dyn ProgressSink,
    job_id: JobId,
    job: &DownloadJob,
) -> Result<u64, FetchError> {
    let staged = StagedFile::new(&job.destination)
        .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
    let bytes = fetcher
        .download_to(job_id, &job.url, staged.path(), sink)
        .await?;
    if bytes == 0 {
        return Err(FetchError::new(FailureKind::Network, "empty response body"));
    }
    staged
        .commit()
        .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
    Ok(bytes)
}

async fn is_present(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
