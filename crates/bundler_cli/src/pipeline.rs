//! Runs the stages for each subcommand.
//!
//! Directory defaults and the "newest matching directory" lookup happen here;
//! the engine stages always receive explicit directories.
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use bundler_core::{CompressSummary, DownloadSummary, MergeSummary, QualityProfile};
use bundler_engine::{
    find_pdf_links, latest_dir_with_prefix, merge_directory, scan_pdfs, CompressionPool,
    Downloader, EngineSettings, GhostscriptCompressor, LogProgressSink, PdfLinkExtractor,
    ProgressSink, ReqwestFetcher,
};
use engine_logging::{engine_info, engine_warn};
use url::Url;

use crate::cli::{AllArgs, Command, CompressArgs, DownloadArgs, MergeArgs};

pub const DOWNLOAD_DIR_PREFIX: &str = "PDF_Downloads_";
pub const MERGED_DIR_PREFIXES: [&str; 2] = ["Merged_", "Temp_Merged_"];
pub const TEMP_MERGED_DIR: &str = "Temp_Merged_PDFs";

/// `PDF_Downloads_<segment>`, where the segment is the last non-empty path
/// segment of `page_url` (or its host), reduced to file-name-safe characters.
pub fn download_dir_for(page_url: &str) -> PathBuf {
    let segment = Url::parse(page_url)
        .ok()
        .and_then(|url| {
            let last = url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string));
            last.or_else(|| url.host_str().map(str::to_string))
        })
        .unwrap_or_default();
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    let name = if cleaned.is_empty() { "page" } else { cleaned };
    PathBuf::from(format!("{DOWNLOAD_DIR_PREFIX}{name}"))
}

/// `explicit` if given, else the newest directory in `parent` with one of
/// `prefixes`.
pub fn resolve_input(explicit: Option<PathBuf>, parent: &Path, prefixes: &[&str]) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    match latest_dir_with_prefix(parent, prefixes) {
        Some(dir) => {
            engine_info!("Using input directory {}", dir.display());
            Ok(dir)
        }
        None => bail!(
            "no input directory given and none matching {} found in {}",
            prefixes.join("* or "),
            parent.display()
        ),
    }
}

pub struct Pipeline {
    settings: EngineSettings,
    sink: Arc<dyn ProgressSink>,
}

impl Pipeline {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            sink: Arc::new(LogProgressSink),
        }
    }

    pub async fn download(&self, page_url: &str, output: &Path) -> Result<DownloadSummary> {
        let started = Instant::now();
        let fetcher = ReqwestFetcher::new(self.settings.fetch.clone())
            .context("cannot build HTTP client")?;
        let fetcher = Arc::new(fetcher);

        let links = find_pdf_links(fetcher.as_ref(), &PdfLinkExtractor::default(), page_url).await?;
        if links.is_empty() {
            engine_warn!("No PDF links found on {}", page_url);
            return Ok(DownloadSummary::default());
        }

        let downloader = Downloader::new(
            fetcher,
            Arc::clone(&self.sink),
            self.settings.download.workers,
        );
        let summary = downloader
            .download_all(links, output)
            .await
            .with_context(|| format!("download into {} failed", output.display()))?;
        engine_info!("Download stage finished in {:.1?}", started.elapsed());
        Ok(summary)
    }

    pub async fn merge(&self, input: &Path, output: &Path, count: NonZeroUsize) -> Result<MergeSummary> {
        let started = Instant::now();
        let (input_dir, output_dir) = (input.to_path_buf(), output.to_path_buf());
        let summary = tokio::task::spawn_blocking(move || merge_directory(&input_dir, &output_dir, count))
            .await
            .context("merge task panicked")?
            .with_context(|| format!("merge of {} failed", input.display()))?;
        engine_info!("Merge stage finished in {:.1?}", started.elapsed());
        Ok(summary)
    }

    pub async fn compress(
        &self,
        input: &Path,
        output: &Path,
        profile: QualityProfile,
    ) -> Result<CompressSummary> {
        let started = Instant::now();
        let compressor = Arc::new(GhostscriptCompressor::from_settings(&self.settings.compress));
        let pool = CompressionPool::new(compressor, Arc::clone(&self.sink), &self.settings.compress);
        let summary = pool
            .compress_directory(input, output, profile)
            .await
            .with_context(|| format!("compression of {} failed", input.display()))?;
        engine_info!("Compression stage finished in {:.1?}", started.elapsed());
        Ok(summary)
    }

    /// Download, merge and compress, stopping early (successfully) when a
    /// stage leaves nothing for the next one.
    pub async fn run_all(
        &self,
        page_url: &str,
        output: &Path,
        count: NonZeroUsize,
        profile: QualityProfile,
    ) -> Result<()> {
        let started = Instant::now();
        let downloads = download_dir_for(page_url);

        let fetched = self.download(page_url, &downloads).await?;
        if fetched.total() == 0 {
            engine_info!("Nothing to download; stopping");
            return Ok(());
        }
        if scan_pdfs(&downloads)?.is_empty() {
            engine_warn!("No PDF files in {}; stopping", downloads.display());
            return Ok(());
        }

        let temp = PathBuf::from(TEMP_MERGED_DIR);
        let merged = self.merge(&downloads, &temp, count).await?;
        if merged.written == 0 {
            engine_warn!("No merged files were written; stopping");
            return Ok(());
        }

        let compressed = self.compress(&temp, output, profile).await;
        if let Err(err) = fs::remove_dir_all(&temp) {
            engine_warn!("Could not remove {}: {}", temp.display(), err);
        }
        let compressed = compressed?;

        engine_info!(
            "Finished in {:.1?}: {} downloaded, {} merged, {} compressed into {}",
            started.elapsed(),
            fetched.downloaded,
            merged.written,
            compressed.compressed,
            output.display()
        );
        Ok(())
    }
}

/// Settings with the per-command worker overrides applied.
pub fn apply_overrides(
    mut settings: EngineSettings,
    download_workers: Option<usize>,
    compress_workers: Option<usize>,
) -> EngineSettings {
    if let Some(workers) = download_workers {
        settings.download.workers = workers;
    }
    if compress_workers.is_some() {
        settings.compress.workers = compress_workers;
    }
    settings
}

pub async fn run(command: Command, settings: EngineSettings) -> Result<()> {
    let cwd = Path::new(".");
    match command {
        Command::Download(DownloadArgs {
            url,
            output,
            workers,
        }) => {
            let pipeline = Pipeline::new(apply_overrides(settings, workers, None));
            let output = output.unwrap_or_else(|| download_dir_for(&url));
            pipeline.download(&url, &output).await?;
        }
        Command::Merge(MergeArgs {
            input,
            output,
            count,
        }) => {
            let input = resolve_input(input, cwd, &[DOWNLOAD_DIR_PREFIX])?;
            Pipeline::new(settings).merge(&input, &output, count).await?;
        }
        Command::Compress(CompressArgs {
            input,
            output,
            quality,
            workers,
        }) => {
            let input = resolve_input(input, cwd, &MERGED_DIR_PREFIXES)?;
            let pipeline = Pipeline::new(apply_overrides(settings, None, workers));
            pipeline.compress(&input, &output, quality.into()).await?;
        }
        Command::All(AllArgs {
            url,
            output,
            count,
            quality,
            download_workers,
            compress_workers,
        }) => {
            let pipeline =
                Pipeline::new(apply_overrides(settings, download_workers, compress_workers));
            pipeline.run_all(&url, &output, count, quality.into()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_dir_uses_last_segment() {
        assert_eq!(
            download_dir_for("https://example.com/library/papers"),
            PathBuf::from("PDF_Downloads_papers")
        );
        assert_eq!(
            download_dir_for("https://example.com/library/papers/"),
            PathBuf::from("PDF_Downloads_papers")
        );
        assert_eq!(
            download_dir_for("https://example.com/"),
            PathBuf::from("PDF_Downloads_example.com")
        );
        assert_eq!(
            download_dir_for("https://example.com/a/index.html?x=1"),
            PathBuf::from("PDF_Downloads_index.html")
        );
    }

    #[test]
    fn download_dir_is_file_name_safe() {
        assert_eq!(
            download_dir_for("https://example.com/my%20docs"),
            PathBuf::from("PDF_Downloads_my_20docs")
        );
        assert_eq!(download_dir_for("not a url"), PathBuf::from("PDF_Downloads_page"));
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let base = EngineSettings::default();
        let default_compress = base.compress.workers;

        let settings = apply_overrides(base.clone(), Some(3), None);
        assert_eq!(settings.download.workers, 3);
        assert_eq!(settings.compress.workers, default_compress);

        let settings = apply_overrides(base, None, Some(1));
        assert_eq!(settings.download.workers, 10);
        assert_eq!(settings.compress.workers, Some(1));
    }
}
