use std::path::{Path, PathBuf};

use url::Url;

use crate::{QualityProfile, RetryPolicy};

/// One URL to fetch into one destination file. Consumed by a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: Url,
    pub destination: PathBuf,
}

impl DownloadJob {
    pub fn new(url: Url, destination: impl Into<PathBuf>) -> Self {
        Self {
            url,
            destination: destination.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: QualityProfile,
    pub retry: RetryPolicy,
}

impl CompressionJob {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        profile: QualityProfile,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            profile,
            retry,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Profile for the aggressive pass, if the first pass left `output_size` bytes.
    pub fn fallback_for(&self, output_size: u64) -> Option<QualityProfile> {
        self.retry.fallback_for(self.profile, output_size)
    }
}
