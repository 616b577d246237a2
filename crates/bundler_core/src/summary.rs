//! Per-stage tallies, aggregated once every worker of a stage has finished.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    /// Destination already present with nonzero size, or a duplicate name.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl DownloadSummary {
    pub fn record(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

impl FromIterator<DownloadOutcome> for DownloadSummary {
    fn from_iter<I: IntoIterator<Item = DownloadOutcome>>(iter: I) -> Self {
        let mut summary = Self::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub inputs: usize,
    pub groups_planned: usize,
    pub written: usize,
    pub failed: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    Compressed {
        original: u64,
        compressed: u64,
        retried: bool,
    },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressSummary {
    pub compressed: usize,
    pub retried: usize,
    pub failed: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl CompressSummary {
    pub fn record(&mut self, outcome: CompressOutcome) {
        match outcome {
            CompressOutcome::Compressed {
                original,
                compressed,
                retried,
            } => {
                self.compressed += 1;
                self.retried += usize::from(retried);
                self.bytes_in += original;
                self.bytes_out += compressed;
            }
            CompressOutcome::Failed => self.failed += 1,
        }
    }

    /// Size reduction over successfully compressed files, in percent.
    pub fn reduction_percent(&self) -> Option<f64> {
        if self.bytes_in == 0 {
            return None;
        }
        Some((1.0 - self.bytes_out as f64 / self.bytes_in as f64) * 100.0)
    }
}

impl FromIterator<CompressOutcome> for CompressSummary {
    fn from_iter<I: IntoIterator<Item = CompressOutcome>>(iter: I) -> Self {
        let mut summary = Self::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}
