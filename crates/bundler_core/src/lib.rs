//! Bundler core: pure planning logic and the data model shared by the stages.
mod jobs;
mod plan;
mod policy;
mod profile;
mod source;
mod summary;

pub use jobs::{CompressionJob, DownloadJob};
pub use plan::{merged_file_name, plan_merge, MergeGroup, MergePlan, PlanInput, DEFAULT_OUTPUT_COUNT};
pub use policy::{RetryPolicy, DEFAULT_LARGE_FILE_THRESHOLD};
pub use profile::QualityProfile;
pub use source::PdfRef;
pub use summary::{CompressOutcome, CompressSummary, DownloadOutcome, DownloadSummary, MergeSummary};
