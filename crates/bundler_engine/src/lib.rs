//! PDF bundler engine: the IO side of the pipeline.
//!
//! Page fetching and link extraction, the download pool, page-level merging
//! with `lopdf`, and the Ghostscript compression pool. Planning and policy
//! decisions live in `bundler_core`; this crate only executes them.
mod compress;
mod decode;
mod download;
mod extract;
mod fetch;
mod filename;
mod inputs;
mod links;
mod merge;
mod persist;
mod pool;
mod progress;
mod settings;
mod types;

pub use compress::{
    ghostscript_args, CompressSettings, CompressionError, CompressionPool, Compressor,
    GhostscriptCompressor,
};
pub use decode::{decode_page, DecodedPage};
pub use download::{plan_downloads, DownloadSettings, Downloader};
pub use extract::find_pdf_links;
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::destination_file_name;
pub use inputs::{latest_dir_with_prefix, scan_pdfs};
pub use links::PdfLinkExtractor;
pub use merge::{concatenate, merge_directory, page_count, MergeError};
pub use persist::{ensure_output_dir, PersistError, StagedFile};
pub use pool::run_pool;
pub use progress::{LogProgressSink, ProgressSink};
pub use settings::EngineSettings;
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, JobId, JobOutcome,
    JobProgress, Stage, StageError,
};
