use std::num::NonZeroUsize;
use std::path::PathBuf;

use bundler_core::{QualityProfile, DEFAULT_OUTPUT_COUNT};
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "pdf-bundler")]
#[command(
    author,
    version,
    about = "Download the PDFs linked from a web page, merge them into balanced bundles and compress the result"
)]
pub struct Args {
    /// Settings file (RON)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only report warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Also write log output to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every PDF linked from a web page
    Download(DownloadArgs),
    /// Merge a directory of PDFs into size-balanced bundles
    Merge(MergeArgs),
    /// Compress every PDF in a directory with Ghostscript
    Compress(CompressArgs),
    /// Download, merge and compress in one run
    All(AllArgs),
}

#[derive(ClapArgs, Debug)]
pub struct DownloadArgs {
    /// Page whose PDF links are downloaded
    pub url: String,

    /// Output directory (defaults to PDF_Downloads_<last path segment>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of concurrent downloads [default: 10]
    #[arg(short, long)]
    pub workers: Option<usize>,
}

#[derive(ClapArgs, Debug)]
pub struct MergeArgs {
    /// Directory of PDFs (defaults to the newest PDF_Downloads_* directory)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "Merged_PDFs")]
    pub output: PathBuf,

    /// Maximum number of merged files
    #[arg(short, long, default_value_t = DEFAULT_OUTPUT_COUNT)]
    pub count: NonZeroUsize,
}

#[derive(ClapArgs, Debug)]
pub struct CompressArgs {
    /// Directory of PDFs (defaults to the newest Merged_* directory)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "Compressed_PDFs")]
    pub output: PathBuf,

    /// Ghostscript quality preset
    #[arg(short, long, value_enum, default_value = "screen")]
    pub quality: Quality,

    /// Number of concurrent Ghostscript processes [default: min(cpus, 4)]
    #[arg(short, long)]
    pub workers: Option<usize>,
}

#[derive(ClapArgs, Debug)]
pub struct AllArgs {
    /// Page whose PDF links are downloaded
    pub url: String,

    /// Directory for the compressed bundles
    #[arg(short, long, default_value = "Processed_PDFs")]
    pub output: PathBuf,

    /// Maximum number of merged files
    #[arg(short, long, default_value_t = DEFAULT_OUTPUT_COUNT)]
    pub count: NonZeroUsize,

    /// Ghostscript quality preset
    #[arg(short, long, value_enum, default_value = "screen")]
    pub quality: Quality,

    /// Number of concurrent downloads [default: 10]
    #[arg(long)]
    pub download_workers: Option<usize>,

    /// Number of concurrent Ghostscript processes [default: min(cpus, 4)]
    #[arg(long)]
    pub compress_workers: Option<usize>,
}

/// Quality presets selectable on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum Quality {
    /// 72 dpi images, smallest output
    #[default]
    Screen,
    /// 150 dpi images
    Ebook,
    /// 300 dpi images
    Printer,
    /// 300 dpi images, color preserving
    Prepress,
}

impl From<Quality> for QualityProfile {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Screen => QualityProfile::Screen,
            Quality::Ebook => QualityProfile::Ebook,
            Quality::Printer => QualityProfile::Printer,
            Quality::Prepress => QualityProfile::Prepress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn every_selectable_profile_has_a_flag() {
        let mapped: Vec<QualityProfile> = Quality::value_variants()
            .iter()
            .map(|q| QualityProfile::from(*q))
            .collect();
        for profile in QualityProfile::SELECTABLE {
            assert!(mapped.contains(&profile), "{profile} has no flag");
        }
    }
}
