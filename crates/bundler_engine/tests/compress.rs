use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bundler_core::{QualityProfile, RetryPolicy};
use bundler_engine::{
    CompressSettings, CompressionError, CompressionPool, Compressor, LogProgressSink,
};
use pretty_assertions::assert_eq;

/// Writes a fixed number of bytes per pass instead of running Ghostscript.
struct SizedCompressor {
    first_pass: usize,
    fallback_pass: usize,
    calls: Mutex<Vec<QualityProfile>>,
}

impl SizedCompressor {
    fn new(first_pass: usize, fallback_pass: usize) -> Arc<Self> {
        Arc::new(Self {
            first_pass,
            fallback_pass,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<QualityProfile> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Compressor for SizedCompressor {
    async fn compress(
        &self,
        _input: &Path,
        output: &Path,
        profile: QualityProfile,
    ) -> Result<(), CompressionError> {
        self.calls.lock().unwrap().push(profile);
        let size = if profile == QualityProfile::Aggressive {
            self.fallback_pass
        } else {
            self.first_pass
        };
        tokio::fs::write(output, vec![b'x'; size]).await?;
        Ok(())
    }
}

fn settings(threshold: u64) -> CompressSettings {
    CompressSettings {
        workers: Some(2),
        retry: RetryPolicy {
            large_file_threshold: threshold,
            fallback_profile: QualityProfile::Aggressive,
        },
        ..CompressSettings::default()
    }
}

fn pool(compressor: Arc<dyn Compressor>, settings: &CompressSettings) -> CompressionPool {
    engine_logging::initialize_for_tests();
    CompressionPool::new(compressor, Arc::new(LogProgressSink), settings)
}

fn input_dir(files: &[(&str, usize)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("in")).unwrap();
    for (name, size) in files {
        fs::write(dir.path().join("in").join(name), vec![b'%'; *size]).unwrap();
    }
    dir
}

#[tokio::test]
async fn small_outputs_are_written_once() {
    let dir = input_dir(&[("merged_001.pdf", 400), ("merged_002.pdf", 300)]);
    let compressor = SizedCompressor::new(100, 10);

    let summary = pool(compressor.clone(), &settings(1024))
        .compress_directory(&dir.path().join("in"), &dir.path().join("out"), QualityProfile::Screen)
        .await
        .unwrap();

    assert_eq!(summary.compressed, 2);
    assert_eq!(summary.retried, 0);
    assert_eq!(summary.bytes_in, 700);
    assert_eq!(summary.bytes_out, 200);
    assert_eq!(compressor.calls(), vec![QualityProfile::Screen; 2]);
    let written = fs::metadata(dir.path().join("out").join("merged_001.pdf")).unwrap();
    assert_eq!(written.len(), 100);
}

#[tokio::test]
async fn oversized_output_is_retried_exactly_once() {
    let dir = input_dir(&[("merged_001.pdf", 4096)]);
    let compressor = SizedCompressor::new(2048, 512);

    let summary = pool(compressor.clone(), &settings(1024))
        .compress_directory(&dir.path().join("in"), &dir.path().join("out"), QualityProfile::Ebook)
        .await
        .unwrap();

    assert_eq!(summary.compressed, 1);
    assert_eq!(summary.retried, 1);
    assert_eq!(
        compressor.calls(),
        vec![QualityProfile::Ebook, QualityProfile::Aggressive]
    );
    let written = fs::metadata(dir.path().join("out").join("merged_001.pdf")).unwrap();
    assert_eq!(written.len(), 512);
}

#[tokio::test]
async fn fallback_result_is_accepted_even_if_still_large() {
    let dir = input_dir(&[("big.pdf", 8192)]);
    let compressor = SizedCompressor::new(4096, 2048);

    let summary = pool(compressor.clone(), &settings(1024))
        .compress_directory(&dir.path().join("in"), &dir.path().join("out"), QualityProfile::Screen)
        .await
        .unwrap();

    assert_eq!(summary.retried, 1);
    assert_eq!(compressor.calls().len(), 2);
    assert_eq!(summary.bytes_out, 2048);
}

#[tokio::test]
async fn larger_fallback_keeps_first_pass() {
    let dir = input_dir(&[("big.pdf", 8192)]);
    let compressor = SizedCompressor::new(2048, 4096);

    let summary = pool(compressor.clone(), &settings(1024))
        .compress_directory(&dir.path().join("in"), &dir.path().join("out"), QualityProfile::Screen)
        .await
        .unwrap();

    assert_eq!(summary.retried, 1);
    assert_eq!(summary.bytes_out, 2048);
    let written = fs::metadata(dir.path().join("out").join("big.pdf")).unwrap();
    assert_eq!(written.len(), 2048);
}

#[tokio::test]
async fn aggressive_request_is_never_retried() {
    let dir = input_dir(&[("big.pdf", 8192)]);
    let compressor = SizedCompressor::new(4096, 4096);

    let summary = pool(compressor.clone(), &settings(1024))
        .compress_directory(
            &dir.path().join("in"),
            &dir.path().join("out"),
            QualityProfile::Aggressive,
        )
        .await
        .unwrap();

    assert_eq!(summary.retried, 0);
    assert_eq!(compressor.calls(), vec![QualityProfile::Aggressive]);
}

#[tokio::test]
async fn empty_input_directory_compresses_nothing() {
    let dir = input_dir(&[]);
    let compressor = SizedCompressor::new(1, 1);

    let summary = pool(compressor.clone(), &settings(1024))
        .compress_directory(&dir.path().join("in"), &dir.path().join("out"), QualityProfile::Screen)
        .await
        .unwrap();

    assert_eq!(summary.compressed + summary.failed, 0);
    assert!(compressor.calls().is_empty());
}

#[cfg(unix)]
mod ghostscript {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Duration;

    use bundler_engine::GhostscriptCompressor;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Install an executable shell script standing in for `gs`. `body` runs
    /// with `$out` set to the `-sOutputFile=` target.
    fn fake_gs(dir: &Path, body: &str) -> PathBuf {
        let script = dir.join("fake-gs");
        let log = dir.join("calls.log");
        let text = format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{}'\n\
             out=''\n\
             for arg in \"$@\"; do\n\
               case \"$arg\" in -sOutputFile=*) out=\"${{arg#-sOutputFile=}}\";; esac\n\
             done\n\
             {}\n",
            log.display(),
            body
        );
        fs::write(&script, text).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn calls(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn gs_settings(program: PathBuf, threshold: u64) -> CompressSettings {
        CompressSettings {
            program,
            timeout: Duration::from_secs(20),
            ..settings(threshold)
        }
    }

    async fn run(settings: &CompressSettings, dir: &Path, profile: QualityProfile) -> bundler_core::CompressSummary {
        let compressor = Arc::new(GhostscriptCompressor::from_settings(settings));
        pool(compressor, settings)
            .compress_directory(&dir.join("in"), &dir.join("out"), profile)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn passes_preset_and_output_file() {
        let dir = input_dir(&[("merged_001.pdf", 64)]);
        let gs = fake_gs(dir.path(), "printf 'compressed' > \"$out\"");

        let summary = run(&gs_settings(gs, 1024), dir.path(), QualityProfile::Printer).await;

        assert_eq!(summary.compressed, 1);
        let calls = calls(dir.path());
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("-sDEVICE=pdfwrite"));
        assert!(calls[0].contains("-dPDFSETTINGS=/printer"));
        assert!(calls[0].ends_with("merged_001.pdf"));
        let out = fs::read_to_string(dir.path().join("out").join("merged_001.pdf")).unwrap();
        assert_eq!(out, "compressed");
    }

    #[tokio::test]
    async fn large_result_triggers_single_grey_pass() {
        let dir = input_dir(&[("merged_001.pdf", 64)]);
        let gs = fake_gs(
            dir.path(),
            "case \"$*\" in\n\
               *ColorConversionStrategy=/Gray*) printf 'small' > \"$out\" ;;\n\
               *) head -c 4096 /dev/zero > \"$out\" ;;\n\
             esac",
        );

        let summary = run(&gs_settings(gs, 1024), dir.path(), QualityProfile::Screen).await;

        assert_eq!(summary.retried, 1);
        assert_eq!(calls(dir.path()).len(), 2);
        let out = fs::read_to_string(dir.path().join("out").join("merged_001.pdf")).unwrap();
        assert_eq!(out, "small");
    }

    #[tokio::test]
    async fn nonzero_exit_is_counted_and_batch_continues() {
        let dir = input_dir(&[("a.pdf", 64), ("b.pdf", 64)]);
        let gs = fake_gs(
            dir.path(),
            "case \"$*\" in\n\
               *a.pdf) echo 'broken input' >&2; exit 3 ;;\n\
               *) printf 'ok' > \"$out\" ;;\n\
             esac",
        );

        let summary = run(&gs_settings(gs, 1024), dir.path(), QualityProfile::Screen).await;

        assert_eq!(summary.compressed, 1);
        assert_eq!(summary.failed, 1);
        assert!(!dir.path().join("out").join("a.pdf").exists());
        assert!(dir.path().join("out").join("b.pdf").exists());
    }

    #[tokio::test]
    async fn missing_output_is_a_failure() {
        let dir = input_dir(&[("a.pdf", 64)]);
        let gs = fake_gs(dir.path(), "exit 0");

        let summary = run(&gs_settings(gs, 1024), dir.path(), QualityProfile::Screen).await;

        assert_eq!(summary.failed, 1);
        assert!(!dir.path().join("out").join("a.pdf").exists());
    }

    #[tokio::test]
    async fn failure_can_keep_original() {
        let dir = input_dir(&[("a.pdf", 64)]);
        let gs = fake_gs(dir.path(), "exit 1");
        let settings = CompressSettings {
            keep_original_on_failure: true,
            ..gs_settings(gs, 1024)
        };

        let summary = run(&settings, dir.path(), QualityProfile::Screen).await;

        assert_eq!(summary.failed, 1);
        let copied = fs::metadata(dir.path().join("out").join("a.pdf")).unwrap();
        assert_eq!(copied.len(), 64);
    }

    #[tokio::test]
    async fn slow_compressor_times_out() {
        let dir = input_dir(&[("a.pdf", 64)]);
        let gs = fake_gs(dir.path(), "sleep 5; printf 'late' > \"$out\"");
        let settings = CompressSettings {
            timeout: Duration::from_millis(200),
            ..gs_settings(gs, 1024)
        };

        let summary = run(&settings, dir.path(), QualityProfile::Screen).await;

        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn missing_program_fails_every_job() {
        let dir = input_dir(&[("a.pdf", 64), ("b.pdf", 64)]);
        let settings = gs_settings(dir.path().join("no-such-gs"), 1024);

        let summary = run(&settings, dir.path(), QualityProfile::Screen).await;

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.compressed, 0);
    }
}
