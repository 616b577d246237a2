use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bundler_core::PdfRef;

use crate::StageError;

/// Regular `*.pdf` files directly inside `dir` (extension matched
/// case-insensitively), sorted by file name, with their sizes.
pub fn scan_pdfs(dir: &Path) -> Result<Vec<PdfRef>, StageError> {
    let input_error = |source| StageError::InputDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(input_error)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter(|e| has_pdf_extension(&e.path()))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut pdfs = Vec::with_capacity(entries.len());
    for entry in entries {
        let size = entry.metadata().map_err(input_error)?.len();
        pdfs.push(PdfRef::local(entry.path(), size));
    }
    Ok(pdfs)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// The most recently modified directory in `parent` whose name starts with one
/// of `prefixes`. Best effort: unreadable entries are ignored.
pub fn latest_dir_with_prefix(parent: &Path, prefixes: &[&str]) -> Option<PathBuf> {
    fs::read_dir(parent)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            prefixes.iter().any(|prefix| name.starts_with(prefix))
        })
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, e.file_name(), e.path())
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, _, path)| path)
}
