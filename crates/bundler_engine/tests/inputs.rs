use std::fs;
use std::time::{Duration, SystemTime};

use bundler_engine::{latest_dir_with_prefix, scan_pdfs};

#[test]
fn scan_finds_pdfs_sorted_with_sizes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.pdf"), "bb").unwrap();
    fs::write(dir.path().join("A.PDF"), "a").unwrap();
    fs::write(dir.path().join("readme.txt"), "text").unwrap();
    fs::create_dir(dir.path().join("nested.pdf")).unwrap();

    let found = scan_pdfs(dir.path()).unwrap();

    let listed: Vec<(String, Option<u64>)> = found
        .iter()
        .map(|pdf| {
            let name = pdf.path().unwrap().file_name().unwrap();
            (name.to_string_lossy().into_owned(), pdf.size())
        })
        .collect();
    assert_eq!(
        listed,
        vec![("A.PDF".to_string(), Some(1)), ("b.pdf".to_string(), Some(2))]
    );
}

#[test]
fn scan_of_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(scan_pdfs(&dir.path().join("absent")).is_err());
}

#[cfg(unix)]
#[test]
fn newest_matching_directory_wins() {
    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("PDF_Downloads_old");
    let new = dir.path().join("PDF_Downloads_new");
    fs::create_dir(&old).unwrap();
    fs::create_dir(&new).unwrap();
    fs::create_dir(dir.path().join("Merged_PDFs")).unwrap();

    let past = SystemTime::now() - Duration::from_secs(3600);
    fs::File::open(&old).unwrap().set_modified(past).unwrap();

    assert_eq!(
        latest_dir_with_prefix(dir.path(), &["PDF_Downloads_"]),
        Some(new)
    );
    assert_eq!(
        latest_dir_with_prefix(dir.path(), &["Merged_", "Temp_Merged_"]),
        Some(dir.path().join("Merged_PDFs"))
    );
    assert_eq!(latest_dir_with_prefix(dir.path(), &["Processed_"]), None);
}
