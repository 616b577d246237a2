use std::fs;

use bundler_engine::{ensure_output_dir, StagedFile};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("nested");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn output_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();
    assert!(ensure_output_dir(&file_path).is_err());
}

#[test]
fn commit_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("doc.pdf");
    fs::write(&target, "old").unwrap();

    let staged = StagedFile::new(&target).unwrap();
    fs::write(staged.path(), "new").unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "old");

    let committed = staged.commit().unwrap();
    assert_eq!(committed, target);
    assert_eq!(fs::read_to_string(&target).unwrap(), "new");
}

#[test]
fn dropped_staged_file_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("doc.pdf");
    {
        let staged = StagedFile::new(&target).unwrap();
        fs::write(staged.path(), "partial").unwrap();
    }
    assert!(!target.exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}
