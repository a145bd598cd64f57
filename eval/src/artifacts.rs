// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! All-or-nothing writing of output artifacts
//!
//! Artifacts are encoded in memory before anything touches the output
//! folder. Each one is then written to a temporary sibling and renamed into
//! place, so readers never observe a partially written file.

use crate::error::{EvalError, EvalResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One encoded output file
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: &'static str,
    pub contents: Vec<u8>,
}

impl Artifact {
    pub fn new(name: &'static str, contents: Vec<u8>) -> Self {
        Self { name, contents }
    }
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}

/// Create `output_folder` and write every artifact into it
///
/// Returns the final paths in the order of `artifacts`. Either every
/// artifact is in place afterwards or none of them changed: on failure,
/// temporaries are removed and files already replaced are restored.
pub fn write_all(output_folder: &Path, artifacts: &[Artifact]) -> EvalResult<Vec<PathBuf>> {
    fs::create_dir_all(output_folder).map_err(|e| EvalError::io(output_folder, e))?;

    for artifact in artifacts {
        let target = output_folder.join(artifact.name);
        if target.is_dir() {
            return Err(EvalError::io(
                target,
                io::Error::new(io::ErrorKind::Other, "output path is a directory"),
            ));
        }
    }

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let target = output_folder.join(artifact.name);
        let temp = sibling(&target, ".tmp");
        if let Err(e) = fs::write(&temp, &artifact.contents) {
            let _ = fs::remove_file(&temp);
            discard(&staged);
            return Err(EvalError::io(temp, e));
        }
        staged.push((temp, target));
    }

    commit(&staged)
}

/// Rename staged temporaries over their targets, all or nothing
///
/// Existing targets are moved to a `.bak` sibling first and restored if a
/// later rename fails.
fn commit(staged: &[(PathBuf, PathBuf)]) -> EvalResult<Vec<PathBuf>> {
    let mut committed: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(staged.len());

    for (index, (temp, target)) in staged.iter().enumerate() {
        let backup = if target.exists() {
            let backup = sibling(target, ".bak");
            if let Err(e) = fs::rename(target, &backup) {
                roll_back(&committed);
                discard(&staged[index..]);
                return Err(EvalError::io(target, e));
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(temp, target) {
            if let Some(backup) = &backup {
                let _ = fs::rename(backup, target);
            }
            roll_back(&committed);
            discard(&staged[index..]);
            return Err(EvalError::io(target, e));
        }
        committed.push((target.clone(), backup));
    }

    let mut written = Vec::with_capacity(committed.len());
    for (target, backup) in committed {
        if let Some(backup) = backup {
            let _ = fs::remove_file(backup);
        }
        tracing::info!("Wrote {}", target.display());
        written.push(target);
    }
    Ok(written)
}

fn roll_back(committed: &[(PathBuf, Option<PathBuf>)]) {
    for (target, backup) in committed.iter().rev() {
        let _ = fs::remove_file(target);
        if let Some(backup) = backup {
            let _ = fs::rename(backup, target);
        }
    }
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        let _ = fs::remove_file(temp);
    }
}

/// Shortest round-trip text for a float, always with a decimal part
pub fn format_float(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains(['.', 'e']) {
        format!("{}.0", text)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_all_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("runs").join("2024").join("a");

        let paths = write_all(
            &output,
            &[
                Artifact::new("scores.csv", b"fold\n".to_vec()),
                Artifact::new("curves.png", vec![1, 2, 3]),
            ],
        )
        .unwrap();

        assert_eq!(paths, vec![output.join("scores.csv"), output.join("curves.png")]);
        assert_eq!(fs::read(&paths[0]).unwrap(), b"fold\n");
        assert_eq!(fs::read(&paths[1]).unwrap(), vec![1, 2, 3]);
        assert!(!output.join("scores.csv.tmp").exists());
    }

    #[test]
    fn test_write_all_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path(), &[Artifact::new("summary.csv", b"old".to_vec())]).unwrap();
        write_all(dir.path(), &[Artifact::new("summary.csv", b"new".to_vec())]).unwrap();
        assert_eq!(fs::read(dir.path().join("summary.csv")).unwrap(), b"new");
    }

    #[test]
    fn test_write_all_reports_unusable_folder() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        let err = write_all(&file, &[Artifact::new("scores.csv", vec![])]).unwrap_err();
        match err {
            EvalError::Io { path, .. } => assert_eq!(path, file),
            other => panic!("expected I/O error, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_target_leaves_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scores.csv"), b"old").unwrap();
        let blocked = dir.path().join("curves.png");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("inner"), b"x").unwrap();

        let err = write_all(
            dir.path(),
            &[
                Artifact::new("scores.csv", b"new".to_vec()),
                Artifact::new("curves.png", vec![1, 2, 3]),
            ],
        )
        .unwrap_err();

        match err {
            EvalError::Io { path, .. } => assert_eq!(path, blocked),
            other => panic!("expected I/O error, got {:?}", other),
        }
        assert_eq!(fs::read(dir.path().join("scores.csv")).unwrap(), b"old");
        assert!(!dir.path().join("scores.csv.tmp").exists());
    }

    #[test]
    fn test_failed_rename_restores_replaced_files() {
        let dir = tempfile::tempdir().unwrap();
        let scores = dir.path().join("scores.csv");
        let curves = dir.path().join("curves.png");
        fs::write(&scores, b"old").unwrap();
        fs::write(sibling(&scores, ".tmp"), b"new").unwrap();
        // the second temporary was never written, so its rename fails

        let staged = vec![
            (sibling(&scores, ".tmp"), scores.clone()),
            (sibling(&curves, ".tmp"), curves.clone()),
        ];
        let err = commit(&staged).unwrap_err();

        match err {
            EvalError::Io { path, .. } => assert_eq!(path, curves),
            other => panic!("expected I/O error, got {:?}", other),
        }
        assert_eq!(fs::read(&scores).unwrap(), b"old");
        assert!(!curves.exists());
        assert!(!sibling(&scores, ".tmp").exists());
        assert!(!sibling(&scores, ".bak").exists());
    }

    #[test]
    fn test_failed_rename_removes_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let scores = dir.path().join("scores.csv");
        let curves = dir.path().join("curves.png");
        fs::write(sibling(&scores, ".tmp"), b"new").unwrap();

        let staged = vec![
            (sibling(&scores, ".tmp"), scores.clone()),
            (sibling(&curves, ".tmp"), curves.clone()),
        ];
        assert!(commit(&staged).is_err());
        assert!(!scores.exists());
        assert!(!curves.exists());
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.75), "0.75");
        assert_eq!(format_float(0.21616187468057912), "0.21616187468057912");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(f64::NAN), "NaN");
    }
}
