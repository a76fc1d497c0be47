//! Durable checkpoint of the current target
//!
//! The checkpoint is replaced atomically: the new content goes to a sibling
//! temp file, is synced, then renamed over the old file. A reader never sees
//! a torn checkpoint, only the previous or the new one.

use paramdd_model::{ParamSet, check_aligned};
use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn temp_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        Error::Config(format!(
            "checkpoint path has no file name: {}",
            path.display()
        ))
    })?;
    let mut tmp = OsString::from(".");
    tmp.push(name);
    tmp.push(".tmp");
    Ok(path.with_file_name(tmp))
}

/// Atomically replace `path` with `params` in record format
///
/// # Errors
///
/// Returns [`Error::Checkpoint`] if the temp file cannot be written, synced
/// or renamed.
pub fn write_atomic(path: &Path, params: &ParamSet) -> Result<()> {
    let tmp = temp_path(path)?;
    let checkpoint_err = |source| Error::Checkpoint {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(&tmp).map_err(checkpoint_err)?;
    let mut writer = BufWriter::new(file);
    params.write_to(&mut writer).map_err(checkpoint_err)?;
    let file = writer
        .into_inner()
        .map_err(|e| checkpoint_err(e.into_error()))?;
    file.sync_all().map_err(checkpoint_err)?;
    drop(file);

    std::fs::rename(&tmp, path).map_err(checkpoint_err)
}

/// Load a checkpoint to resume from
///
/// Returns `Ok(None)` if there is no checkpoint at `path`.
///
/// # Errors
///
/// A checkpoint that exists but cannot be parsed, or whose keys do not line
/// up with `baseline`, is fatal.
pub fn load_resume(path: &Path, baseline: &ParamSet) -> Result<Option<ParamSet>> {
    if !path.exists() {
        return Ok(None);
    }
    let target = ParamSet::from_file(path)?;
    check_aligned(baseline, &target).map_err(|e| e.in_file(path))?;
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramdd_model::Param;

    fn sample(value: &str) -> ParamSet {
        ParamSet::from_records([
            Param::new("sat.gc", value, "symbol"),
            Param::new("smt.relevancy", "2", "unsigned int"),
        ])
        .unwrap()
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z3.params.dd");
        write_atomic(&path, &sample("psm")).unwrap();
        let loaded = load_resume(&path, &sample("glue")).unwrap();
        assert_eq!(loaded, Some(sample("psm")));
    }

    #[test]
    fn test_overwrite_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z3.params.dd");
        write_atomic(&path, &sample("a")).unwrap();
        write_atomic(&path, &sample("b")).unwrap();
        assert_eq!(ParamSet::from_file(&path).unwrap(), sample("b"));
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_resume(&dir.path().join("absent"), &sample("x")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_misaligned_checkpoint_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z3.params.dd");
        std::fs::write(&path, "other.key = 1 (int)\nsmt.relevancy = 2 (unsigned int)\n").unwrap();
        let err = load_resume(&path, &sample("x")).unwrap_err();
        match err {
            Error::Model(e) => assert!(e.is_alignment_error()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_checkpoint_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z3.params.dd");
        std::fs::write(&path, "half a rec").unwrap();
        assert!(load_resume(&path, &sample("x")).is_err());
    }

    #[test]
    fn test_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("z3.params.dd");
        let err = write_atomic(&path, &sample("x")).unwrap_err();
        assert!(matches!(err, Error::Checkpoint { .. }));
    }
}
