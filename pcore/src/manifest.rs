// PicSeek — manifest.rs
// Labelled image manifests: one JSON object per line.
// Author: d65v <https://github.com/d65v>

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{PicSeekError, Result};

/// One labelled image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sample {
    pub path: PathBuf,
    pub color: String,
    pub style: String,
}

impl Sample {
    pub fn new(path: impl Into<PathBuf>, color: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            color: color.into(),
            style: style.into(),
        }
    }
}

/// Read a JSONL manifest of `{"path", "color", "style"}` records.
///
/// Blank lines are skipped. Relative paths resolve against the manifest's
/// directory.
///
/// # Errors
/// `InvalidInput` naming the line for malformed records or empty labels.
pub fn load_manifest(path: &Path) -> Result<Vec<Sample>> {
    let content = fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut samples = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut sample: Sample = serde_json::from_str(line).map_err(|e| {
            PicSeekError::InvalidInput(format!("{}:{}: {}", path.display(), idx + 1, e))
        })?;
        if sample.color.is_empty() || sample.style.is_empty() {
            return Err(PicSeekError::InvalidInput(format!(
                "{}:{}: labels must be non-empty",
                path.display(),
                idx + 1
            )));
        }
        if sample.path.is_relative() {
            sample.path = base.join(&sample.path);
        }
        samples.push(sample);
    }

    log::debug!("{}: {} samples", path.display(), samples.len());
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_manifest_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        fs::write(
            &path,
            "{\"path\":\"img/a.png\",\"color\":\"red\",\"style\":\"casual\"}\n\n\
             {\"path\":\"/abs/b.png\",\"color\":\"blue\",\"style\":\"formal\"}\n",
        )
        .unwrap();

        let samples = load_manifest(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].path, dir.path().join("img/a.png"));
        assert_eq!((samples[0].color.as_str(), samples[0].style.as_str()), ("red", "casual"));
        assert_eq!(samples[1].path, PathBuf::from("/abs/b.png"));
    }

    #[test]
    fn test_load_manifest_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(
            &path,
            "{\"path\":\"a.png\",\"color\":\"red\",\"style\":\"casual\"}\n{\"path\":\"b.png\"}\n",
        )
        .unwrap();
        match load_manifest(&path).unwrap_err() {
            PicSeekError::InvalidInput(msg) => assert!(msg.contains(":2:")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_load_manifest_empty_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, "{\"path\":\"a.png\",\"color\":\"\",\"style\":\"casual\"}\n").unwrap();
        assert!(matches!(
            load_manifest(&path).unwrap_err(),
            PicSeekError::InvalidInput(_)
        ));
    }
}
