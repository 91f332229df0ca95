// PicSeek — database.rs
// Immutable feature database, column-oriented flat-file persistence, and the
// offline batch extraction pass that builds it.
// Author: d65v <https://github.com/d65v>

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::extractor::{Extractor, ExtractorKind};
use crate::manifest::Sample;
use crate::{FeatureVector, PicSeekError, Result};

const FORMAT_VERSION: u32 = 1;

// ── Entries ───────────────────────────────────────────────────────────────────

/// One catalog image: its vector and labels.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseEntry {
    pub feature: FeatureVector,
    pub color: String,
    pub style: String,
}

impl DatabaseEntry {
    pub fn new(feature: FeatureVector, color: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            feature,
            color: color.into(),
            style: style.into(),
        }
    }
}

/// On-disk layout: one column per field.
#[derive(Serialize, Deserialize)]
struct ColumnTable {
    version: u32,
    dim: usize,
    feature: Vec<Vec<f32>>,
    color: Vec<String>,
    style: Vec<String>,
}

// ── Database ──────────────────────────────────────────────────────────────────

/// Ordered, read-only collection of entries sharing one dimension.
/// Row order is insertion order and breaks ranking ties.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    dim: usize,
    /// Row-major `len × dim` feature matrix
    features: Vec<f32>,
    colors: Vec<String>,
    styles: Vec<String>,
}

impl Database {
    /// Build from entries, in order.
    ///
    /// # Errors
    /// `DimensionMismatch` if any feature length ≠ `dim`, `InvalidInput` for empty labels.
    pub fn from_entries(dim: usize, entries: Vec<DatabaseEntry>) -> Result<Self> {
        if dim == 0 {
            return Err(PicSeekError::ConfigError("database dimension must be positive".into()));
        }
        let mut db = Self {
            dim,
            features: Vec::with_capacity(dim * entries.len()),
            colors: Vec::with_capacity(entries.len()),
            styles: Vec::with_capacity(entries.len()),
        };
        for entry in entries {
            db.push(entry)?;
        }
        Ok(db)
    }

    fn push(&mut self, entry: DatabaseEntry) -> Result<()> {
        if entry.feature.len() != self.dim {
            return Err(PicSeekError::DimensionMismatch {
                expected: self.dim,
                got: entry.feature.len(),
            });
        }
        if entry.color.is_empty() || entry.style.is_empty() {
            return Err(PicSeekError::InvalidInput(format!(
                "row {}: labels must be non-empty",
                self.colors.len()
            )));
        }
        self.features.extend_from_slice(&entry.feature);
        self.colors.push(entry.color);
        self.styles.push(entry.style);
        Ok(())
    }

    /// Load a persisted database in one pass. The whole file is rejected if
    /// any row disagrees with the declared dimension.
    ///
    /// # Errors
    /// `ConfigError` for a missing or undecodable file, `DimensionMismatch` for bad rows.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PicSeekError::ConfigError(format!(
                "database file '{}' does not exist",
                path.display()
            )));
        }
        let bytes = fs::read(path)?;
        let table: ColumnTable = bincode::deserialize(&bytes).map_err(|e| {
            PicSeekError::ConfigError(format!("invalid database file '{}': {}", path.display(), e))
        })?;

        if table.version != FORMAT_VERSION {
            return Err(PicSeekError::ConfigError(format!(
                "database file '{}' has format version {}, expected {}",
                path.display(),
                table.version,
                FORMAT_VERSION
            )));
        }
        let rows = table.feature.len();
        if table.color.len() != rows || table.style.len() != rows {
            return Err(PicSeekError::ConfigError(format!(
                "database file '{}' has ragged columns ({} features, {} colors, {} styles)",
                path.display(),
                rows,
                table.color.len(),
                table.style.len()
            )));
        }

        let entries = table
            .feature
            .into_iter()
            .zip(table.color)
            .zip(table.style)
            .map(|((feature, color), style)| DatabaseEntry {
                feature,
                color,
                style,
            })
            .collect();
        let db = Self::from_entries(table.dim, entries)?;
        log::info!(
            "loaded database '{}' ({} rows, dim={})",
            path.display(),
            db.len(),
            db.dim
        );
        Ok(db)
    }

    /// Persist as a column table, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let table = ColumnTable {
            version: FORMAT_VERSION,
            dim: self.dim,
            feature: self.rows().map(|r| r.to_vec()).collect(),
            color: self.colors.clone(),
            style: self.styles.clone(),
        };
        let bytes =
            bincode::serialize(&table).map_err(|e| PicSeekError::StorageError(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        log::info!("saved database '{}' ({} rows)", path.display(), self.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.features[index * self.dim..(index + 1) * self.dim]
    }

    /// Feature rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.features.chunks_exact(self.dim)
    }

    pub fn color(&self, index: usize) -> &str {
        &self.colors[index]
    }

    pub fn style(&self, index: usize) -> &str {
        &self.styles[index]
    }
}

/// `<dir>/<tag>_db.bin`
pub fn database_path(dir: &Path, kind: ExtractorKind) -> PathBuf {
    dir.join(format!("{}_db.bin", kind.tag()))
}

// ── Batch build ───────────────────────────────────────────────────────────────

/// Outcome of a batch extraction pass.
#[derive(Debug)]
pub struct BuildReport {
    pub inserted: usize,
    /// Images without usable signal
    pub misses: Vec<PathBuf>,
    /// (path, reason) for images that could not be processed
    pub failed: Vec<(PathBuf, String)>,
}

/// Extract every sample and collect the hits into a database, in manifest order.
/// Misses and unreadable images are skipped and reported.
pub fn build_database(extractor: &Extractor, samples: &[Sample]) -> Result<(Database, BuildReport)> {
    let mut entries = Vec::with_capacity(samples.len());
    let mut misses = Vec::new();
    let mut failed = Vec::new();

    for sample in samples {
        match extractor.extract(&sample.path) {
            Ok(Some(feature)) => {
                entries.push(DatabaseEntry::new(feature, &sample.color, &sample.style))
            }
            Ok(None) => {
                log::warn!("{}: no usable signal in '{}'", extractor.name(), sample.path.display());
                misses.push(sample.path.clone());
            }
            Err(e) => {
                log::warn!("{}: skipping '{}': {}", extractor.name(), sample.path.display(), e);
                failed.push((sample.path.clone(), e.to_string()));
            }
        }
    }

    let inserted = entries.len();
    let db = Database::from_entries(extractor.dimension(), entries)?;
    Ok((
        db,
        BuildReport {
            inserted,
            misses,
            failed,
        },
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{brightness_extractor, flat, write_png};

    fn sample_db() -> Database {
        Database::from_entries(
            3,
            vec![
                DatabaseEntry::new(vec![1.0, 0.0, 0.0], "red", "casual"),
                DatabaseEntry::new(vec![0.0, 1.0, 0.0], "blue", "formal"),
                DatabaseEntry::new(vec![0.0, 0.0, 1.0], "red", "formal"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_entries_and_accessors() {
        let db = sample_db();
        assert_eq!(db.len(), 3);
        assert_eq!(db.dim(), 3);
        assert_eq!(db.row(1), &[0.0, 1.0, 0.0]);
        assert_eq!(db.color(2), "red");
        assert_eq!(db.style(2), "formal");
        assert_eq!(db.style(0), "casual");
        assert_eq!(db.rows().count(), 3);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let err = Database::from_entries(
            3,
            vec![
                DatabaseEntry::new(vec![1.0, 0.0, 0.0], "red", "casual"),
                DatabaseEntry::new(vec![1.0, 0.0], "red", "casual"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, PicSeekError::DimensionMismatch { expected: 3, got: 2 }));
    }

    #[test]
    fn test_empty_label_rejected() {
        let err = Database::from_entries(1, vec![DatabaseEntry::new(vec![1.0], "", "casual")])
            .unwrap_err();
        assert!(matches!(err, PicSeekError::InvalidInput(_)));
    }

    #[test]
    fn test_save_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("harris_db.bin");
        let db = sample_db();
        db.save(&path).unwrap();
        let loaded = Database::load(&path).unwrap();
        assert_eq!(loaded, db);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Database::load(Path::new("/nonexistent/db.bin")).unwrap_err();
        assert!(matches!(err, PicSeekError::ConfigError(_)));
    }

    #[test]
    fn test_load_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        fs::write(&path, b"not a database").unwrap();
        let err = Database::load(&path).unwrap_err();
        assert!(matches!(err, PicSeekError::ConfigError(_)));
    }

    #[test]
    fn test_load_rejects_bad_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_dim.bin");
        let table = ColumnTable {
            version: FORMAT_VERSION,
            dim: 2,
            feature: vec![vec![1.0, 2.0], vec![3.0]],
            color: vec!["a".into(), "b".into()],
            style: vec!["x".into(), "y".into()],
        };
        fs::write(&path, bincode::serialize(&table).unwrap()).unwrap();
        let err = Database::load(&path).unwrap_err();
        assert!(matches!(err, PicSeekError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_database_path() {
        let p = database_path(Path::new("/feat"), ExtractorKind::ColorLayout);
        assert_eq!(p, PathBuf::from("/feat/color-layout_db.bin"));
    }

    #[test]
    fn test_build_database_skips_misses() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![
            Sample::new(write_png(dir.path(), "a", &flat(16, 45)), "red", "casual"),
            Sample::new(write_png(dir.path(), "b", &flat(16, 0)), "blue", "casual"),
            Sample::new(dir.path().join("missing.png"), "blue", "formal"),
            Sample::new(write_png(dir.path(), "c", &flat(16, 95)), "green", "formal"),
        ];
        let extractor = brightness_extractor(4);
        let (db, report) = build_database(&extractor, &samples).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.misses.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(db.len(), 2);
        assert_eq!(db.dim(), 4 * 64);
        assert_eq!(db.color(0), "red");
        assert_eq!(db.color(1), "green");
    }
}
