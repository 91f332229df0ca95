// PicSeek — finder.rs
// Exact nearest-neighbour retrieval: one extractor, one metric, and a shared
// read-only database snapshot.
// Author: d65v <https://github.com/d65v>

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::database::Database;
use crate::distance::Metric;
use crate::evaluation::LabelGranularity;
use crate::extractor::Extractor;
use crate::{timed, PicSeekError, Result, Timed};

// ── Ranking ───────────────────────────────────────────────────────────────────

/// Score every row against `query` and keep the `depth` lowest scores.
/// Equal scores keep database order. Returns `(row index, score)` pairs.
///
/// # Errors
/// `DimensionMismatch` if the query length differs from the database dimension.
pub fn rank(db: &Database, metric: Metric, query: &[f32], depth: usize) -> Result<Vec<(usize, f32)>> {
    if query.len() != db.dim() {
        return Err(PicSeekError::DimensionMismatch {
            expected: db.dim(),
            got: query.len(),
        });
    }

    let mut scored: Vec<(usize, f32)> = db
        .rows()
        .enumerate()
        .map(|(i, row)| (i, metric.score(query, row)))
        .collect();

    // sort_by_key is stable
    scored.sort_by_key(|&(_, s)| OrderedFloat(s));
    scored.truncate(depth.min(db.len()));
    Ok(scored)
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Ranked labels and raw scores, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutput {
    pub input: Option<PathBuf>,
    pub colors: Vec<String>,
    pub styles: Vec<String>,
    pub distances: Vec<f32>,
}

impl SearchOutput {
    /// Result for a query with no usable signal.
    pub fn empty(input: Option<PathBuf>) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// `color_style` labels in ranking order.
    pub fn combined(&self) -> Vec<String> {
        self.labels(LabelGranularity::Combined)
    }

    pub fn labels(&self, granularity: LabelGranularity) -> Vec<String> {
        self.colors
            .iter()
            .zip(&self.styles)
            .map(|(c, s)| granularity.select(c, s))
            .collect()
    }
}

// ── Finder ────────────────────────────────────────────────────────────────────

/// Query front-end over one database snapshot.
pub struct Finder {
    extractor: Extractor,
    metric: Metric,
    database: Option<Arc<Database>>,
}

impl Finder {
    /// A finder with no database attached; `search` fails until one is.
    pub fn new(extractor: Extractor, metric: Metric) -> Self {
        Self {
            extractor,
            metric,
            database: None,
        }
    }

    /// Load the database at `path` and swap it in.
    pub fn change_database(&mut self, path: &Path) -> Result<()> {
        let db = Database::load(path)?;
        self.attach_database(Arc::new(db))
    }

    /// Swap in an already-loaded snapshot. The previous snapshot stays valid
    /// for anyone still holding it.
    pub fn attach_database(&mut self, database: Arc<Database>) -> Result<()> {
        let expected = self.extractor.dimension();
        if database.dim() != expected {
            return Err(PicSeekError::DimensionMismatch {
                expected,
                got: database.dim(),
            });
        }
        log::debug!(
            "{}: attached database with {} rows",
            self.extractor.name(),
            database.len()
        );
        self.database = Some(database);
        Ok(())
    }

    pub fn database(&self) -> Option<&Arc<Database>> {
        self.database.as_ref()
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn set_metric(&mut self, metric: Metric) {
        self.metric = metric;
    }

    fn require_database(&self) -> Result<&Database> {
        self.database.as_deref().ok_or_else(|| {
            PicSeekError::ConfigError("no database attached; call change_database first".into())
        })
    }

    /// Extract `image` and return its `depth` closest entries.
    /// An image without usable signal yields an empty output.
    pub fn search(&self, image: &Path, depth: usize) -> Result<SearchOutput> {
        self.require_database()?;
        match self.extractor.extract(image)? {
            Some(vector) => {
                let mut out = self.search_vector(&vector, depth)?;
                out.input = Some(image.to_path_buf());
                Ok(out)
            }
            None => {
                log::debug!("{}: no match for '{}'", self.extractor.name(), image.display());
                Ok(SearchOutput::empty(Some(image.to_path_buf())))
            }
        }
    }

    /// [`search`](Self::search) with its wall-clock time.
    pub fn search_timed(&self, image: &Path, depth: usize) -> Timed<Result<SearchOutput>> {
        timed(|| self.search(image, depth))
    }

    /// Rank a precomputed query vector.
    pub fn search_vector(&self, vector: &[f32], depth: usize) -> Result<SearchOutput> {
        let db = self.require_database()?;
        let ranked = rank(db, self.metric, vector, depth)?;

        let mut out = SearchOutput::empty(None);
        for (i, score) in ranked {
            out.colors.push(db.color(i).to_string());
            out.styles.push(db.style(i).to_string());
            out.distances.push(score);
        }
        Ok(out)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
