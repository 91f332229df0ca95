// PicSeek — evaluation.rs
// Offline evaluation harness: extractor × metric × label granularity,
// scored with the retrieval metrics and written as a CSV report.
// Author: d65v <https://github.com/d65v>

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::database::{database_path, Database};
use crate::distance::Metric;
use crate::extractor::{build_extractor, Extractor, ExtractorKind, ExtractorSettings};
use crate::finder::Finder;
use crate::manifest::Sample;
use crate::metrics::{first_rank_accuracy, mean_average_precision, mean_reciprocal_rank};
use crate::{timed, FeatureVector, Result};

pub const REPORT_HEADER: &str = "extractor,distance,mrr,map,accuracy,average_time,errors,granularity";

// ── Granularity ───────────────────────────────────────────────────────────────

/// Which label a retrieval is judged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelGranularity {
    Color,
    Style,
    /// `color_style`
    Combined,
}

impl LabelGranularity {
    pub const ALL: [LabelGranularity; 3] = [
        LabelGranularity::Color,
        LabelGranularity::Style,
        LabelGranularity::Combined,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            LabelGranularity::Color => "color",
            LabelGranularity::Style => "style",
            LabelGranularity::Combined => "both",
        }
    }

    pub fn select(&self, color: &str, style: &str) -> String {
        match self {
            LabelGranularity::Color => color.to_string(),
            LabelGranularity::Style => style.to_string(),
            LabelGranularity::Combined => format!("{}_{}", color, style),
        }
    }
}

// ── Records ───────────────────────────────────────────────────────────────────

/// One report row.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    pub extractor: String,
    pub distance: String,
    pub mrr: f64,
    pub map: f64,
    pub accuracy: f64,
    /// Mean extraction time plus mean search time, in seconds
    pub average_time: f64,
    /// Queries whose extraction missed or failed
    pub errors: usize,
    pub granularity: String,
}

/// Everything one `evaluate` run needs besides the test samples.
#[derive(Debug, Clone)]
pub struct EvaluationPlan {
    pub extractors: Vec<ExtractorKind>,
    pub metrics: Vec<Metric>,
    pub granularities: Vec<LabelGranularity>,
    pub depth: usize,
    pub settings: ExtractorSettings,
    /// Directory holding `<tag>_db.bin` files
    pub feature_dir: PathBuf,
}

// ── Harness ───────────────────────────────────────────────────────────────────

/// Run the full cross product over `samples`.
pub fn evaluate(plan: &EvaluationPlan, samples: &[Sample]) -> Result<Vec<EvaluationRecord>> {
    let mut records = Vec::new();
    for &kind in &plan.extractors {
        log::info!("evaluating extractor '{}'", kind);
        let extractor = build_extractor(kind, &plan.settings)?;
        let db = Arc::new(Database::load(&database_path(&plan.feature_dir, kind))?);
        records.extend(evaluate_with(
            kind.tag(),
            extractor,
            db,
            samples,
            &plan.metrics,
            &plan.granularities,
            plan.depth,
        )?);
    }
    Ok(records)
}

/// Evaluate one extractor against an already-loaded database. Queries are
/// extracted once and reused for every metric.
pub fn evaluate_with(
    name: &str,
    extractor: Extractor,
    db: Arc<Database>,
    samples: &[Sample],
    metrics: &[Metric],
    granularities: &[LabelGranularity],
    depth: usize,
) -> Result<Vec<EvaluationRecord>> {
    let mut finder = Finder::new(extractor, metrics.first().copied().unwrap_or(Metric::Cosine));
    finder.attach_database(db)?;

    let mut queries: Vec<(FeatureVector, &Sample)> = Vec::with_capacity(samples.len());
    let mut extraction_times = Vec::with_capacity(samples.len());
    let mut errors = 0usize;

    for sample in samples {
        let t = timed(|| finder.extractor().extract(&sample.path));
        extraction_times.push(t.duration);
        match t.value {
            Ok(Some(vector)) => queries.push((vector, sample)),
            Ok(None) => errors += 1,
            Err(e) => {
                log::warn!("{}: failed to extract '{}': {}", name, sample.path.display(), e);
                errors += 1;
            }
        }
    }
    let extraction_secs = mean_secs(&extraction_times);
    log::info!(
        "{}: {} queries extracted, {} errors, {:.4}s mean extraction",
        name,
        queries.len(),
        errors,
        extraction_secs
    );

    let mut records = Vec::with_capacity(metrics.len() * granularities.len());
    for &metric in metrics {
        finder.set_metric(metric);

        let mut outputs = Vec::with_capacity(queries.len());
        let mut search_times = Vec::with_capacity(queries.len());
        for (vector, _) in &queries {
            let t = timed(|| finder.search_vector(vector, depth));
            search_times.push(t.duration);
            outputs.push(t.value?);
        }
        let average_time = extraction_secs + mean_secs(&search_times);

        for &granularity in granularities {
            let (mrr, map, accuracy) = if queries.is_empty() {
                (0.0, 0.0, 0.0)
            } else {
                let retrievals: Vec<Vec<String>> =
                    outputs.iter().map(|o| o.labels(granularity)).collect();
                let truths: Vec<String> = queries
                    .iter()
                    .map(|(_, s)| granularity.select(&s.color, &s.style))
                    .collect();
                (
                    mean_reciprocal_rank(&retrievals, &truths)?,
                    mean_average_precision(&retrievals, &truths)?,
                    first_rank_accuracy(&retrievals, &truths)?,
                )
            };
            log::debug!(
                "{} / {} / {}: mrr={:.4} map={:.4} acc={:.4}",
                name,
                metric,
                granularity.tag(),
                mrr,
                map,
                accuracy
            );
            records.push(EvaluationRecord {
                extractor: name.to_string(),
                distance: metric.tag().to_string(),
                mrr,
                map,
                accuracy,
                average_time,
                errors,
                granularity: granularity.tag().to_string(),
            });
        }
    }
    Ok(records)
}

fn mean_secs(times: &[Duration]) -> f64 {
    if times.is_empty() {
        return 0.0;
    }
    times.iter().map(Duration::as_secs_f64).sum::<f64>() / times.len() as f64
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Write the report, replacing any previous file.
pub fn write_report(path: &Path, records: &[EvaluationRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path)?;
    writeln!(f, "{}", REPORT_HEADER)?;
    write_rows(&mut f, records)
}

/// Append rows, writing the header only when the file is new.
pub fn append_report(path: &Path, records: &[EvaluationRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let is_new = !path.exists();
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    if is_new {
        writeln!(f, "{}", REPORT_HEADER)?;
    }
    write_rows(&mut f, records)
}

fn write_rows<W: Write>(w: &mut W, records: &[EvaluationRecord]) -> Result<()> {
    for r in records {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{}",
            esc(&r.extractor),
            esc(&r.distance),
            r.mrr,
            r.map,
            r.accuracy,
            r.average_time,
            r.errors,
            esc(&r.granularity)
        )?;
    }
    Ok(())
}

fn esc(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
