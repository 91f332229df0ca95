// PicSeek — main.rs
// Binary entry point: build feature databases, search one image, evaluate.
// Author: d65v <https://github.com/d65v>

use std::env;
use std::path::Path;

use anyhow::{bail, Context};

use pcore::database::{build_database, database_path};
use pcore::evaluation::{evaluate, write_report, EvaluationPlan, LabelGranularity};
use pcore::manifest::load_manifest;
use pcore::{build_extractor, parse_depth, Finder, PicSeekConfig};

fn main() {
    // Initialize logger, respects RUST_LOG
    env_logger::init();

    // Load .env if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let outcome = match mode {
        "build" => run_build(),
        "search" => run_search(&args[2..]),
        "evaluate" => run_evaluate(),
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        unknown => {
            eprintln!("[PicSeek] Unknown mode: '{}'. Try --help.", unknown);
            std::process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("[PicSeek] {:#}", e);
        std::process::exit(1);
    }
}

fn run_build() -> anyhow::Result<()> {
    let config = PicSeekConfig::from_env()?;
    let manifest = config.input_path.join("train.jsonl");
    let samples = load_manifest(&manifest)
        .with_context(|| format!("reading manifest '{}'", manifest.display()))?;
    log::info!("{} catalog images in '{}'", samples.len(), manifest.display());

    let settings = config.extractor_settings();
    for &kind in &config.extractors {
        let extractor = build_extractor(kind, &settings)?;
        log::info!(
            "building '{}' ({} family, dim={})",
            kind,
            if kind.is_keypoint() { "keypoint" } else { "compressor" },
            extractor.dimension()
        );
        let (db, report) = build_database(&extractor, &samples)?;
        let path = database_path(&config.feature_path, kind);
        db.save(&path)?;

        println!(
            "  {:14} inserted={:6}  misses={:4}  failed={:4}  -> {}",
            kind.tag(),
            report.inserted,
            report.misses.len(),
            report.failed.len(),
            path.display()
        );
        for (p, reason) in &report.failed {
            log::debug!("  {} => {}", p.display(), reason);
        }
    }
    Ok(())
}

fn run_search(args: &[String]) -> anyhow::Result<()> {
    let config = PicSeekConfig::from_env()?;
    let image = match args.first() {
        Some(p) => Path::new(p),
        None => bail!("usage: picseek search <image> [depth]"),
    };
    let depth = match args.get(1) {
        Some(raw) => parse_depth(raw)?,
        None => config.depth,
    };

    let extractor = build_extractor(config.extractor, &config.extractor_settings())?;
    let mut finder = Finder::new(extractor, config.metric);
    finder.change_database(&database_path(&config.feature_path, config.extractor))?;

    let timed = finder.search_timed(image, depth);
    let output = timed.value?;

    if output.is_empty() {
        println!("[PicSeek] No results for '{}'.", image.display());
        return Ok(());
    }

    println!(
        "\n[PicSeek] Top-{} results for '{}' ({} / {}, {:.2}ms):",
        output.len(),
        image.display(),
        config.extractor,
        config.metric,
        timed.duration.as_secs_f64() * 1000.0
    );
    for (label, distance) in output.combined().iter().zip(&output.distances) {
        println!("  {:24}  distance={:.6}", label, distance);
    }
    Ok(())
}

fn run_evaluate() -> anyhow::Result<()> {
    let config = PicSeekConfig::from_env()?;
    let manifest = config.input_path.join("test.jsonl");
    let samples = load_manifest(&manifest)
        .with_context(|| format!("reading manifest '{}'", manifest.display()))?;

    let plan = EvaluationPlan {
        extractors: config.extractors.clone(),
        metrics: config.metrics.clone(),
        granularities: LabelGranularity::ALL.to_vec(),
        depth: config.depth,
        settings: config.extractor_settings(),
        feature_dir: config.feature_path.clone(),
    };
    log::info!(
        "evaluating {} extractors x {} metrics on {} queries",
        plan.extractors.len(),
        plan.metrics.len(),
        samples.len()
    );

    let records = evaluate(&plan, &samples)?;
    let report = config.evaluation_path.join("evaluation.csv");
    write_report(&report, &records)?;

    println!("\n[PicSeek] {} rows written to '{}'", records.len(), report.display());
    for r in &records {
        println!(
            "  {:14} {:10} {:6}  mrr={:.4}  map={:.4}  acc={:.4}  time={:.4}s  errors={}",
            r.extractor, r.distance, r.granularity, r.mrr, r.map, r.accuracy, r.average_time, r.errors
        );
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"
PicSeek — Content-Based Image Retrieval

USAGE:
  picseek [MODE]

MODES:
  build                    Extract train.jsonl into one database per extractor
  search <image> [depth]   Rank the database against one image
  evaluate                 Score every extractor x metric on test.jsonl
  help                     Show this message

ENVIRONMENT:
  PICSEEK_INPUT_PATH       Directory holding train.jsonl / test.jsonl (default: ./data)
  PICSEEK_FEATURE_PATH     Directory of <extractor>_db.bin files (default: ./features)
  PICSEEK_EVALUATION_PATH  Directory for evaluation.csv (default: ./outputs)
  PICSEEK_EXTRACTOR        Extractor for search: harris | fast | color-layout | encoder (default: harris)
  PICSEEK_EXTRACTORS       Extractors for build/evaluate (default: harris,fast,color-layout)
  PICSEEK_METRIC           Metric for search: cosine | cosine-similarity | manhattan | euclidean (default: cosine)
  PICSEEK_METRICS          Metrics for evaluate (default: cosine,manhattan,euclidean)
  PICSEEK_DEPTH            Results per query (default: 5)
  PICSEEK_VECTOR_SIZE      Keypoints kept per image (default: 32)
  PICSEEK_INPUT_SIZE       Square input side (default: 224)
  PICSEEK_ENCODER_WEIGHTS  Weights file for the encoder extractor
  RUST_LOG                 Log level: info | debug | warn | error

AUTHOR:
  d65v <https://github.com/d65v>
"#
    );
}
