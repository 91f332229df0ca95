// PicSeek — example/batch.rs
// Demonstrates building a database from a manifest with miss/failure reporting.

use image::{DynamicImage, GrayImage, Luma};

use pcore::database::build_database;
use pcore::manifest::Sample;
use pcore::{build_extractor, ExtractorKind, ExtractorSettings};

fn main() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join("picseek-batch-example");
    std::fs::create_dir_all(&dir)?;

    // Checkerboard has corners; a flat image has none
    let board = GrayImage::from_fn(96, 96, |x, y| {
        if (x / 16 + y / 16) % 2 == 0 { Luma([230]) } else { Luma([20]) }
    });
    let flat = GrayImage::from_pixel(96, 96, Luma([128]));

    let board_path = dir.join("board.png");
    let flat_path = dir.join("flat.png");
    DynamicImage::ImageLuma8(board).save(&board_path)?;
    DynamicImage::ImageLuma8(flat).save(&flat_path)?;

    let samples = vec![
        Sample::new(&board_path, "black", "check"),
        Sample::new(&flat_path, "gray", "plain"),
        // Missing file, will fail
        Sample::new(dir.join("missing.png"), "none", "none"),
    ];

    let extractor = build_extractor(
        ExtractorKind::Harris,
        &ExtractorSettings {
            vector_size: 16,
            input_width: 96,
            input_height: 96,
            ..Default::default()
        },
    )?;
    let (db, report) = build_database(&extractor, &samples)?;

    println!("Inserted: {} (db rows: {}, dim: {})", report.inserted, db.len(), db.dim());
    println!("Misses:   {}", report.misses.len());
    for p in &report.misses {
        println!("  {}", p.display());
    }
    println!("Failed:   {}", report.failed.len());
    for (p, reason) in &report.failed {
        println!("  {} => {}", p.display(), reason);
    }
    Ok(())
}
