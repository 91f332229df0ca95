// PicSeek — example/basic.rs
// Builds a tiny database from synthetic images and searches it.
// Run with:  cargo run --example basic  (from pcore/ directory)

use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};

use pcore::{build_extractor, Database, DatabaseEntry, ExtractorKind, ExtractorSettings, Finder, Metric};

fn solid(color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb(color)))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("── PicSeek Basic Example ─────────────────────");

    let settings = ExtractorSettings {
        input_width: 64,
        input_height: 64,
        ..Default::default()
    };
    let extractor = build_extractor(ExtractorKind::ColorLayout, &settings)?;

    let catalog = [
        ("red", "casual", [220, 30, 30]),
        ("crimson", "formal", [180, 20, 40]),
        ("blue", "casual", [30, 40, 210]),
        ("green", "sport", [40, 190, 60]),
        ("white", "formal", [245, 245, 245]),
    ];

    let mut entries = Vec::new();
    for (color, style, rgb) in &catalog {
        if let Some(feature) = extractor.extract_image(&solid(*rgb))? {
            entries.push(DatabaseEntry::new(feature, *color, *style));
        }
    }
    let db = Database::from_entries(extractor.dimension(), entries)?;
    println!("Catalog: {} images, dim={}\n", db.len(), db.dim());

    // Query: something close to "red"
    let query = extractor
        .extract_image(&solid([210, 35, 35]))?
        .unwrap_or_default();

    let mut finder = Finder::new(extractor, Metric::Euclidean);
    finder.attach_database(Arc::new(db))?;

    for metric in Metric::ALL {
        finder.set_metric(metric);
        let out = finder.search_vector(&query, 3)?;
        println!("Top-3 by {}:", metric);
        for (label, d) in out.combined().iter().zip(&out.distances) {
            println!("  {:16}  distance={:.4}", label, d);
        }
    }

    println!("\nExpected: red_casual, crimson_formal first");
    println!("\n── Done ──────────────────────────────────────");
    Ok(())
}
