// PicSeek — distance.rs
// Vector normalization and the interchangeable ranking metrics.
// Author: d65v <https://github.com/d65v>

use std::fmt;
use std::str::FromStr;

use crate::PicSeekError;

/// Supported ranking metrics. Every metric yields a score where the
/// database is ranked ascending (smallest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Cosine distance: 1 - cosine similarity (lower = closer)
    Cosine,
    /// Raw cosine similarity, still ranked ascending.
    /// Reproduces the legacy ordering where the least similar rows come first.
    CosineSimilarity,
    /// Manhattan (L1) distance (lower = closer)
    Manhattan,
    /// Euclidean (L2) distance (lower = closer)
    Euclidean,
}

impl Metric {
    /// Metrics iterated by default during evaluation.
    pub const ALL: [Metric; 3] = [Metric::Cosine, Metric::Manhattan, Metric::Euclidean];

    pub fn tag(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::CosineSimilarity => "cosine-similarity",
            Metric::Manhattan => "manhattan",
            Metric::Euclidean => "euclidean",
        }
    }

    /// Ranking score between a query and one database row.
    #[inline]
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Metric::Cosine => 1.0 - cosine_similarity(query, candidate),
            Metric::CosineSimilarity => cosine_similarity(query, candidate),
            Metric::Manhattan => manhattan_distance(query, candidate),
            Metric::Euclidean => euclidean_distance(query, candidate),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Metric {
    type Err = PicSeekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" | "cosinus" => Ok(Metric::Cosine),
            "cosine-similarity" => Ok(Metric::CosineSimilarity),
            "manhattan" => Ok(Metric::Manhattan),
            "euclidean" => Ok(Metric::Euclidean),
            other => Err(PicSeekError::ConfigError(format!(
                "unknown metric '{}' (expected cosine | cosine-similarity | manhattan | euclidean)",
                other
            ))),
        }
    }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// L2-normalize a vector (copy). Returns a unit vector.
/// If the vector is all-zero, it is returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mag = magnitude(v);
    if mag < 1e-10 {
        return v.to_vec();
    }
    v.iter().map(|x| x / mag).collect()
}

/// Compute the L2 (Euclidean) magnitude (norm) of a vector.
#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

// ── Similarity / Distance ─────────────────────────────────────────────────────

/// Dot product of two equal-length vectors.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity between two vectors.
/// A zero vector has similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let na = normalize(a);
    let nb = normalize(b);
    dot(&na, &nb).clamp(-1.0, 1.0)
}

/// Sum of absolute differences.
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Squared Euclidean distance.
pub fn euclidean_distance_sq(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_distance_sq(a, b).sqrt()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_vector() {
        let v = vec![3.0f32, 4.0];
        let n = normalize(&v);
        let mag = magnitude(&n);
        assert!((mag - 1.0).abs() < 1e-6, "magnitude should be ~1.0");
    }

    #[test]
    fn test_normalize_zero_vector() {
        let v = vec![0.0f32, 0.0, 0.0];
        let n = normalize(&v);
        assert_eq!(n, v, "zero vector should be returned unchanged");
    }

    #[test]
    fn test_cosine_same_vector() {
        let v = vec![1.0, 2.0, 3.0];
        let s = cosine_similarity(&v, &v);
        assert!((s - 1.0).abs() < 1e-5);
        assert!(Metric::Cosine.score(&v, &v).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((Metric::Cosine.score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-5);
        assert!((euclidean_distance_sq(&a, &b) - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_manhattan_distance() {
        let a = vec![1.0, -1.0, 2.0];
        let b = vec![0.0, 1.0, 2.0];
        assert!((manhattan_distance(&a, &b) - 3.0).abs() < 1e-6);
        assert!((Metric::Manhattan.score(&a, &b) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_legacy_similarity_score_is_raw() {
        let a = vec![1.0, 0.0];
        assert!((Metric::CosineSimilarity.score(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_tags_round_trip() {
        for metric in Metric::ALL.iter().chain([Metric::CosineSimilarity].iter()) {
            assert_eq!(metric.tag().parse::<Metric>().unwrap(), *metric);
        }
        assert_eq!("cosinus".parse::<Metric>().unwrap(), Metric::Cosine);
        assert!("hamming".parse::<Metric>().is_err());
    }
}
