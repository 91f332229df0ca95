// PicSeek — metrics.rs
// Retrieval quality scores over ranked label lists: reciprocal rank,
// average precision, rank-1 accuracy and their corpus means.
// Author: d65v <https://github.com/d65v>

use crate::{PicSeekError, Result};

fn check_truth(truth: &str) -> Result<()> {
    if truth.is_empty() {
        return Err(PicSeekError::InvalidInput("truth label must be non-empty".into()));
    }
    Ok(())
}

fn check_pairs(retrievals: usize, truths: usize) -> Result<()> {
    if retrievals != truths {
        return Err(PicSeekError::InvalidInput(format!(
            "{} retrievals paired with {} truths",
            retrievals, truths
        )));
    }
    if retrievals == 0 {
        return Err(PicSeekError::InvalidInput("empty evaluation corpus".into()));
    }
    Ok(())
}

/// `1 / r` for the 1-based position `r` of the first match, else `0.0`.
pub fn reciprocal_rank<S: AsRef<str>>(found: &[S], truth: &str) -> Result<f64> {
    check_truth(truth)?;
    Ok(found
        .iter()
        .position(|label| label.as_ref() == truth)
        .map_or(0.0, |i| 1.0 / (i + 1) as f64))
}

pub fn mean_reciprocal_rank<S, T>(retrievals: &[Vec<S>], truths: &[T]) -> Result<f64>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    check_pairs(retrievals.len(), truths.len())?;
    let mut sum = 0.0;
    for (found, truth) in retrievals.iter().zip(truths) {
        sum += reciprocal_rank(found, truth.as_ref())?;
    }
    Ok(sum / retrievals.len() as f64)
}

/// Fraction of `found` equal to `truth`.
pub fn precision<S: AsRef<str>>(found: &[S], truth: &str) -> Result<f64> {
    check_truth(truth)?;
    if found.is_empty() {
        return Err(PicSeekError::InvalidInput("precision over an empty list".into()));
    }
    let hits = found.iter().filter(|label| label.as_ref() == truth).count();
    Ok(hits as f64 / found.len() as f64)
}

/// Mean of the precision at every matching position; `0.0` without matches.
pub fn average_precision<S: AsRef<str>>(found: &[S], truth: &str) -> Result<f64> {
    check_truth(truth)?;
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (i, label) in found.iter().enumerate() {
        if label.as_ref() == truth {
            hits += 1;
            // same as precision(&found[..=i], truth)
            sum += hits as f64 / (i + 1) as f64;
        }
    }
    Ok(if hits == 0 { 0.0 } else { sum / hits as f64 })
}

pub fn mean_average_precision<S, T>(retrievals: &[Vec<S>], truths: &[T]) -> Result<f64>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    check_pairs(retrievals.len(), truths.len())?;
    let mut sum = 0.0;
    for (found, truth) in retrievals.iter().zip(truths) {
        sum += average_precision(found, truth.as_ref())?;
    }
    Ok(sum / retrievals.len() as f64)
}

/// Fraction of queries whose top result is correct. An empty result is a miss.
pub fn first_rank_accuracy<S, T>(retrievals: &[Vec<S>], truths: &[T]) -> Result<f64>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    check_pairs(retrievals.len(), truths.len())?;
    let mut correct = 0usize;
    for (found, truth) in retrievals.iter().zip(truths) {
        check_truth(truth.as_ref())?;
        if found.first().map(|l| l.as_ref()) == Some(truth.as_ref()) {
            correct += 1;
        }
    }
    Ok(correct as f64 / retrievals.len() as f64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    fn ranked() -> Vec<&'static str> {
        vec!["one", "two", "one", "one", "two"]
    }

    #[test]
    fn test_reciprocal_rank() {
        assert!((reciprocal_rank(&ranked(), "one").unwrap() - 1.0).abs() < EPS);
        assert!((reciprocal_rank(&ranked(), "two").unwrap() - 0.5).abs() < EPS);
        let rr = reciprocal_rank(&["two", "two", "one", "one", "two"], "one").unwrap();
        assert!((rr - 1.0 / 3.0).abs() < EPS);
        assert_eq!(reciprocal_rank(&ranked(), "three").unwrap(), 0.0);
    }

    #[test]
    fn test_average_precision() {
        let ap = average_precision(&ranked(), "one").unwrap();
        assert!((ap - mean(&[1.0, 2.0 / 3.0, 3.0 / 4.0])).abs() < EPS);
        let ap = average_precision(&ranked(), "two").unwrap();
        assert!((ap - mean(&[1.0 / 2.0, 2.0 / 5.0])).abs() < EPS);
        assert_eq!(average_precision(&ranked(), "three").unwrap(), 0.0);
    }

    #[test]
    fn test_precision() {
        assert!((precision(&ranked(), "one").unwrap() - 0.6).abs() < EPS);
        assert!(precision::<&str>(&[], "one").is_err());
    }

    #[test]
    fn test_corpus_means() {
        let retrievals = vec![ranked(), ranked()];
        let truths = ["one", "two"];
        let mrr = mean_reciprocal_rank(&retrievals, &truths).unwrap();
        assert!((mrr - mean(&[1.0, 0.5])).abs() < EPS);

        let map = mean_average_precision(&retrievals, &truths).unwrap();
        let expected = mean(&[
            mean(&[1.0, 2.0 / 3.0, 3.0 / 4.0]),
            mean(&[1.0 / 2.0, 2.0 / 5.0]),
        ]);
        assert!((map - expected).abs() < EPS);

        assert!((first_rank_accuracy(&retrievals, &truths).unwrap() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_empty_found_is_a_miss() {
        let retrievals: Vec<Vec<&str>> = vec![vec![], vec!["one"]];
        let acc = first_rank_accuracy(&retrievals, &["one", "one"]).unwrap();
        assert!((acc - 0.5).abs() < EPS);
        assert_eq!(
            mean_reciprocal_rank(&retrievals, &["one", "one"]).unwrap(),
            0.5
        );
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        assert!(matches!(
            reciprocal_rank(&ranked(), ""),
            Err(PicSeekError::InvalidInput(_))
        ));
        assert!(mean_reciprocal_rank(&[ranked()], &["one", "two"]).is_err());
        let none: Vec<Vec<&str>> = Vec::new();
        let no_truths: [&str; 0] = [];
        assert!(mean_average_precision(&none, &no_truths).is_err());
        assert!(first_rank_accuracy(&[ranked()], &[""]).is_err());
    }

    #[test]
    fn test_inputs_are_owned_strings_too() {
        let retrievals = vec![vec!["red".to_string(), "blue".to_string()]];
        let truths = vec!["blue".to_string()];
        assert_eq!(mean_reciprocal_rank(&retrievals, &truths).unwrap(), 0.5);
    }
}
