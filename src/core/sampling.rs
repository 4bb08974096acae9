//! Guarded random draws shared by the simulation components.
//!
//! Degenerate inputs (zero or negative rates, empty weights) yield zero or
//! empty results instead of errors, so that extinct lineages and unconnected
//! populations never abort a run.

use rand::Rng;
use rand::seq::index;
use rand_distr::{Binomial, Distribution, Exp, Poisson};

use crate::errors::{GenepiError, Result};

/// Normalized cumulative distribution of non-negative weights.
///
/// The last entry is forced to one. All-zero weights give an empty
/// distribution.
pub fn accumulate_cdf(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.) || !total.is_finite() {
        return Vec::new();
    }
    let mut cumulative = 0.;
    let mut cdf: Vec<f64> = weights
        .iter()
        .map(|weight| {
            cumulative += weight / total;
            cumulative
        })
        .collect();
    if let Some(last) = cdf.last_mut() {
        *last = 1.;
    }
    cdf
}

/// Index drawn from a cumulative distribution built by [`accumulate_cdf`].
pub fn weighted_choice<R: Rng + ?Sized>(cdf: &[f64], rng: &mut R) -> usize {
    let threshold: f64 = rng.random();
    let index = cdf.iter().take_while(|&&value| value < threshold).count();
    index.min(cdf.len().saturating_sub(1))
}

pub fn poisson<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> usize {
    if !(lambda > 0.) {
        return 0;
    }
    match Poisson::new(lambda) {
        Ok(distribution) => distribution.sample(rng) as usize,
        Err(_) => 0,
    }
}

pub fn exponential<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> Option<f64> {
    if !(rate > 0.) {
        return None;
    }
    match Exp::new(rate) {
        Ok(distribution) => Some(distribution.sample(rng)),
        Err(_) => None,
    }
}

pub fn binomial<R: Rng + ?Sized>(rng: &mut R, n: usize, p: f64) -> usize {
    if n == 0 || !(p > 0.) {
        return 0;
    }
    if p >= 1. {
        return n;
    }
    match Binomial::new(n as u64, p) {
        Ok(distribution) => distribution.sample(rng) as usize,
        Err(_) => 0,
    }
}

/// `amount` indices in `0..length`, drawn uniformly with replacement.
pub fn choose_with_replacement<R: Rng + ?Sized>(
    rng: &mut R,
    amount: usize,
    length: usize,
) -> Vec<usize> {
    if length == 0 {
        return Vec::new();
    }
    (0..amount).map(|_| rng.random_range(0..length)).collect()
}

/// `amount` distinct indices in `0..length`.
pub fn choose_without_replacement<R: Rng + ?Sized>(
    rng: &mut R,
    amount: usize,
    length: usize,
) -> Result<Vec<usize>> {
    if amount > length {
        return Err(GenepiError::ConfigurationError(format!(
            "unable to sample {amount} out of {length} without replacement"
        )));
    }
    Ok(index::sample(rng, length, amount).into_vec())
}
