//! Rate-based migration between named populations.
//!
//! Infected individuals carry their own exponential migration timer. The
//! uninfected cohort has no identity, so its emigrants are drawn in bulk every
//! tick. Migrants are queued by the populations and delivered by the
//! simulation once all populations have been updated.

use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

use super::hosts::HumanIndividual;
use super::sampling::{accumulate_cdf, binomial, exponential, weighted_choice};

/// Personal migration schedule of an infected individual.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Migration {
    timer: f64,
    destination: Option<String>,
}

impl Migration {
    /// A schedule that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn scheduled(timer: f64, destination: &str) -> Self {
        Self {
            timer,
            destination: Some(destination.to_string()),
        }
    }

    pub fn advance(&mut self, dt: f64) {
        if self.destination.is_some() {
            self.timer -= dt;
        }
    }

    pub fn timer(&self) -> f64 {
        self.timer
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Destination once the timer has run out.
    pub fn due(&self) -> Option<&str> {
        match &self.destination {
            Some(destination) if self.timer <= 0. => Some(destination),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MigrationInfo {
    destinations: Vec<String>,
    cdf: Vec<f64>,
    total_rate: f64,
}

impl MigrationInfo {
    /// Destinations with a non-positive rate are ignored.
    pub fn new(rates: &BTreeMap<String, f64>) -> Self {
        let (destinations, weights): (Vec<String>, Vec<f64>) = rates
            .iter()
            .filter(|(_, rate)| **rate > 0.)
            .map(|(destination, rate)| (destination.clone(), *rate))
            .unzip();
        let total_rate = weights.iter().sum();
        Self {
            cdf: accumulate_cdf(&weights),
            destinations,
            total_rate,
        }
    }

    pub fn total_rate(&self) -> f64 {
        self.total_rate
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    fn choose_destination<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.destinations[weighted_choice(&self.cdf, rng)]
    }

    /// Waiting time and destination of the next move of an infected individual.
    pub fn next_migration<R: Rng + ?Sized>(&self, rng: &mut R) -> Migration {
        if self.destinations.is_empty() {
            return Migration::none();
        }
        match exponential(rng, self.total_rate) {
            Some(timer) => Migration::scheduled(timer, self.choose_destination(rng)),
            None => Migration::none(),
        }
    }

    /// Destinations of the cohort members leaving within `dt` days.
    pub fn destinations_in_timestep<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
        dt: f64,
    ) -> Vec<&str> {
        if self.destinations.is_empty() || n == 0 {
            return Vec::new();
        }
        let probability = 1. - (-self.total_rate * dt).exp();
        let n_emigrants = binomial(rng, n, probability);
        (0..n_emigrants)
            .map(|_| self.choose_destination(rng))
            .collect()
    }
}

impl fmt::Display for MigrationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MigrationInfo(total_rate={}, destinations={:?})",
            self.total_rate, self.destinations
        )
    }
}

#[derive(Debug)]
pub struct Emigrant {
    pub source: String,
    pub destination: String,
    pub individual: HumanIndividual,
}

/// Migrants waiting for delivery at the end of a tick.
#[derive(Debug, Default)]
pub struct MigrantQueue {
    individuals: Vec<Emigrant>,
    cohort: BTreeMap<String, usize>,
}

impl MigrantQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_individual(
        &mut self,
        source: &str,
        destination: &str,
        individual: HumanIndividual,
    ) {
        self.individuals.push(Emigrant {
            source: source.to_string(),
            destination: destination.to_string(),
            individual,
        });
    }

    pub fn push_cohort(&mut self, destination: &str, n: usize) {
        *self.cohort.entry(destination.to_string()).or_default() += n;
    }

    pub fn n_individuals(&self) -> usize {
        self.individuals.len()
    }

    pub fn n_cohort(&self) -> usize {
        self.cohort.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty() && self.cohort.is_empty()
    }

    pub fn take_individuals(&mut self) -> Vec<Emigrant> {
        std::mem::take(&mut self.individuals)
    }

    pub fn take_cohort(&mut self) -> BTreeMap<String, usize> {
        std::mem::take(&mut self.cohort)
    }
}
