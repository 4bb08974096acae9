use itertools::Itertools;
use std::collections::BTreeMap;

use crate::core::Population;

/// Per-tick summary of a population.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationSnapshot {
    pub day: usize,
    pub population: String,
    pub n_humans: usize,
    pub n_infecteds: usize,
    pub n_polygenomic: usize,
    pub n_strains: usize,
    pub vectorial_capacity: f64,
}

impl PopulationSnapshot {
    pub fn f_infected(&self) -> f64 {
        fraction(self.n_infecteds, self.n_humans)
    }

    pub fn f_polygenomic(&self) -> f64 {
        fraction(self.n_polygenomic, self.n_infecteds)
    }

    /// Mean number of distinct strains per infected host.
    pub fn mean_coi(&self) -> f64 {
        fraction(self.n_strains, self.n_infecteds)
    }
}

fn fraction(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Trait extension to summarize the parasite genetics of a population
pub trait PopulationFrequencies {
    fn allele_frequencies(&self) -> Vec<f64>;

    fn coi_distribution(&self) -> BTreeMap<usize, usize>;

    fn mean_coi(&self) -> f64;
}

impl PopulationFrequencies for Population {
    /// Alternate-allele frequency of every SNP over all strains of all infected hosts.
    fn allele_frequencies(&self) -> Vec<f64> {
        let mut counts: Vec<usize> = Vec::new();
        let mut n_strains = 0;
        for genome in self
            .infecteds()
            .iter()
            .flat_map(|individual| individual.infection().strains())
        {
            let barcode = genome.barcode();
            if counts.is_empty() {
                counts = vec![0; barcode.len()];
            }
            for (count, allele) in counts.iter_mut().zip(barcode) {
                *count += (allele != 0) as usize;
            }
            n_strains += 1;
        }
        counts
            .into_iter()
            .map(|count| fraction(count, n_strains))
            .collect()
    }

    /// Number of infected hosts per complexity of infection.
    fn coi_distribution(&self) -> BTreeMap<usize, usize> {
        self.infecteds()
            .iter()
            .map(|individual| individual.infection().n_strains())
            .counts()
            .into_iter()
            .collect()
    }

    fn mean_coi(&self) -> f64 {
        let n_strains = self
            .infecteds()
            .iter()
            .map(|individual| individual.infection().n_strains())
            .sum();
        fraction(n_strains, self.n_infecteds())
    }
}
