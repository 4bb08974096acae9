//! Discretized genome layout.
//!
//! The layout maps (chromosome, position) coordinates onto a single array of
//! bins spanning all chromosomes back to back. It also records which bins
//! hold catalogued SNPs, in barcode order, and the per-bin fitness weights of
//! selective loci.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::config::GenomeParameters;
use crate::errors::{GenepiError, Result};

/// Chromosome lengths of the P. falciparum 3D7 reference in base pairs.
pub const PF_CHROMOSOME_LENGTHS: [u64; 14] = [
    643_000, 947_000, 1_100_000, 1_200_000, 1_350_000, 1_420_000, 1_450_000, 1_500_000,
    1_550_000, 1_700_000, 2_050_000, 2_300_000, 2_950_000, 3_300_000,
];

/// A catalogued single nucleotide polymorphism. Chromosomes are numbered from one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snp {
    pub chrom: usize,
    pub pos: u64,
    #[serde(default = "default_freq")]
    pub freq: f64,
}

fn default_freq() -> f64 {
    0.5
}

impl Snp {
    pub fn new(chrom: usize, pos: u64, freq: f64) -> Self {
        Self { chrom, pos, freq }
    }
}

/// A SNP after discretization.
#[derive(Debug, Clone, PartialEq)]
pub struct SnpBin {
    pub name: String,
    pub chrom: usize,
    pub pos: u64,
    pub bin: usize,
    pub freq: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chromosome {
    pub length: u64,
    pub n_bins: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenomeLayout {
    bin_size: u64,
    bp_per_morgan: f64,
    chromosomes: Vec<Chromosome>,
    chrom_breaks: Vec<usize>,
    snps: Vec<SnpBin>,
    fitness: BTreeMap<usize, f64>,
}

impl GenomeLayout {
    pub fn new(lengths: &[u64], bin_size: u64, bp_per_morgan: f64) -> Result<Self> {
        if bin_size == 0 {
            return Err(GenepiError::ConfigurationError(
                "bin size must be positive".to_string(),
            ));
        }
        let chromosomes: Vec<Chromosome> = lengths
            .iter()
            .map(|&length| Chromosome {
                length,
                n_bins: length.div_ceil(bin_size) as usize,
            })
            .collect();
        let mut chrom_breaks = Vec::with_capacity(chromosomes.len() + 1);
        chrom_breaks.push(0);
        for chromosome in chromosomes.iter() {
            let last = chrom_breaks[chrom_breaks.len() - 1];
            chrom_breaks.push(last + chromosome.n_bins);
        }
        Ok(Self {
            bin_size,
            bp_per_morgan,
            chromosomes,
            chrom_breaks,
            snps: Vec::new(),
            fitness: BTreeMap::new(),
        })
    }

    pub fn plasmodium_falciparum(bin_size: u64, bp_per_morgan: f64) -> Result<Self> {
        Self::new(&PF_CHROMOSOME_LENGTHS, bin_size, bp_per_morgan)
    }

    /// Build the P. falciparum layout for a SNP catalog.
    ///
    /// Rare SNPs are filtered first. Without an explicit bin size, the bin size
    /// is derived from the closest spacing between SNPs on the same chromosome.
    pub fn from_catalog(snps: &[Snp], parameters: &GenomeParameters) -> Result<Self> {
        let kept: Vec<Snp> = if parameters.min_allele_freq > 0. {
            snps.iter()
                .filter(|snp| snp.freq > parameters.min_allele_freq)
                .cloned()
                .collect()
        } else {
            snps.to_vec()
        };
        if kept.len() < snps.len() {
            log::info!(
                "Dropped {} SNPs with allele frequency at or below {}",
                snps.len() - kept.len(),
                parameters.min_allele_freq
            );
        }

        let bin_size = match parameters.bin_size {
            Some(bin_size) => bin_size,
            None => {
                let distance = closest_snp_distance(&kept).ok_or_else(|| {
                    GenepiError::ConfigurationError(
                        "unable to derive a bin size from fewer than two SNPs on a chromosome"
                            .to_string(),
                    )
                })?;
                let bin_size = rounded_bin_size(distance);
                log::info!("Closest SNPs are {distance}bp apart, binning at {bin_size}bp");
                bin_size
            }
        };

        let mut layout = Self::plasmodium_falciparum(bin_size, parameters.bp_per_morgan)?;
        layout.set_snps(&kept)?;
        Ok(layout)
    }

    /// Replace the SNP set. Where two SNPs fall into the same bin the one with
    /// the higher allele frequency is kept.
    pub fn set_snps(&mut self, snps: &[Snp]) -> Result<()> {
        let mut sorted = snps.to_vec();
        sorted.sort_by_key(|snp| (snp.chrom, snp.pos));

        let mut binned: Vec<SnpBin> = Vec::with_capacity(sorted.len());
        for snp in sorted.iter() {
            let bin = self.bin_of(snp.chrom, snp.pos)?;
            match binned.last_mut() {
                Some(last) if last.bin == bin => {
                    log::warn!(
                        "SNPs {} (freq={:.4}) and {}:{} (freq={:.4}) share bin {}",
                        last.name,
                        last.freq,
                        snp.chrom,
                        snp.pos,
                        snp.freq,
                        bin
                    );
                    if snp.freq > last.freq {
                        *last = SnpBin::from_snp(snp, bin);
                    }
                }
                _ => binned.push(SnpBin::from_snp(snp, bin)),
            }
        }

        log::info!(
            "{} of {} unique SNPs after discretization at {}bp binning",
            binned.len(),
            snps.len(),
            self.bin_size
        );
        self.snps = binned;
        Ok(())
    }

    /// Add or replace a SNP and set the fitness weight of its non-reference allele.
    ///
    /// Returns the bin of the locus.
    pub fn add_locus(
        &mut self,
        chrom: usize,
        pos: u64,
        name: &str,
        fitness: f64,
        freq: f64,
    ) -> Result<usize> {
        if !(fitness >= 0.) {
            return Err(GenepiError::ConfigurationError(format!(
                "locus {name} has invalid fitness {fitness}"
            )));
        }
        let bin = self.bin_of(chrom, pos)?;
        let locus = SnpBin {
            name: name.to_string(),
            chrom,
            pos,
            bin,
            freq,
        };
        match self.snps.binary_search_by_key(&bin, |snp| snp.bin) {
            Ok(index) => {
                log::info!("Replacing SNP {} with locus {name}", self.snps[index].name);
                self.snps[index] = locus;
            }
            Err(index) => self.snps.insert(index, locus),
        }
        self.fitness.insert(bin, fitness);
        log::info!("Added locus {name} at bin {bin} with fitness {fitness}");
        Ok(bin)
    }

    pub fn bin_of(&self, chrom: usize, pos: u64) -> Result<usize> {
        let index = chrom.checked_sub(1).filter(|&i| i < self.chromosomes.len());
        let Some(index) = index else {
            return Err(GenepiError::ConfigurationError(format!(
                "chromosome {chrom} is not part of the genome"
            )));
        };
        let local = (pos / self.bin_size) as usize;
        if local >= self.chromosomes[index].n_bins {
            return Err(GenepiError::ConfigurationError(format!(
                "position {pos} lies beyond the end of chromosome {chrom} ({}bp)",
                self.chromosomes[index].length
            )));
        }
        Ok(self.chrom_breaks[index] + local)
    }

    pub fn bin_size(&self) -> u64 {
        self.bin_size
    }

    pub fn bp_per_morgan(&self) -> f64 {
        self.bp_per_morgan
    }

    /// Expected crossovers per bin.
    pub fn crossover_rate(&self) -> f64 {
        self.bin_size as f64 / self.bp_per_morgan
    }

    pub fn genome_length(&self) -> usize {
        self.chrom_breaks[self.chrom_breaks.len() - 1]
    }

    pub fn n_chromosomes(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn chrom_breaks(&self) -> &[usize] {
        &self.chrom_breaks
    }

    pub fn chromosome_range(&self, index: usize) -> Range<usize> {
        self.chrom_breaks[index]..self.chrom_breaks[index + 1]
    }

    pub fn chromosome_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.chrom_breaks.windows(2).map(|w| w[0]..w[1])
    }

    pub fn snps(&self) -> &[SnpBin] {
        &self.snps
    }

    pub fn snp_named(&self, name: &str) -> Option<&SnpBin> {
        self.snps.iter().find(|snp| snp.name == name)
    }

    pub fn num_snps(&self) -> usize {
        self.snps.len()
    }

    pub fn snp_bins(&self) -> impl Iterator<Item = usize> + '_ {
        self.snps.iter().map(|snp| snp.bin)
    }

    pub fn bin_fitness(&self, bin: usize) -> f64 {
        self.fitness.get(&bin).copied().unwrap_or(1.)
    }

    /// Product of the fitness weights of all non-reference alleles.
    pub fn fitness_of(&self, bins: &[u8]) -> f64 {
        self.fitness
            .iter()
            .filter(|(bin, _)| bins[**bin] != 0)
            .map(|(_, fitness)| fitness)
            .product()
    }
}

impl fmt::Display for GenomeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GenomeLayout(chromosomes={}, bins={}, bin_size={}bp, snps={}, loci={})",
            self.chromosomes.len(),
            self.genome_length(),
            self.bin_size,
            self.snps.len(),
            self.fitness.len()
        )
    }
}

impl SnpBin {
    fn from_snp(snp: &Snp, bin: usize) -> Self {
        Self {
            name: format!("Pf.{}.{}", snp.chrom, snp.pos),
            chrom: snp.chrom,
            pos: snp.pos,
            bin,
            freq: snp.freq,
        }
    }
}

/// Smallest distance between two SNPs on the same chromosome.
pub fn closest_snp_distance(snps: &[Snp]) -> Option<u64> {
    let mut positions: Vec<(usize, u64)> = snps.iter().map(|snp| (snp.chrom, snp.pos)).collect();
    positions.sort_unstable();
    positions
        .windows(2)
        .filter(|w| w[0].0 == w[1].0)
        .map(|w| w[1].1 - w[0].1)
        .min()
}

/// Round a distance down to two significant digits to get a bin size.
pub fn rounded_bin_size(min_distance: u64) -> u64 {
    if min_distance < 100 {
        return min_distance.max(1);
    }
    let magnitude = 10u64.pow(min_distance.ilog10() - 1);
    let shifted = (min_distance - magnitude / 2) as f64 / magnitude as f64;
    shifted.round_ties_even() as u64 * magnitude
}
