//! Immutable, content-addressed parasite genomes.
//!
//! A genome is an array of biallelic states, one byte per bin of the
//! [`GenomeLayout`]. Its id is resolved from the content through the context
//! registry, so structurally identical genomes always compare equal. Genomes
//! are cheap to clone and never change after construction.

use derivative::Derivative;
use derive_more::Deref;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::context::Context;
use super::layout::GenomeLayout;
use crate::errors::{GenepiError, Result};

/// Applied to the bins of a new genome before its id is resolved.
pub type GenomeModifier = dyn Fn(&mut [u8]);

#[derive(Derivative)]
#[derivative(Debug)]
pub struct GenomeData {
    id: usize,
    fitness: f64,
    #[derivative(Debug = "ignore")]
    bins: Box<[u8]>,
    #[derivative(Debug = "ignore")]
    layout: Rc<GenomeLayout>,
}

#[derive(Clone, Debug, Deref)]
#[deref(forward)]
pub struct Genome(Rc<GenomeData>);

impl Genome {
    pub(crate) fn new(id: usize, bins: Box<[u8]>, layout: Rc<GenomeLayout>) -> Self {
        let fitness = layout.fitness_of(&bins);
        Self(Rc::new(GenomeData {
            id,
            fitness,
            bins,
            layout,
        }))
    }

    fn build(ctx: &mut Context, mut bins: Vec<u8>, modifiers: &[&GenomeModifier]) -> Self {
        for modifier in modifiers {
            modifier(bins.as_mut_slice());
        }
        ctx.register_genome(bins.into_boxed_slice())
    }

    pub fn from_reference(ctx: &mut Context) -> Self {
        Self::from_reference_with(ctx, &[])
    }

    pub fn from_reference_with(ctx: &mut Context, modifiers: &[&GenomeModifier]) -> Self {
        let bins = vec![0; ctx.layout().genome_length()];
        Self::build(ctx, bins, modifiers)
    }

    /// Draw every SNP independently with its catalog frequency.
    pub fn from_allele_frequencies(ctx: &mut Context) -> Self {
        Self::from_allele_frequencies_with(ctx, &[])
    }

    pub fn from_allele_frequencies_with(ctx: &mut Context, modifiers: &[&GenomeModifier]) -> Self {
        let layout = ctx.layout().clone();
        let mut bins = vec![0; layout.genome_length()];
        let rng = ctx.rng();
        for snp in layout.snps() {
            if rng.random::<f64>() < snp.freq {
                bins[snp.bin] = 1;
            }
        }
        Self::build(ctx, bins, modifiers)
    }

    /// Reference genome with the SNP bins set to `barcode`.
    pub fn from_barcode(ctx: &mut Context, barcode: &[u8]) -> Result<Self> {
        Self::from_barcode_with(ctx, barcode, &[])
    }

    pub fn from_barcode_with(
        ctx: &mut Context,
        barcode: &[u8],
        modifiers: &[&GenomeModifier],
    ) -> Result<Self> {
        let layout = ctx.layout().clone();
        if barcode.len() != layout.num_snps() {
            return Err(GenepiError::ConfigurationError(format!(
                "barcode of length {} does not match {} SNPs",
                barcode.len(),
                layout.num_snps()
            )));
        }
        let mut bins = vec![0; layout.genome_length()];
        for (bin, &allele) in layout.snp_bins().zip(barcode) {
            bins[bin] = allele;
        }
        Ok(Self::build(ctx, bins, modifiers))
    }
}

/// Modifier forcing `allele` at `bin`, e.g. a resistance site.
pub fn set_allele(bin: usize, allele: u8) -> impl Fn(&mut [u8]) {
    move |bins: &mut [u8]| bins[bin] = allele
}

impl GenomeData {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn layout(&self) -> &GenomeLayout {
        &self.layout
    }

    pub fn chromosome(&self, index: usize) -> &[u8] {
        &self.bins[self.layout.chromosome_range(index)]
    }

    /// Alleles at the SNP bins, in barcode order.
    pub fn barcode(&self) -> Vec<u8> {
        self.layout.snp_bins().map(|bin| self.bins[bin]).collect()
    }

    pub fn display_barcode(&self) -> String {
        self.layout
            .snp_bins()
            .map(|bin| display_bit(self.bins[bin]))
            .collect()
    }

    pub fn display_genome(&self) -> String {
        self.layout
            .chromosome_ranges()
            .enumerate()
            .map(|(index, range)| {
                let alleles: String = self.bins[range].iter().map(|&b| display_bit(b)).collect();
                format!("chr{:02}: {}", index + 1, alleles)
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

fn display_bit(allele: u8) -> char {
    if allele != 0 { '*' } else { '-' }
}

impl PartialEq for Genome {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Genome {}

impl Hash for Genome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Genome {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Genome {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Genome(id={}, {})", self.id, self.display_barcode())
    }
}

/// Genomes with duplicates removed, keeping first occurrences in order.
pub fn distinct<I: IntoIterator<Item = Genome>>(genomes: I) -> Vec<Genome> {
    let mut seen = HashSet::new();
    genomes
        .into_iter()
        .filter(|genome| seen.insert(genome.id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context;

    #[test]
    fn display_barcode() {
        let mut ctx = context(0);
        let n_snps = ctx.layout().num_snps();
        let mutant = Genome::from_barcode(&mut ctx, &vec![1; n_snps]).unwrap();
        assert_eq!(mutant.display_barcode(), "*".repeat(n_snps));
        let reference = Genome::from_reference(&mut ctx);
        assert_eq!(reference.display_barcode(), "-".repeat(n_snps));
    }

    #[test]
    fn display_genome_per_chromosome() {
        let mut ctx = context(0);
        let reference = Genome::from_reference(&mut ctx);
        let display = reference.display_genome();
        let lines: Vec<&str> = display.lines().collect();
        assert_eq!(lines.len(), 14);
        assert!(lines[0].starts_with("chr01: ---"));
        assert_eq!(lines[0].len(), "chr01: ".len() + 65);
    }

    #[test]
    fn identical_content_identical_id() {
        let mut ctx = context(0);
        let n_snps = ctx.layout().num_snps();
        let a = Genome::from_reference(&mut ctx);
        let b = Genome::from_barcode(&mut ctx, &vec![0; n_snps]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        assert_eq!(distinct(vec![a.clone(), a.clone(), a.clone()]), vec![a]);
    }

    #[test]
    fn barcode_length_mismatch() {
        let mut ctx = context(0);
        assert!(Genome::from_barcode(&mut ctx, &[1, 0]).is_err());
    }

    #[test]
    fn modifiers_and_fitness() {
        let mut layout = crate::core::context::testing::barcode_layout();
        let bin = layout.add_locus(13, 1_725_259, "kelch13", 0.9, 0.).unwrap();
        let mut ctx = Context::new(layout, Default::default(), 0).unwrap();

        let reference = Genome::from_reference(&mut ctx);
        assert_eq!(reference.fitness(), 1.);

        let resistant = set_allele(bin, 1);
        let mutant = Genome::from_reference_with(&mut ctx, &[&resistant]);
        assert_eq!(mutant.bins()[bin], 1);
        assert_eq!(mutant.fitness(), 0.9);
        assert_ne!(mutant.id(), reference.id());
    }

    #[test]
    fn allele_frequencies() {
        let mut ctx = context(11);
        let n = 2000;
        let first_snp = ctx.layout().snps()[0].bin;
        let freq = ctx.layout().snps()[0].freq;
        let count = (0..n)
            .filter(|_| Genome::from_allele_frequencies(&mut ctx).bins()[first_snp] == 1)
            .count();
        let observed = count as f64 / n as f64;
        assert!((observed - freq).abs() < 0.05, "observed={observed}");
    }
}
