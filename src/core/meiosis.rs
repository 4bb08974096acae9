//! Meiotic recombination of two parental genomes.
//!
//! Every chromosome recombines independently. Crossover breakpoints follow a
//! renewal process with exponential inter-arrival distances, in bins, at the
//! crossover rate of the layout. Swapping the parental segments between
//! breakpoints yields two recombinant chromatids, which are assorted together
//! with the two parental chromatids over the output slots.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Exp};
use smallvec::{SmallVec, smallvec};

use super::context::Context;
use super::genome::{Genome, distinct};
use crate::errors::{GenepiError, Result};

/// A single meiosis yields at most four gametes.
pub const MAX_MEIOTIC_PRODUCTS: usize = 4;

pub type Products = SmallVec<[Genome; MAX_MEIOTIC_PRODUCTS]>;

/// A genome on its way into a new host, with its lineage.
#[derive(Clone, Debug)]
pub struct Sporozoite {
    pub parent_infection: usize,
    pub parent_genomes: (usize, usize),
    pub genome: Genome,
}

/// Crossover breakpoints within a chromosome of `n_bins` bins.
///
/// Positions are strictly increasing, exclude zero and stay below `n_bins`.
pub fn crossover_points<R: Rng + ?Sized>(rng: &mut R, rate: f64, n_bins: usize) -> Vec<usize> {
    if !(rate > 0.) {
        return Vec::new();
    }
    let Ok(distance) = Exp::new(rate) else {
        return Vec::new();
    };
    let mut points = Vec::new();
    let mut position = 0.;
    loop {
        position += distance.sample(rng).ceil().max(1.);
        if position >= n_bins as f64 {
            break;
        }
        points.push(position as usize);
    }
    points
}

/// Swap the segments of two chromatids between consecutive breakpoints.
///
/// With an odd number of breakpoints the last segment runs to the end.
pub fn crossover(c1: &[u8], c2: &[u8], points: &[usize]) -> (Vec<u8>, Vec<u8>) {
    let mut c3 = c1.to_vec();
    let mut c4 = c2.to_vec();
    for pair in points.chunks(2) {
        let start = pair[0];
        let end = pair.get(1).copied().unwrap_or(c1.len());
        c3[start..end].copy_from_slice(&c2[start..end]);
        c4[start..end].copy_from_slice(&c1[start..end]);
    }
    (c3, c4)
}

/// `n` products of a single meiosis of `g1` and `g2`.
pub fn meiosis(ctx: &mut Context, g1: &Genome, g2: &Genome, n: usize) -> Result<Products> {
    if n > MAX_MEIOTIC_PRODUCTS {
        return Err(GenepiError::SamplingError(format!(
            "meiosis yields at most {MAX_MEIOTIC_PRODUCTS} products, {n} requested"
        )));
    }
    let layout = ctx.layout().clone();
    let rate = layout.crossover_rate();
    let mut outputs: Vec<Vec<u8>> = (0..n)
        .map(|_| Vec::with_capacity(layout.genome_length()))
        .collect();

    for range in layout.chromosome_ranges() {
        let c1 = &g1.bins()[range.clone()];
        let c2 = &g2.bins()[range.clone()];
        let points = crossover_points(ctx.rng(), rate, range.len());
        let (c3, c4) = crossover(c1, c2, &points);
        let mut chromatids = [c1, c2, c3.as_slice(), c4.as_slice()];
        chromatids.shuffle(ctx.rng());
        for (output, chromatid) in outputs.iter_mut().zip(chromatids) {
            output.extend_from_slice(chromatid);
        }
    }

    Ok(outputs
        .into_iter()
        .map(|bins| ctx.register_genome(bins.into_boxed_slice()))
        .collect())
}

/// One meiotic product without generating the other three.
///
/// Per chromosome: a copy of either parent with probability 1/4 each, or one
/// of the two recombinant chromatids with probability 1/4 each.
pub fn single_product(ctx: &mut Context, g1: &Genome, g2: &Genome) -> Genome {
    let layout = ctx.layout().clone();
    let rate = layout.crossover_rate();
    let mut bins = Vec::with_capacity(layout.genome_length());

    for range in layout.chromosome_ranges() {
        let c1 = &g1.bins()[range.clone()];
        let c2 = &g2.bins()[range.clone()];
        let choice: f64 = ctx.rng().random();
        if choice < 0.25 {
            bins.extend_from_slice(c1);
        } else if choice < 0.5 {
            bins.extend_from_slice(c2);
        } else {
            let points = crossover_points(ctx.rng(), rate, range.len());
            let (c3, c4) = crossover(c1, c2, &points);
            bins.extend_from_slice(if choice < 0.75 { &c3 } else { &c4 });
        }
    }

    ctx.register_genome(bins.into_boxed_slice())
}

/// Distinct genomes resulting from `n` products of a gametocyte pair.
///
/// Selfing yields a clone of the parent.
pub fn distinct_products(
    ctx: &mut Context,
    g1: &Genome,
    g2: &Genome,
    n: usize,
) -> Result<Vec<Genome>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    if g1.id() == g2.id() {
        return Ok(vec![g1.clone()]);
    }
    let products: Products = if n > 1 {
        meiosis(ctx, g1, g2, n)?
    } else {
        smallvec![single_product(ctx, g1, g2)]
    };
    Ok(distinct(products))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn crossover_single_point() {
        let c1 = vec![0u8; 24];
        let c2 = vec![1u8; 24];
        let (c3, c4) = crossover(&c1, &c2, &[18]);
        assert_eq!(&c3[..18], &[0; 18]);
        assert_eq!(&c3[18..], &[1; 6]);
        assert_eq!(&c4[..18], &[1; 18]);
        assert_eq!(&c4[18..], &[0; 6]);
    }

    #[test]
    fn crossover_two_points() {
        let c1 = vec![0u8; 24];
        let c2 = vec![1u8; 24];
        let (c3, c4) = crossover(&c1, &c2, &[6, 18]);
        let expected: Vec<u8> = (0..24).map(|i| (6..18).contains(&i) as u8).collect();
        assert_eq!(c3, expected);
        let complement: Vec<u8> = expected.iter().map(|b| 1 - b).collect();
        assert_eq!(c4, complement);
    }

    #[test]
    fn crossover_points_are_bounded() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let points = crossover_points(&mut rng, 0.05, 200);
            assert!(points.windows(2).all(|w| w[0] < w[1]));
            assert!(points.iter().all(|&p| p > 0 && p < 200));
        }
        assert!(crossover_points(&mut rng, 0., 200).is_empty());
    }

    #[test]
    fn meiosis_conserves_alleles() {
        let mut ctx = context(8675309);
        let n_snps = ctx.layout().num_snps();
        let reference = Genome::from_reference(&mut ctx);
        let mutant = Genome::from_barcode(&mut ctx, &vec![1; n_snps]).unwrap();
        for _ in 0..20 {
            let products = meiosis(&mut ctx, &reference, &mutant, 4).unwrap();
            assert_eq!(products.len(), 4);
            for snp in 0..n_snps {
                let total: u8 = products.iter().map(|g| g.barcode()[snp]).sum();
                assert_eq!(total, 2);
            }
        }
    }

    #[test]
    fn meiosis_conserves_every_bin() {
        let mut ctx = context(3);
        let g1 = Genome::from_allele_frequencies(&mut ctx);
        let g2 = Genome::from_allele_frequencies(&mut ctx);
        let products = meiosis(&mut ctx, &g1, &g2, 4).unwrap();
        for bin in 0..g1.len() {
            let total: u8 = products.iter().map(|g| g.bins()[bin]).sum();
            assert_eq!(total, 2 * (g1.bins()[bin] + g2.bins()[bin]));
        }
    }

    #[test]
    fn too_many_products() {
        let mut ctx = context(0);
        let g = Genome::from_reference(&mut ctx);
        assert!(matches!(
            meiosis(&mut ctx, &g, &g, 5),
            Err(GenepiError::SamplingError(_))
        ));
    }

    #[test]
    fn single_product_takes_parental_alleles() {
        let mut ctx = context(4);
        let n_snps = ctx.layout().num_snps();
        let reference = Genome::from_reference(&mut ctx);
        let mutant = Genome::from_barcode(&mut ctx, &vec![1; n_snps]).unwrap();
        let product = single_product(&mut ctx, &reference, &mutant);
        assert_eq!(product.len(), reference.len());
        let novel = product
            .bins()
            .iter()
            .zip(mutant.bins())
            .filter(|(p, m)| **p > **m)
            .count();
        assert_eq!(novel, 0);
    }

    #[test]
    fn selfing_is_clonal() {
        let mut ctx = context(0);
        let g = Genome::from_allele_frequencies(&mut ctx);
        let products = distinct_products(&mut ctx, &g, &g, 3).unwrap();
        assert_eq!(products, vec![g]);
    }

    #[test]
    fn deterministic() {
        let run = |seed| {
            let mut ctx = context(seed);
            let g1 = Genome::from_allele_frequencies(&mut ctx);
            let g2 = Genome::from_allele_frequencies(&mut ctx);
            (0..10)
                .flat_map(|_| meiosis(&mut ctx, &g1, &g2, 4).unwrap())
                .map(|g| g.bins().to_vec())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(17), run(17));
    }
}
