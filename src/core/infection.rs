//! Multi-strain infection of a single host.
//!
//! An infection holds a deduplicated, ordered set of strains, a timer of days
//! until clearance and the state of its infectiousness profile. Transmission
//! passes through the vector stage: gametocyte pairs are drawn weighted by
//! fitness, recombine in oocysts, and a limited number of their meiotic
//! products reach the hepatocytes of the next host.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use super::context::Context;
use super::genome::{Genome, distinct};
use super::meiosis::{MAX_MEIOTIC_PRODUCTS, Sporozoite, distinct_products};
use super::sampling::{accumulate_cdf, poisson, weighted_choice};
use crate::config::InfectionParameters;
use crate::errors::Result;

/// Infectiousness as a function of time since onset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Infectiousness {
    t: f64,
}

impl Infectiousness {
    pub fn new() -> Self {
        Self { t: 0. }
    }

    pub fn at(t: f64) -> Self {
        Self { t }
    }

    pub fn time_since_onset(&self) -> f64 {
        self.t
    }

    /// Mean profile without noise.
    pub fn mean(t: f64, incubation: f64) -> f64 {
        if t < incubation {
            return 0.;
        }
        0.8 * (-t / 50.).exp() + 0.05 * (-t / 300.).exp()
    }

    /// Move the clock forward by `dt` and return the infectiousness at the new time.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        rng: &mut R,
        parameters: &InfectionParameters,
        noise: &Normal<f64>,
    ) -> f64 {
        self.t += dt;
        if self.t < parameters.incubation {
            return 0.;
        }
        let value = Self::mean(self.t, parameters.incubation) + noise.sample(rng);
        value.clamp(parameters.min_infectiousness, 1.)
    }
}

#[derive(Clone, Debug)]
pub struct Infection {
    id: usize,
    strains: Vec<Genome>,
    infection_timer: f64,
    infectiousness: Infectiousness,
    current_infectiousness: f64,
}

impl Infection {
    pub fn new(ctx: &mut Context, genomes: Vec<Genome>) -> Self {
        let id = ctx.next_infection_id();
        let infection = Self {
            id,
            strains: distinct(genomes),
            infection_timer: sample_duration(ctx),
            infectiousness: Infectiousness::new(),
            current_infectiousness: 0.,
        };
        log::debug!("New {infection}");
        infection
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn strains(&self) -> &[Genome] {
        &self.strains
    }

    pub fn n_strains(&self) -> usize {
        self.strains.len()
    }

    pub fn infection_timer(&self) -> f64 {
        self.infection_timer
    }

    pub fn infectiousness(&self) -> f64 {
        self.current_infectiousness
    }

    pub fn time_since_onset(&self) -> f64 {
        self.infectiousness.time_since_onset()
    }

    pub fn expired(&self) -> bool {
        self.infection_timer <= 0.
    }

    pub fn mean_fitness(&self) -> f64 {
        if self.strains.is_empty() {
            return 0.;
        }
        self.strains.iter().map(|g| g.fitness()).sum::<f64>() / self.strains.len() as f64
    }

    /// Advance the infection by `dt` days and return the sporozoite batches of
    /// all bites taken from this host in the meantime.
    pub fn update(
        &mut self,
        ctx: &mut Context,
        dt: f64,
        vectorial_capacity: f64,
    ) -> Result<Vec<Vec<Sporozoite>>> {
        self.infection_timer -= dt;
        let parameters = *ctx.parameters();
        let noise = ctx.samplers().noise;
        self.current_infectiousness = self
            .infectiousness
            .advance(dt, ctx.rng(), &parameters, &noise);

        if self.strains.is_empty() {
            return Ok(Vec::new());
        }

        let rate = vectorial_capacity * dt * self.current_infectiousness * self.mean_fitness();
        let n_transmissions = poisson(ctx.rng(), rate);
        if n_transmissions > 0 {
            log::debug!("Infection {} transmits {n_transmissions} times", self.id);
        }
        (0..n_transmissions).map(|_| self.transmit(ctx)).collect()
    }

    /// Sporozoites passed on by a single bite.
    pub fn transmit(&self, ctx: &mut Context) -> Result<Vec<Sporozoite>> {
        match self.strains.as_slice() {
            [] => return Ok(Vec::new()),
            [clone] => {
                return Ok(vec![Sporozoite {
                    parent_infection: self.id,
                    parent_genomes: (clone.id(), clone.id()),
                    genome: clone.clone(),
                }]);
            }
            _ => {}
        }

        let cdf = self.gametocyte_strain_cdf();
        if cdf.is_empty() {
            return Ok(Vec::new());
        }

        let samplers = *ctx.samplers();
        let max_strains = ctx.parameters().max_transmit_strains;
        let rng = ctx.rng();
        let n_hepatocytes = sample_n_hepatocytes(rng, &samplers.hepatocytes).min(max_strains);
        let n_oocysts = sample_n_oocysts(rng, &samplers.oocysts);
        let products = sample_oocyst_products(rng, n_hepatocytes, n_oocysts);

        let mut sporozoites = Vec::new();
        for n_products in products {
            let g1 = &self.strains[weighted_choice(&cdf, ctx.rng())];
            let g2 = &self.strains[weighted_choice(&cdf, ctx.rng())];
            for genome in distinct_products(ctx, g1, g2, n_products)? {
                sporozoites.push(Sporozoite {
                    parent_infection: self.id,
                    parent_genomes: (g1.id(), g2.id()),
                    genome,
                });
            }
        }

        let mut seen = HashSet::new();
        sporozoites.retain(|sporozoite| seen.insert(sporozoite.genome.id()));
        Ok(sporozoites)
    }

    /// Add strains from a superinfection. The infection restarts as if freshly
    /// infected but already past incubation.
    pub fn merge_infection(&mut self, ctx: &mut Context, genomes: Vec<Genome>) {
        let n_before = self.strains.len();
        self.strains.extend(genomes);
        self.strains = distinct(std::mem::take(&mut self.strains));
        self.infection_timer = sample_duration(ctx);
        self.infectiousness = Infectiousness::at(ctx.parameters().incubation);
        log::debug!(
            "Merged into infection {}: {} -> {} strains",
            self.id,
            n_before,
            self.strains.len()
        );
    }

    /// Drop every strain with its clearance probability and return how many
    /// were cleared. An infection left without strains clears at once.
    pub fn treat<F>(&mut self, ctx: &mut Context, clearance: F) -> usize
    where
        F: Fn(&Genome) -> f64,
    {
        let n_before = self.strains.len();
        let rng = ctx.rng();
        self.strains
            .retain(|genome| rng.random::<f64>() >= clearance(genome));
        if self.strains.is_empty() {
            self.infection_timer = 0.;
        }
        log::debug!(
            "Treated infection {}: {} -> {} strains",
            self.id,
            n_before,
            self.strains.len()
        );
        n_before - self.strains.len()
    }

    fn gametocyte_strain_cdf(&self) -> Vec<f64> {
        let weights: Vec<f64> = self.strains.iter().map(|g| g.fitness()).collect();
        accumulate_cdf(&weights)
    }
}

impl fmt::Display for Infection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<usize> = self.strains.iter().map(|g| g.id()).collect();
        write!(
            f,
            "Infection(id={}, timer={:.1}, strains={:?})",
            self.id, self.infection_timer, ids
        )
    }
}

fn sample_duration(ctx: &mut Context) -> f64 {
    let duration = ctx.samplers().duration;
    duration.sample(ctx.rng())
}

/// Oocysts in a fed mosquito, at least one.
pub fn sample_n_oocysts<R, D>(rng: &mut R, oocysts: &D) -> usize
where
    R: Rng + ?Sized,
    D: Distribution<f64>,
{
    1 + oocysts.sample(rng) as usize
}

/// Infected hepatocytes of the next host, at least one.
pub fn sample_n_hepatocytes<R, D>(rng: &mut R, hepatocytes: &D) -> usize
where
    R: Rng + ?Sized,
    D: Distribution<f64>,
{
    (hepatocytes.sample(rng) as usize).max(1)
}

/// Distinct meiotic products needed per oocyst.
///
/// Every hepatocyte is seeded by one of the four meiotic products of one of
/// the oocysts. Hepatocytes sharing a product count once.
pub fn sample_oocyst_products<R: Rng + ?Sized>(
    rng: &mut R,
    n_hepatocytes: usize,
    n_oocysts: usize,
) -> Vec<usize> {
    if n_oocysts == 0 {
        return Vec::new();
    }
    let mut products: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for _ in 0..n_hepatocytes {
        let slot = rng.random_range(0..n_oocysts * MAX_MEIOTIC_PRODUCTS);
        products
            .entry(slot / MAX_MEIOTIC_PRODUCTS)
            .or_default()
            .insert(slot % MAX_MEIOTIC_PRODUCTS);
    }
    products.into_values().map(|slots| slots.len()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn two_strain_infection(ctx: &mut Context) -> Infection {
        let n_snps = ctx.layout().num_snps();
        let reference = Genome::from_reference(ctx);
        let mutant = Genome::from_barcode(ctx, &vec![1; n_snps]).unwrap();
        Infection::new(ctx, vec![reference, mutant])
    }

    #[test]
    fn silent_during_incubation() {
        let parameters = InfectionParameters::default();
        let noise = Normal::new(0., parameters.infectiousness_noise).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut profile = Infectiousness::new();
        for _ in 0..24 {
            assert_eq!(profile.advance(1., &mut rng, &parameters, &noise), 0.);
        }
        for _ in 0..100 {
            let value = profile.advance(1., &mut rng, &parameters, &noise);
            assert!(value >= parameters.min_infectiousness && value <= 1.);
        }
        assert_eq!(profile.time_since_onset(), 124.);
    }

    #[test]
    fn mean_profile_decays() {
        assert_eq!(Infectiousness::mean(10., 25.), 0.);
        assert!(Infectiousness::mean(25., 25.) > Infectiousness::mean(100., 25.));
        assert!(Infectiousness::mean(1000., 25.) > 0.);
    }

    #[test]
    fn timer_decreases_until_expired() {
        let mut ctx = context(1);
        let mut infection = two_strain_infection(&mut ctx);
        let mut previous = infection.infection_timer();
        while !infection.expired() {
            infection.update(&mut ctx, 21., 0.).unwrap();
            assert!(infection.infection_timer() < previous);
            previous = infection.infection_timer();
        }
        assert!(infection.infection_timer() <= 0.);
    }

    #[test]
    fn no_transmission_without_vectors() {
        let mut ctx = context(2);
        let mut infection = two_strain_infection(&mut ctx);
        for _ in 0..10 {
            assert!(infection.update(&mut ctx, 21., 0.).unwrap().is_empty());
        }
    }

    #[test]
    fn transmissions_under_high_capacity() {
        let mut ctx = context(3);
        let mut infection = two_strain_infection(&mut ctx);
        infection.update(&mut ctx, 30., 0.).unwrap();
        let batches = infection.update(&mut ctx, 10., 20.).unwrap();
        assert!(!batches.is_empty());
        for batch in batches {
            assert!(!batch.is_empty());
            let ids: HashSet<usize> = batch.iter().map(|s| s.genome.id()).collect();
            assert_eq!(ids.len(), batch.len());
            assert!(batch.iter().all(|s| s.parent_infection == infection.id()));
        }
    }

    #[test]
    fn clonal_transmission() {
        let mut ctx = context(4);
        let genome = Genome::from_allele_frequencies(&mut ctx);
        let infection = Infection::new(&mut ctx, vec![genome.clone(), genome.clone()]);
        assert_eq!(infection.n_strains(), 1);
        let sporozoites = infection.transmit(&mut ctx).unwrap();
        assert_eq!(sporozoites.len(), 1);
        assert_eq!(sporozoites[0].genome, genome);
        assert_eq!(sporozoites[0].parent_genomes, (genome.id(), genome.id()));
    }

    #[test]
    fn transmission_is_bounded() {
        let mut ctx = context(5);
        let infection = two_strain_infection(&mut ctx);
        let max_strains = ctx.parameters().max_transmit_strains;
        for _ in 0..50 {
            let sporozoites = infection.transmit(&mut ctx).unwrap();
            assert!(!sporozoites.is_empty());
            assert!(sporozoites.len() <= max_strains);
        }
    }

    #[test]
    fn merge_adds_strains_and_resets() {
        let mut ctx = context(6);
        let reference = Genome::from_reference(&mut ctx);
        let mut infection = Infection::new(&mut ctx, vec![reference]);
        infection.update(&mut ctx, 10., 0.).unwrap();
        let n_snps = ctx.layout().num_snps();
        let mutant = Genome::from_barcode(&mut ctx, &vec![1; n_snps]).unwrap();
        infection.merge_infection(&mut ctx, vec![mutant.clone(), mutant]);
        assert_eq!(infection.n_strains(), 2);
        assert_eq!(infection.time_since_onset(), ctx.parameters().incubation);
    }

    #[test]
    fn treatment_clears_strains() {
        let mut ctx = context(9);
        let mut infection = two_strain_infection(&mut ctx);
        let reference = infection.strains()[0].clone();

        let cleared = infection.treat(&mut ctx, |genome| if *genome == reference { 1. } else { 0. });
        assert_eq!(cleared, 1);
        assert_eq!(infection.n_strains(), 1);
        assert_ne!(infection.strains()[0], reference);
        assert!(!infection.expired());

        assert_eq!(infection.treat(&mut ctx, |_| 0.), 0);
        assert_eq!(infection.treat(&mut ctx, |_| 1.), 1);
        assert_eq!(infection.n_strains(), 0);
        assert!(infection.expired());
        assert!(infection.update(&mut ctx, 21., 50.).unwrap().is_empty());
        assert!(infection.transmit(&mut ctx).unwrap().is_empty());
    }

    #[test]
    fn oocyst_products() {
        let mut rng = StdRng::seed_from_u64(7);
        for n_oocysts in 1..5 {
            for n_hepatocytes in 1..12 {
                let products = sample_oocyst_products(&mut rng, n_hepatocytes, n_oocysts);
                assert!(!products.is_empty());
                assert!(products.len() <= n_oocysts);
                assert!(products.iter().all(|&n| (1..=4).contains(&n)));
                assert!(products.iter().sum::<usize>() <= n_hepatocytes);
            }
        }
        assert!(sample_oocyst_products(&mut rng, 3, 0).is_empty());
    }

    #[test]
    fn fitness_weighted_strains() {
        let mut layout = crate::core::context::testing::barcode_layout();
        let bin = layout.add_locus(13, 1_725_259, "kelch13", 0.2, 0.).unwrap();
        let mut ctx = Context::new(layout, Default::default(), 8).unwrap();
        let fit = Genome::from_reference(&mut ctx);
        let resistant = crate::core::genome::set_allele(bin, 1);
        let unfit = Genome::from_reference_with(&mut ctx, &[&resistant]);
        let infection = Infection::new(&mut ctx, vec![fit, unfit]);
        let cdf = infection.gametocyte_strain_cdf();
        assert!((cdf[0] - 1. / 1.2).abs() < 1e-12);
        assert_eq!(cdf[1], 1.);
        assert!((infection.mean_fitness() - 0.6).abs() < 1e-12);
    }
}
