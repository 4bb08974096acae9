//! A named node of the transmission network.
//!
//! A population owns a cohort of uninfected humans and the infected
//! individuals, in infection order. One update advances every infection,
//! returns cleared hosts to the cohort, queues migrants and finally routes the
//! bites taken during the tick to random hosts of the population.

use std::fmt;

use super::context::Context;
use super::genome::Genome;
use super::historian::{Event, Transmission};
use super::hosts::{HumanCohort, HumanIndividual};
use super::infection::Infection;
use super::meiosis::Sporozoite;
use super::migration::{MigrantQueue, MigrationInfo};
use super::sampling::{choose_with_replacement, choose_without_replacement};
use super::treatment::DrugTreatment;
use crate::config::{PopulationSpec, VectorialCapacity};
use crate::errors::{GenepiError, Result};
use crate::stats::PopulationSnapshot;

#[derive(Debug)]
pub struct Population {
    id: String,
    cohort: HumanCohort,
    infecteds: Vec<HumanIndividual>,
    vectorial_capacity: VectorialCapacity,
    migration_info: MigrationInfo,
    treatment: Option<DrugTreatment>,
}

impl Population {
    /// Create a population and seed its initial infections with genomes drawn
    /// from the catalog allele frequencies.
    pub fn new(ctx: &mut Context, id: &str, spec: &PopulationSpec) -> Result<Self> {
        if spec.n_infections > spec.n_humans {
            return Err(GenepiError::ConfigurationError(format!(
                "{id}: {} initial infections exceed {} humans",
                spec.n_infections, spec.n_humans
            )));
        }
        spec.vectorial_capacity.validate()?;
        let treatment = match spec.treatment.as_ref() {
            Some(treatment) => {
                treatment.validate(id)?;
                Some(DrugTreatment::new(treatment, ctx.layout())?)
            }
            None => None,
        };

        let mut population = Self {
            id: id.to_string(),
            cohort: HumanCohort::new(spec.n_humans),
            infecteds: Vec::with_capacity(spec.n_infections),
            vectorial_capacity: spec.vectorial_capacity.clone(),
            migration_info: MigrationInfo::new(&spec.migration_rates),
            treatment,
        };
        for _ in 0..spec.n_infections {
            let genome = Genome::from_allele_frequencies(ctx);
            population.add_new_infection(ctx, vec![genome])?;
        }
        log::debug!("{population}");
        Ok(population)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cohort(&self) -> &HumanCohort {
        &self.cohort
    }

    pub fn infecteds(&self) -> &[HumanIndividual] {
        &self.infecteds
    }

    pub fn migration_info(&self) -> &MigrationInfo {
        &self.migration_info
    }

    pub fn treatment(&self) -> Option<&DrugTreatment> {
        self.treatment.as_ref()
    }

    pub fn n_humans(&self) -> usize {
        self.cohort.n_humans() + self.infecteds.len()
    }

    pub fn n_infecteds(&self) -> usize {
        self.infecteds.len()
    }

    pub fn n_polygenomic(&self) -> usize {
        self.infecteds
            .iter()
            .filter(|individual| individual.infection().n_strains() > 1)
            .count()
    }

    pub fn vectorial_capacity(&self, day: usize) -> Result<f64> {
        self.vectorial_capacity.evaluate(day)
    }

    /// Infect a human from the cohort and return the id of the new infection.
    pub fn add_new_infection(&mut self, ctx: &mut Context, genomes: Vec<Genome>) -> Result<usize> {
        let infection = Infection::new(ctx, genomes);
        let infection_id = infection.id();
        let individual = self
            .cohort
            .pop_individual(ctx, &self.migration_info, infection)?;
        self.infecteds.push(individual);
        Ok(infection_id)
    }

    /// Advance the population by one tick of `dt` days ending on `day`.
    pub fn update(
        &mut self,
        ctx: &mut Context,
        day: usize,
        dt: f64,
        migrants: &mut MigrantQueue,
    ) -> Result<()> {
        let vectorial_capacity = self.vectorial_capacity(day)?;
        log::info!("{self} vectorial capacity={vectorial_capacity:.2}");

        let mut batches = Vec::new();
        let mut remaining = Vec::with_capacity(self.infecteds.len());
        for mut individual in std::mem::take(&mut self.infecteds) {
            batches.extend(individual.update(ctx, dt, vectorial_capacity)?);
            if individual.infection_expired() {
                self.cohort.merge_individual(individual);
            } else if let Some(destination) = individual.migration_due().map(str::to_string) {
                log::debug!("Human {} leaves {} for {destination}", individual.id(), self.id);
                migrants.push_individual(&self.id, &destination, individual);
            } else {
                remaining.push(individual);
            }
        }
        self.infecteds = remaining;

        if !batches.is_empty() {
            self.transmit_infections(ctx, day, batches)?;
        }
        self.cohort_migration(ctx, dt, migrants)
    }

    /// Route every sporozoite batch to a host drawn uniformly, with
    /// replacement, over all humans of the population. Hosts that are already
    /// infected are superinfected, any other draw infects a cohort member.
    /// Under a treatment policy the bitten host's infection may then be treated.
    fn transmit_infections(
        &mut self,
        ctx: &mut Context,
        day: usize,
        batches: Vec<Vec<Sporozoite>>,
    ) -> Result<()> {
        let n_humans = self.n_humans();
        if n_humans == 0 {
            log::warn!("{}: dropping {} bites without hosts", self.id, batches.len());
            return Ok(());
        }
        log::debug!("{}: routing {} bites", self.id, batches.len());

        let fraction = self
            .treatment
            .as_ref()
            .map(|treatment| treatment.fraction(day))
            .transpose()?;
        let targets = choose_with_replacement(ctx.rng(), batches.len(), n_humans);
        for (target, batch) in targets.into_iter().zip(batches) {
            let genomes: Vec<Genome> = batch.iter().map(|s| s.genome.clone()).collect();
            let index = if target < self.infecteds.len() {
                self.infecteds[target]
                    .infection_mut()
                    .merge_infection(ctx, genomes);
                target
            } else {
                self.add_new_infection(ctx, genomes)?;
                self.infecteds.len() - 1
            };
            let infection = self.infecteds[index].infection_mut();
            if let (Some(treatment), Some(fraction)) = (self.treatment.as_ref(), fraction) {
                treatment.apply(ctx, fraction, infection);
            }
            let infection_id = infection.id();
            let transmissions = batch
                .into_iter()
                .map(|sporozoite| Transmission {
                    day,
                    population: self.id.clone(),
                    infection: infection_id,
                    parent_infection: sporozoite.parent_infection,
                    parent_genomes: sporozoite.parent_genomes,
                    genome: sporozoite.genome,
                })
                .collect();
            ctx.historian_mut()
                .record(Event::InfectionTransmitted(transmissions));
        }
        Ok(())
    }

    fn cohort_migration(
        &mut self,
        ctx: &mut Context,
        dt: f64,
        migrants: &mut MigrantQueue,
    ) -> Result<()> {
        let destinations =
            self.migration_info
                .destinations_in_timestep(ctx.rng(), self.cohort.n_humans(), dt);
        if destinations.is_empty() {
            return Ok(());
        }
        self.cohort.remove(destinations.len())?;
        log::debug!("Cohort migration from {}: {:?}", self.id, destinations);
        for destination in destinations {
            migrants.push_cohort(destination, 1);
        }
        Ok(())
    }

    /// Take in an infected individual and restart its migration schedule from here.
    pub fn receive_immigrant(&mut self, ctx: &mut Context, mut individual: HumanIndividual) {
        individual.reschedule(self.migration_info.next_migration(ctx.rng()));
        self.infecteds.push(individual);
    }

    pub fn receive_cohort(&mut self, n: usize) {
        self.cohort.add(n);
    }

    /// `n` distinct infected individuals.
    pub fn sample_infecteds(&self, ctx: &mut Context, n: usize) -> Result<Vec<&HumanIndividual>> {
        let indices = choose_without_replacement(ctx.rng(), n, self.infecteds.len())?;
        Ok(indices.into_iter().map(|i| &self.infecteds[i]).collect())
    }

    pub fn snapshot(&self, day: usize) -> Result<PopulationSnapshot> {
        Ok(PopulationSnapshot {
            day,
            population: self.id.clone(),
            n_humans: self.n_humans(),
            n_infecteds: self.n_infecteds(),
            n_polygenomic: self.n_polygenomic(),
            n_strains: self
                .infecteds
                .iter()
                .map(|individual| individual.infection().n_strains())
                .sum(),
            vectorial_capacity: self.vectorial_capacity(day)?,
        })
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: humans={} infections={}",
            self.id,
            self.n_humans(),
            self.infecteds.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context;

    fn spec(n_humans: usize, n_infections: usize, vc: f64) -> PopulationSpec {
        PopulationSpec::new(n_humans, n_infections, VectorialCapacity::Constant(vc))
    }

    #[test]
    fn initial_infections() {
        let mut ctx = context(0);
        let population = Population::new(&mut ctx, "A", &spec(10, 4, 0.)).unwrap();
        assert_eq!(population.n_humans(), 10);
        assert_eq!(population.n_infecteds(), 4);
        assert_eq!(population.cohort().n_humans(), 6);
    }

    #[test]
    fn too_many_infections() {
        let mut ctx = context(0);
        let result = Population::new(&mut ctx, "A", &spec(3, 4, 0.));
        assert!(matches!(result, Err(GenepiError::ConfigurationError(_))));
    }

    #[test]
    fn conservation_under_transmission() {
        let mut ctx = context(1);
        let mut population = Population::new(&mut ctx, "A", &spec(200, 20, 0.5)).unwrap();
        let mut migrants = MigrantQueue::new();
        for tick in 1..=30 {
            population
                .update(&mut ctx, tick * 21, 21., &mut migrants)
                .unwrap();
            assert_eq!(population.n_humans(), 200);
            assert_eq!(
                population.n_humans(),
                population.cohort().n_humans() + population.n_infecteds()
            );
            assert!(migrants.is_empty());
        }
    }

    #[test]
    fn infections_clear_without_vectors() {
        let mut ctx = context(2);
        let mut population = Population::new(&mut ctx, "A", &spec(10, 10, 0.)).unwrap();
        let mut migrants = MigrantQueue::new();
        for tick in 1..=200 {
            population
                .update(&mut ctx, tick * 21, 21., &mut migrants)
                .unwrap();
        }
        assert_eq!(population.n_infecteds(), 0);
        assert_eq!(population.cohort().n_humans(), 10);
    }

    #[test]
    fn transmissions_are_recorded() {
        let mut ctx = context(3);
        let mut population = Population::new(&mut ctx, "A", &spec(100, 50, 2.)).unwrap();
        ctx.historian_mut().take();
        let mut migrants = MigrantQueue::new();
        for tick in 1..=5 {
            population
                .update(&mut ctx, tick * 21, 21., &mut migrants)
                .unwrap();
        }
        let transmissions: Vec<Transmission> = ctx
            .historian_mut()
            .take()
            .into_iter()
            .filter_map(|event| match event {
                Event::InfectionTransmitted(batch) => Some(batch),
                Event::GenomeCreated(_) => None,
            })
            .flatten()
            .collect();
        assert!(!transmissions.is_empty());
        assert!(transmissions.iter().all(|t| t.population == "A"));
        assert!(transmissions.iter().all(|t| t.day % 21 == 0));
    }

    #[test]
    fn treated_infections_clear() {
        use crate::config::{Treatment, TreatmentFraction};

        let mut ctx = context(3);
        let treatment = Treatment::new(TreatmentFraction::Constant(1.), 1.);
        let spec = spec(100, 50, 2.).with_treatment(treatment);
        let mut population = Population::new(&mut ctx, "A", &spec).unwrap();
        assert!(population.treatment().is_some());
        let mut migrants = MigrantQueue::new();
        let mut n_cleared = 0;
        for tick in 1..=5 {
            population
                .update(&mut ctx, tick * 21, 21., &mut migrants)
                .unwrap();
            let cleared: Vec<&HumanIndividual> = population
                .infecteds()
                .iter()
                .filter(|individual| individual.infection().n_strains() == 0)
                .collect();
            assert!(cleared.iter().all(|individual| individual.infection_expired()));
            n_cleared += cleared.len();
            assert_eq!(population.n_humans(), 100);
        }
        assert!(n_cleared > 0);
    }

    #[test]
    fn unknown_resistance_locus() {
        use crate::config::{Treatment, TreatmentFraction};

        let mut ctx = context(3);
        let treatment =
            Treatment::new(TreatmentFraction::Constant(0.5), 0.9).with_resistance("kelch13", 0.1);
        let result = Population::new(&mut ctx, "A", &spec(10, 1, 0.).with_treatment(treatment));
        assert!(matches!(result, Err(GenepiError::ConfigurationError(_))));
    }

    #[test]
    fn cohort_emigrants_are_queued() {
        let mut ctx = context(4);
        let spec = spec(1000, 0, 0.).with_migration("B", 0.01);
        let mut population = Population::new(&mut ctx, "A", &spec).unwrap();
        let mut migrants = MigrantQueue::new();
        population.update(&mut ctx, 21, 21., &mut migrants).unwrap();
        let n_emigrants = migrants.n_cohort();
        assert!(n_emigrants > 0);
        assert_eq!(population.n_humans() + n_emigrants, 1000);
    }

    #[test]
    fn sample_more_than_infected() {
        let mut ctx = context(5);
        let population = Population::new(&mut ctx, "A", &spec(10, 3, 0.)).unwrap();
        assert_eq!(population.sample_infecteds(&mut ctx, 2).unwrap().len(), 2);
        assert!(matches!(
            population.sample_infecteds(&mut ctx, 4),
            Err(GenepiError::ConfigurationError(_))
        ));
    }

    #[test]
    fn snapshot() {
        let mut ctx = context(6);
        let population = Population::new(&mut ctx, "A", &spec(10, 5, 0.3)).unwrap();
        let snapshot = population.snapshot(42).unwrap();
        assert_eq!(snapshot.day, 42);
        assert_eq!(snapshot.n_infecteds, 5);
        assert_eq!(snapshot.f_infected(), 0.5);
        assert_eq!(snapshot.vectorial_capacity, 0.3);
    }
}
