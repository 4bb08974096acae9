//! Run-scoped simulation state.
//!
//! Everything that would otherwise be a process-wide singleton lives here: the
//! genome layout, the genome id registry, the event buffer, the single seeded
//! random stream and the id counters. Independent runs use independent
//! contexts.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Normal, Weibull};
use std::rc::Rc;

use super::genome::Genome;
use super::historian::{Event, Historian};
use super::layout::GenomeLayout;
use super::registry::GenomeRegistry;
use crate::config::InfectionParameters;
use crate::errors::{GenepiError, Result};

/// Distributions of the within-host and vector stages, built once per run.
#[derive(Clone, Copy, Debug)]
pub struct InfectionSamplers {
    pub duration: LogNormal<f64>,
    pub oocysts: Weibull<f64>,
    pub hepatocytes: LogNormal<f64>,
    pub noise: Normal<f64>,
}

impl InfectionSamplers {
    pub fn new(parameters: &InfectionParameters) -> Result<Self> {
        let invalid = |name: &str, err: &dyn std::fmt::Display| {
            GenepiError::ConfigurationError(format!("invalid {name} distribution: {err}"))
        };
        Ok(Self {
            duration: LogNormal::new(parameters.duration.mu, parameters.duration.sigma)
                .map_err(|err| invalid("infection duration", &err))?,
            oocysts: Weibull::new(parameters.oocysts.scale, parameters.oocysts.shape)
                .map_err(|err| invalid("oocyst", &err))?,
            hepatocytes: LogNormal::new(parameters.hepatocytes.mu, parameters.hepatocytes.sigma)
                .map_err(|err| invalid("hepatocyte", &err))?,
            noise: Normal::new(0., parameters.infectiousness_noise)
                .map_err(|err| invalid("infectiousness noise", &err))?,
        })
    }
}

pub struct Context {
    layout: Rc<GenomeLayout>,
    parameters: InfectionParameters,
    samplers: InfectionSamplers,
    registry: GenomeRegistry,
    historian: Historian,
    rng: StdRng,
    next_infection_id: usize,
    next_human_id: usize,
}

impl Context {
    pub fn new(layout: GenomeLayout, parameters: InfectionParameters, seed: u64) -> Result<Self> {
        let samplers = InfectionSamplers::new(&parameters)?;
        log::info!("Created context with {layout} and seed {seed}");
        Ok(Self {
            layout: Rc::new(layout),
            parameters,
            samplers,
            registry: GenomeRegistry::new(),
            historian: Historian::new(),
            rng: StdRng::seed_from_u64(seed),
            next_infection_id: 0,
            next_human_id: 0,
        })
    }

    pub fn layout(&self) -> &Rc<GenomeLayout> {
        &self.layout
    }

    pub fn parameters(&self) -> &InfectionParameters {
        &self.parameters
    }

    pub fn samplers(&self) -> &InfectionSamplers {
        &self.samplers
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn historian(&self) -> &Historian {
        &self.historian
    }

    pub fn historian_mut(&mut self) -> &mut Historian {
        &mut self.historian
    }

    /// Number of distinct genomes created so far.
    pub fn n_genomes(&self) -> usize {
        self.registry.len()
    }

    /// Resolve the canonical id of a bin array and wrap it as a genome.
    ///
    /// The first time a content is seen a `GenomeCreated` event is recorded.
    pub(crate) fn register_genome(&mut self, bins: Box<[u8]>) -> Genome {
        let (id, is_new) = self.registry.resolve(&bins);
        let genome = Genome::new(id, bins, self.layout.clone());
        if is_new {
            log::debug!("New genome {genome}");
            self.historian.record(Event::GenomeCreated(genome.clone()));
        }
        genome
    }

    pub(crate) fn next_infection_id(&mut self) -> usize {
        let id = self.next_infection_id;
        self.next_infection_id += 1;
        id
    }

    pub(crate) fn next_human_id(&mut self) -> usize {
        let id = self.next_human_id;
        self.next_human_id += 1;
        id
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn genome_created_once() {
        let mut ctx = context(1);
        let length = ctx.layout().genome_length();
        let first = ctx.register_genome(vec![0; length].into_boxed_slice());
        let second = ctx.register_genome(vec![0; length].into_boxed_slice());
        assert_eq!(first.id(), second.id());
        assert_eq!(ctx.n_genomes(), 1);
        let events = ctx.historian_mut().take();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::GenomeCreated(genome) if genome.id() == 0));
    }

    #[test]
    fn invalid_distribution() {
        let parameters = InfectionParameters {
            infectiousness_noise: -1.,
            ..Default::default()
        };
        assert!(Context::new(barcode_layout(), parameters, 0).is_err());
    }

    #[test]
    fn counters() {
        let mut ctx = context(0);
        assert_eq!(ctx.next_infection_id(), 0);
        assert_eq!(ctx.next_infection_id(), 1);
        assert_eq!(ctx.next_human_id(), 0);
    }
}
