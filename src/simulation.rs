//! Top-level driver of a run.
//!
//! A tick first advances the clock, then updates every population in name
//! order, delivering the events each one produced to the registered reports
//! right away. Migrants queued during the tick are delivered once all
//! populations have been updated, and finally the reports see a snapshot of
//! every population.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{Demographics, Parameters, PopulationSpec, validate_demographics};
use crate::core::{Context, GenomeLayout, MigrantQueue, Population, Report};
use crate::errors::{GenepiError, Result};
use crate::stats::PopulationSnapshot;

pub struct Simulation {
    context: Context,
    day: usize,
    duration: usize,
    tstep: usize,
    populations: BTreeMap<String, Population>,
    migrants: MigrantQueue,
    reports: Vec<Box<dyn Report>>,
}

impl Simulation {
    pub fn new(layout: GenomeLayout, parameters: &Parameters) -> Result<Self> {
        parameters.validate()?;
        let context = Context::new(layout, parameters.infection, parameters.seed)?;
        Ok(Self {
            context,
            day: 0,
            duration: parameters.duration,
            tstep: parameters.tstep,
            populations: BTreeMap::new(),
            migrants: MigrantQueue::new(),
            reports: Vec::new(),
        })
    }

    /// Register a report. Reports receive events in registration order.
    pub fn add_report(&mut self, report: Box<dyn Report>) {
        self.reports.push(report);
    }

    /// Create every population of `demographics`, in name order.
    pub fn populate(&mut self, demographics: &Demographics) -> Result<()> {
        validate_demographics(demographics)?;
        for (id, spec) in demographics {
            self.add_population(id, spec)?;
        }
        Ok(())
    }

    pub fn add_population(&mut self, id: &str, spec: &PopulationSpec) -> Result<()> {
        if self.populations.contains_key(id) {
            return Err(GenepiError::ConfigurationError(format!(
                "population {id} already exists"
            )));
        }
        let population = Population::new(&mut self.context, id, spec)?;
        log::info!("Added population {population}");
        self.populations.insert(id.to_string(), population);
        self.dispatch_events();
        Ok(())
    }

    pub fn day(&self) -> usize {
        self.day
    }

    pub fn tstep(&self) -> usize {
        self.tstep
    }

    /// Number of ticks that make up a full run.
    pub fn n_ticks(&self) -> usize {
        self.duration / self.tstep
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn populations(&self) -> &BTreeMap<String, Population> {
        &self.populations
    }

    pub fn population(&self, id: &str) -> Option<&Population> {
        self.populations.get(id)
    }

    pub fn n_humans(&self) -> usize {
        self.populations.values().map(Population::n_humans).sum()
    }

    pub fn n_infecteds(&self) -> usize {
        self.populations.values().map(Population::n_infecteds).sum()
    }

    /// Advance the simulation by one tick.
    pub fn update(&mut self) -> Result<()> {
        self.day += self.tstep;
        let dt = self.tstep as f64;
        log::debug!("Update day {}", self.day);

        let ids: Vec<String> = self.populations.keys().cloned().collect();
        for id in ids {
            if let Some(population) = self.populations.get_mut(&id) {
                population.update(&mut self.context, self.day, dt, &mut self.migrants)?;
            }
            self.dispatch_events();
        }

        self.resolve_migration()?;

        let snapshots = self.snapshots()?;
        for report in self.reports.iter_mut() {
            report.on_tick(self.day, &snapshots);
        }
        Ok(())
    }

    /// Deliver the queued migrants. Infected individuals go first, then the
    /// cohort counts.
    fn resolve_migration(&mut self) -> Result<()> {
        for emigrant in self.migrants.take_individuals() {
            let destination = self
                .populations
                .get_mut(&emigrant.destination)
                .ok_or_else(|| unknown_destination(&emigrant.destination))?;
            log::debug!(
                "Human {} migrates from {} to {}",
                emigrant.individual.id(),
                emigrant.source,
                emigrant.destination
            );
            destination.receive_immigrant(&mut self.context, emigrant.individual);
        }
        for (destination, n) in self.migrants.take_cohort() {
            self.populations
                .get_mut(&destination)
                .ok_or_else(|| unknown_destination(&destination))?
                .receive_cohort(n);
        }
        debug_assert!(self.migrants.is_empty());
        Ok(())
    }

    fn dispatch_events(&mut self) {
        for event in self.context.historian_mut().take() {
            for report in self.reports.iter_mut() {
                report.on_event(&event);
            }
        }
    }

    pub fn snapshots(&self) -> Result<Vec<PopulationSnapshot>> {
        self.populations
            .values()
            .map(|population| population.snapshot(self.day))
            .collect()
    }

    /// Write every report into `path`.
    pub fn flush(&mut self, path: &Path) -> Result<()> {
        for report in self.reports.iter_mut() {
            report.flush(path)?;
        }
        Ok(())
    }

    /// Run all ticks and flush the reports into `path`.
    pub fn run(&mut self, path: &Path) -> Result<()> {
        self.run_with(path, |simulation, _tick| {
            for population in simulation.populations().values() {
                log::info!("day={} {population}", simulation.day());
            }
        })
    }

    /// Like [`Simulation::run`], calling `on_tick` with the number of the tick
    /// that just completed, starting at one.
    pub fn run_with<F>(&mut self, path: &Path, mut on_tick: F) -> Result<()>
    where
        F: FnMut(&Simulation, usize),
    {
        for tick in 1..=self.n_ticks() {
            self.update()?;
            on_tick(self, tick);
        }
        self.flush(path)
    }
}

fn unknown_destination(destination: &str) -> GenepiError {
    GenepiError::ConfigurationError(format!("unknown migration destination {destination}"))
}
