//! Historian --- buffers simulation events until they are delivered to reports
//!
//! Components record events while a population is updated. The simulation
//! drains the buffer after every population update and hands each event, in
//! creation order, to the registered reports. Reports only observe; they never
//! feed back into the run.

use std::fmt;
use std::path::Path;

use super::genome::Genome;
use crate::errors::Result;
use crate::stats::PopulationSnapshot;

/// A genome placed into a new or existing infection.
#[derive(Clone, Debug)]
pub struct Transmission {
    pub day: usize,
    pub population: String,
    pub infection: usize,
    pub parent_infection: usize,
    pub parent_genomes: (usize, usize),
    pub genome: Genome,
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transmission(day={}, population={}, infection={}, parent={}, parents=({}, {}), genome={})",
            self.day,
            self.population,
            self.infection,
            self.parent_infection,
            self.parent_genomes.0,
            self.parent_genomes.1,
            self.genome.id()
        )
    }
}

#[derive(Clone, Debug)]
pub enum Event {
    GenomeCreated(Genome),
    InfectionTransmitted(Vec<Transmission>),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::GenomeCreated(_) => "genome.init",
            Event::InfectionTransmitted(_) => "infection.transmit",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::GenomeCreated(genome) => write!(f, "{}({})", self.name(), genome),
            Event::InfectionTransmitted(batch) => {
                write!(f, "{}(n={})", self.name(), batch.len())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Historian {
    history: Vec<Event>,
}

impl Historian {
    pub fn new() -> Self {
        Self { history: vec![] }
    }

    pub fn record(&mut self, event: Event) {
        self.history.push(event);
    }

    /// Remove and return all buffered events in creation order.
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.history)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Receives events and per-tick population snapshots.
pub trait Observer {
    fn on_event(&mut self, _event: &Event) {}

    fn on_tick(&mut self, _day: usize, _snapshots: &[PopulationSnapshot]) {}
}

/// Writes whatever was collected to an output directory at the end of a run.
pub trait Sink {
    fn flush(&mut self, path: &Path) -> Result<()>;
}

pub trait Report: Observer + Sink {}

impl<T: Observer + Sink + ?Sized> Report for T {}
