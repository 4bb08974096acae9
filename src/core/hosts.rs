//! Human hosts.
//!
//! Uninfected humans are exchangeable, so a population only keeps their count
//! in a [`HumanCohort`]. A [`HumanIndividual`] is materialized from the cohort
//! when it gets infected and returns to the count once its infection clears.

use std::fmt;

use super::context::Context;
use super::infection::Infection;
use super::meiosis::Sporozoite;
use super::migration::{Migration, MigrationInfo};
use crate::errors::{GenepiError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HumanCohort {
    n_humans: usize,
}

impl HumanCohort {
    pub fn new(n_humans: usize) -> Self {
        Self { n_humans }
    }

    pub fn n_humans(&self) -> usize {
        self.n_humans
    }

    pub fn add(&mut self, n: usize) {
        self.n_humans += n;
    }

    pub fn remove(&mut self, n: usize) -> Result<()> {
        self.n_humans = self.n_humans.checked_sub(n).ok_or_else(|| {
            GenepiError::SamplingError(format!(
                "unable to remove {n} humans from a cohort of {}",
                self.n_humans
            ))
        })?;
        Ok(())
    }

    /// Take one human out of the cohort to carry `infection`.
    pub fn pop_individual(
        &mut self,
        ctx: &mut Context,
        migration_info: &MigrationInfo,
        infection: Infection,
    ) -> Result<HumanIndividual> {
        self.remove(1)?;
        Ok(HumanIndividual::new(ctx, migration_info, infection))
    }

    /// Return a cleared individual to the cohort. Its identity is discarded.
    pub fn merge_individual(&mut self, individual: HumanIndividual) {
        log::debug!("Human {} returns to the cohort", individual.id());
        self.n_humans += 1;
    }
}

#[derive(Debug)]
pub struct HumanIndividual {
    id: usize,
    infection: Infection,
    migration: Migration,
}

impl HumanIndividual {
    fn new(ctx: &mut Context, migration_info: &MigrationInfo, infection: Infection) -> Self {
        let id = ctx.next_human_id();
        let migration = migration_info.next_migration(ctx.rng());
        Self {
            id,
            infection,
            migration,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn infection(&self) -> &Infection {
        &self.infection
    }

    pub fn infection_mut(&mut self) -> &mut Infection {
        &mut self.infection
    }

    pub fn migration(&self) -> &Migration {
        &self.migration
    }

    pub fn reschedule(&mut self, migration: Migration) {
        self.migration = migration;
    }

    pub fn update(
        &mut self,
        ctx: &mut Context,
        dt: f64,
        vectorial_capacity: f64,
    ) -> Result<Vec<Vec<Sporozoite>>> {
        self.migration.advance(dt);
        self.infection.update(ctx, dt, vectorial_capacity)
    }

    pub fn infection_expired(&self) -> bool {
        self.infection.expired()
    }

    pub fn migration_due(&self) -> Option<&str> {
        self.migration.due()
    }
}

impl fmt::Display for HumanIndividual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Human(id={}, {})", self.id, self.infection)
    }
}
