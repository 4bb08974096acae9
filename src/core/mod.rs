//! This module contains the core datatypes of the library.

pub mod context;
pub mod genome;
pub mod historian;
pub mod hosts;
pub mod infection;
pub mod layout;
pub mod meiosis;
pub mod migration;
pub mod population;
mod registry;
pub mod sampling;
pub mod treatment;

pub use context::{Context, InfectionSamplers};
pub use genome::{Genome, GenomeModifier, distinct, set_allele};
pub use historian::{Event, Historian, Observer, Report, Sink, Transmission};
pub use hosts::{HumanCohort, HumanIndividual};
pub use infection::{Infection, Infectiousness};
pub use layout::{GenomeLayout, PF_CHROMOSOME_LENGTHS, Snp, SnpBin};
pub use meiosis::{Sporozoite, distinct_products, meiosis, single_product};
pub use migration::{MigrantQueue, Migration, MigrationInfo};
pub use population::Population;
pub use treatment::DrugTreatment;
