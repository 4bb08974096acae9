//! Population summaries and statistics

pub mod population;

pub use population::PopulationFrequencies;
pub use population::PopulationSnapshot;
