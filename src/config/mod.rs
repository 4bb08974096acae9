//! Configuration data structures for simulation setups.

mod demographics;
mod parameters;
mod settings;
mod treatment;

pub use demographics::{
    Demographics, DemographicsField, PRESETS, PopulationSpec, VectorialCapacity, validate_demographics,
};
pub use parameters::{
    GenomeParameters, InfectionParameters, LogNormalParameters, Parameters, ParametersError,
    WeibullParameters,
};
pub use settings::{Locus, Settings, SettingsError};
pub use treatment::{Treatment, TreatmentFraction};
