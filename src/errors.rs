//! All errors that can occur in the genepi library.

use std::fmt;

use crate::config::SettingsError;

#[derive(Debug)]
pub enum GenepiError {
    ConfigurationError(String),
    SamplingError(String),
    ReadError(String),
    WriteError(String),
    SettingsError(SettingsError),
}

pub type Result<T> = std::result::Result<T, GenepiError>;

impl fmt::Display for GenepiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenepiError::ConfigurationError(message) => {
                write!(f, "ConfigurationError: {}", message)
            }
            GenepiError::SamplingError(message) => {
                write!(f, "SamplingError: {}", message)
            }
            GenepiError::ReadError(message) => {
                write!(f, "ReadError: {}", message)
            }
            GenepiError::WriteError(message) => {
                write!(f, "WriteError: {}", message)
            }
            GenepiError::SettingsError(error) => {
                write!(f, "SettingsError: {}", error)
            }
        }
    }
}

impl std::error::Error for GenepiError {}

impl From<SettingsError> for GenepiError {
    fn from(error: SettingsError) -> Self {
        GenepiError::SettingsError(error)
    }
}
