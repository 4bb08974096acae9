use serde::{Deserialize, Serialize};
use std::fs;

use crate::errors::{GenepiError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Seed of the single random stream that drives the whole run.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of simulated days.
    #[serde(default = "default_duration")]
    pub duration: usize,

    /// Length of a single tick in days.
    #[serde(default = "default_tstep")]
    pub tstep: usize,

    /// Within-host infection dynamics.
    #[serde(default)]
    pub infection: InfectionParameters,

    /// Discretization of the parasite genome.
    #[serde(default)]
    pub genome: GenomeParameters,
}

fn default_seed() -> u64 {
    8675309
}

fn default_duration() -> usize {
    3650
}

fn default_tstep() -> usize {
    21
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            duration: default_duration(),
            tstep: default_tstep(),
            infection: InfectionParameters::default(),
            genome: GenomeParameters::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LogNormalParameters {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WeibullParameters {
    pub scale: f64,
    pub shape: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct InfectionParameters {
    /// Days after onset before an infection becomes infectious.
    pub incubation: f64,

    /// Upper bound on the number of distinct strains a single bite passes on.
    pub max_transmit_strains: usize,

    /// Log-normal duration of an infection in days.
    pub duration: LogNormalParameters,

    /// Weibull distribution of the oocyst count, shifted by one.
    pub oocysts: WeibullParameters,

    /// Log-normal distribution of the infected hepatocyte count, floored at one.
    pub hepatocytes: LogNormalParameters,

    /// Standard deviation of the noise added to the infectiousness profile.
    pub infectiousness_noise: f64,

    /// Lower clamp of the infectiousness profile once incubation is over.
    pub min_infectiousness: f64,
}

impl Default for InfectionParameters {
    fn default() -> Self {
        Self {
            incubation: 25.,
            max_transmit_strains: 10,
            duration: LogNormalParameters {
                mu: 5.13,
                sigma: 0.8,
            },
            oocysts: WeibullParameters {
                scale: 2.5,
                shape: 0.65,
            },
            hepatocytes: LogNormalParameters {
                mu: 1.6,
                sigma: 0.8,
            },
            infectiousness_noise: 0.1,
            min_infectiousness: 1e-6,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct GenomeParameters {
    /// Size of a genome bin in base pairs. Derived from the SNP spacing if missing.
    pub bin_size: Option<u64>,

    /// Physical length of one Morgan of genetic map distance.
    pub bp_per_morgan: f64,

    /// SNPs with an allele frequency at or below this threshold are dropped.
    pub min_allele_freq: f64,
}

impl Default for GenomeParameters {
    fn default() -> Self {
        Self {
            bin_size: None,
            bp_per_morgan: 1.5e6,
            min_allele_freq: 0.,
        }
    }
}

#[derive(Debug)]
pub enum ParametersError {
    IoError(std::io::Error),
    YamlError(serde_yaml::Error),
}

impl std::fmt::Display for ParametersError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParametersError::IoError(error) => write!(formatter, "IO error: {}", error),
            ParametersError::YamlError(error) => write!(formatter, "YAML error: {}", error),
        }
    }
}

impl std::error::Error for ParametersError {}

impl std::fmt::Display for Parameters {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = vec![];
        self.write(&mut output).map_err(|_| std::fmt::Error)?;
        write!(formatter, "{}", String::from_utf8_lossy(&output))
    }
}

impl Parameters {
    pub fn write(&self, writer: &mut dyn std::io::Write) -> std::result::Result<(), ParametersError> {
        serde_yaml::to_writer(writer, self).map_err(ParametersError::YamlError)
    }

    pub fn read(
        reader: &mut dyn std::io::Read,
    ) -> std::result::Result<Parameters, ParametersError> {
        serde_yaml::from_reader(reader).map_err(ParametersError::YamlError)
    }

    pub fn write_to_file(&self, filename: &str) -> std::result::Result<(), ParametersError> {
        let file = fs::File::create(filename).map_err(ParametersError::IoError)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)
    }

    pub fn read_from_file(filename: &str) -> std::result::Result<Parameters, ParametersError> {
        let file = fs::File::open(filename).map_err(ParametersError::IoError)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read(&mut reader)
    }

    /// Number of ticks a full run takes.
    pub fn n_ticks(&self) -> usize {
        if self.tstep == 0 {
            return 0;
        }
        self.duration / self.tstep
    }

    pub fn validate(&self) -> Result<()> {
        if self.tstep == 0 {
            return Err(GenepiError::ConfigurationError(
                "time step must be positive".to_string(),
            ));
        }
        if let Some(0) = self.genome.bin_size {
            return Err(GenepiError::ConfigurationError(
                "bin size must be positive".to_string(),
            ));
        }
        if !(self.genome.bp_per_morgan > 0.) {
            return Err(GenepiError::ConfigurationError(format!(
                "bp_per_morgan must be positive, got {}",
                self.genome.bp_per_morgan
            )));
        }
        if self.infection.max_transmit_strains == 0 {
            return Err(GenepiError::ConfigurationError(
                "max_transmit_strains must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}
