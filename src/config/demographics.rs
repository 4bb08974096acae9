//! Population topology, host counts and transmission intensity.
//!
//! A demography is either one of the named presets or an explicit map of
//! population names to their specification.

use evalexpr::{HashMapContext, Value, context_map, eval_number_with_context};
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

use super::treatment::Treatment;
use crate::errors::{GenepiError, Result};

/// Time-varying vectorial capacity of a population, evaluated per simulated day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum VectorialCapacity {
    Constant(f64),
    AnnualCycle {
        year_max: f64,
        #[serde(default)]
        year_min: f64,
        #[serde(default = "default_coeff")]
        coeff: u32,
        #[serde(default = "default_cycle")]
        cycle: f64,
    },
    /// Arithmetic expression in the variable `t`.
    Expression(String),
}

fn default_coeff() -> u32 {
    2
}

fn default_cycle() -> f64 {
    365.
}

impl VectorialCapacity {
    pub fn annual_cycle(year_max: f64, year_min: f64, coeff: u32) -> Self {
        Self::AnnualCycle {
            year_max,
            year_min,
            coeff,
            cycle: default_cycle(),
        }
    }

    pub fn evaluate(&self, day: usize) -> Result<f64> {
        match self {
            VectorialCapacity::Constant(value) => Ok(*value),
            VectorialCapacity::AnnualCycle {
                year_max,
                year_min,
                coeff,
                cycle,
            } => {
                if *coeff == 0 {
                    return Ok(*year_max);
                }
                let seasonal = (PI * day as f64 / cycle).cos().powi(*coeff as i32);
                Ok(year_min + (year_max - year_min) * seasonal)
            }
            VectorialCapacity::Expression(expression) => {
                evaluate_in_time(expression, day, "vectorial capacity")
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let VectorialCapacity::AnnualCycle { coeff, cycle, .. } = self {
            if coeff % 2 != 0 {
                return Err(GenepiError::ConfigurationError(format!(
                    "annual cycle coefficient must be even, got {coeff}"
                )));
            }
            if !(*cycle > 0.) {
                return Err(GenepiError::ConfigurationError(format!(
                    "annual cycle length must be positive, got {cycle}"
                )));
            }
        }
        let initial = self.evaluate(0)?;
        if !initial.is_finite() || initial < 0. {
            return Err(GenepiError::ConfigurationError(format!(
                "vectorial capacity must be finite and non-negative, got {initial}"
            )));
        }
        Ok(())
    }
}

/// Evaluate an arithmetic expression in the variable `t`, the simulated day.
pub(crate) fn evaluate_in_time(expression: &str, day: usize, what: &str) -> Result<f64> {
    let context: HashMapContext = context_map! {
        "t" => Value::Float(day as f64)
    }
    .map_err(|err| GenepiError::ConfigurationError(format!("{err}")))?;
    eval_number_with_context(expression, &context).map_err(|err| {
        GenepiError::ConfigurationError(format!("unable to evaluate {what} `{expression}`: {err}"))
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PopulationSpec {
    pub n_humans: usize,
    pub n_infections: usize,
    pub vectorial_capacity: VectorialCapacity,
    #[serde(default)]
    pub migration_rates: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<Treatment>,
}

impl PopulationSpec {
    pub fn new(n_humans: usize, n_infections: usize, vectorial_capacity: VectorialCapacity) -> Self {
        Self {
            n_humans,
            n_infections,
            vectorial_capacity,
            migration_rates: BTreeMap::new(),
            treatment: None,
        }
    }

    pub fn with_migration(mut self, destination: &str, rate: f64) -> Self {
        self.migration_rates.insert(destination.to_string(), rate);
        self
    }

    pub fn with_treatment(mut self, treatment: Treatment) -> Self {
        self.treatment = Some(treatment);
        self
    }
}

pub type Demographics = BTreeMap<String, PopulationSpec>;

/// Either the name of a preset or an explicit demography.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum DemographicsField {
    Preset(String),
    Explicit(Demographics),
}

impl DemographicsField {
    pub fn resolve(&self) -> Result<Demographics> {
        let demographics = match self {
            DemographicsField::Preset(name) => match PRESETS.get(name.as_str()) {
                Some(preset) => preset(),
                None => {
                    return Err(GenepiError::ConfigurationError(format!(
                        "unknown demography preset `{name}`"
                    )));
                }
            },
            DemographicsField::Explicit(demographics) => demographics.clone(),
        };
        validate_demographics(&demographics)?;
        Ok(demographics)
    }
}

/// Check counts, capacities and that every migration destination exists.
pub fn validate_demographics(demographics: &Demographics) -> Result<()> {
    for (name, spec) in demographics.iter() {
        if spec.n_infections > spec.n_humans {
            return Err(GenepiError::ConfigurationError(format!(
                "{name}: {} initial infections exceed {} humans",
                spec.n_infections, spec.n_humans
            )));
        }
        spec.vectorial_capacity.validate()?;
        if let Some(treatment) = spec.treatment.as_ref() {
            treatment.validate(name)?;
        }
        for (destination, rate) in spec.migration_rates.iter() {
            if !demographics.contains_key(destination) {
                return Err(GenepiError::ConfigurationError(format!(
                    "{name}: unknown migration destination `{destination}`"
                )));
            }
            if !rate.is_finite() || *rate < 0. {
                return Err(GenepiError::ConfigurationError(format!(
                    "{name}: invalid migration rate {rate} to `{destination}`"
                )));
            }
        }
    }
    Ok(())
}

pub static PRESETS: phf::Map<&'static str, fn() -> Demographics> = phf_map! {
    "single_node" => single_node,
    "two_node" => two_node,
    "multi_node" => multi_node,
};

fn single_node() -> Demographics {
    Demographics::from([(
        "Population #1".to_string(),
        PopulationSpec::new(1350, 500, VectorialCapacity::annual_cycle(1.0, 0.18, 2)),
    )])
}

fn two_node() -> Demographics {
    Demographics::from([
        (
            "Population #1".to_string(),
            PopulationSpec::new(500, 20, VectorialCapacity::annual_cycle(0.2, 1e-3, 10))
                .with_migration("Population #2", 2e-5),
        ),
        (
            "Population #2".to_string(),
            PopulationSpec::new(500, 150, VectorialCapacity::annual_cycle(0.045, 0., 0))
                .with_migration("Population #1", 2e-5),
        ),
    ])
}

fn multi_node() -> Demographics {
    const N_NODES: usize = 10;
    const MIGRATION: f64 = 5e-4;
    let names: Vec<String> = (1..=N_NODES).map(|i| format!("Population #{i}")).collect();
    names
        .iter()
        .map(|name| {
            let spec = names.iter().filter(|other| *other != name).fold(
                PopulationSpec::new(500, 20, VectorialCapacity::annual_cycle(0.18, 1e-3, 8)),
                |spec, other| spec.with_migration(other, MIGRATION / N_NODES as f64),
            );
            (name.clone(), spec)
        })
        .collect()
}
