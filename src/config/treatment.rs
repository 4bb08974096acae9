//! Drug treatment of freshly transmitted infections.

use serde::{Deserialize, Serialize};

use super::demographics::evaluate_in_time;
use crate::errors::{GenepiError, Result};

/// Share of transmissions that get treated on a given day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum TreatmentFraction {
    Constant(f64),
    /// Arithmetic expression in the variable `t`, e.g. `min(0.6, 0.05 + 0.05 * t / 365)`.
    Expression(String),
}

impl TreatmentFraction {
    /// Fraction on `day`, clamped to `[0, 1]`.
    pub fn evaluate(&self, day: usize) -> Result<f64> {
        let fraction = match self {
            TreatmentFraction::Constant(value) => *value,
            TreatmentFraction::Expression(expression) => {
                evaluate_in_time(expression, day, "treatment fraction")?
            }
        };
        if !fraction.is_finite() {
            return Err(GenepiError::ConfigurationError(format!(
                "treatment fraction must be finite, got {fraction} on day {day}"
            )));
        }
        Ok(fraction.clamp(0., 1.))
    }
}

/// Treatment policy of a population.
///
/// Every infection that receives a bite is treated with probability
/// `fraction`. A treated infection loses each strain with its clearance
/// probability and clears altogether once no strain survives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Treatment {
    pub fraction: TreatmentFraction,
    /// Clearance probability of a drug sensitive strain.
    pub clearance: f64,
    /// Clearance probability of a strain carrying the resistance allele.
    #[serde(default)]
    pub resistant_clearance: f64,
    /// Locus whose non-reference allele confers resistance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resistance_locus: Option<String>,
}

impl Treatment {
    pub fn new(fraction: TreatmentFraction, clearance: f64) -> Self {
        Self {
            fraction,
            clearance,
            resistant_clearance: 0.,
            resistance_locus: None,
        }
    }

    pub fn with_resistance(mut self, locus: &str, resistant_clearance: f64) -> Self {
        self.resistance_locus = Some(locus.to_string());
        self.resistant_clearance = resistant_clearance;
        self
    }

    pub fn validate(&self, population: &str) -> Result<()> {
        for (what, probability) in [
            ("clearance", self.clearance),
            ("resistant clearance", self.resistant_clearance),
        ] {
            if !(0. ..=1.).contains(&probability) {
                return Err(GenepiError::ConfigurationError(format!(
                    "{population}: {what} must be a probability, got {probability}"
                )));
            }
        }
        self.fraction.evaluate(0)?;
        Ok(())
    }
}
