//! Drug treatment applied to infections as they receive bites.

use rand::Rng;

use super::context::Context;
use super::genome::Genome;
use super::infection::Infection;
use super::layout::GenomeLayout;
use crate::config::{Treatment, TreatmentFraction};
use crate::errors::{GenepiError, Result};

/// A population's treatment policy resolved against the genome layout.
#[derive(Clone, Debug)]
pub struct DrugTreatment {
    fraction: TreatmentFraction,
    clearance: f64,
    resistant_clearance: f64,
    resistant_bin: Option<usize>,
}

impl DrugTreatment {
    pub fn new(treatment: &Treatment, layout: &GenomeLayout) -> Result<Self> {
        let resistant_bin = match treatment.resistance_locus.as_deref() {
            Some(name) => match layout.snp_named(name) {
                Some(snp) => Some(snp.bin),
                None => {
                    return Err(GenepiError::ConfigurationError(format!(
                        "unknown resistance locus `{name}`"
                    )));
                }
            },
            None => None,
        };
        Ok(Self {
            fraction: treatment.fraction.clone(),
            clearance: treatment.clearance,
            resistant_clearance: treatment.resistant_clearance,
            resistant_bin,
        })
    }

    pub fn fraction(&self, day: usize) -> Result<f64> {
        self.fraction.evaluate(day)
    }

    pub fn is_resistant(&self, genome: &Genome) -> bool {
        self.resistant_bin
            .is_some_and(|bin| genome.bins()[bin] != 0)
    }

    pub fn clearance(&self, genome: &Genome) -> f64 {
        match self.is_resistant(genome) {
            true => self.resistant_clearance,
            false => self.clearance,
        }
    }

    /// Treat `infection` with probability `fraction` and return whether it was treated.
    pub fn apply(&self, ctx: &mut Context, fraction: f64, infection: &mut Infection) -> bool {
        if ctx.rng().random::<f64>() >= fraction {
            return false;
        }
        infection.treat(ctx, |genome| self.clearance(genome));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::{barcode_layout, context};
    use crate::core::genome::set_allele;

    fn resistance_context(seed: u64) -> (Context, usize) {
        let mut layout = barcode_layout();
        let bin = layout.add_locus(13, 1_725_259, "kelch13", 1., 0.).unwrap();
        (Context::new(layout, Default::default(), seed).unwrap(), bin)
    }

    fn full_treatment() -> Treatment {
        Treatment::new(TreatmentFraction::Constant(1.), 1.).with_resistance("kelch13", 0.)
    }

    #[test]
    fn resistant_strains_survive() {
        let (mut ctx, bin) = resistance_context(0);
        let treatment = DrugTreatment::new(&full_treatment(), ctx.layout()).unwrap();
        let sensitive = Genome::from_reference(&mut ctx);
        let resistant = Genome::from_reference_with(&mut ctx, &[&set_allele(bin, 1)]);
        assert!(!treatment.is_resistant(&sensitive));
        assert!(treatment.is_resistant(&resistant));

        let mut infection = Infection::new(&mut ctx, vec![sensitive, resistant.clone()]);
        assert!(treatment.apply(&mut ctx, 1., &mut infection));
        assert_eq!(infection.strains(), &[resistant]);
        assert!(!infection.expired());
    }

    #[test]
    fn untreated_when_fraction_is_zero() {
        let (mut ctx, _) = resistance_context(1);
        let treatment = DrugTreatment::new(&full_treatment(), ctx.layout()).unwrap();
        let genome = Genome::from_reference(&mut ctx);
        let mut infection = Infection::new(&mut ctx, vec![genome]);
        for _ in 0..100 {
            assert!(!treatment.apply(&mut ctx, 0., &mut infection));
        }
        assert_eq!(infection.n_strains(), 1);
    }

    #[test]
    fn sensitive_infection_clears() {
        let mut ctx = context(2);
        let treatment = Treatment::new(TreatmentFraction::Constant(1.), 1.);
        let treatment = DrugTreatment::new(&treatment, ctx.layout()).unwrap();
        let genome = Genome::from_allele_frequencies(&mut ctx);
        let mut infection = Infection::new(&mut ctx, vec![genome]);
        assert!(treatment.apply(&mut ctx, treatment.fraction(0).unwrap(), &mut infection));
        assert_eq!(infection.n_strains(), 0);
        assert!(infection.expired());
    }

    #[test]
    fn unknown_resistance_locus() {
        let ctx = context(3);
        let result = DrugTreatment::new(&full_treatment(), ctx.layout());
        assert!(matches!(result, Err(GenepiError::ConfigurationError(_))));
    }
}
