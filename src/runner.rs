use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};

use crate::args::Args;
use crate::config::Settings;
use crate::core::{GenomeLayout, Snp};
use crate::errors::{GenepiError, Result};
use crate::readwrite::{GenomeReport, PopulationReport, TransmissionReport, read_snp_catalog};
use crate::simulation::Simulation;

pub struct Runner {
    args: Args,
    settings: Settings,
    simulation: Simulation,
}

impl Runner {
    pub fn new(args: Args) -> Result<Runner> {
        Self::setup_logger(&args);

        let mut settings = Self::load_settings(&args.settings)?;
        if let Some(seed) = args.seed {
            log::info!("Overriding seed with {seed}");
            settings.parameters.seed = seed;
        }

        let snps = read_snp_catalog(&args.snps, &args.allele_freqs)?;
        let layout = Self::create_layout(&snps, &settings)?;
        let demographics = settings.demographics.resolve()?;

        let mut simulation = Simulation::new(layout, &settings.parameters)?;
        let layout = simulation.context().layout().clone();
        simulation.add_report(Box::new(TransmissionReport::new()));
        simulation.add_report(Box::new(GenomeReport::new(layout)));
        simulation.add_report(Box::new(PopulationReport::new()));
        simulation.populate(&demographics)?;

        Ok(Self {
            args,
            settings,
            simulation,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        let outdir = PathBuf::from(&self.args.outdir);
        fs::create_dir_all(&outdir).map_err(|err| {
            GenepiError::WriteError(format!("Unable to create {}: {err}", outdir.display()))
        })?;

        log::info!("Storing settings...");
        let settings_path = outdir.join("settings.yaml");
        self.settings
            .write_to_file(&settings_path.to_string_lossy())?;

        self.run(&outdir)?;
        log::info!("Finished storing reports.");
        Ok(())
    }

    /// Setup logging level and file
    fn setup_logger(args: &Args) {
        let log_level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        simple_logging::log_to_file(args.log_file.as_str(), log_level).unwrap_or_else(|_| {
            eprintln!("Unable to open log file.");
            std::process::exit(1);
        });
    }

    /// Load settings from file
    fn load_settings(path: &str) -> Result<Settings> {
        let settings: Settings = Settings::read_from_file(path)?;
        log::info!("Loaded settings\n{}", settings);
        Ok(settings)
    }

    /// Discretize the catalog and add the selective loci
    fn create_layout(snps: &[Snp], settings: &Settings) -> Result<GenomeLayout> {
        let mut layout = GenomeLayout::from_catalog(snps, &settings.parameters.genome)?;
        for locus in settings.loci.iter() {
            layout.add_locus(locus.chrom, locus.pos, &locus.name, locus.fitness, locus.freq)?;
        }
        log::info!("Created {layout}");
        Ok(layout)
    }

    fn run(&mut self, outdir: &Path) -> Result<()> {
        let n_ticks = self.simulation.n_ticks();
        let bar = match self.args.disable_progress_bar {
            true => None,
            false => {
                let bar = ProgressBar::new(n_ticks as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "[{bar:40}] {pos:>7}/{len:7} [{elapsed_precise} / {duration_precise}] {msg}",
                        )
                        .unwrap_or_else(|_| {
                            eprintln!("Unable to create template.");
                            std::process::exit(1);
                        })
                        .progress_chars("=> "),
                );
                Some(bar)
            }
        };

        self.simulation.run_with(outdir, |simulation, tick| {
            let prevalence = simulation
                .populations()
                .values()
                .map(|population| {
                    format!(
                        "{}={}/{}",
                        population.id(),
                        population.n_infecteds(),
                        population.n_humans()
                    )
                })
                .join(" ");
            log::info!(
                r###"
        day={}
        prevalence={prevalence}
        genomes={}"###,
                simulation.day(),
                simulation.context().n_genomes()
            );

            if let Some(bar) = bar.as_ref() {
                bar.set_position(tick as u64);
                bar.set_message(prevalence);
            }
        })?;

        if let Some(bar) = bar {
            bar.finish_with_message("Done.");
        }
        Ok(())
    }
}
