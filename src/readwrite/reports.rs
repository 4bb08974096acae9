//! Reports collect events and population snapshots during a run and write
//! them to an output directory when flushed.

use npyz::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::rc::Rc;

use crate::core::{Event, GenomeLayout, Observer, Sink};
use crate::errors::{GenepiError, Result};
use crate::stats::PopulationSnapshot;

fn write_error(path: &Path, err: impl std::fmt::Display) -> GenepiError {
    GenepiError::WriteError(format!("{}: {err}", path.display()))
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|err| write_error(path, err))?;
    for row in rows {
        writer.serialize(row).map_err(|err| write_error(path, err))?;
    }
    writer.flush().map_err(|err| write_error(path, err))?;
    Ok(())
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct TransmissionRecord {
    day: usize,
    pid: String,
    iid: usize,
    #[serde(rename = "iidParent")]
    iid_parent: usize,
    #[serde(rename = "gidParent1")]
    gid_parent1: usize,
    #[serde(rename = "gidParent2")]
    gid_parent2: usize,
    gid: usize,
}

/// Every transmitted genome together with its parents.
#[derive(Debug, Default)]
pub struct TransmissionReport {
    records: Vec<TransmissionRecord>,
}

impl TransmissionReport {
    pub const FILENAME: &'static str = "TransmissionGeneticsReport.csv";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Observer for TransmissionReport {
    fn on_event(&mut self, event: &Event) {
        if let Event::InfectionTransmitted(batch) = event {
            self.records
                .extend(batch.iter().map(|transmission| TransmissionRecord {
                    day: transmission.day,
                    pid: transmission.population.clone(),
                    iid: transmission.infection,
                    iid_parent: transmission.parent_infection,
                    gid_parent1: transmission.parent_genomes.0,
                    gid_parent2: transmission.parent_genomes.1,
                    gid: transmission.genome.id(),
                }));
        }
    }
}

impl Sink for TransmissionReport {
    fn flush(&mut self, path: &Path) -> Result<()> {
        let path = path.join(Self::FILENAME);
        log::info!("Writing {} transmissions to {}", self.len(), path.display());
        write_csv(&path, &self.records)
    }
}

#[derive(Serialize, Debug)]
struct SnpRecord<'a> {
    index: usize,
    name: &'a str,
    chrom: usize,
    pos: u64,
    bin: usize,
}

/// Barcodes of every genome that appeared during the run.
///
/// The matrix is written as `GenomeReport.npy` with one row per genome in id
/// order and one column per SNP. The columns are described in
/// `GenomeReport.snps.csv`.
#[derive(Debug)]
pub struct GenomeReport {
    layout: Rc<GenomeLayout>,
    barcodes: Vec<(usize, Vec<u8>)>,
}

impl GenomeReport {
    pub const FILENAME: &'static str = "GenomeReport.npy";
    pub const SNPS_FILENAME: &'static str = "GenomeReport.snps.csv";

    pub fn new(layout: Rc<GenomeLayout>) -> Self {
        Self {
            layout,
            barcodes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    pub fn write(&self, writer: &mut impl std::io::Write) -> Result<()> {
        let mut barcodes: Vec<&(usize, Vec<u8>)> = self.barcodes.iter().collect();
        barcodes.sort_by_key(|(id, _)| *id);

        let shape = &[barcodes.len() as u64, self.layout.num_snps() as u64];
        let mut npy_writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(shape)
            .writer(writer)
            .begin_nd()
            .map_err(|e| GenepiError::WriteError(format!("{}", e)))?;
        npy_writer
            .extend(barcodes.into_iter().flat_map(|(_, barcode)| barcode.iter().copied()))
            .map_err(|e| GenepiError::WriteError(format!("{}", e)))?;
        npy_writer
            .finish()
            .map_err(|e| GenepiError::WriteError(format!("{}", e)))?;
        Ok(())
    }
}

impl Observer for GenomeReport {
    fn on_event(&mut self, event: &Event) {
        if let Event::GenomeCreated(genome) = event {
            self.barcodes.push((genome.id(), genome.barcode()));
        }
    }
}

impl Sink for GenomeReport {
    fn flush(&mut self, path: &Path) -> Result<()> {
        let npy_path = path.join(Self::FILENAME);
        log::info!("Writing {} genomes to {}", self.len(), npy_path.display());
        let file = fs::File::create(&npy_path).map_err(|err| write_error(&npy_path, err))?;
        self.write(&mut BufWriter::new(file))?;

        let snps: Vec<SnpRecord> = self
            .layout
            .snps()
            .iter()
            .enumerate()
            .map(|(index, snp)| SnpRecord {
                index,
                name: &snp.name,
                chrom: snp.chrom,
                pos: snp.pos,
                bin: snp.bin,
            })
            .collect();
        write_csv(&path.join(Self::SNPS_FILENAME), &snps)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct PopulationRecord {
    day: usize,
    pid: String,
    n_humans: usize,
    n_infecteds: usize,
    f_infected: f64,
    f_polygenomic: f64,
    mean_coi: f64,
    vectorial_capacity: f64,
}

impl From<&PopulationSnapshot> for PopulationRecord {
    fn from(snapshot: &PopulationSnapshot) -> Self {
        Self {
            day: snapshot.day,
            pid: snapshot.population.clone(),
            n_humans: snapshot.n_humans,
            n_infecteds: snapshot.n_infecteds,
            f_infected: snapshot.f_infected(),
            f_polygenomic: snapshot.f_polygenomic(),
            mean_coi: snapshot.mean_coi(),
            vectorial_capacity: snapshot.vectorial_capacity,
        }
    }
}

/// Prevalence time series, one row per population and tick.
#[derive(Debug, Default)]
pub struct PopulationReport {
    records: Vec<PopulationRecord>,
}

impl PopulationReport {
    pub const FILENAME: &'static str = "PopulationInfectionReport.csv";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Observer for PopulationReport {
    fn on_tick(&mut self, _day: usize, snapshots: &[PopulationSnapshot]) {
        self.records
            .extend(snapshots.iter().map(PopulationRecord::from));
    }
}

impl Sink for PopulationReport {
    fn flush(&mut self, path: &Path) -> Result<()> {
        let path = path.join(Self::FILENAME);
        log::info!("Writing {} population records to {}", self.len(), path.display());
        write_csv(&path, &self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::testing::context;
    use crate::core::{Genome, Transmission};

    fn outdir(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn transmission_report() {
        let mut ctx = context(0);
        let g1 = Genome::from_reference(&mut ctx);
        let g2 = Genome::from_barcode(&mut ctx, &vec![1; 28]).unwrap();
        let mut report = TransmissionReport::new();
        report.on_event(&Event::GenomeCreated(g1.clone()));
        report.on_event(&Event::InfectionTransmitted(vec![Transmission {
            day: 21,
            population: "A".to_string(),
            infection: 3,
            parent_infection: 1,
            parent_genomes: (g1.id(), g2.id()),
            genome: g2.clone(),
        }]));
        assert_eq!(report.len(), 1);

        let path = outdir("genepi_transmission_report");
        report.flush(&path).unwrap();
        let content = fs::read_to_string(path.join(TransmissionReport::FILENAME)).unwrap();
        assert_eq!(
            content,
            "day,pid,iid,iidParent,gidParent1,gidParent2,gid\n21,A,3,1,0,1,1\n"
        );
    }

    #[test]
    fn genome_report() {
        let mut ctx = context(0);
        let mut report = GenomeReport::new(ctx.layout().clone());
        Genome::from_reference(&mut ctx);
        Genome::from_barcode(&mut ctx, &vec![1; 28]).unwrap();
        for event in ctx.historian_mut().take() {
            report.on_event(&event);
        }
        assert_eq!(report.len(), 2);

        let mut buffer = Vec::new();
        report.write(&mut buffer).unwrap();
        let npy_data = npyz::NpyFile::new(buffer.as_slice()).unwrap();
        assert_eq!(npy_data.shape(), &[2, 28]);
        let data: Vec<u8> = npy_data.data::<u8>().unwrap().map(|el| el.unwrap()).collect();
        assert_eq!(&data[..28], &[0; 28]);
        assert_eq!(&data[28..], &[1; 28]);

        let path = outdir("genepi_genome_report");
        report.flush(&path).unwrap();
        let snps = fs::read_to_string(path.join(GenomeReport::SNPS_FILENAME)).unwrap();
        let mut lines = snps.lines();
        assert_eq!(lines.next(), Some("index,name,chrom,pos,bin"));
        assert_eq!(lines.next(), Some("0,Pf.1.100000,1,100000,10"));
        assert_eq!(lines.count(), 27);
    }

    #[test]
    fn population_report() {
        let mut report = PopulationReport::new();
        let snapshot = PopulationSnapshot {
            day: 42,
            population: "A".to_string(),
            n_humans: 10,
            n_infecteds: 5,
            n_polygenomic: 1,
            n_strains: 6,
            vectorial_capacity: 0.5,
        };
        report.on_tick(42, &[snapshot]);

        let path = outdir("genepi_population_report");
        report.flush(&path).unwrap();
        let content = fs::read_to_string(path.join(PopulationReport::FILENAME)).unwrap();
        assert_eq!(
            content,
            "day,pid,n_humans,n_infecteds,f_infected,f_polygenomic,mean_coi,vectorial_capacity\n\
             42,A,10,5,0.5,0.2,1.2,0.5\n"
        );
    }

    #[test]
    fn unwritable_directory() {
        let mut report = PopulationReport::new();
        assert!(matches!(
            report.flush(Path::new("/nonexistent/genepi")),
            Err(GenepiError::WriteError(_))
        ));
    }
}
