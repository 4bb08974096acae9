//! Reading SNP catalogs and writing run reports.

mod reports;
mod snp;

pub use reports::{GenomeReport, PopulationReport, TransmissionReport};
pub use snp::{read_snp_catalog, read_snp_csv, read_snp_table};
