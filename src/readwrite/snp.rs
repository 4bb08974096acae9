//! Readers for SNP catalogs.
//!
//! Two layouts are understood:
//!
//! * CSV with a `chrom,pos,freq` header (`freq` may be omitted), e.g.
//!   ```text
//!   chrom,pos,freq
//!   1,1110,0.02631
//!   ```
//! * A whitespace separated `CHR POS` table with a header line and 3D7
//!   chromosome names. Allele frequencies are given separately.
//!   ```text
//!   CHR    POS
//!   Pf3D7_01_v3    130339
//!   ```

use std::fs;
use std::path::Path;

use crate::core::Snp;
use crate::errors::{GenepiError, Result};

/// Read a catalog, choosing the layout from the file extension.
///
/// `allele_freqs` only applies to the whitespace table.
pub fn read_snp_catalog(path: &str, allele_freqs: &[f64]) -> Result<Vec<Snp>> {
    let is_csv = Path::new(path)
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
    let snps = if is_csv {
        read_snp_csv(path)?
    } else {
        read_snp_table(path, allele_freqs)?
    };
    log::info!("Read {} SNPs from {path}", snps.len());
    Ok(snps)
}

pub fn read_snp_csv(path: &str) -> Result<Vec<Snp>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|_err| GenepiError::ReadError(format!("Failed to read from {path}")))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(line, record)| {
            record.map_err(|err| {
                GenepiError::ReadError(format!(
                    "Failed to parse record {} in {path}: {err}",
                    line + 1
                ))
            })
        })
        .collect()
}

pub fn read_snp_table(path: &str, allele_freqs: &[f64]) -> Result<Vec<Snp>> {
    let content = fs::read_to_string(path)
        .map_err(|_err| GenepiError::ReadError(format!("Failed to read from {path}")))?;
    parse_snp_table(&content, allele_freqs)
        .map_err(|err| GenepiError::ReadError(format!("{path}: {err}")))
}

fn parse_snp_table(content: &str, allele_freqs: &[f64]) -> std::result::Result<Vec<Snp>, String> {
    let mut snps = content
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(parse_table_line)
        .collect::<std::result::Result<Vec<Snp>, String>>()?;

    if !allele_freqs.is_empty() {
        if allele_freqs.len() != snps.len() {
            return Err(format!(
                "{} allele frequencies given for {} SNPs",
                allele_freqs.len(),
                snps.len()
            ));
        }
        for (snp, freq) in snps.iter_mut().zip(allele_freqs) {
            snp.freq = *freq;
        }
    }
    Ok(snps)
}

fn parse_table_line(line: &str) -> std::result::Result<Snp, String> {
    let mut fields = line.split_whitespace();
    let (Some(chrom), Some(pos), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(format!("expected two columns in `{line}`"));
    };
    let chrom = chrom
        .split('_')
        .nth(1)
        .and_then(|number| number.parse::<usize>().ok())
        .ok_or_else(|| format!("invalid chromosome name `{chrom}`"))?;
    let pos = pos
        .parse::<u64>()
        .map_err(|_| format!("invalid position `{pos}`"))?;
    Ok(Snp::new(chrom, pos, 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "CHR\tPOS\nPf3D7_01_v3\t130339\nPf3D7_14_v3    2700000\n";

    fn write_temp(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, content).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn parse_table() {
        let snps = parse_snp_table(TABLE, &[]).unwrap();
        assert_eq!(
            snps,
            vec![Snp::new(1, 130339, 0.5), Snp::new(14, 2700000, 0.5)]
        );
    }

    #[test]
    fn table_with_frequencies() {
        let snps = parse_snp_table(TABLE, &[0.1, 0.2]).unwrap();
        assert_eq!(snps[0].freq, 0.1);
        assert_eq!(snps[1].freq, 0.2);
        assert!(parse_snp_table(TABLE, &[0.1]).is_err());
    }

    #[test]
    fn malformed_table() {
        assert!(parse_snp_table("CHR POS\nchr1 100\n", &[]).is_err());
        assert!(parse_snp_table("CHR POS\nPf3D7_01_v3 abc\n", &[]).is_err());
        assert!(parse_snp_table("CHR POS\nPf3D7_01_v3\n", &[]).is_err());
    }

    #[test]
    fn read_csv() {
        let path = write_temp(
            "genepi_snps.csv",
            "chrom,pos,freq\n1,1110,0.02631\n2,2271,0.03125\n",
        );
        let snps = read_snp_catalog(&path, &[]).unwrap();
        assert_eq!(
            snps,
            vec![Snp::new(1, 1110, 0.02631), Snp::new(2, 2271, 0.03125)]
        );
    }

    #[test]
    fn read_table_file() {
        let path = write_temp("genepi_barcode_loci.txt", TABLE);
        let snps = read_snp_catalog(&path, &[]).unwrap();
        assert_eq!(snps.len(), 2);
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_snp_catalog("/nonexistent/snps.csv", &[]),
            Err(GenepiError::ReadError(_))
        ));
    }
}
