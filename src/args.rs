use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = None,
    name = "genepi",
)]
pub struct Args {
    /// Path to settings.
    #[clap(long)]
    pub settings: String,

    /// Path to SNP catalog (csv or whitespace table)
    #[clap(long)]
    pub snps: String,

    /// Allele frequencies of the SNPs in a whitespace table, in file order
    #[clap(long, value_delimiter = ',', num_args = 1..)]
    pub allele_freqs: Vec<f64>,

    /// Path to output directory
    #[clap(long, short, default_value = "./output")]
    pub outdir: String,

    /// Path to log file
    #[clap(long, default_value = "genepi.log")]
    pub log_file: String,

    /// Verbosity
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Seed overriding the one in the settings
    #[clap(long)]
    pub seed: Option<u64>,

    /// Disable progress bar
    #[clap(long, default_value_t = false)]
    pub disable_progress_bar: bool,
}
