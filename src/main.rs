use clap::Parser;
use genepi::args::Args;
use genepi::runner::Runner;

fn main() {
    let args = Args::parse();
    let mut runner = Runner::new(args).unwrap_or_else(|err| {
        eprintln!("Unable to set up simulation: {err}");
        std::process::exit(1);
    });
    runner.start().unwrap_or_else(|err| {
        eprintln!("Simulation failed: {err}");
        std::process::exit(1);
    });
}
