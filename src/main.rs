use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use pairasm_rs::cli::Args;
use pairasm_rs::PipelineConfig;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    // Usage errors exit 1 like every other failure; --help/--version exit 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            if args.quiet {
                EnvFilter::new("warn")
            } else {
                EnvFilter::new("info")
            }
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match try_main(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pairasm-rs: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(args: &Args) -> Result<()> {
    let config = PipelineConfig::from_args(args);
    let done = pairasm_rs::run(&config)?;
    tracing::info!(
        contigs = done.metrics.contigs,
        total_bp = done.metrics.total_bp,
        average_coverage = done.metrics.average_coverage,
        corrections = done.metrics.corrections,
        k = done.kmer.k,
        genome_size = done.kmer.genome_size,
        coverage_cutoff = done.kmer.coverage_cutoff,
        longest_read = done.longest_read,
        tiled = done.tiled,
        "pairasm-rs: assembly complete, contigs in {}",
        done.contigs.display()
    );
    Ok(())
}
