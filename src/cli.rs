use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pairasm-rs",
    about = "Assemble a paired-end library: trim, profile read lengths, pick k, assemble, tile",
    version,
    args_override_self = true
)]
pub struct Args {
    /// Output directory (must not exist unless --force is given)
    pub outdir: PathBuf,

    /// First read file of the pair (FASTQ, optionally gzipped)
    pub read1: PathBuf,

    /// Second read file of the pair (FASTQ, optionally gzipped)
    pub read2: PathBuf,

    /// Number of threads (CPUs) to pass to the external tools
    #[arg(short = 't', long = "threads", default_value_t = 8)]
    pub threads: usize,

    /// Reuse an existing output directory
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Skip read trimming and link the original reads instead
    #[arg(short = 'n', long = "no-trim")]
    pub no_trim: bool,

    /// Reference FASTA used to tile the final contigs
    #[arg(short = 'r', long = "reference", value_name = "FASTA")]
    pub reference: Option<PathBuf>,

    /// Set logging level to WARN
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Read trimmer executable
    #[arg(long, value_name = "PROGRAM", default_value = "skewer")]
    pub trimmer: String,

    /// K-mer profiler executable
    #[arg(long = "kmer-profiler", value_name = "PROGRAM", default_value = "kmergenie")]
    pub kmer_profiler: String,

    /// Assembler executable
    #[arg(long, value_name = "PROGRAM", default_value = "spades.py")]
    pub assembler: String,

    /// Reference tiler executable
    #[arg(long, value_name = "PROGRAM", default_value = "ragtag.py")]
    pub tiler: String,
}
