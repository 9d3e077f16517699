use crate::cli::Args;
use crate::error::FailureKind;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Reads shorter than this are useless to the assembler; also the lower end of the k range.
pub const MIN_READ_LENGTH: usize = 31;
/// Largest k the assembler accepts.
pub const MAX_KMER: usize = 127;
/// Phred threshold handed to the trimmer.
pub const TRIM_QUALITY: u8 = 10;
/// Assembler memory budget in GB.
pub const ASSEMBLER_MEMORY_GB: u32 = 16;
/// Number of FASTQ records sampled for the read-length histogram.
pub const HISTOGRAM_SAMPLE_CAP: usize = 100_000;

/// Program names (or paths) for the external collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub trimmer: String,
    pub kmer_profiler: String,
    pub assembler: String,
    pub tiler: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            trimmer: "skewer".to_string(),
            kmer_profiler: "kmergenie".to_string(),
            assembler: "spades.py".to_string(),
            tiler: "ragtag.py".to_string(),
        }
    }
}

/// Run configuration. Built once, never mutated; stages only borrow it.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub outdir: PathBuf,
    pub read1: PathBuf,
    pub read2: PathBuf,
    pub threads: usize,
    pub force: bool,
    pub trim: bool,
    pub reference: Option<PathBuf>,
    pub min_read_length: usize,
    pub max_kmer: usize,
    pub tools: ToolPaths,
}

impl PipelineConfig {
    /// Configuration with the fixed constants and default tool names.
    pub fn new(outdir: impl Into<PathBuf>, read1: impl Into<PathBuf>, read2: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            read1: read1.into(),
            read2: read2.into(),
            threads: 8,
            force: false,
            trim: true,
            reference: None,
            min_read_length: MIN_READ_LENGTH,
            max_kmer: MAX_KMER,
            tools: ToolPaths::default(),
        }
    }

    pub fn from_args(args: &Args) -> Self {
        Self {
            threads: args.threads,
            force: args.force,
            trim: !args.no_trim,
            reference: args.reference.clone(),
            tools: ToolPaths {
                trimmer: args.trimmer.clone(),
                kmer_profiler: args.kmer_profiler.clone(),
                assembler: args.assembler.clone(),
                tiler: args.tiler.clone(),
            },
            ..Self::new(&args.outdir, &args.read1, &args.read2)
        }
    }

    /// Checks everything that must hold before the first stage touches the disk.
    pub fn validate(&self) -> Result<(), FailureKind> {
        if self.threads == 0 {
            return Err(FailureKind::InvalidArgument(
                "thread count must be a positive integer".to_string(),
            ));
        }
        if self.min_read_length == 0 || self.min_read_length > self.max_kmer {
            return Err(FailureKind::InvalidArgument(format!(
                "minimum read length {} must lie in 1..={}",
                self.min_read_length, self.max_kmer
            )));
        }
        check_readable(&self.read1, "read 1")?;
        check_readable(&self.read2, "read 2")?;
        if let Some(reference) = &self.reference {
            check_readable(reference, "reference")?;
        }
        if self.outdir.exists() && !self.force {
            return Err(FailureKind::OutputExists(self.outdir.clone()));
        }
        Ok(())
    }
}

fn check_readable(path: &Path, label: &str) -> Result<(), FailureKind> {
    if !path.is_file() {
        return Err(FailureKind::InvalidArgument(format!(
            "{label} file {} does not exist or is not a regular file",
            path.display()
        )));
    }
    File::open(path).map_err(|e| {
        FailureKind::InvalidArgument(format!("{label} file {} is not readable: {e}", path.display()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn args_map_onto_config() {
        let args = Args::try_parse_from([
            "pairasm-rs", "out", "a.fq", "b.fq", "-t", "4", "-n", "-r", "ref.fa", "--assembler", "/opt/spades.py",
        ])
        .unwrap();
        let cfg = PipelineConfig::from_args(&args);
        assert_eq!(cfg.threads, 4);
        assert!(!cfg.trim);
        assert!(!cfg.force);
        assert_eq!(cfg.reference.as_deref(), Some(Path::new("ref.fa")));
        assert_eq!(cfg.tools.assembler, "/opt/spades.py");
        assert_eq!(cfg.tools.trimmer, "skewer");
        assert_eq!(cfg.min_read_length, 31);
        assert_eq!(cfg.max_kmer, 127);
    }

    #[test]
    fn non_integer_threads_rejected_by_parser() {
        for bad in ["abc", "-2", "1.5", ""] {
            let res = Args::try_parse_from(["pairasm-rs", "out", "a.fq", "b.fq", "-t", bad]);
            assert!(res.is_err(), "accepted -t {bad:?}");
        }
    }

    #[test]
    fn zero_threads_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = dir.path().join("r1.fq");
        let r2 = dir.path().join("r2.fq");
        std::fs::write(&r1, "@a\nACGT\n+\nIIII\n").unwrap();
        std::fs::write(&r2, "@a\nACGT\n+\nIIII\n").unwrap();
        let mut cfg = PipelineConfig::new(dir.path().join("out"), &r1, &r2);
        cfg.threads = 0;
        assert!(matches!(cfg.validate(), Err(FailureKind::InvalidArgument(_))));
        cfg.threads = 1;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn existing_outdir_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = dir.path().join("r1.fq");
        std::fs::write(&r1, "@a\nACGT\n+\nIIII\n").unwrap();
        let mut cfg = PipelineConfig::new(dir.path(), &r1, &r1);
        assert!(matches!(cfg.validate(), Err(FailureKind::OutputExists(_))));
        cfg.force = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_reads_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::new(dir.path().join("out"), dir.path().join("nope.fq"), dir.path().join("nope2.fq"));
        assert!(matches!(cfg.validate(), Err(FailureKind::InvalidArgument(_))));
    }
}
