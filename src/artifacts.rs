//! Output-directory layout: creation, canonical names, intermediate cleanup.

use crate::error::FailureKind;
use std::path::{Path, PathBuf};

pub const CONTIGS: &str = "contigs.fa";
pub const ASSEMBLY_LOG: &str = "assembly.log";
pub const KMER_STATS: &str = "kmers.tsv";
pub const READ_LENGTHS: &str = "readlengths.tsv";
pub const MANIFEST: &str = "input.fofn";
pub const PROFILER_LOG: &str = "kmergenie.log";
pub const PROFILER_PREFIX: &str = "kmergenie";
pub const TRIM_PREFIX: &str = "trim";
pub const TILING_DIR: &str = "tiling";

const ASSEMBLER_SCAFFOLDS: &str = "scaffolds.fasta";
const ASSEMBLER_LOG: &str = "spades.log";

const TRANSIENT_DIRS: &[&str] = &[
    "tmp",
    "misc",
    "corrected",
    "split_input",
    "mismatch_corrector",
    "pipeline_state",
    TILING_DIR,
];
const TRANSIENT_FILES: &[&str] = &[
    "contigs.fasta",
    "before_rr.fasta",
    "params.txt",
    "dataset.info",
    "input_dataset.yaml",
];
const TRANSIENT_EXTENSIONS: &[&str] = &["histo", "pdf", "html", "r", "gfa", "fastg", "paths"];

/// Trimmed (or linked) read pair every later stage consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippedReads {
    pub r1: PathBuf,
    pub r2: PathBuf,
}

/// Handle on the run's output directory.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Creates the directory. An existing directory is reused only with `force`.
    pub fn prepare(root: &Path, force: bool) -> Result<Self, FailureKind> {
        if root.exists() {
            if !force {
                return Err(FailureKind::OutputExists(root.to_path_buf()));
            }
            if !root.is_dir() {
                return Err(FailureKind::InvalidArgument(format!(
                    "{} exists and is not a directory",
                    root.display()
                )));
            }
            tracing::warn!(outdir = %root.display(), "reusing existing output directory");
        }
        std::fs::create_dir_all(root)
            .map_err(|e| FailureKind::io(format!("failed to create {}", root.display()), e))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Canonical clipped-read names; keeps `.gz` when the source is gzip-named.
    pub fn clipped_names(&self, r1_source: &Path, r2_source: &Path) -> ClippedReads {
        let name = |n: u8, src: &Path| {
            let gz = src.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz"));
            self.path(&format!("R{n}.clipped.fastq{}", if gz { ".gz" } else { "" }))
        };
        ClippedReads {
            r1: name(1, r1_source),
            r2: name(2, r2_source),
        }
    }

    /// Points the canonical clipped names at the untouched original reads.
    pub fn link_reads(&self, read1: &Path, read2: &Path) -> Result<ClippedReads, FailureKind> {
        let clipped = self.clipped_names(read1, read2);
        symlink_replacing(read1, &clipped.r1)?;
        symlink_replacing(read2, &clipped.r2)?;
        Ok(clipped)
    }

    /// Moves the trimmer's pair outputs onto the canonical clipped names.
    pub fn adopt_trimmed(&self, pair1: &Path, pair2: &Path) -> Result<ClippedReads, FailureKind> {
        let clipped = self.clipped_names(pair1, pair2);
        rename(pair1, &clipped.r1)?;
        rename(pair2, &clipped.r2)?;
        Ok(clipped)
    }

    pub fn write_manifest(&self, reads: &ClippedReads) -> Result<PathBuf, FailureKind> {
        let path = self.path(MANIFEST);
        let body = format!("{}\n{}\n", reads.r1.display(), reads.r2.display());
        write(&path, body)?;
        Ok(path)
    }

    pub fn write_histogram(&self, table: &str) -> Result<PathBuf, FailureKind> {
        let path = self.path(READ_LENGTHS);
        write(&path, table)?;
        Ok(path)
    }

    /// Renames the profiler's report to the canonical stats name.
    pub fn adopt_kmer_report(&self, report: &Path) -> Result<PathBuf, FailureKind> {
        let dest = self.path(KMER_STATS);
        rename(report, &dest)?;
        Ok(dest)
    }

    /// Renames the assembler's scaffolds and log to canonical names.
    /// Returns `(contigs, log)`.
    pub fn canonicalize_assembly(&self) -> Result<(PathBuf, PathBuf), FailureKind> {
        let contigs = self.path(CONTIGS);
        let log = self.path(ASSEMBLY_LOG);
        rename(&self.path(ASSEMBLER_SCAFFOLDS), &contigs)?;
        rename(&self.path(ASSEMBLER_LOG), &log)?;
        Ok((contigs, log))
    }

    /// Best-effort removal of assembler and profiler leftovers. Missing
    /// targets are fine; other failures are logged and skipped.
    pub fn purge_intermediates(&self) {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(outdir = %self.root.display(), error = %e, "cannot list output directory");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir && is_transient_dir(&name) {
                remove(&path, true);
            } else if !is_dir && is_transient_file(&name) {
                remove(&path, false);
            }
        }
    }
}

/// Per-k working directories (`K21`, `K55`, ...) and the fixed scratch dirs.
pub fn is_transient_dir(name: &str) -> bool {
    let per_k = name.len() > 1 && name.starts_with('K') && name[1..].bytes().all(|b| b.is_ascii_digit());
    per_k || TRANSIENT_DIRS.contains(&name)
}

pub fn is_transient_file(name: &str) -> bool {
    if TRANSIENT_FILES.contains(&name) {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TRANSIENT_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
}

fn remove(path: &Path, dir: bool) {
    let res = if dir {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match res {
        Ok(()) => tracing::debug!(path = %path.display(), "removed intermediate"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove intermediate"),
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), FailureKind> {
    std::fs::rename(from, to).map_err(|e| {
        FailureKind::io(format!("failed to rename {} to {}", from.display(), to.display()), e)
    })
}

fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), FailureKind> {
    std::fs::write(path, contents).map_err(|e| FailureKind::io(format!("failed to write {}", path.display()), e))
}

fn symlink_replacing(original: &Path, link: &Path) -> Result<(), FailureKind> {
    let target = std::fs::canonicalize(original)
        .map_err(|e| FailureKind::io(format!("failed to resolve {}", original.display()), e))?;
    if std::fs::symlink_metadata(link).is_ok() {
        // the original already is, or resolves to, the canonical entry
        if std::fs::canonicalize(link).is_ok_and(|existing| existing == target) {
            tracing::debug!(read = %target.display(), link = %link.display(), "read already in place");
            return Ok(());
        }
        std::fs::remove_file(link)
            .map_err(|e| FailureKind::io(format!("failed to replace {}", link.display()), e))?;
    }
    #[cfg(unix)]
    let res = std::os::unix::fs::symlink(&target, link);
    #[cfg(windows)]
    let res = std::os::windows::fs::symlink_file(&target, link);
    res.map_err(|e| FailureKind::io(format!("failed to link {} -> {}", link.display(), target.display()), e))
}
