//! The fixed stage sequence, from validated config to final contigs.
//!
//! Each stage either returns what the next one needs or a [`FailureKind`];
//! the first failure is tagged with its stage and returned immediately.
//! Nothing is retried and nothing runs concurrently.

use crate::artifacts::{self, ClippedReads, OutputDir};
use crate::config::{PipelineConfig, HISTOGRAM_SAMPLE_CAP};
use crate::error::{FailureKind, PipelineError};
use crate::extract::{self, AssemblyMetrics, KmerOptimizationRow};
use crate::tools::{self, SystemRunner, ToolRunner};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    ValidateConfig,
    CheckDependencies,
    PrepareOutputDir,
    Trim,
    ProfileReadLengths,
    OptimizeKmer,
    Assemble,
    PostProcess,
    Tile,
    Done,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::ValidateConfig => "validate-config",
            Stage::CheckDependencies => "check-dependencies",
            Stage::PrepareOutputDir => "prepare-output-dir",
            Stage::Trim => "trim",
            Stage::ProfileReadLengths => "profile-read-lengths",
            Stage::OptimizeKmer => "optimize-kmer",
            Stage::Assemble => "assemble",
            Stage::PostProcess => "post-process",
            Stage::Tile => "tile",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a successful run leaves in the output directory, plus the
/// decisions taken on the way.
#[derive(Debug, Clone)]
pub struct FinalArtifacts {
    pub contigs: PathBuf,
    pub log: PathBuf,
    pub kmer_stats: PathBuf,
    pub histogram: PathBuf,
    pub manifest: PathBuf,
    pub profiler_log: PathBuf,
    pub clipped: ClippedReads,
    pub longest_read: usize,
    pub kmer: KmerOptimizationRow,
    pub metrics: AssemblyMetrics,
    pub tiled: bool,
}

/// Runs the whole workflow with real external programs.
pub fn run(config: &PipelineConfig) -> Result<FinalArtifacts, PipelineError> {
    run_with(config, &SystemRunner)
}

/// Runs the whole workflow, sending every external call through `runner`.
pub fn run_with<R: ToolRunner + ?Sized>(config: &PipelineConfig, runner: &R) -> Result<FinalArtifacts, PipelineError> {
    tracing::info!(
        stage = %Stage::Init,
        outdir = %config.outdir.display(),
        threads = config.threads,
        trim = config.trim,
        reference = config.reference.is_some(),
        "starting assembly pipeline"
    );

    within(Stage::ValidateConfig, || config.validate())?;
    within(Stage::CheckDependencies, || check_dependencies(config, runner))?;
    let out = within(Stage::PrepareOutputDir, || OutputDir::prepare(&config.outdir, config.force))?;
    let clipped = within(Stage::Trim, || trim(config, runner, &out))?;
    let (histogram, longest_read) = within(Stage::ProfileReadLengths, || profile_read_lengths(config, &out, &clipped))?;
    let optimized = within(Stage::OptimizeKmer, || optimize_kmer(config, runner, &out, &clipped, longest_read))?;
    within(Stage::Assemble, || assemble(config, runner, &out, &clipped, optimized.row.k))?;
    let post = within(Stage::PostProcess, || post_process(&out, &optimized.report))?;

    let tiled = match &config.reference {
        Some(reference) => {
            within(Stage::Tile, || tile(config, runner, &out, reference, &post.contigs))?;
            true
        }
        None => {
            tracing::info!(stage = %Stage::Tile, "no reference supplied, skipping tiling");
            false
        }
    };

    tracing::info!(stage = %Stage::Done, contigs = %post.contigs.display(), "pipeline finished");
    Ok(FinalArtifacts {
        contigs: post.contigs,
        log: post.log,
        kmer_stats: post.kmer_stats,
        histogram,
        manifest: optimized.manifest,
        profiler_log: optimized.profiler_log,
        clipped,
        longest_read,
        kmer: optimized.row,
        metrics: post.metrics,
        tiled,
    })
}

fn within<T>(stage: Stage, work: impl FnOnce() -> Result<T, FailureKind>) -> Result<T, PipelineError> {
    tracing::debug!(stage = %stage, "entering stage");
    work().map_err(|kind| {
        tracing::debug!(stage = %stage, error = %kind, "stage failed");
        PipelineError::new(stage, kind)
    })
}

/// Upper end of the k range: the longest read, capped at the assembler's limit.
pub fn kmer_upper_bound(longest_read: usize, max_kmer: usize) -> usize {
    longest_read.min(max_kmer)
}

fn check_dependencies<R: ToolRunner + ?Sized>(config: &PipelineConfig, runner: &R) -> Result<(), FailureKind> {
    let mut needed = Vec::with_capacity(4);
    if config.trim {
        needed.push(&config.tools.trimmer);
    }
    needed.push(&config.tools.kmer_profiler);
    needed.push(&config.tools.assembler);
    if config.reference.is_some() {
        needed.push(&config.tools.tiler);
    }
    for program in needed {
        match runner.locate(program) {
            Some(path) => tracing::debug!(tool = %program, path = %path.display(), "found dependency"),
            None => return Err(FailureKind::MissingDependency(program.clone())),
        }
    }
    Ok(())
}

fn trim<R: ToolRunner + ?Sized>(config: &PipelineConfig, runner: &R, out: &OutputDir) -> Result<ClippedReads, FailureKind> {
    if !config.trim {
        tracing::info!(stage = %Stage::Trim, "trimming disabled, linking original reads");
        return out.link_reads(&config.read1, &config.read2);
    }
    let invocation = tools::trimmer(config, &out.path(artifacts::TRIM_PREFIX));
    tracing::info!(stage = %Stage::Trim, tool = %invocation.program, "trimming reads");
    tools::invoke(runner, &invocation)?;
    out.adopt_trimmed(&invocation.outputs[0], &invocation.outputs[1])
}

fn profile_read_lengths(
    config: &PipelineConfig,
    out: &OutputDir,
    clipped: &ClippedReads,
) -> Result<(PathBuf, usize), FailureKind> {
    let hist = extract::build_read_length_histogram(&[clipped.r1.as_path(), clipped.r2.as_path()], HISTOGRAM_SAMPLE_CAP)?;
    let path = out.write_histogram(&hist.to_table())?;
    let longest = hist.longest();
    tracing::info!(
        stage = %Stage::ProfileReadLengths,
        sampled = hist.total(),
        longest,
        "read lengths profiled"
    );
    if longest < config.min_read_length {
        return Err(FailureKind::AssemblyTooShort {
            longest,
            minimum: config.min_read_length,
        });
    }
    Ok((path, longest))
}

struct KmerChoice {
    row: KmerOptimizationRow,
    report: PathBuf,
    manifest: PathBuf,
    profiler_log: PathBuf,
}

fn optimize_kmer<R: ToolRunner + ?Sized>(
    config: &PipelineConfig,
    runner: &R,
    out: &OutputDir,
    clipped: &ClippedReads,
    longest_read: usize,
) -> Result<KmerChoice, FailureKind> {
    let max_k = kmer_upper_bound(longest_read, config.max_kmer);
    let manifest = out.write_manifest(clipped)?;
    let profiler_log = out.path(artifacts::PROFILER_LOG);
    let invocation = tools::kmer_profiler(
        config,
        &manifest,
        config.min_read_length,
        max_k,
        &out.path(artifacts::PROFILER_PREFIX),
        &profiler_log,
    );
    tracing::info!(
        stage = %Stage::OptimizeKmer,
        tool = %invocation.program,
        min_k = config.min_read_length,
        max_k,
        "profiling k-mer range"
    );
    tools::invoke(runner, &invocation)?;

    let report = invocation.outputs[0].clone();
    let rows = extract::parse_kmer_table(&read_text(&report)?)?;
    let row = extract::select_optimal_kmer_row(&rows)?;
    tracing::info!(
        stage = %Stage::OptimizeKmer,
        k = row.k,
        genome_size = row.genome_size,
        coverage_cutoff = row.coverage_cutoff,
        candidates = rows.len(),
        "selected k"
    );
    Ok(KmerChoice {
        row,
        report,
        manifest,
        profiler_log,
    })
}

fn assemble<R: ToolRunner + ?Sized>(
    config: &PipelineConfig,
    runner: &R,
    out: &OutputDir,
    clipped: &ClippedReads,
    k: usize,
) -> Result<(), FailureKind> {
    let invocation = tools::assembler(config, k, (clipped.r1.as_path(), clipped.r2.as_path()), out.root());
    tracing::info!(stage = %Stage::Assemble, tool = %invocation.program, k, "assembling");
    tools::invoke(runner, &invocation)
}

struct PostProcessed {
    contigs: PathBuf,
    log: PathBuf,
    kmer_stats: PathBuf,
    metrics: AssemblyMetrics,
}

fn post_process(out: &OutputDir, kmer_report: &Path) -> Result<PostProcessed, FailureKind> {
    let (contigs, log) = out.canonicalize_assembly()?;
    let kmer_stats = out.adopt_kmer_report(kmer_report)?;
    out.purge_intermediates();

    let metrics = extract::extract_assembly_metrics(&read_text(&log)?, &read_text(&contigs)?)?;
    tracing::info!(
        stage = %Stage::PostProcess,
        contigs = metrics.contigs,
        total_bp = metrics.total_bp,
        average_coverage = metrics.average_coverage,
        corrections = metrics.corrections,
        "assembly metrics"
    );
    Ok(PostProcessed {
        contigs,
        log,
        kmer_stats,
        metrics,
    })
}

fn tile<R: ToolRunner + ?Sized>(
    config: &PipelineConfig,
    runner: &R,
    out: &OutputDir,
    reference: &Path,
    contigs: &Path,
) -> Result<(), FailureKind> {
    let invocation = tools::tiler(config, reference, contigs, &out.path(artifacts::TILING_DIR));
    tracing::info!(stage = %Stage::Tile, tool = %invocation.program, reference = %reference.display(), "tiling contigs");
    tools::invoke(runner, &invocation)?;
    std::fs::rename(&invocation.outputs[0], contigs).map_err(|e| {
        FailureKind::io(format!("failed to replace {} with tiled contigs", contigs.display()), e)
    })?;
    out.purge_intermediates();
    Ok(())
}

fn read_text(path: &Path) -> Result<String, FailureKind> {
    std::fs::read_to_string(path).map_err(|e| FailureKind::io(format!("failed to read {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_is_capped() {
        assert_eq!(kmer_upper_bound(200, 127), 127);
        assert_eq!(kmer_upper_bound(60, 127), 60);
        assert_eq!(kmer_upper_bound(127, 127), 127);
    }

    #[test]
    fn stage_names_are_kebab_case() {
        assert_eq!(Stage::ProfileReadLengths.to_string(), "profile-read-lengths");
        assert_eq!(Stage::Tile.name(), "tile");
    }
}
