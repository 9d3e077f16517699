//! Uniform wrapper around every external program the pipeline calls.

use crate::config::{PipelineConfig, ASSEMBLER_MEMORY_GB, TRIM_QUALITY};
use crate::error::FailureKind;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One external call: what it needs, what it must leave behind.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Files that must exist before the call.
    pub inputs: Vec<PathBuf>,
    /// Files that must exist and be non-empty after a successful call.
    pub outputs: Vec<PathBuf>,
    /// Redirect the program's stdout into this file.
    pub stdout: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Executes invocations. The orchestrator only talks to this trait, so tests
/// can swap in a fake that writes canned outputs.
pub trait ToolRunner {
    /// Resolves a program name to an executable, if one is available.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Runs the program to completion. Only the exit status is checked here.
    fn execute(&self, invocation: &ToolInvocation) -> Result<(), FailureKind>;
}

/// Runs real processes found on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        find_executable(program)
    }

    fn execute(&self, invocation: &ToolInvocation) -> Result<(), FailureKind> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).stdin(Stdio::null());
        if let Some(path) = &invocation.stdout {
            let file = File::create(path)
                .map_err(|e| FailureKind::io(format!("failed to create {}", path.display()), e))?;
            cmd.stdout(file);
        }
        let status = cmd
            .status()
            .map_err(|e| FailureKind::io(format!("failed to launch `{}`", invocation.program), e))?;
        if !status.success() {
            return Err(FailureKind::StageExecution {
                tool: invocation.program.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// Checks declared inputs, runs the tool, then checks declared outputs.
/// A zero exit status with a missing output is still a failure.
pub fn invoke<R: ToolRunner + ?Sized>(runner: &R, invocation: &ToolInvocation) -> Result<(), FailureKind> {
    if let Some(missing) = invocation.inputs.iter().find(|p| !p.exists()) {
        return Err(FailureKind::MissingInput(missing.clone()));
    }
    tracing::debug!(command = %invocation.command_line(), "invoking external tool");
    runner.execute(invocation)?;
    ensure_outputs(&invocation.outputs)
}

pub fn ensure_outputs(paths: &[PathBuf]) -> Result<(), FailureKind> {
    for path in paths {
        let non_empty = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if !non_empty {
            return Err(FailureKind::MissingOutput(path.clone()));
        }
    }
    Ok(())
}

/// Looks up `program` the way a shell would: paths are checked directly,
/// bare names are searched on `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── concrete tool contracts ──────────────────────────────────────────────────

/// Paired-end quality trim. Outputs `<prefix>-trimmed-pair{1,2}.fastq`.
pub fn trimmer(config: &PipelineConfig, prefix: &Path) -> ToolInvocation {
    let pair1 = suffixed(prefix, "-trimmed-pair1.fastq");
    let pair2 = suffixed(prefix, "-trimmed-pair2.fastq");
    ToolInvocation::new(&config.tools.trimmer)
        .arg("-m")
        .arg("pe")
        .arg("-q")
        .arg(TRIM_QUALITY.to_string())
        .arg("-l")
        .arg(config.min_read_length.to_string())
        .arg("-t")
        .arg(config.threads.to_string())
        .arg("-o")
        .arg(prefix)
        .arg(&config.read1)
        .arg(&config.read2)
        .input(&config.read1)
        .input(&config.read2)
        .output(pair1)
        .output(pair2)
}

/// Per-k genome-size scan over `[min_k, max_k]`. The table lands in
/// `<prefix>.dat`; the html report and `-k*.histo` files are not tracked.
pub fn kmer_profiler(
    config: &PipelineConfig,
    manifest: &Path,
    min_k: usize,
    max_k: usize,
    prefix: &Path,
    log: &Path,
) -> ToolInvocation {
    ToolInvocation::new(&config.tools.kmer_profiler)
        .arg(manifest)
        .arg("-l")
        .arg(min_k.to_string())
        .arg("-k")
        .arg(max_k.to_string())
        .arg("-t")
        .arg(config.threads.to_string())
        .arg("-o")
        .arg(prefix)
        .input(manifest)
        .output(suffixed(prefix, ".dat"))
        .stdout_to(log)
}

/// Assembler-only run with mismatch correction. Writes `scaffolds.fasta` and
/// `spades.log` into `workdir`.
pub fn assembler(config: &PipelineConfig, k: usize, reads: (&Path, &Path), workdir: &Path) -> ToolInvocation {
    ToolInvocation::new(&config.tools.assembler)
        .arg("--only-assembler")
        .arg("--careful")
        .arg("-k")
        .arg(k.to_string())
        .arg("-t")
        .arg(config.threads.to_string())
        .arg("-m")
        .arg(ASSEMBLER_MEMORY_GB.to_string())
        .arg("-1")
        .arg(reads.0)
        .arg("-2")
        .arg(reads.1)
        .arg("-o")
        .arg(workdir)
        .input(reads.0)
        .input(reads.1)
        .output(workdir.join("scaffolds.fasta"))
        .output(workdir.join("spades.log"))
}

/// Orders and orients contigs against `reference`. Writes
/// `<workdir>/ragtag.scaffold.fasta`.
pub fn tiler(config: &PipelineConfig, reference: &Path, contigs: &Path, workdir: &Path) -> ToolInvocation {
    ToolInvocation::new(&config.tools.tiler)
        .arg("scaffold")
        .arg("-t")
        .arg(config.threads.to_string())
        .arg("-o")
        .arg(workdir)
        .arg(reference)
        .arg(contigs)
        .input(reference)
        .input(contigs)
        .output(workdir.join("ragtag.scaffold.fasta"))
}

fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
