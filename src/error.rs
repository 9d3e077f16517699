//! Failure taxonomy for the assembly pipeline.
//!
//! Every failure is fatal: the orchestrator stops at the first one and the
//! binary exits with status 1.

use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// What went wrong, independent of where.
#[derive(Debug, Error)]
pub enum FailureKind {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("output directory {} already exists (use -f to reuse it)", .0.display())]
    OutputExists(PathBuf),

    #[error("required tool `{0}` was not found")]
    MissingDependency(String),

    #[error("`{tool}` failed ({})", describe_code(.code))]
    StageExecution { tool: String, code: Option<i32> },

    #[error("expected input {} is missing", .0.display())]
    MissingInput(PathBuf),

    #[error("expected output {} is missing or empty", .0.display())]
    MissingOutput(PathBuf),

    #[error("longest sampled read is {longest} bp, shorter than the {minimum} bp minimum")]
    AssemblyTooShort { longest: usize, minimum: usize },

    #[error("malformed {what}: {detail}")]
    MalformedOutput { what: &'static str, detail: String },

    #[error("unreadable reads {}: {detail}", .path.display())]
    MalformedInput { path: PathBuf, detail: String },

    #[error("{context}: {error}")]
    Io {
        context: String,
        error: std::io::Error,
    },
}

impl FailureKind {
    pub(crate) fn io(context: impl Into<String>, error: std::io::Error) -> Self {
        FailureKind::Io {
            context: context.into(),
            error,
        }
    }

    pub(crate) fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        FailureKind::MalformedOutput {
            what,
            detail: detail.into(),
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit status {c}"),
        None => "terminated by signal".to_string(),
    }
}

/// A failure tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {kind}")]
pub struct PipelineError {
    pub stage: Stage,
    pub kind: FailureKind,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: FailureKind) -> Self {
        Self { stage, kind }
    }

    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }
}
