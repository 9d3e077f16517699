//! pairasm-rs: drive a paired-end genome assembly through trimming, read-length
//! profiling, k selection, assembly, cleanup and optional reference tiling.
//!
//! The heavy lifting is done by external programs; this crate sequences them,
//! reads their tables back into typed values, and stops at the first failure.
//!
//! # Library usage
//!
//! ```no_run
//! use pairasm_rs::{run, PipelineConfig};
//!
//! let mut config = PipelineConfig::new("asm_out", "reads_R1.fastq.gz", "reads_R2.fastq.gz");
//! config.threads = 16;
//! config.trim = false;
//! match run(&config) {
//!     Ok(done) => println!("{} contigs in {}", done.metrics.contigs, done.contigs.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod tools;

pub use config::{PipelineConfig, ToolPaths};
pub use error::{FailureKind, PipelineError};
pub use extract::{AssemblyMetrics, KmerOptimizationRow, ReadLengthHistogram};
pub use pipeline::{run, run_with, FinalArtifacts, Stage};
pub use tools::{SystemRunner, ToolInvocation, ToolRunner};
