//! Typed parsers for the tables and logs the external tools leave behind.
//!
//! Nothing here writes to disk; every function either reads an input stream or
//! works on text that has already been loaded.

use crate::error::FailureKind;
use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read length -> number of sampled reads with that length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadLengthHistogram {
    counts: BTreeMap<usize, u64>,
}

impl ReadLengthHistogram {
    pub fn record(&mut self, length: usize) {
        *self.counts.entry(length).or_insert(0) += 1;
    }

    /// Longest read length observed, or 0 for an empty sample.
    pub fn longest(&self) -> usize {
        self.counts.keys().next_back().copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, length: usize) -> u64 {
        self.counts.get(&length).copied().unwrap_or(0)
    }

    /// Two-column `length<TAB>count` table, longest first.
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        for (len, count) in self.counts.iter().rev() {
            let _ = writeln!(out, "{len}\t{count}");
        }
        out
    }

    pub fn from_table(text: &str) -> Result<Self, FailureKind> {
        let mut hist = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let parsed = (
                fields.next().and_then(|f| f.parse::<usize>().ok()),
                fields.next().and_then(|f| f.parse::<u64>().ok()),
            );
            match parsed {
                (Some(len), Some(count)) => *hist.counts.entry(len).or_insert(0) += count,
                _ => {
                    return Err(FailureKind::malformed(
                        "read-length histogram",
                        format!("line {} is not `length count`: {line:?}", lineno + 1),
                    ))
                }
            }
        }
        Ok(hist)
    }
}

/// Samples at most `sample_cap` records across `paths`, in order, as if the
/// files were concatenated. Gzip input is detected and decompressed; an empty
/// file contributes no records.
pub fn build_read_length_histogram<P: AsRef<Path>>(
    paths: &[P],
    sample_cap: usize,
) -> Result<ReadLengthHistogram, FailureKind> {
    let mut hist = ReadLengthHistogram::default();
    let mut sampled = 0;
    for path in paths {
        if sampled >= sample_cap {
            break;
        }
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FailureKind::MissingInput(path.to_path_buf()),
            _ => FailureKind::io(format!("failed to stat {}", path.display()), e),
        })?;
        if meta.len() == 0 {
            tracing::warn!(reads = %path.display(), "read file is empty");
            continue;
        }
        let reader = match parse_fastx_file(path) {
            Ok(reader) => reader,
            Err(e) if e.kind == ParseErrorKind::EmptyFile => {
                tracing::warn!(reads = %path.display(), "read file holds no records");
                continue;
            }
            Err(e) => return Err(unreadable(path, format!("failed to open: {e}"))),
        };
        sampled += sample_lengths(reader, &mut hist, sample_cap - sampled, path)?;
    }
    Ok(hist)
}

/// Same as [`build_read_length_histogram`] over in-memory or piped streams.
/// Streams are named `stream #1`, `stream #2`, ... in errors.
pub fn histogram_from_readers<R>(streams: Vec<R>, sample_cap: usize) -> Result<ReadLengthHistogram, FailureKind>
where
    R: Read + Send + 'static,
{
    let mut hist = ReadLengthHistogram::default();
    let mut sampled = 0;
    for (i, stream) in streams.into_iter().enumerate() {
        if sampled >= sample_cap {
            break;
        }
        let name = PathBuf::from(format!("stream #{}", i + 1));
        let reader = match parse_fastx_reader(stream) {
            Ok(reader) => reader,
            Err(e) if e.kind == ParseErrorKind::EmptyFile => continue,
            Err(e) => return Err(unreadable(&name, format!("failed to open: {e}"))),
        };
        sampled += sample_lengths(reader, &mut hist, sample_cap - sampled, &name)?;
    }
    Ok(hist)
}

/// Records up to `budget` lengths from `reader`; returns how many were taken.
fn sample_lengths(
    mut reader: Box<dyn FastxReader>,
    hist: &mut ReadLengthHistogram,
    budget: usize,
    source: &Path,
) -> Result<usize, FailureKind> {
    let mut taken = 0;
    while taken < budget {
        let Some(result) = reader.next() else { break };
        let record = result.map_err(|e| unreadable(source, format!("failed to parse record: {e}")))?;
        hist.record(record.num_bases());
        taken += 1;
    }
    Ok(taken)
}

fn unreadable(path: &Path, detail: String) -> FailureKind {
    FailureKind::MalformedInput {
        path: path.to_path_buf(),
        detail,
    }
}

/// One line of the k-mer profiler's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerOptimizationRow {
    pub k: usize,
    pub genome_size: u64,
    pub coverage_cutoff: u64,
}

/// Parses the profiler's per-k table. Lines whose first field is not an
/// integer are headers or comments.
pub fn parse_kmer_table(text: &str) -> Result<Vec<KmerOptimizationRow>, FailureKind> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = fields.first() else { continue };
        let Ok(k) = first.parse::<usize>() else { continue };
        if fields.len() < 3 {
            return Err(FailureKind::malformed(
                "k-mer table",
                format!("row for k={k} has {} columns, expected 3", fields.len()),
            ));
        }
        let genome_size = fields[1]
            .parse::<u64>()
            .map_err(|_| FailureKind::malformed("k-mer table", format!("bad genome size {:?} for k={k}", fields[1])))?;
        let coverage_cutoff = fields[2]
            .parse::<u64>()
            .map_err(|_| FailureKind::malformed("k-mer table", format!("bad cutoff {:?} for k={k}", fields[2])))?;
        rows.push(KmerOptimizationRow {
            k,
            genome_size,
            coverage_cutoff,
        });
    }
    if rows.is_empty() {
        return Err(FailureKind::malformed("k-mer table", "no data rows"));
    }
    Ok(rows)
}

/// Row with the largest estimated genome size; the earliest such row wins ties.
///
/// Genome size is what the downstream wrapper has always keyed on. Whether
/// the cutoff column would be a better criterion has not been evaluated.
pub fn select_optimal_kmer_row(rows: &[KmerOptimizationRow]) -> Result<KmerOptimizationRow, FailureKind> {
    // max_by_key keeps the last maximum, so fold by hand.
    rows.iter()
        .copied()
        .reduce(|best, row| if row.genome_size > best.genome_size { row } else { best })
        .ok_or_else(|| FailureKind::malformed("k-mer table", "no rows to select from"))
}

/// Summary figures for a finished assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyMetrics {
    pub contigs: usize,
    pub average_coverage: f64,
    pub corrections: u64,
    pub total_bp: u64,
}

const TOTAL_MARKER: &str = "TOTAL";
const COVERAGE_MARKER: &str = "Average coverage";

pub fn extract_assembly_metrics(log_text: &str, contig_fasta: &str) -> Result<AssemblyMetrics, FailureKind> {
    let corrections = log_text
        .lines()
        .filter(|l| l.starts_with(TOTAL_MARKER))
        .last()
        .ok_or_else(|| FailureKind::malformed("assembly log", "no line starting with TOTAL"))
        .and_then(|line| {
            line[TOTAL_MARKER.len()..]
                .split(|c: char| c.is_whitespace() || c == ':' || c == '=')
                .find_map(|tok| tok.parse::<u64>().ok())
                .ok_or_else(|| FailureKind::malformed("assembly log", format!("no count on TOTAL line {line:?}")))
        })?;

    let average_coverage = log_text
        .lines()
        .filter_map(|l| l.find(COVERAGE_MARKER).map(|idx| &l[idx + COVERAGE_MARKER.len()..]))
        .last()
        .ok_or_else(|| FailureKind::malformed("assembly log", "no `Average coverage` line"))
        .and_then(|rest| {
            rest.trim_start_matches(|c: char| c.is_whitespace() || c == '=' || c == ':')
                .split_whitespace()
                .next()
                .and_then(|tok| tok.trim_end_matches([',', ';']).parse::<f64>().ok())
                .ok_or_else(|| FailureKind::malformed("assembly log", format!("no value after `Average coverage` in {rest:?}")))
        })?;

    let mut contigs = 0usize;
    let mut total_bp = 0u64;
    for line in contig_fasta.lines() {
        if line.starts_with('>') {
            contigs += 1;
        } else {
            total_bp += line.len() as u64;
        }
    }
    if contigs == 0 {
        return Err(FailureKind::malformed("contig FASTA", "no header lines"));
    }

    Ok(AssemblyMetrics {
        contigs,
        average_coverage,
        corrections,
        total_bp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fastq(lengths: &[usize]) -> String {
        let mut out = String::new();
        for (i, &len) in lengths.iter().enumerate() {
            out.push_str(&format!("@r{i}\n{}\n+\n{}\n", "A".repeat(len), "I".repeat(len)));
        }
        out
    }

    #[test]
    fn histogram_tracks_longest_and_counts() {
        let data = fastq(&[50, 75, 75, 31, 100]);
        let hist = histogram_from_readers(vec![std::io::Cursor::new(data.into_bytes())], 1000).unwrap();
        assert_eq!(hist.longest(), 100);
        assert_eq!(hist.total(), 5);
        assert_eq!(hist.count(75), 2);
    }

    #[test]
    fn empty_stream_is_skipped() {
        let hist = histogram_from_readers(
            vec![std::io::Cursor::new(Vec::new()), std::io::Cursor::new(fastq(&[60, 61]).into_bytes())],
            10,
        )
        .unwrap();
        assert_eq!(hist.total(), 2);
        assert_eq!(hist.longest(), 61);

        let err = histogram_from_readers(vec![std::io::Cursor::new(b"@r\nACGT\n+\nI\n".to_vec())], 10).unwrap_err();
        assert!(matches!(err, FailureKind::MalformedInput { ref path, .. } if path.as_os_str() == "stream #1"));
    }

    #[test]
    fn histogram_respects_sample_cap_across_streams() {
        let a = fastq(&[40; 6]);
        let b = fastq(&[150; 6]);
        let hist = histogram_from_readers(
            vec![std::io::Cursor::new(a.into_bytes()), std::io::Cursor::new(b.into_bytes())],
            8,
        )
        .unwrap();
        assert_eq!(hist.total(), 8);
        assert_eq!(hist.count(40), 6);
        assert_eq!(hist.count(150), 2);

        let capped = histogram_from_readers(vec![std::io::Cursor::new(fastq(&[40; 6]).into_bytes())], 4).unwrap();
        assert_eq!(capped.total(), 4);
    }

    #[test]
    fn histogram_table_is_descending_and_parses_back() {
        let mut hist = ReadLengthHistogram::default();
        for len in [35, 150, 150, 80] {
            hist.record(len);
        }
        let table = hist.to_table();
        assert_eq!(table, "150\t2\n80\t1\n35\t1\n");
        assert_eq!(ReadLengthHistogram::from_table(&table).unwrap(), hist);
        assert!(ReadLengthHistogram::from_table("150\n").is_err());
    }

    #[test]
    fn kmer_table_skips_header() {
        let rows = parse_kmer_table("k\tgenomic kmers\tcutoff\n21\t100\t5\n33 120 3\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], KmerOptimizationRow { k: 33, genome_size: 120, coverage_cutoff: 3 });
    }

    #[test]
    fn kmer_table_rejects_short_rows_and_empty() {
        assert!(matches!(parse_kmer_table("21 100\n"), Err(FailureKind::MalformedOutput { .. })));
        assert!(matches!(parse_kmer_table("k genomic cutoff\n"), Err(FailureKind::MalformedOutput { .. })));
        assert!(parse_kmer_table("21 lots 5\n").is_err());
    }

    #[test]
    fn selection_keeps_first_of_tied_rows() {
        let rows = [
            KmerOptimizationRow { k: 21, genome_size: 100, coverage_cutoff: 5 },
            KmerOptimizationRow { k: 33, genome_size: 120, coverage_cutoff: 3 },
            KmerOptimizationRow { k: 55, genome_size: 120, coverage_cutoff: 7 },
        ];
        assert_eq!(select_optimal_kmer_row(&rows).unwrap(), rows[1]);
        assert!(select_optimal_kmer_row(&[]).is_err());
    }

    #[test]
    fn metrics_from_log_and_fasta() {
        let log = "Running assembler\n  Average coverage = 42.5\nTOTAL\t17\nTOTAL 23\n";
        let fasta = ">c1\nACGTACGT\nAC\n>c2\nGGGG\n";
        let m = extract_assembly_metrics(log, fasta).unwrap();
        assert_eq!(m.contigs, 2);
        assert_eq!(m.corrections, 23);
        assert_eq!(m.total_bp, 14);
        assert!((m.average_coverage - 42.5).abs() < 1e-9);
    }

    #[test]
    fn metrics_require_markers() {
        let fasta = ">c1\nACGT\n";
        assert!(extract_assembly_metrics("Average coverage: 3.0\n", fasta).is_err());
        assert!(extract_assembly_metrics("TOTAL 4\n", fasta).is_err());
        assert!(extract_assembly_metrics("TOTAL 4\nAverage coverage: 3\n", "ACGT\n").is_err());
    }
}
