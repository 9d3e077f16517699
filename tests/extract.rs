use flate2::write::GzEncoder;
use flate2::Compression;
use pairasm_rs::extract::{build_read_length_histogram, extract_assembly_metrics, parse_kmer_table, select_optimal_kmer_row};
use pairasm_rs::FailureKind;
use std::io::Write;
use std::path::Path;

fn records(lengths: &[usize]) -> String {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| format!("@r{i} 1:N:0\n{}\n+\n{}\n", "G".repeat(len), "#".repeat(len)))
        .collect()
}

fn write_gz(path: &Path, text: &str) {
    let mut enc = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    enc.finish().unwrap();
}

#[test]
fn gzip_and_plain_inputs_mix() {
    let dir = tempfile::tempdir().unwrap();
    let r1 = dir.path().join("r1.fastq.gz");
    let r2 = dir.path().join("r2.fastq");
    write_gz(&r1, &records(&[151, 150, 120]));
    std::fs::write(&r2, records(&[151, 35])).unwrap();

    let hist = build_read_length_histogram(&[&r1, &r2], 100_000).unwrap();
    assert_eq!(hist.longest(), 151);
    assert_eq!(hist.total(), 5);
    assert_eq!(hist.count(151), 2);
    assert_eq!(hist.to_table(), "151\t2\n150\t1\n120\t1\n35\t1\n");
}

#[test]
fn sample_cap_bounds_the_total() {
    let dir = tempfile::tempdir().unwrap();
    let lengths: Vec<usize> = (31..=130).collect();
    let r1 = dir.path().join("r1.fq");
    let r2 = dir.path().join("r2.fq");
    std::fs::write(&r1, records(&lengths)).unwrap();
    std::fs::write(&r2, records(&[500])).unwrap();

    let hist = build_read_length_histogram(&[&r1, &r2], 40).unwrap();
    assert_eq!(hist.total(), 40);
    // only the first 40 records of r1 are seen
    assert_eq!(hist.longest(), 70);

    let all = build_read_length_histogram(&[&r1, &r2], 1_000).unwrap();
    assert_eq!(all.total(), 101);
    assert_eq!(all.longest(), 500);
}

#[test]
fn truncated_fastq_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let r1 = dir.path().join("bad.fq");
    std::fs::write(&r1, "@r1\nACGT\n+\nII\n").unwrap();
    let err = build_read_length_histogram(&[&r1], 10).unwrap_err();
    assert!(matches!(err, FailureKind::MalformedInput { ref path, .. } if path == &r1));
}

#[test]
fn empty_read_files_hold_zero_records() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("empty_R1.fastq");
    let gz = dir.path().join("empty_R2.fastq.gz");
    std::fs::write(&plain, "").unwrap();
    write_gz(&gz, "");

    let hist = build_read_length_histogram(&[&plain, &gz], 100_000).unwrap();
    assert_eq!(hist.total(), 0);
    assert_eq!(hist.longest(), 0);
    assert_eq!(hist.to_table(), "");
}

#[test]
fn empty_mate_after_short_reads() {
    let dir = tempfile::tempdir().unwrap();
    let r1 = dir.path().join("r1.fq");
    let r2 = dir.path().join("r2.fq");
    std::fs::write(&r1, records(&[20, 25])).unwrap();
    std::fs::write(&r2, "").unwrap();

    let hist = build_read_length_histogram(&[&r1, &r2], 100_000).unwrap();
    assert_eq!(hist.total(), 2);
    assert_eq!(hist.longest(), 25);
}

#[test]
fn absent_read_file_is_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let r1 = dir.path().join("r1.fq");
    let gone = dir.path().join("r2.fq");
    std::fs::write(&r1, records(&[40])).unwrap();

    let err = build_read_length_histogram(&[&r1, &gone], 100_000).unwrap_err();
    assert!(matches!(err, FailureKind::MissingInput(ref p) if p == &gone));
}

#[test]
fn kmer_report_with_kmergenie_header() {
    let report = "k number of genomic k-mers cutoff\n21 4821931 2\n31 4902114 3\n41 4902114 3\n51 4711093 3\n";
    let rows = parse_kmer_table(report).unwrap();
    assert_eq!(rows.len(), 4);
    let best = select_optimal_kmer_row(&rows).unwrap();
    assert_eq!((best.k, best.genome_size, best.coverage_cutoff), (31, 4902114, 3));
}

#[test]
fn metrics_ignore_blank_lines_and_crlf() {
    let log = "Mismatch correction\r\nTOTAL: 12\r\nAverage coverage: 88.25\r\n";
    let fasta = ">a\r\nACGT\r\n\r\n>b\r\nAC\r\n";
    let m = extract_assembly_metrics(log, fasta).unwrap();
    assert_eq!(m.contigs, 2);
    assert_eq!(m.total_bp, 6);
    assert_eq!(m.corrections, 12);
    assert!((m.average_coverage - 88.25).abs() < 1e-9);
}
