use super::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::model::Condition;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("kira_ltbiseq_input_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(path: &Path, contents: &str) {
    let mut f = BufWriter::new(File::create(path).unwrap());
    f.write_all(contents.as_bytes()).unwrap();
}

const COUNTS_CSV: &str = "Transcript_ID,S1,S2,S3\nMARCH1,10,0,3\nADARB2,5,7,9\n";
const META_CSV: &str = "title,geo_accession,characteristics_ch1.0.disease group\n\
S2,GSM2,Latent TB\n\
S1,GSM1,Healthy\n\
S3,GSM3,healthy\n";

#[test]
fn test_load_csv_inputs_aligns_metadata_to_columns() {
    let dir = make_temp_dir();
    let counts = dir.join("counts.csv");
    let meta = dir.join("meta.csv");
    write_file(&counts, COUNTS_CSV);
    write_file(&meta, META_CSV);

    let bundle = load_input(&counts, &meta, &MetaColumns::default()).unwrap();
    assert_eq!(bundle.counts.gene_id_column, "Transcript_ID");
    assert_eq!(bundle.counts.genes, vec!["MARCH1", "ADARB2"]);
    assert_eq!(bundle.counts.samples, vec!["S1", "S2", "S3"]);
    assert_eq!(bundle.counts.counts[[1, 2]], 9.0);
    assert_eq!(bundle.sheet.samples, bundle.counts.samples);
    assert_eq!(
        bundle.sheet.conditions,
        vec![Condition::Healthy, Condition::LatentTb, Condition::Healthy]
    );
    assert_eq!(bundle.counts.sample_totals(), vec![15.0, 7.0, 12.0]);
}

#[test]
fn test_load_gzipped_tsv_counts() {
    let dir = make_temp_dir();
    let counts = dir.join("counts.tsv.gz");
    let meta = dir.join("meta.csv");
    let mut enc = GzEncoder::new(File::create(&counts).unwrap(), Compression::default());
    enc.write_all(COUNTS_CSV.replace(',', "\t").as_bytes())
        .unwrap();
    enc.finish().unwrap();
    write_file(&meta, META_CSV);

    let bundle = load_input(&counts, &meta, &MetaColumns::default()).unwrap();
    assert_eq!(bundle.counts.n_genes(), 2);
    assert_eq!(bundle.sheet.len(), 3);
}

#[test]
fn test_duplicate_gene_keeps_first() {
    let dir = make_temp_dir();
    let counts = dir.join("counts.csv");
    write_file(&counts, "id,S1\nG1,1\nG1,5\nG2,2\n");
    let m = parse_counts(&counts).unwrap();
    assert_eq!(m.genes, vec!["G1", "G2"]);
    assert_eq!(m.counts[[0, 0]], 1.0);
}

#[test]
fn test_rejects_negative_and_fractional_counts() {
    let dir = make_temp_dir();
    let neg = dir.join("neg.csv");
    write_file(&neg, "id,S1\nG1,-1\n");
    assert!(matches!(parse_counts(&neg), Err(InputError::Parse(_))));

    let frac = dir.join("frac.csv");
    write_file(&frac, "id,S1\nG1,1.5\n");
    assert!(matches!(parse_counts(&frac), Err(InputError::Parse(_))));

    let integral = dir.join("integral.csv");
    write_file(&integral, "id,S1\nG1,4.0\n");
    assert_eq!(parse_counts(&integral).unwrap().counts[[0, 0]], 4.0);
}

#[test]
fn test_rejects_workbook_extension() {
    let dir = make_temp_dir();
    let xlsx = dir.join("GSE99373_RawCounts_CD4.xlsx");
    write_file(&xlsx, "not really a workbook");
    assert!(matches!(parse_counts(&xlsx), Err(InputError::InvalidInput(_))));
}

#[test]
fn test_missing_counts_file() {
    let dir = make_temp_dir();
    let err = parse_counts(&dir.join("absent.csv")).unwrap_err();
    assert!(matches!(err, InputError::MissingInput(_)));
}

#[test]
fn test_metadata_row_count_mismatch_is_fatal() {
    let dir = make_temp_dir();
    let counts = dir.join("counts.csv");
    let meta = dir.join("meta.csv");
    write_file(&counts, COUNTS_CSV);
    write_file(
        &meta,
        &format!("{}S4,GSM4,Latent TB\n", META_CSV),
    );
    let err = load_input(&counts, &meta, &MetaColumns::default()).unwrap_err();
    assert!(err.to_string().contains("4 rows"));
}

#[test]
fn test_metadata_missing_sample_is_fatal() {
    let dir = make_temp_dir();
    let counts = dir.join("counts.csv");
    let meta = dir.join("meta.csv");
    write_file(&counts, COUNTS_CSV);
    write_file(
        &meta,
        "title,characteristics_ch1.0.disease group\nS1,Healthy\nS2,Latent TB\n",
    );
    let err = load_input(&counts, &meta, &MetaColumns::default()).unwrap_err();
    assert!(err.to_string().contains("S3"));
}

#[test]
fn test_metadata_duplicate_sample_is_fatal() {
    let dir = make_temp_dir();
    let meta = dir.join("meta.csv");
    write_file(
        &meta,
        "title,characteristics_ch1.0.disease group\nS1,Healthy\nS1,Latent TB\n",
    );
    let order = vec!["S1".to_string()];
    let err = load_sample_sheet(&meta, &MetaColumns::default(), &order).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn test_custom_metadata_columns() {
    let dir = make_temp_dir();
    let meta = dir.join("meta.tsv");
    write_file(&meta, "Sample\tStatus\nA\tcontrol\nB\tLTBI\n");
    let columns = MetaColumns {
        sample: "sample".to_string(),
        group: "status".to_string(),
        healthy_label: "Control".to_string(),
    };
    let order = vec!["B".to_string(), "A".to_string()];
    let sheet = load_sample_sheet(&meta, &columns, &order).unwrap();
    assert_eq!(sheet.conditions, vec![Condition::LatentTb, Condition::Healthy]);
    assert_eq!(sheet.groups, vec!["LTBI", "control"]);
    assert_eq!(sheet.distinct_groups(), vec!["LTBI", "control"]);
}
