extern crate allobench;

mod util;

use std::fs;

use allobench::config::ReferenceSetConfig;
use allobench::pipeline::{run_partition, run_stage, Stage};
use allobench::record::{read_records, IdStatus};

use util::{test_config, test_data_path, FakeFetcher};

#[test]
fn test_run_all_stages() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.asd_archive = test_data_path("asd");

    let reference_file = temp_dir.path().join("reference.txt");
    fs::write(&reference_file, "3hrf_A\n").unwrap();
    config.reference_sets.push(ReferenceSetConfig {
        name: "PASSer".into(),
        file: reference_file,
    });

    // every remote lookup gives "not found"
    let fetcher = FakeFetcher::new();

    run_stage(Stage::All, &config, &fetcher).unwrap();

    let loaded = read_records(&config.loaded_path()).unwrap();
    assert_eq!(loaded.len(), 3);

    let updated = read_records(&config.updated_path()).unwrap();
    assert_eq!(updated.len(), 3);
    assert_eq!(updated[0].pdb_id.as_deref(), Some("3HRF"));
    assert_eq!(updated[0].pdb_status, IdStatus::Unresolved);
    assert_eq!(updated[2].pdb_status, IdStatus::Missing);

    let enriched = read_records(&config.enriched_path()).unwrap();
    assert!(enriched[0].enrichment_issues.contains("uniprot"));
    assert!(enriched[0].enrichment_issues.contains("structure"));

    let benchmark = read_records(&config.benchmark_path()).unwrap();
    let ids: Vec<&str> = benchmark.iter().map(|record| record.pdb_id.as_deref().unwrap_or("")).collect();
    assert_eq!(ids, vec!["4RRV", ""]);
}

#[test]
fn test_stage_needs_previous_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());

    let err = run_partition(&config).unwrap_err();
    assert!(err.is_fatal());
}
