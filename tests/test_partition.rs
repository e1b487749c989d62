extern crate allobench;

mod util;

use std::fs;

use allobench::config::ReferenceSetConfig;
use allobench::partition::{partition, read_reference_set, ReferenceSet};

use util::make_record;

fn make_records() -> Vec<allobench::record::ProteinRecord> {
    vec![
        make_record("ASD00010001", Some("P12345"), Some("3HRF")),
        make_record("ASD00020002", Some("Q11111"), Some("1ABC")),
        make_record("ASD00030003", Some("O15530"), Some("4RRV")),
        make_record("ASD00040004", None, None),
        make_record("ASD00050005", Some("P99999"), Some("2XYZ")),
    ]
}

#[test]
fn test_reference_uniprot_id_excluded() {
    let reference_set = ReferenceSet::new("PASSer", ["P12345"]);
    let kept = partition(make_records(), &[reference_set]);

    let ids: Vec<&str> = kept.iter().map(|record| record.asd_id.as_str()).collect();
    assert_eq!(ids, vec!["ASD00020002", "ASD00030003", "ASD00040004", "ASD00050005"]);
}

#[test]
fn test_partition_properties() {
    let reference_sets = vec![
        ReferenceSet::new("PASSer", ["1abc_A", "p99999"]),
        ReferenceSet::new("AlloReverse", ["2XYZ", "P00001"]),
    ];

    let input = make_records();
    let kept = partition(input.clone(), &reference_sets);

    let overlapping = input.iter()
        .filter(|record| reference_sets.iter().any(|set| set.contains_record(record)))
        .count();
    assert_eq!(overlapping, 2);
    assert_eq!(kept.len(), input.len() - overlapping);

    for record in &kept {
        assert!(input.contains(record));
        for reference_set in &reference_sets {
            assert!(!reference_set.contains_record(record));
        }
    }

    // order is preserved
    let positions: Vec<usize> = kept.iter()
        .map(|record| input.iter().position(|input_record| input_record == record).unwrap())
        .collect();
    let mut sorted_positions = positions.clone();
    sorted_positions.sort();
    assert_eq!(positions, sorted_positions);
}

#[test]
fn test_no_reference_sets() {
    let input = make_records();
    assert_eq!(partition(input.clone(), &[]), input);
}

#[test]
fn test_read_reference_set() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file = temp_dir.path().join("passer_training.txt");
    fs::write(&file, "# PASSer training set\n3hrf_A\n1ABC.B, 5JKL\n").unwrap();

    let set_config = ReferenceSetConfig {
        name: "PASSer".into(),
        file,
    };
    let reference_set = read_reference_set(&set_config).unwrap();
    assert_eq!(reference_set.len(), 3);

    let kept = partition(make_records(), &[reference_set]);
    assert_eq!(kept.len(), 3);

    let missing = ReferenceSetConfig {
        name: "missing".into(),
        file: temp_dir.path().join("no_such_file.txt"),
    };
    assert!(read_reference_set(&missing).unwrap_err().is_fatal());
}
