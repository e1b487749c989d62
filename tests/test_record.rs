extern crate allobench;

mod util;

use std::collections::BTreeSet;

use allobench::bio::residue::Residue;
use allobench::record::{read_records, write_csv, write_records, ChainUniProt, IdStatus, Source};

use util::make_record;

fn make_full_record() -> allobench::record::ProteinRecord {
    let mut record = make_record("ASD00010001", Some("P22222"), Some("9XYZ"));
    record.gene = Some("PDK1".to_owned());
    record.organism = Some("Homo sapiens".to_owned());
    record.ec_numbers = vec!["2.7.11.1".to_owned(), "2.7.11.2".to_owned()];
    record.modulator_name = Some("PS48, an activator".to_owned());
    record.reference_title = Some("A \"quoted\" title".to_owned());
    record.allosteric_residues =
        [Residue::new("A", "LYS", 115), Residue::new("B", "LEU", -2)].into_iter().collect();
    record.uniprot_status = IdStatus::Replaced;
    record.replaced_uniprot_id = Some("Q11111".into());
    record.pdb_status = IdStatus::Replaced;
    record.replaced_pdb_id = Some("1ABC".into());
    record.protein_name = Some("3-phosphoinositide-dependent protein kinase 1".to_owned());
    record.reviewed = Some(true);
    record.uniprot_active_site_positions = [223].into_iter().collect();
    record.uniprot_binding_site_positions = [92, 93, 94].into_iter().collect();
    let mut insertion = Residue::new("A", "GLY", 100);
    insertion.insertion_code = Some('A');
    record.active_site_residues = [Residue::new("A", "ASP", 223), insertion].into_iter().collect();
    record.active_site_sources = [Source::UniProt, Source::Mcsa].into_iter().collect();
    record.chain_uniprot_map = vec![
        ChainUniProt { chain: "A".into(), uniprot_ids: vec!["P22222".into()] },
        ChainUniProt { chain: "B".into(), uniprot_ids: vec!["P22222".into(), "Q99999".into()] },
    ];
    record.oligomeric_state = Some("Homo 2-mer".to_owned());
    record.stoichiometry = Some("A2".to_owned());
    record.experimental_method = Some("X-ray".to_owned());
    record.resolution = Some(2.1);
    record.structure_file = Some("pdb_structures/9XYZ.cif".to_owned());
    record.unmatched_allosteric_residues = [Residue::new("B", "LEU", -2)].into_iter().collect();
    record.enrichment_issues = ["sifts".to_owned()].into_iter().collect::<BTreeSet<_>>();
    record
}

#[test]
fn test_csv_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("ASD_Enriched.csv");

    let records = vec![
        make_full_record(),
        make_record("ASD00020002", None, None),
    ];

    write_records(&path, &records).unwrap();
    let read_back = read_records(&path).unwrap();

    assert_eq!(read_back, records);
}

#[test]
fn test_csv_columns() {
    let mut output = vec![];
    write_csv(&mut output, &[make_full_record()]).unwrap();
    let text = String::from_utf8(output).unwrap();
    let mut lines = text.lines();

    let header = lines.next().unwrap();
    assert!(header.starts_with("Protein ASD ID,Gene,Organism,UniProt ID,PDB ID"));

    let row = lines.next().unwrap();
    assert!(row.contains("\"A-LYS-115,B-LEU--2\""));
    assert!(row.contains("\"A-GLY-100A,A-ASP-223\""));
    assert!(row.contains("2.7.11.1;2.7.11.2"));
    assert!(row.contains("A:P22222;B:P22222|Q99999"));
    assert!(row.contains(",replaced,"));
}

#[test]
fn test_read_missing_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = read_records(&temp_dir.path().join("AlloBench.csv")).unwrap_err();
    assert!(err.is_fatal());
}
