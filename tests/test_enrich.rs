extern crate allobench;

mod util;

use allobench::enrich::{enrich_records, Enricher};
use allobench::mcsa::residues_url;
use allobench::pdb::{graphql_url, sifts_url, structure_url};
use allobench::record::Source;
use allobench::uniprot::entry_url;

use allobench::bio::residue::Residue;

use util::{make_record, test_config, FakeFetcher, OfflineFetcher,
           MCSA_URL, PDBE_URL, RCSB_DATA_URL, RCSB_FILES_URL, UNIPROT_URL};

const UNIPROT_ENTRY: &str = r#"{
  "entryType": "UniProtKB unreviewed (TrEMBL)",
  "primaryAccession": "P12345",
  "proteinDescription": { "submissionNames": [ { "fullName": { "value": "Test kinase" } } ] },
  "sequence": { "value": "MKHAGLVWER" },
  "features": [
    { "type": "Active site",
      "location": { "start": { "value": 3 }, "end": { "value": 3 } } },
    { "type": "Binding site",
      "location": { "start": { "value": 5 }, "end": { "value": 6 } } }
  ]
}"#;

const GRAPHQL_RESPONSE: &str = r#"{
  "data": { "entries": [
    { "rcsb_id": "1ABC",
      "rcsb_entry_info": { "experimental_method": "X-ray", "resolution_combined": [1.9] },
      "assemblies": [
        { "polymer_entity_instances": [
            { "rcsb_id": "1ABC.A", "polymer_entity": { "uniprots": [ { "rcsb_id": "P12345" } ] } } ],
          "rcsb_struct_symmetry": [
            { "kind": "Global Symmetry", "oligomeric_state": "Monomer", "stoichiometry": ["A1"] } ] } ] }
  ] }
}"#;

const SIFTS_RESPONSE: &str = r#"{
  "1abc": { "UniProt": { "P12345": { "mappings": [
    { "chain_id": "A", "unp_start": 1, "unp_end": 10,
      "start": { "author_residue_number": 101, "author_insertion_code": "", "residue_number": 1 },
      "end": { "author_residue_number": 110, "author_insertion_code": "", "residue_number": 10 } }
  ] } } }
}"#;

const STRUCTURE_1ABC: &str = "data_1ABC
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_alt_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_entity_id
_atom_site.label_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.occupancy
_atom_site.B_iso_or_equiv
_atom_site.pdbx_formal_charge
_atom_site.auth_seq_id
_atom_site.auth_comp_id
_atom_site.auth_asym_id
_atom_site.auth_atom_id
_atom_site.pdbx_PDB_model_num
ATOM   1 C CA . HIS A 1 3  ? 10.104 12.337 4.581 1.00 20.15 ? 103 HIS A CA 1
ATOM   2 C CA . GLY A 1 5  ? 12.871 12.001 6.440 1.00 21.02 ? 105 GLY A CA 1
ATOM   3 C CA . TRP A 1 10 ? 15.330 10.412 7.118 1.00 22.74 ? 110 TRP A CA 1
HETATM 4 P PA . ATP B 2 .  ? 20.512 8.733 1.904 1.00 30.44 ? 301 ATP B PA 1
#
";

const MCSA_PAGE_2_URL: &str = "https://mcsa.test/api/residues/?format=json&page=2";

fn mcsa_first_page() -> String {
    format!(r#"{{
  "count": 3,
  "next": "{}",
  "results": [
    {{ "mcsa_id": 10,
       "residue_chains": [ {{ "chain_name": "A", "pdb_id": "1abc", "code": "His", "resid": 3, "auth_resid": 103 }} ],
       "residue_sequences": [ {{ "uniprot_id": "P12345", "code": "His", "resid": 3 }} ] }}
  ]
}}"#, MCSA_PAGE_2_URL)
}

const MCSA_SECOND_PAGE: &str = r#"{
  "count": 3,
  "next": null,
  "results": [
    { "mcsa_id": 10,
      "residue_chains": [ { "chain_name": "A", "pdb_id": "5xyz", "code": "Gly", "resid": 5, "auth_resid": 5 } ],
      "residue_sequences": [ { "uniprot_id": "P12345", "code": "Gly", "resid": 5 } ] },
    { "mcsa_id": 11,
      "residue_chains": [],
      "residue_sequences": [ { "uniprot_id": "Q00001", "code": "Ser", "resid": 40 } ] }
  ]
}"#;

fn make_fetcher() -> FakeFetcher {
    let mut fetcher = FakeFetcher::new();
    fetcher.respond(&entry_url(UNIPROT_URL, "P12345"), UNIPROT_ENTRY);
    fetcher.respond(&graphql_url(RCSB_DATA_URL), GRAPHQL_RESPONSE);
    fetcher.respond(&sifts_url(PDBE_URL, "1ABC"), SIFTS_RESPONSE);
    fetcher.respond(&structure_url(RCSB_FILES_URL, "1ABC"), STRUCTURE_1ABC);
    fetcher.respond(&residues_url(MCSA_URL), &mcsa_first_page());
    fetcher.respond(MCSA_PAGE_2_URL, MCSA_SECOND_PAGE);
    fetcher
}

fn make_records() -> Vec<allobench::record::ProteinRecord> {
    let mut annotated = make_record("ASD00010001", Some("P12345"), Some("1ABC"));
    annotated.allosteric_residues =
        [Residue::new("A", "HIS", 103), Residue::new("A", "PHE", 200)].into_iter().collect();

    vec![
        annotated,
        make_record("ASD00020002", Some("Q99999"), Some("2XYZ")),
        make_record("ASD00030003", Some("P12345"), None),
    ]
}

fn residue_strings(residues: &allobench::bio::residue::ResidueSet) -> Vec<String> {
    residues.iter().map(|residue| residue.to_string()).collect()
}

#[test]
fn test_enrich_records() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let fetcher = make_fetcher();

    let mut records = make_records();
    let mut enricher = Enricher::new(&fetcher, &config).unwrap();
    enrich_records(&mut enricher, &mut records).unwrap();

    let annotated = &records[0];
    assert_eq!(annotated.protein_name.as_deref(), Some("Test kinase"));
    assert_eq!(annotated.reviewed, Some(false));
    assert_eq!(annotated.uniprot_active_site_positions.iter().cloned().collect::<Vec<_>>(), vec![3]);
    assert_eq!(annotated.uniprot_binding_site_positions.iter().cloned().collect::<Vec<_>>(),
               vec![5, 6]);
    assert_eq!(residue_strings(&annotated.active_site_residues), vec!["A-HIS-103", "A-GLY-105"]);
    assert_eq!(annotated.active_site_sources.iter().cloned().collect::<Vec<_>>(),
               vec![Source::Mcsa, Source::UniProt]);
    assert_eq!(residue_strings(&annotated.unmatched_allosteric_residues), vec!["A-PHE-200"]);
    assert_eq!(annotated.oligomeric_state.as_deref(), Some("Monomer"));
    assert_eq!(annotated.stoichiometry.as_deref(), Some("A1"));
    assert_eq!(annotated.experimental_method.as_deref(), Some("X-ray"));
    assert_eq!(annotated.resolution, Some(1.9));
    assert_eq!(annotated.chain_uniprot_map.len(), 1);
    assert_eq!(annotated.chain_uniprot_map[0].to_string(), "A:P12345");
    assert!(annotated.enrichment_issues.is_empty());

    let structure_path = config.structure_dir().join("1ABC.cif");
    assert!(structure_path.exists());
    assert_eq!(annotated.structure_file.as_deref(), Some(structure_path.display().to_string().as_str()));

    let failed = &records[1];
    let issues: Vec<&str> = failed.enrichment_issues.iter().map(|issue| issue.as_str()).collect();
    assert_eq!(issues, vec!["pdb-metadata", "structure", "uniprot"]);
    assert!(failed.active_site_residues.is_empty());
    assert!(failed.structure_file.is_none());

    let no_structure = &records[2];
    assert_eq!(no_structure.protein_name.as_deref(), Some("Test kinase"));
    assert!(no_structure.active_site_residues.is_empty());
    assert!(no_structure.enrichment_issues.is_empty());

    // one request per distinct lookup
    assert_eq!(fetcher.calls(&entry_url(UNIPROT_URL, "P12345")), 1);
    assert_eq!(fetcher.calls(&graphql_url(RCSB_DATA_URL)), 1);
    assert_eq!(fetcher.calls(&sifts_url(PDBE_URL, "1ABC")), 1);
    assert_eq!(fetcher.calls(MCSA_PAGE_2_URL), 1);
    assert!(config.mcsa_cache_path().exists());
}

#[test]
fn test_rerun_uses_caches() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let fetcher = make_fetcher();

    let mut records = make_records();
    let mut enricher = Enricher::new(&fetcher, &config).unwrap();
    enrich_records(&mut enricher, &mut records).unwrap();
    let first_pass = records.clone();

    let mut enricher = Enricher::new(&fetcher, &config).unwrap();
    enrich_records(&mut enricher, &mut records).unwrap();

    assert_eq!(records, first_pass);
    assert_eq!(fetcher.calls(&residues_url(MCSA_URL)), 1);
    assert_eq!(fetcher.calls(&structure_url(RCSB_FILES_URL, "1ABC")), 1);
}

#[test]
fn test_network_loss_is_fatal() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let fetcher = OfflineFetcher;

    let mut records = make_records();
    let mut enricher = Enricher::new(&fetcher, &config).unwrap();
    let err = enrich_records(&mut enricher, &mut records).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_non_cif_structure_not_cached() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let mut fetcher = make_fetcher();
    fetcher.respond(&structure_url(RCSB_FILES_URL, "1ABC"), "<html>Service Unavailable</html>");

    let mut records = make_records();
    {
        let mut enricher = Enricher::new(&fetcher, &config).unwrap();
        enrich_records(&mut enricher, &mut records).unwrap();
    }

    let annotated = &records[0];
    let issues: Vec<&str> = annotated.enrichment_issues.iter().map(|issue| issue.as_str()).collect();
    assert_eq!(issues, vec!["structure"]);
    assert!(annotated.structure_file.is_none());
    assert!(annotated.unmatched_allosteric_residues.is_empty());
    assert!(!config.structure_dir().join("1ABC.cif").exists());

    // the next run downloads the structure again
    fetcher.respond(&structure_url(RCSB_FILES_URL, "1ABC"), STRUCTURE_1ABC);
    let mut enricher = Enricher::new(&fetcher, &config).unwrap();
    enrich_records(&mut enricher, &mut records).unwrap();

    assert!(records[0].enrichment_issues.is_empty());
    assert_eq!(residue_strings(&records[0].unmatched_allosteric_residues), vec!["A-PHE-200"]);
    assert_eq!(fetcher.calls(&structure_url(RCSB_FILES_URL, "1ABC")), 2);
}

#[test]
fn test_unreadable_cached_structure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let fetcher = make_fetcher();

    let structure_path = config.structure_dir().join("1ABC.cif");
    std::fs::create_dir_all(config.structure_dir()).unwrap();
    std::fs::write(&structure_path, [0xff, 0xfe, 0x00]).unwrap();

    let mut records = make_records();
    let mut enricher = Enricher::new(&fetcher, &config).unwrap();
    enrich_records(&mut enricher, &mut records).unwrap();

    let annotated = &records[0];
    let issues: Vec<&str> = annotated.enrichment_issues.iter().map(|issue| issue.as_str()).collect();
    assert_eq!(issues, vec!["structure"]);
    assert!(annotated.structure_file.is_none());
    assert_eq!(annotated.protein_name.as_deref(), Some("Test kinase"));

    assert_eq!(records[2].protein_name.as_deref(), Some("Test kinase"));
    assert!(records[2].enrichment_issues.is_empty());

    assert!(!structure_path.exists());
    assert_eq!(fetcher.calls(&structure_url(RCSB_FILES_URL, "1ABC")), 0);
}
