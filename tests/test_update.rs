extern crate allobench;

mod util;

use allobench::pdb::holdings_status_url;
use allobench::record::IdStatus;
use allobench::uniprot::entry_url;
use allobench::update::{update_records, IdType, IdentifierUpdater, Resolution};

use util::{make_record, FakeFetcher, OfflineFetcher, RCSB_DATA_URL, UNIPROT_URL};

const CURRENT_HOLDINGS: &str =
    r#"{"rcsb_id": "CURRENT", "rcsb_repository_holdings_combined": {"status": "CURRENT"}}"#;

fn uniprot_entry_json(primary_accession: &str) -> String {
    format!(r#"{{"entryType": "UniProtKB reviewed (Swiss-Prot)", "primaryAccession": "{}"}}"#,
            primary_accession)
}

fn make_fetcher() -> FakeFetcher {
    let mut fetcher = FakeFetcher::new();

    fetcher.respond(&holdings_status_url(RCSB_DATA_URL, "1ABC"),
                    r#"{"rcsb_repository_holdings_combined":
                          {"status": "REMOVED", "id_code_replaced_by_latest": "9XYZ"}}"#);
    fetcher.respond(&holdings_status_url(RCSB_DATA_URL, "9XYZ"), CURRENT_HOLDINGS);
    fetcher.respond(&holdings_status_url(RCSB_DATA_URL, "4HHB"), CURRENT_HOLDINGS);

    fetcher.respond(&entry_url(UNIPROT_URL, "P12345"), &uniprot_entry_json("P12345"));
    // a secondary accession redirects to the primary entry
    fetcher.respond(&entry_url(UNIPROT_URL, "Q11111"), &uniprot_entry_json("P22222"));
    fetcher.respond(&entry_url(UNIPROT_URL, "P22222"), &uniprot_entry_json("P22222"));
    fetcher.respond(&entry_url(UNIPROT_URL, "P33333"),
                    r#"{"entryType": "Inactive", "primaryAccession": "P33333",
                        "inactiveReason": {"inactiveReasonType": "DELETED"}}"#);

    fetcher
}

#[test]
fn test_obsolete_pdb_id_replaced() {
    let fetcher = make_fetcher();
    let mut updater = IdentifierUpdater::new(&fetcher, UNIPROT_URL, RCSB_DATA_URL, 3);

    let mut records = vec![make_record("ASD00010001", Some("P12345"), Some("1ABC"))];
    update_records(&mut updater, &mut records).unwrap();

    let record = &records[0];
    assert_eq!(record.pdb_id.as_deref(), Some("9XYZ"));
    assert_eq!(record.replaced_pdb_id.as_deref(), Some("1ABC"));
    assert_eq!(record.pdb_status, IdStatus::Replaced);
    assert!(record.pdb_status.is_resolved());
    assert_eq!(record.uniprot_id.as_deref(), Some("P12345"));
    assert_eq!(record.uniprot_status, IdStatus::Current);
    assert!(record.replaced_uniprot_id.is_none());
}

#[test]
fn test_lookups_memoized() {
    let fetcher = make_fetcher();
    let mut updater = IdentifierUpdater::new(&fetcher, UNIPROT_URL, RCSB_DATA_URL, 3);

    let mut records = vec![
        make_record("ASD00010001", Some("P12345"), Some("1ABC")),
        make_record("ASD00010001", Some("P12345"), Some("1ABC")),
        make_record("ASD00020002", Some("Q11111"), Some("1abc")),
    ];
    update_records(&mut updater, &mut records).unwrap();

    assert_eq!(fetcher.calls(&holdings_status_url(RCSB_DATA_URL, "1ABC")), 1);
    assert_eq!(fetcher.calls(&entry_url(UNIPROT_URL, "P12345")), 1);
    assert_eq!(updater.summary().lookups, 3);

    assert_eq!(records[2].uniprot_id.as_deref(), Some("P22222"));
    assert_eq!(records[2].replaced_uniprot_id.as_deref(), Some("Q11111"));
    assert_eq!(records[2].uniprot_status, IdStatus::Replaced);
    assert_eq!(records[2].pdb_id.as_deref(), Some("9XYZ"));

    // no deduplication
    assert_eq!(records.len(), 3);
}

#[test]
fn test_unresolved_ids_kept() {
    let fetcher = make_fetcher();
    let mut updater = IdentifierUpdater::new(&fetcher, UNIPROT_URL, RCSB_DATA_URL, 3);

    let mut records = vec![
        make_record("ASD00030003", Some("P33333"), Some("2BAD")),
        make_record("ASD00040004", None, Some("4HHB")),
    ];
    update_records(&mut updater, &mut records).unwrap();

    assert_eq!(records[0].uniprot_id.as_deref(), Some("P33333"));
    assert_eq!(records[0].uniprot_status, IdStatus::Unresolved);
    assert_eq!(records[0].pdb_id.as_deref(), Some("2BAD"));
    assert_eq!(records[0].pdb_status, IdStatus::Unresolved);

    assert_eq!(records[1].uniprot_status, IdStatus::Missing);
    assert_eq!(records[1].pdb_status, IdStatus::Current);

    assert_eq!(updater.resolve(IdType::Pdb, "2bad").unwrap(),
               Resolution::Unresolved("unknown".to_owned()));
}

#[test]
fn test_update_idempotent() {
    let fetcher = make_fetcher();

    let mut records = vec![
        make_record("ASD00010001", Some("P12345"), Some("1ABC")),
        make_record("ASD00020002", Some("Q11111"), Some("4HHB")),
        make_record("ASD00030003", Some("P33333"), Some("2BAD")),
        make_record("ASD00040004", None, None),
    ];

    let mut updater = IdentifierUpdater::new(&fetcher, UNIPROT_URL, RCSB_DATA_URL, 3);
    update_records(&mut updater, &mut records).unwrap();
    let first_pass = records.clone();

    let mut updater = IdentifierUpdater::new(&fetcher, UNIPROT_URL, RCSB_DATA_URL, 3);
    update_records(&mut updater, &mut records).unwrap();

    assert_eq!(records, first_pass);
    assert_eq!(records[0].pdb_status, IdStatus::Replaced);
    assert_eq!(records[1].uniprot_status, IdStatus::Replaced);
}

#[test]
fn test_network_loss_is_fatal() {
    let fetcher = OfflineFetcher;
    let mut updater = IdentifierUpdater::new(&fetcher, UNIPROT_URL, RCSB_DATA_URL, 2);

    let mut records = vec![
        make_record("ASD00010001", Some("P12345"), Some("1ABC")),
        make_record("ASD00020002", Some("Q11111"), Some("4HHB")),
    ];

    let err = update_records(&mut updater, &mut records).unwrap_err();
    assert!(err.is_fatal());
}
