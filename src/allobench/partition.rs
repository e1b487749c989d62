use std::collections::HashSet;
use std::fs;

use regex::Regex;

use crate::config::ReferenceSetConfig;
use crate::errors::{CurationError, Result};
use crate::record::ProteinRecord;
use crate::types::ReferenceSetName;

lazy_static! {
    // a PDB ID followed by a chain: "1abc_A", "1ABC.A" or "1ABC:A"
    static ref CHAIN_QUALIFIED_PDB_RE: Regex =
        Regex::new(r"^([0-9][A-Z0-9]{3})[_.:][A-Z0-9]+$").unwrap();
}

// PDB IDs and UniProt accessions from another tool's training data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSet {
    pub name: ReferenceSetName,
    pub ids: HashSet<String>,
}

pub fn normalize_identifier(id: &str) -> String {
    let id = id.trim().to_uppercase();

    if let Some(captures) = CHAIN_QUALIFIED_PDB_RE.captures(&id) {
        return captures[1].to_owned();
    }

    id
}

impl ReferenceSet {
    pub fn new<'a>(name: &str, ids: impl IntoIterator<Item = &'a str>) -> ReferenceSet {
        ReferenceSet {
            name: name.into(),
            ids: ids.into_iter()
                .map(normalize_identifier)
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    // Identifiers are separated by commas or whitespace; lines starting
    // with '#' are comments.
    pub fn parse(name: &str, text: &str) -> ReferenceSet {
        let ids = text.lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()));

        ReferenceSet::new(name, ids)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(&normalize_identifier(id))
    }

    pub fn contains_record(&self, record: &ProteinRecord) -> bool {
        record.pdb_id.as_ref().map(|pdb_id| self.contains(pdb_id)).unwrap_or(false) ||
            record.uniprot_id.as_ref().map(|uniprot_id| self.contains(uniprot_id)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn read_reference_set(set_config: &ReferenceSetConfig) -> Result<ReferenceSet> {
    let text = fs::read_to_string(&set_config.file)
        .map_err(|err| CurationError::Fatal(format!("failed to read reference set {} from {}: {}",
                                                    set_config.name, set_config.file.display(),
                                                    err)))?;

    let reference_set = ReferenceSet::parse(&set_config.name, &text);

    if reference_set.is_empty() {
        warn!("reference set {} in {} has no identifiers", reference_set.name,
              set_config.file.display());
    } else {
        info!("read {} identifiers of reference set {}", reference_set.len(), reference_set.name);
    }

    Ok(reference_set)
}

// Remove every record whose PDB ID or UniProt accession is in one of the
// reference sets.  The remaining records keep their order.
pub fn partition(records: Vec<ProteinRecord>, reference_sets: &[ReferenceSet]) -> Vec<ProteinRecord> {
    let mut excluded_counts = vec![0usize; reference_sets.len()];
    let input_count = records.len();

    let kept: Vec<ProteinRecord> = records.into_iter()
        .filter(|record| {
            let mut excluded = false;
            for (idx, reference_set) in reference_sets.iter().enumerate() {
                if reference_set.contains_record(record) {
                    excluded_counts[idx] += 1;
                    excluded = true;
                }
            }
            !excluded
        })
        .collect();

    for (reference_set, count) in reference_sets.iter().zip(excluded_counts) {
        info!("{} records overlap reference set {}", count, reference_set.name);
    }

    info!("kept {} of {} records after removing reference set overlaps",
          kept.len(), input_count);

    kept
}

#[test]
fn test_normalize_identifier() {
    assert_eq!(normalize_identifier(" 1abc_A "), "1ABC");
    assert_eq!(normalize_identifier("1ABC.b"), "1ABC");
    assert_eq!(normalize_identifier("4hhb:A"), "4HHB");
    assert_eq!(normalize_identifier("4hhb"), "4HHB");
    assert_eq!(normalize_identifier("p12345"), "P12345");
    // a UniProt isoform isn't a chain-qualified PDB ID
    assert_eq!(normalize_identifier("P12345-2"), "P12345-2");
}

#[test]
fn test_parse_reference_set() {
    let reference_set =
        ReferenceSet::parse("PASSer", "# training set\n1abc_A, 2XYZ\tP12345\n\n  q99999 ,\n");
    assert_eq!(reference_set.len(), 4);
    assert!(reference_set.contains("1ABC"));
    assert!(reference_set.contains("2xyz"));
    assert!(reference_set.contains("Q99999"));
    assert!(!reference_set.contains("TRAINING"));
    assert!(!reference_set.is_empty());

    assert!(ReferenceSet::parse("empty", "# nothing here\n\n").is_empty());
}
