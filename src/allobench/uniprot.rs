use std::collections::BTreeSet;

use crate::fetch::{Fetch, FetchError};
use crate::types::{SeqPosition, UniProtAcc};

// The parts of a UniProtKB REST entry ("/uniprotkb/{accession}.json") that
// are used here.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UniProtEntry {
    pub primary_accession: String,
    #[serde(default)]
    pub entry_type: String,
    pub inactive_reason: Option<InactiveReason>,
    pub protein_description: Option<ProteinDescription>,
    pub sequence: Option<Sequence>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InactiveReason {
    pub inactive_reason_type: String,
    #[serde(default)]
    pub merge_demerge_to: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NameValue {
    pub value: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProteinName {
    pub full_name: Option<NameValue>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProteinDescription {
    pub recommended_name: Option<ProteinName>,
    #[serde(default)]
    pub submission_names: Vec<ProteinName>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Sequence {
    pub value: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FeaturePosition {
    pub value: Option<SeqPosition>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FeatureLocation {
    pub start: FeaturePosition,
    pub end: FeaturePosition,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub location: FeatureLocation,
    #[serde(default)]
    pub description: String,
}

const INACTIVE_ENTRY_TYPE: &str = "Inactive";
const REVIEWED_ENTRY_TYPE: &str = "UniProtKB reviewed (Swiss-Prot)";
pub const ACTIVE_SITE_FEATURE: &str = "Active site";
pub const BINDING_SITE_FEATURE: &str = "Binding site";

// What the database says happened to an accession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessionState {
    Current,
    // secondary accession, or a merged or demerged entry
    ReplacedBy(UniProtAcc),
    // deleted, or inactive without a successor
    Obsolete(String),
}

impl UniProtEntry {
    pub fn is_inactive(&self) -> bool {
        self.entry_type == INACTIVE_ENTRY_TYPE
    }

    pub fn is_reviewed(&self) -> bool {
        self.entry_type == REVIEWED_ENTRY_TYPE
    }

    pub fn accession_state(&self, requested: &str) -> AccessionState {
        if self.is_inactive() {
            if let Some(ref reason) = self.inactive_reason {
                // a demerge can list several successors, the first is used
                if let Some(successor) = reason.merge_demerge_to.first() {
                    return AccessionState::ReplacedBy(successor.to_uppercase().into());
                }
                return AccessionState::Obsolete(reason.inactive_reason_type.to_lowercase());
            }
            return AccessionState::Obsolete("inactive".to_owned());
        }

        if self.primary_accession.eq_ignore_ascii_case(requested) {
            AccessionState::Current
        } else {
            AccessionState::ReplacedBy(self.primary_accession.to_uppercase().into())
        }
    }

    pub fn protein_name(&self) -> Option<String> {
        let description = self.protein_description.as_ref()?;
        description.recommended_name.as_ref()
            .or_else(|| description.submission_names.first())
            .and_then(|name| name.full_name.as_ref())
            .map(|full_name| full_name.value.clone())
    }

    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_ref().map(|sequence| sequence.value.as_str())
    }

    // every position covered by features of the given type
    pub fn feature_positions(&self, feature_type: &str) -> BTreeSet<SeqPosition> {
        let mut positions = BTreeSet::new();

        for feature in self.features.iter().filter(|f| f.feature_type == feature_type) {
            let Some(start) = feature.location.start.value else {
                continue;
            };
            let end = feature.location.end.value.unwrap_or(start);
            if end < start {
                continue;
            }
            positions.extend(start..=end);
        }

        positions
    }
}

pub fn entry_url(base_url: &str, accession: &str) -> String {
    format!("{}/uniprotkb/{}.json", base_url.trim_end_matches('/'), accession)
}

// fetch an entry, a 404 gives Ok(None)
pub fn fetch_entry<F: Fetch>(fetcher: &F, base_url: &str, accession: &str)
    -> Result<Option<UniProtEntry>, FetchError>
{
    match fetcher.get_json(&entry_url(base_url, accession)) {
        Ok(entry) => Ok(Some(entry)),
        Err(FetchError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

#[test]
fn test_parse_entry() {
    let json = r#"{
  "entryType": "UniProtKB reviewed (Swiss-Prot)",
  "primaryAccession": "P00533",
  "proteinDescription": {
    "recommendedName": { "fullName": { "value": "Epidermal growth factor receptor" } }
  },
  "sequence": { "value": "MRPSGTAGAALLALLAALCPASRA", "length": 24 },
  "features": [
    { "type": "Active site",
      "location": { "start": { "value": 5, "modifier": "EXACT" }, "end": { "value": 5, "modifier": "EXACT" } },
      "description": "Proton acceptor" },
    { "type": "Binding site",
      "location": { "start": { "value": 10, "modifier": "EXACT" }, "end": { "value": 12, "modifier": "EXACT" } } },
    { "type": "Active site",
      "location": { "start": { "value": null, "modifier": "UNKNOWN" }, "end": { "value": 8, "modifier": "EXACT" } } }
  ]
}"#;
    let entry: UniProtEntry = serde_json::from_str(json).unwrap();
    assert!(entry.is_reviewed());
    assert_eq!(entry.accession_state("p00533"), AccessionState::Current);
    assert_eq!(entry.accession_state("Q9UBF5"), AccessionState::ReplacedBy("P00533".into()));
    assert_eq!(entry.protein_name().unwrap(), "Epidermal growth factor receptor");
    assert_eq!(entry.feature_positions(ACTIVE_SITE_FEATURE).into_iter().collect::<Vec<_>>(), vec![5]);
    assert_eq!(entry.feature_positions(BINDING_SITE_FEATURE).into_iter().collect::<Vec<_>>(),
               vec![10, 11, 12]);
}

#[test]
fn test_inactive_entry() {
    let merged = r#"{
  "entryType": "Inactive",
  "primaryAccession": "P12345",
  "inactiveReason": { "inactiveReasonType": "MERGED", "mergeDemergeTo": ["p67890"] }
}"#;
    let entry: UniProtEntry = serde_json::from_str(merged).unwrap();
    assert_eq!(entry.accession_state("P12345"), AccessionState::ReplacedBy("P67890".into()));

    let demerged = r#"{
  "entryType": "Inactive",
  "primaryAccession": "P12345",
  "inactiveReason": { "inactiveReasonType": "DEMERGED", "mergeDemergeTo": ["P67890", "Q11111"] }
}"#;
    let entry: UniProtEntry = serde_json::from_str(demerged).unwrap();
    assert_eq!(entry.accession_state("P12345"), AccessionState::ReplacedBy("P67890".into()));

    let demerged_without_successor = r#"{
  "entryType": "Inactive",
  "primaryAccession": "P12345",
  "inactiveReason": { "inactiveReasonType": "DEMERGED", "mergeDemergeTo": [] }
}"#;
    let entry: UniProtEntry = serde_json::from_str(demerged_without_successor).unwrap();
    assert_eq!(entry.accession_state("P12345"), AccessionState::Obsolete("demerged".to_owned()));

    let deleted = r#"{
  "entryType": "Inactive",
  "primaryAccession": "P12345",
  "inactiveReason": { "inactiveReasonType": "DELETED" }
}"#;
    let entry: UniProtEntry = serde_json::from_str(deleted).unwrap();
    assert_eq!(entry.accession_state("P12345"), AccessionState::Obsolete("deleted".to_owned()));
    assert!(entry.protein_name().is_none());
}
