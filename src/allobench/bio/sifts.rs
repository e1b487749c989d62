use std::collections::HashMap;

use crate::types::{ChainId, ResidueNumber, SeqPosition};

// Response of the PDBe "mappings/uniprot/{pdb_id}" call, keyed by lower
// case PDB ID.
pub type SiftsResponse = HashMap<String, SiftsEntry>;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SiftsEntry {
    #[serde(rename = "UniProt", default)]
    pub uniprot: HashMap<String, SiftsUniProt>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SiftsUniProt {
    #[serde(default)]
    pub mappings: Vec<SiftsSegment>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SiftsSegment {
    pub chain_id: String,
    pub unp_start: SeqPosition,
    pub unp_end: SeqPosition,
    pub start: SiftsResidue,
    pub end: SiftsResidue,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SiftsResidue {
    pub author_residue_number: Option<ResidueNumber>,
    #[serde(default)]
    pub author_insertion_code: Option<String>,
    pub residue_number: i64,
}

// A stretch of a chain where UniProt positions and PDB author numbers run
// in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSegment {
    pub chain: ChainId,
    pub unp_start: SeqPosition,
    pub unp_end: SeqPosition,
    pub author_start: ResidueNumber,
}

// All UniProt to PDB segments of one structure, by accession.
#[derive(Debug, Clone, Default)]
pub struct SiftsMapping {
    segments: HashMap<String, Vec<ChainSegment>>,
}

fn has_insertion_code(residue: &SiftsResidue) -> bool {
    residue.author_insertion_code.as_ref()
        .map(|code| !code.trim().is_empty())
        .unwrap_or(false)
}

fn linear_segment(segment: &SiftsSegment) -> Option<ChainSegment> {
    let author_start = segment.start.author_residue_number?;
    let author_end = segment.end.author_residue_number?;

    if segment.unp_end < segment.unp_start ||
        has_insertion_code(&segment.start) || has_insertion_code(&segment.end) {
        return None;
    }

    let unp_length = (segment.unp_end - segment.unp_start) as i64;

    if (author_end as i64 - author_start as i64) != unp_length ||
        segment.end.residue_number - segment.start.residue_number != unp_length {
        return None;
    }

    Some(ChainSegment {
        chain: segment.chain_id.as_str().into(),
        unp_start: segment.unp_start,
        unp_end: segment.unp_end,
        author_start,
    })
}

// strip an isoform suffix: "P12345-2" -> "P12345"
fn base_accession(accession: &str) -> &str {
    accession.split('-').next().unwrap_or(accession)
}

impl SiftsMapping {
    pub fn from_response(response: SiftsResponse) -> SiftsMapping {
        let mut segments: HashMap<String, Vec<ChainSegment>> = HashMap::new();

        for entry in response.into_values() {
            for (accession, uniprot) in entry.uniprot {
                let linear = uniprot.mappings.iter().filter_map(|segment| {
                    let chain_segment = linear_segment(segment);
                    if chain_segment.is_none() {
                        debug!("ignoring non-linear SIFTS segment of {} chain {}",
                               accession, segment.chain_id);
                    }
                    chain_segment
                });
                segments.entry(base_accession(&accession).to_owned())
                    .or_default()
                    .extend(linear);
            }
        }

        SiftsMapping {
            segments,
        }
    }

    // chain and author number of every chain position aligned with a UniProt
    // sequence position
    pub fn map_position(&self, accession: &str, position: SeqPosition)
        -> Vec<(ChainId, ResidueNumber)>
    {
        let Some(segments) = self.segments.get(base_accession(accession)) else {
            return vec![];
        };

        let mut mapped: Vec<(ChainId, ResidueNumber)> =
            segments.iter()
            .filter(|segment| segment.unp_start <= position && position <= segment.unp_end)
            .map(|segment| {
                let offset = (position - segment.unp_start) as ResidueNumber;
                (segment.chain.clone(), segment.author_start + offset)
            })
            .collect();

        mapped.sort();
        mapped.dedup();
        mapped
    }
}

#[test]
fn test_map_position() {
    let json = r#"{
  "1abc": {
    "UniProt": {
      "P12345": {
        "identifier": "TEST_HUMAN",
        "name": "TEST_HUMAN",
        "mappings": [
          { "entity_id": 1, "chain_id": "A", "struct_asym_id": "A",
            "unp_start": 2, "unp_end": 101,
            "start": { "author_residue_number": 10, "author_insertion_code": "", "residue_number": 1 },
            "end": { "author_residue_number": 109, "author_insertion_code": "", "residue_number": 100 } },
          { "entity_id": 1, "chain_id": "B", "struct_asym_id": "B",
            "unp_start": 2, "unp_end": 101,
            "start": { "author_residue_number": 10, "author_insertion_code": "", "residue_number": 1 },
            "end": { "author_residue_number": 109, "author_insertion_code": "", "residue_number": 100 } },
          { "entity_id": 2, "chain_id": "C", "struct_asym_id": "C",
            "unp_start": 2, "unp_end": 101,
            "start": { "author_residue_number": 1, "author_insertion_code": "", "residue_number": 1 },
            "end": { "author_residue_number": 250, "author_insertion_code": "", "residue_number": 100 } },
          { "entity_id": 3, "chain_id": "D", "struct_asym_id": "D",
            "unp_start": 2, "unp_end": 101,
            "start": { "author_residue_number": null, "residue_number": 1 },
            "end": { "author_residue_number": 109, "residue_number": 100 } }
        ]
      }
    }
  }
}"#;
    let response: SiftsResponse = serde_json::from_str(json).unwrap();
    let mapping = SiftsMapping::from_response(response);

    assert_eq!(mapping.map_position("P12345", 57),
               vec![(ChainId::from("A"), 65), (ChainId::from("B"), 65)]);
    assert_eq!(mapping.map_position("P12345-2", 2),
               vec![(ChainId::from("A"), 10), (ChainId::from("B"), 10)]);
    assert!(mapping.map_position("P12345", 1).is_empty());
    assert!(mapping.map_position("Q99999", 57).is_empty());
}
