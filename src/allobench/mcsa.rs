use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::errors::{CurationError, Result};
use crate::fetch::{Fetch, FetchError};
use crate::types::{ResidueNumber, SeqPosition};

// A catalytic residue from the M-CSA "residues" API.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct McsaResidue {
    pub mcsa_id: Option<u32>,
    #[serde(default)]
    pub residue_chains: Vec<McsaResidueChain>,
    #[serde(default)]
    pub residue_sequences: Vec<McsaResidueSequence>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct McsaResidueChain {
    pub chain_name: String,
    pub pdb_id: String,
    pub code: String,
    pub resid: Option<ResidueNumber>,
    pub auth_resid: Option<ResidueNumber>,
}

impl McsaResidueChain {
    pub fn author_number(&self) -> Option<ResidueNumber> {
        self.auth_resid.or(self.resid)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct McsaResidueSequence {
    pub uniprot_id: String,
    pub code: String,
    pub resid: Option<SeqPosition>,
}

// the API returns either a plain list or Django REST framework pages
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum McsaResponse {
    Page {
        next: Option<String>,
        results: Vec<McsaResidue>,
    },
    List(Vec<McsaResidue>),
}

// M-CSA residues by upper case UniProt accession
#[derive(Debug, Clone, Default)]
pub struct McsaIndex {
    by_uniprot: HashMap<String, Vec<McsaResidue>>,
}

impl McsaIndex {
    pub fn new(residues: Vec<McsaResidue>) -> McsaIndex {
        let mut by_uniprot: HashMap<String, Vec<McsaResidue>> = HashMap::new();

        for residue in residues {
            let mut accessions: Vec<String> =
                residue.residue_sequences.iter()
                .map(|sequence| sequence.uniprot_id.trim().to_uppercase())
                .filter(|accession| !accession.is_empty())
                .collect();
            accessions.sort();
            accessions.dedup();

            for accession in accessions {
                by_uniprot.entry(accession).or_default().push(residue.clone());
            }
        }

        McsaIndex {
            by_uniprot,
        }
    }

    pub fn residues_for(&self, accession: &str) -> &[McsaResidue] {
        self.by_uniprot.get(&accession.to_uppercase())
            .map(|residues| residues.as_slice())
            .unwrap_or(&[])
    }
}

pub fn residues_url(base_url: &str) -> String {
    format!("{}/residues/?format=json", base_url.trim_end_matches('/'))
}

// follow "next" links until the last page
pub fn fetch_all_residues<F: Fetch>(fetcher: &F, base_url: &str)
    -> std::result::Result<Vec<McsaResidue>, FetchError>
{
    let mut residues = vec![];
    let mut next_url = Some(residues_url(base_url));

    while let Some(url) = next_url.take() {
        match fetcher.get_json::<McsaResponse>(&url)? {
            McsaResponse::Page { next, results } => {
                residues.extend(results);
                next_url = next.filter(|next| *next != url);
            },
            McsaResponse::List(results) => residues.extend(results),
        }
    }

    Ok(residues)
}

pub fn read_cached_residues(cache_path: &Path) -> Result<Vec<McsaResidue>> {
    let file = File::open(cache_path).map_err(|err| CurationError::io(cache_path, err))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| CurationError::json(cache_path, err))
}

fn write_cache(cache_path: &Path, residues: &[McsaResidue]) -> Result<()> {
    let dir = match cache_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
        _ => Path::new(".").to_owned(),
    };
    fs::create_dir_all(&dir).map_err(|err| CurationError::io(&dir, err))?;

    let temp_file = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|err| CurationError::io(&dir, err))?;
    serde_json::to_writer(temp_file.as_file(), residues)
        .map_err(|err| CurationError::json(cache_path, err))?;
    temp_file.persist(cache_path).map_err(|err| CurationError::io(cache_path, err.error))?;

    Ok(())
}

// Load the M-CSA residues from the local cache file, downloading and
// caching them on the first run.  The inner result is the lookup outcome,
// the outer one is for fatal local errors.
pub fn load_index<F: Fetch>(fetcher: &F, base_url: &str, cache_path: &Path)
    -> Result<std::result::Result<McsaIndex, FetchError>>
{
    if cache_path.exists() {
        let residues = read_cached_residues(cache_path)?;
        info!("read {} M-CSA residues from {}", residues.len(), cache_path.display());
        return Ok(Ok(McsaIndex::new(residues)));
    }

    match fetch_all_residues(fetcher, base_url) {
        Ok(residues) => {
            info!("downloaded {} M-CSA residues", residues.len());
            write_cache(cache_path, &residues)?;
            Ok(Ok(McsaIndex::new(residues)))
        },
        Err(err) => Ok(Err(err)),
    }
}

#[test]
fn test_index() {
    let json = r#"[
  { "mcsa_id": 1,
    "residue_chains": [ { "chain_name": "A", "pdb_id": "1b73", "assembly_chain_name": "A",
                          "code": "Asp", "resid": 7, "auth_resid": 7, "is_reference": true } ],
    "residue_sequences": [ { "uniprot_id": "P56868", "code": "Asp", "resid": 7, "is_reference": true } ] },
  { "mcsa_id": 1,
    "residue_chains": [],
    "residue_sequences": [ { "uniprot_id": "p56868", "code": "Cys", "resid": 70 },
                           { "uniprot_id": "P56868", "code": "Cys", "resid": 70 } ] },
  { "mcsa_id": 2,
    "residue_sequences": [ { "uniprot_id": "Q00001", "code": "His", "resid": 12 } ] }
]"#;
    let residues: Vec<McsaResidue> = serde_json::from_str(json).unwrap();
    let index = McsaIndex::new(residues);
    assert_eq!(index.residues_for("P56868").len(), 2);
    assert_eq!(index.residues_for("q00001").len(), 1);
    assert!(index.residues_for("P99999").is_empty());
    assert_eq!(index.residues_for("P56868")[0].residue_chains[0].author_number(), Some(7));
}
