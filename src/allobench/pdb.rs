use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::bio::residue::ResidueSet;
use crate::bio::sifts::{SiftsMapping, SiftsResponse};
use crate::bio::structure::read_cif_residues;
use crate::errors::{CurationError, Result};
use crate::fetch::{Fetch, FetchError};
use crate::record::ChainUniProt;
use crate::types::{PdbId, UniProtAcc};

// "/rest/v1/holdings/status/{entry_id}"
#[derive(Deserialize, Debug, Clone)]
pub struct HoldingsStatus {
    pub rcsb_repository_holdings_combined: Option<HoldingsCombined>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HoldingsCombined {
    pub status: Option<String>,
    pub id_code_replaced_by_latest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Current,
    ReplacedBy(PdbId),
    Obsolete(String),
}

impl HoldingsStatus {
    pub fn entry_state(&self) -> EntryState {
        let Some(ref combined) = self.rcsb_repository_holdings_combined else {
            return EntryState::Obsolete("no holdings status".to_owned());
        };

        let status = combined.status.as_deref().unwrap_or("").to_uppercase();

        match status.as_str() {
            "CURRENT" => EntryState::Current,
            "REMOVED" => {
                match combined.id_code_replaced_by_latest.as_deref() {
                    Some(new_id) if !new_id.trim().is_empty() =>
                        EntryState::ReplacedBy(new_id.trim().to_uppercase().into()),
                    _ => EntryState::Obsolete("removed".to_owned()),
                }
            },
            "" => EntryState::Obsolete("no status".to_owned()),
            other => EntryState::Obsolete(other.to_lowercase()),
        }
    }
}

pub fn holdings_status_url(base_url: &str, pdb_id: &str) -> String {
    format!("{}/rest/v1/holdings/status/{}", base_url.trim_end_matches('/'), pdb_id.to_uppercase())
}

// a 404 means the ID was never issued
pub fn fetch_entry_state<F: Fetch>(fetcher: &F, base_url: &str, pdb_id: &str)
    -> std::result::Result<EntryState, FetchError>
{
    match fetcher.get_json::<HoldingsStatus>(&holdings_status_url(base_url, pdb_id)) {
        Ok(holdings) => Ok(holdings.entry_state()),
        Err(FetchError::NotFound { .. }) => Ok(EntryState::Obsolete("unknown".to_owned())),
        Err(err) => Err(err),
    }
}

const ENTRIES_QUERY: &str = "query structure($pdb_ids: [String!]!) {
  entries(entry_ids: $pdb_ids) {
    rcsb_id
    rcsb_entry_info {
      experimental_method
      resolution_combined
    }
    assemblies {
      polymer_entity_instances {
        rcsb_id
        polymer_entity {
          uniprots {
            rcsb_id
          }
        }
      }
      rcsb_struct_symmetry {
        kind
        oligomeric_state
        stoichiometry
      }
    }
  }
}";

#[derive(Deserialize, Debug)]
struct GraphQlResponse {
    data: Option<EntriesData>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct EntriesData {
    #[serde(default)]
    entries: Vec<Option<GqlEntry>>,
}

#[derive(Deserialize, Debug)]
struct GqlEntry {
    rcsb_id: String,
    rcsb_entry_info: Option<GqlEntryInfo>,
    assemblies: Option<Vec<Option<GqlAssembly>>>,
}

#[derive(Deserialize, Debug)]
struct GqlEntryInfo {
    experimental_method: Option<String>,
    resolution_combined: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct GqlAssembly {
    polymer_entity_instances: Option<Vec<GqlInstance>>,
    rcsb_struct_symmetry: Option<Vec<GqlSymmetry>>,
}

#[derive(Deserialize, Debug)]
struct GqlInstance {
    rcsb_id: String,
    polymer_entity: Option<GqlPolymerEntity>,
}

#[derive(Deserialize, Debug)]
struct GqlPolymerEntity {
    uniprots: Option<Vec<GqlRcsbId>>,
}

#[derive(Deserialize, Debug)]
struct GqlRcsbId {
    rcsb_id: String,
}

#[derive(Deserialize, Debug)]
struct GqlSymmetry {
    kind: Option<String>,
    oligomeric_state: Option<String>,
    stoichiometry: Option<Vec<String>>,
}

// Structural metadata of one PDB entry, from its first assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct PdbMetadata {
    pub pdb_id: PdbId,
    pub chain_uniprot_map: Vec<ChainUniProt>,
    pub oligomeric_state: Option<String>,
    pub stoichiometry: Option<String>,
    pub experimental_method: Option<String>,
    pub resolution: Option<f64>,
}

fn metadata_from_entry(entry: GqlEntry) -> PdbMetadata {
    let (experimental_method, resolution) =
        if let Some(info) = entry.rcsb_entry_info {
            let resolution = info.resolution_combined
                .and_then(|values| values.into_iter().flatten().next());
            (info.experimental_method, resolution)
        } else {
            (None, None)
        };

    let first_assembly = entry.assemblies
        .and_then(|assemblies| assemblies.into_iter().flatten().next());

    let mut chain_uniprot_map = vec![];
    let mut oligomeric_state = None;
    let mut stoichiometry = None;

    if let Some(assembly) = first_assembly {
        for instance in assembly.polymer_entity_instances.unwrap_or_default() {
            // instance IDs look like "1ABC.A"
            let chain = match instance.rcsb_id.split_once('.') {
                Some((_, chain)) => chain.to_owned(),
                None => continue,
            };
            let uniprot_ids: Vec<UniProtAcc> =
                instance.polymer_entity
                .and_then(|entity| entity.uniprots)
                .unwrap_or_default()
                .into_iter()
                .map(|uniprot| uniprot.rcsb_id.to_uppercase().into())
                .collect();
            chain_uniprot_map.push(ChainUniProt {
                chain: chain.into(),
                uniprot_ids,
            });
        }

        for symmetry in assembly.rcsb_struct_symmetry.unwrap_or_default() {
            if symmetry.kind.as_deref() == Some("Global Symmetry") {
                oligomeric_state = symmetry.oligomeric_state;
                stoichiometry = symmetry.stoichiometry.map(|parts| parts.join(","));
            }
        }
    }

    PdbMetadata {
        pdb_id: entry.rcsb_id.to_uppercase().into(),
        chain_uniprot_map,
        oligomeric_state,
        stoichiometry,
        experimental_method,
        resolution,
    }
}

pub fn graphql_url(base_url: &str) -> String {
    format!("{}/graphql", base_url.trim_end_matches('/'))
}

// Metadata for one batch of PDB IDs.  IDs the service doesn't know are
// missing from the result.
pub fn fetch_metadata_batch<F: Fetch>(fetcher: &F, base_url: &str, pdb_ids: &[PdbId])
    -> std::result::Result<HashMap<PdbId, PdbMetadata>, FetchError>
{
    let url = graphql_url(base_url);
    let ids: Vec<&str> = pdb_ids.iter().map(|id| id.as_str()).collect();
    let body = json!({
        "query": ENTRIES_QUERY,
        "variables": { "pdb_ids": ids },
    });

    let bytes = fetcher.post_json(&url, &body)?;
    let response: GraphQlResponse = serde_json::from_slice(&bytes)
        .map_err(|err| FetchError::bad_response(&url, err))?;

    if !response.errors.is_empty() {
        return Err(FetchError::bad_response(&url, format!("GraphQL errors: {:?}", response.errors)));
    }

    let entries = response.data.map(|data| data.entries).unwrap_or_default();

    Ok(entries.into_iter().flatten()
       .map(metadata_from_entry)
       .map(|metadata| (metadata.pdb_id.clone(), metadata))
       .collect())
}

pub fn sifts_url(base_url: &str, pdb_id: &str) -> String {
    format!("{}/mappings/uniprot/{}", base_url.trim_end_matches('/'), pdb_id.to_lowercase())
}

// PDBe returns 404 for entries without a UniProt mapping
pub fn fetch_sifts_mapping<F: Fetch>(fetcher: &F, base_url: &str, pdb_id: &str)
    -> std::result::Result<SiftsMapping, FetchError>
{
    match fetcher.get_json::<SiftsResponse>(&sifts_url(base_url, pdb_id)) {
        Ok(response) => Ok(SiftsMapping::from_response(response)),
        Err(FetchError::NotFound { .. }) => Ok(SiftsMapping::default()),
        Err(err) => Err(err),
    }
}

pub fn structure_url(base_url: &str, pdb_id: &str) -> String {
    format!("{}/download/{}.cif", base_url.trim_end_matches('/'), pdb_id.to_uppercase())
}

// Local mmCIF files, downloaded only when not already present.
pub struct StructureCache {
    dir: PathBuf,
    files_url: String,
}

impl StructureCache {
    pub fn new(dir: &Path, files_url: &str) -> Result<StructureCache> {
        fs::create_dir_all(dir).map_err(|err| CurationError::io(dir, err))?;
        Ok(StructureCache {
            dir: dir.to_owned(),
            files_url: files_url.to_owned(),
        })
    }

    pub fn path_for(&self, pdb_id: &str) -> PathBuf {
        self.dir.join(format!("{}.cif", pdb_id.to_uppercase()))
    }

    // Path of the cached file, fetching it if needed.  The outer result
    // reports local I/O failures, the inner one the download.  A body that
    // isn't a usable mmCIF file is never written to the cache.
    pub fn ensure<F: Fetch>(&self, fetcher: &F, pdb_id: &str)
        -> Result<std::result::Result<PathBuf, FetchError>>
    {
        let path = self.path_for(pdb_id);

        if path.exists() {
            debug!("using cached structure {}", path.display());
            return Ok(Ok(path));
        }

        let url = structure_url(&self.files_url, pdb_id);

        let bytes = match fetcher.get_bytes(&url) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(Err(err)),
        };

        if let Err(reason) = read_cif_residues(&bytes) {
            return Ok(Err(FetchError::bad_response(&url, reason)));
        }

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|err| CurationError::io(&self.dir, err))?;
        temp_file.write_all(&bytes).map_err(|err| CurationError::io(&path, err))?;
        temp_file.persist(&path).map_err(|err| CurationError::io(&path, err.error))?;

        info!("downloaded structure {} to {}", pdb_id, path.display());

        Ok(Ok(path))
    }

    // Residues of a cached file.  A file that can't be read or parsed is
    // removed so the next run downloads it again.
    pub fn read_residues(&self, path: &Path) -> std::result::Result<ResidueSet, String> {
        let residues = fs::read(path)
            .map_err(|err| err.to_string())
            .and_then(|bytes| read_cif_residues(&bytes));

        if residues.is_err() {
            if let Err(err) = fs::remove_file(path) {
                warn!("failed to remove unreadable structure {}: {}", path.display(), err);
            }
        }

        residues
    }
}

#[test]
fn test_entry_state() {
    let current: HoldingsStatus = serde_json::from_str(
        r#"{"rcsb_id": "4HHB", "rcsb_repository_holdings_combined": {"status": "CURRENT"}}"#).unwrap();
    assert_eq!(current.entry_state(), EntryState::Current);

    let removed: HoldingsStatus = serde_json::from_str(
        r#"{"rcsb_repository_holdings_combined": {"status": "REMOVED", "id_code_replaced_by_latest": "9xyz"}}"#).unwrap();
    assert_eq!(removed.entry_state(), EntryState::ReplacedBy("9XYZ".into()));

    let withdrawn: HoldingsStatus = serde_json::from_str(
        r#"{"rcsb_repository_holdings_combined": {"status": "REMOVED"}}"#).unwrap();
    assert_eq!(withdrawn.entry_state(), EntryState::Obsolete("removed".to_owned()));
}

#[test]
fn test_metadata_from_entry() {
    let json = r#"{
  "rcsb_id": "1ABC",
  "rcsb_entry_info": { "experimental_method": "X-ray", "resolution_combined": [2.1] },
  "assemblies": [
    { "polymer_entity_instances": [
        { "rcsb_id": "1ABC.A", "polymer_entity": { "uniprots": [ { "rcsb_id": "P12345" } ] } },
        { "rcsb_id": "1ABC.B", "polymer_entity": { "uniprots": null } }
      ],
      "rcsb_struct_symmetry": [
        { "kind": "Local Symmetry", "oligomeric_state": "Hetero 4-mer", "stoichiometry": ["A4"] },
        { "kind": "Global Symmetry", "oligomeric_state": "Hetero 2-mer", "stoichiometry": ["A1", "B1"] }
      ] }
  ]
}"#;
    let entry: GqlEntry = serde_json::from_str(json).unwrap();
    let metadata = metadata_from_entry(entry);
    assert_eq!(metadata.pdb_id.as_str(), "1ABC");
    assert_eq!(metadata.resolution, Some(2.1));
    assert_eq!(metadata.experimental_method.as_deref(), Some("X-ray"));
    assert_eq!(metadata.oligomeric_state.as_deref(), Some("Hetero 2-mer"));
    assert_eq!(metadata.stoichiometry.as_deref(), Some("A1,B1"));
    let chains: Vec<String> = metadata.chain_uniprot_map.iter().map(|c| c.to_string()).collect();
    assert_eq!(chains, vec!["A:P12345", "B:"]);
}
