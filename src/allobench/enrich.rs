use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexSet;
use itertools::Itertools;

use crate::bio::residue::{residue_name_at, Residue, ResidueSet};
use crate::bio::sifts::SiftsMapping;
use crate::bio::structure::{find_at_position, unmatched_residues};
use crate::config::{Config, ServiceUrls};
use crate::errors::{CurationError, Result};
use crate::fetch::{Fetch, FetchError, NetworkGuard};
use crate::mcsa::{load_index, McsaIndex};
use crate::pdb::{fetch_metadata_batch, fetch_sifts_mapping, PdbMetadata, StructureCache};
use crate::record::{ProteinRecord, Source};
use crate::types::{ChainId, PdbId, ResidueName, ResidueNumber, SeqPosition};
use crate::uniprot::{fetch_entry, UniProtEntry, ACTIVE_SITE_FEATURE, BINDING_SITE_FEATURE};

// kinds written to the "Enrichment Issues" column
pub const UNIPROT_ISSUE: &str = "uniprot";
pub const MCSA_ISSUE: &str = "mcsa";
pub const PDB_METADATA_ISSUE: &str = "pdb-metadata";
pub const SIFTS_ISSUE: &str = "sifts";
pub const STRUCTURE_ISSUE: &str = "structure";

const UNKNOWN_RESIDUE: &str = "UNK";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub records: usize,
    pub records_with_issues: usize,
    pub active_site_residues: usize,
}

struct LoadedStructure {
    path: PathBuf,
    residues: ResidueSet,
}

// Adds UniProt, M-CSA and PDB annotation to records.  Every remote lookup
// is made at most once per run; a None in a memo means the lookup failed.
pub struct Enricher<'a, F: Fetch> {
    fetcher: &'a F,
    services: ServiceUrls,
    pdb_batch_size: usize,
    mcsa_cache_path: PathBuf,
    guard: NetworkGuard,
    structures: StructureCache,

    mcsa: Option<Option<Rc<McsaIndex>>>,
    uniprot_entries: HashMap<String, Option<Rc<UniProtEntry>>>,
    metadata: HashMap<PdbId, Option<Rc<PdbMetadata>>>,
    sifts: HashMap<PdbId, Option<Rc<SiftsMapping>>>,
    loaded_structures: HashMap<PdbId, Option<Rc<LoadedStructure>>>,

    summary: EnrichSummary,
}

fn pdb_key(pdb_id: &str) -> PdbId {
    pdb_id.to_uppercase().into()
}

// Name a residue from the structure if it has one at that position,
// otherwise use the fallback, otherwise UNK.
fn named_residue(chain: ChainId, number: ResidueNumber, structure: Option<&ResidueSet>,
                 fallback: Option<ResidueName>) -> Residue {
    let mut residue = Residue {
        chain,
        number,
        insertion_code: None,
        name: UNKNOWN_RESIDUE.into(),
    };

    if let Some(found) = structure.and_then(|residues| find_at_position(residues, &residue)) {
        residue.name = found.name.clone();
    } else if let Some(name) = fallback {
        residue.name = name;
    }

    residue
}

// the structure residues aligned with one UniProt sequence position
fn aligned_residues(mapping: &SiftsMapping, accession: &str, position: SeqPosition,
                    structure: Option<&ResidueSet>, sequence: Option<&str>) -> Vec<Residue> {
    mapping.map_position(accession, position)
        .into_iter()
        .map(|(chain, number)| {
            let sequence_name = sequence.and_then(|sequence| residue_name_at(sequence, position));
            named_residue(chain, number, structure, sequence_name)
        })
        .collect()
}

impl<'a, F: Fetch> Enricher<'a, F> {
    pub fn new(fetcher: &'a F, config: &Config) -> Result<Enricher<'a, F>> {
        let structures = StructureCache::new(&config.structure_dir(), &config.services.rcsb_files)?;

        Ok(Enricher {
            fetcher,
            services: config.services.clone(),
            pdb_batch_size: config.pdb_batch_size.max(1),
            mcsa_cache_path: config.mcsa_cache_path(),
            guard: NetworkGuard::new(config.max_consecutive_network_failures),
            structures,
            mcsa: None,
            uniprot_entries: HashMap::new(),
            metadata: HashMap::new(),
            sifts: HashMap::new(),
            loaded_structures: HashMap::new(),
            summary: EnrichSummary::default(),
        })
    }

    fn mcsa_index(&mut self) -> Result<Option<Rc<McsaIndex>>> {
        if let Some(ref index) = self.mcsa {
            return Ok(index.clone());
        }

        let result = load_index(self.fetcher, &self.services.mcsa, &self.mcsa_cache_path)?;
        self.guard.check(&result)?;

        let index =
            match result {
                Ok(index) => Some(Rc::new(index)),
                Err(err) => {
                    warn!("{}", CurationError::lookup("M-CSA residues", err));
                    None
                },
            };

        self.mcsa = Some(index.clone());

        Ok(index)
    }

    fn uniprot_entry(&mut self, accession: &str) -> Result<Option<Rc<UniProtEntry>>> {
        let key = accession.to_uppercase();

        if let Some(entry) = self.uniprot_entries.get(&key) {
            return Ok(entry.clone());
        }

        let result = fetch_entry(self.fetcher, &self.services.uniprot, &key);
        self.guard.check(&result)?;

        let entry =
            match result {
                Ok(Some(entry)) if entry.is_inactive() => {
                    warn!("UniProt entry {} is inactive", key);
                    None
                },
                Ok(Some(entry)) => Some(Rc::new(entry)),
                Ok(None) => {
                    warn!("UniProt entry {} not found", key);
                    None
                },
                Err(err) => {
                    warn!("{}", CurationError::lookup(&key, err));
                    None
                },
            };

        self.uniprot_entries.insert(key, entry.clone());

        Ok(entry)
    }

    // Query the RCSB GraphQL API for all the given entries, a batch at a
    // time.  IDs already looked up are skipped.
    pub fn prefetch_metadata<'b>(&mut self, pdb_ids: impl Iterator<Item = &'b str>) -> Result<()> {
        let pdb_ids: IndexSet<PdbId> =
            pdb_ids.map(pdb_key)
            .filter(|pdb_id| !self.metadata.contains_key(pdb_id))
            .collect();

        for chunk in &pdb_ids.into_iter().chunks(self.pdb_batch_size) {
            let batch: Vec<PdbId> = chunk.collect();

            debug!("requesting metadata for {} PDB entries", batch.len());

            let result = fetch_metadata_batch(self.fetcher, &self.services.rcsb_data, &batch);
            self.guard.check(&result)?;

            match result {
                Ok(mut batch_metadata) => {
                    for pdb_id in batch {
                        let metadata = batch_metadata.remove(&pdb_id).map(Rc::new);
                        if metadata.is_none() {
                            warn!("no metadata returned for PDB entry {}", pdb_id);
                        }
                        self.metadata.insert(pdb_id, metadata);
                    }
                },
                Err(err) => {
                    warn!("metadata lookup of {} PDB entries failed: {}", batch.len(), err);
                    for pdb_id in batch {
                        self.metadata.insert(pdb_id, None);
                    }
                },
            }
        }

        Ok(())
    }

    fn pdb_metadata(&mut self, pdb_id: &str) -> Result<Option<Rc<PdbMetadata>>> {
        let key = pdb_key(pdb_id);

        if !self.metadata.contains_key(&key) {
            self.prefetch_metadata(std::iter::once(pdb_id))?;
        }

        Ok(self.metadata.get(&key).cloned().flatten())
    }

    fn sifts_mapping(&mut self, pdb_id: &str) -> Result<Option<Rc<SiftsMapping>>> {
        let key = pdb_key(pdb_id);

        if let Some(mapping) = self.sifts.get(&key) {
            return Ok(mapping.clone());
        }

        let result = fetch_sifts_mapping(self.fetcher, &self.services.pdbe, &key);
        self.guard.check(&result)?;

        let mapping =
            match result {
                Ok(mapping) => Some(Rc::new(mapping)),
                Err(err) => {
                    warn!("{}", CurationError::lookup(&format!("SIFTS mapping of {}", key), err));
                    None
                },
            };

        self.sifts.insert(key, mapping.clone());

        Ok(mapping)
    }

    fn structure(&mut self, pdb_id: &str) -> Result<Option<Rc<LoadedStructure>>> {
        let key = pdb_key(pdb_id);

        if let Some(structure) = self.loaded_structures.get(&key) {
            return Ok(structure.clone());
        }

        let result: std::result::Result<PathBuf, FetchError> =
            self.structures.ensure(self.fetcher, &key)?;
        self.guard.check(&result)?;

        let structure =
            match result {
                Ok(path) => match self.structures.read_residues(&path) {
                    Ok(residues) => Some(Rc::new(LoadedStructure {
                        path,
                        residues,
                    })),
                    Err(reason) => {
                        warn!("{}", CurationError::lookup(&format!("structure {}", key), reason));
                        None
                    },
                },
                Err(err) => {
                    warn!("{}", CurationError::lookup(&format!("structure {}", key), err));
                    None
                },
            };

        self.loaded_structures.insert(key, structure.clone());

        Ok(structure)
    }

    fn add_uniprot_annotation(&mut self, record: &mut ProteinRecord)
        -> Result<Option<Rc<UniProtEntry>>>
    {
        let Some(accession) = record.uniprot_id.clone() else {
            return Ok(None);
        };

        let Some(entry) = self.uniprot_entry(&accession)? else {
            record.add_issue(UNIPROT_ISSUE);
            return Ok(None);
        };

        record.protein_name = entry.protein_name();
        record.reviewed = Some(entry.is_reviewed());
        record.uniprot_active_site_positions = entry.feature_positions(ACTIVE_SITE_FEATURE);
        record.uniprot_binding_site_positions = entry.feature_positions(BINDING_SITE_FEATURE);

        Ok(Some(entry))
    }

    fn add_pdb_metadata(&mut self, record: &mut ProteinRecord, pdb_id: &str) -> Result<()> {
        let Some(metadata) = self.pdb_metadata(pdb_id)? else {
            record.add_issue(PDB_METADATA_ISSUE);
            return Ok(());
        };

        record.chain_uniprot_map = metadata.chain_uniprot_map.clone();
        record.oligomeric_state = metadata.oligomeric_state.clone();
        record.stoichiometry = metadata.stoichiometry.clone();
        record.experimental_method = metadata.experimental_method.clone();
        record.resolution = metadata.resolution;

        Ok(())
    }

    // Catalytic residues from M-CSA.  The chain and author number are taken
    // straight from M-CSA when it lists this structure, otherwise the
    // UniProt position is returned for alignment.
    fn mcsa_residues(&mut self, record: &mut ProteinRecord, accession: &str, pdb_id: &str,
                     structure: Option<&ResidueSet>)
        -> Result<(Vec<Residue>, Vec<SeqPosition>)>
    {
        let Some(index) = self.mcsa_index()? else {
            record.add_issue(MCSA_ISSUE);
            return Ok((vec![], vec![]));
        };

        let mut direct = vec![];
        let mut positions = vec![];

        for mcsa_residue in index.residues_for(accession) {
            let same_structure: Vec<_> =
                mcsa_residue.residue_chains.iter()
                .filter(|residue_chain| residue_chain.pdb_id.eq_ignore_ascii_case(pdb_id))
                .collect();

            if same_structure.is_empty() {
                positions.extend(mcsa_residue.residue_sequences.iter()
                                 .filter(|sequence| sequence.uniprot_id.eq_ignore_ascii_case(accession))
                                 .filter_map(|sequence| sequence.resid));
            } else {
                for residue_chain in same_structure {
                    let Some(number) = residue_chain.author_number() else {
                        continue;
                    };
                    let code = residue_chain.code.trim().to_uppercase();
                    let fallback = if code.is_empty() { None } else { Some(code.into()) };
                    direct.push(named_residue(residue_chain.chain_name.as_str().into(), number,
                                              structure, fallback));
                }
            }
        }

        Ok((direct, positions))
    }

    fn add_active_site(&mut self, record: &mut ProteinRecord, pdb_id: &str,
                       entry: Option<&UniProtEntry>, structure: Option<&ResidueSet>)
        -> Result<()>
    {
        let Some(accession) = record.uniprot_id.clone() else {
            return Ok(());
        };

        let (mcsa_direct, mcsa_positions) =
            self.mcsa_residues(record, &accession, pdb_id, structure)?;

        let uniprot_positions: Vec<SeqPosition> =
            record.uniprot_active_site_positions.iter().cloned().collect();

        let mut uniprot_found = vec![];
        let mut mcsa_found = mcsa_direct;

        if !uniprot_positions.is_empty() || !mcsa_positions.is_empty() {
            match self.sifts_mapping(pdb_id)? {
                Some(mapping) => {
                    let sequence = entry.and_then(|entry| entry.sequence());
                    for position in uniprot_positions {
                        uniprot_found.extend(aligned_residues(&mapping, &accession, position,
                                                              structure, sequence));
                    }
                    for position in mcsa_positions {
                        mcsa_found.extend(aligned_residues(&mapping, &accession, position,
                                                           structure, sequence));
                    }
                },
                None => record.add_issue(SIFTS_ISSUE),
            }
        }

        if !uniprot_found.is_empty() {
            record.active_site_sources.insert(Source::UniProt);
        }
        if !mcsa_found.is_empty() {
            record.active_site_sources.insert(Source::Mcsa);
        }

        record.active_site_residues.extend(uniprot_found);
        record.active_site_residues.extend(mcsa_found);

        Ok(())
    }

    pub fn enrich_record(&mut self, record: &mut ProteinRecord) -> Result<()> {
        record.enrichment_issues.clear();

        let entry = self.add_uniprot_annotation(record)?;

        if let Some(pdb_id) = record.pdb_id.clone() {
            self.add_pdb_metadata(record, &pdb_id)?;

            let structure = self.structure(&pdb_id)?;

            match structure {
                Some(ref structure) => {
                    record.structure_file = Some(structure.path.display().to_string());
                    record.unmatched_allosteric_residues =
                        unmatched_residues(&structure.residues, &record.allosteric_residues);
                    if !record.unmatched_allosteric_residues.is_empty() {
                        debug!("{}: {} allosteric residues not found in {}", record.asd_id,
                               record.unmatched_allosteric_residues.len(), pdb_id);
                    }
                },
                None => record.add_issue(STRUCTURE_ISSUE),
            }

            let structure_residues = structure.as_ref().map(|structure| &structure.residues);
            self.add_active_site(record, &pdb_id, entry.as_deref(), structure_residues)?;
        }

        self.summary.records += 1;
        self.summary.active_site_residues += record.active_site_residues.len();

        if !record.enrichment_issues.is_empty() {
            self.summary.records_with_issues += 1;
            warn!("{}: incomplete annotation ({})", record.asd_id,
                  record.enrichment_issues.iter().join(", "));
        }

        Ok(())
    }

    pub fn summary(&self) -> &EnrichSummary {
        &self.summary
    }
}

pub fn enrich_records<F: Fetch>(enricher: &mut Enricher<F>, records: &mut [ProteinRecord])
    -> Result<()>
{
    let pdb_ids: Vec<PdbId> = records.iter().filter_map(|record| record.pdb_id.clone()).collect();

    enricher.prefetch_metadata(pdb_ids.iter().map(|pdb_id| pdb_id.as_str()))?;

    for record in records.iter_mut() {
        enricher.enrich_record(record)?;
    }

    let summary = enricher.summary();
    info!("enriched {} records: {} active site residues, {} records with issues",
          summary.records, summary.active_site_residues, summary.records_with_issues);

    Ok(())
}
