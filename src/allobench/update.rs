use std::collections::HashMap;
use std::fmt;

use crate::errors::{CurationError, Result};
use crate::fetch::{Fetch, FetchError, NetworkGuard};
use crate::pdb::{fetch_entry_state, EntryState};
use crate::record::{IdStatus, ProteinRecord};
use crate::uniprot::{fetch_entry, AccessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
    Pdb,
    UniProt,
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdType::Pdb => write!(f, "PDB"),
            IdType::UniProt => write!(f, "UniProt"),
        }
    }
}

// An obsolete identifier and its current replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierMapping {
    pub old_id: String,
    pub new_id: String,
    pub id_type: IdType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Current,
    Replaced(IdentifierMapping),
    Unresolved(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub lookups: usize,
    pub replaced: usize,
    pub unresolved: usize,
}

// Resolves identifiers against UniProt and the PDB, one remote lookup per
// distinct identifier.
pub struct IdentifierUpdater<'a, F: Fetch> {
    fetcher: &'a F,
    uniprot_url: String,
    rcsb_data_url: String,
    guard: NetworkGuard,
    resolved: HashMap<(IdType, String), Resolution>,
    summary: UpdateSummary,
}

fn new_status(previous: IdStatus, resolution: &Resolution) -> IdStatus {
    match resolution {
        // a rerun confirms the replacement ID, keep the record marked as
        // replaced
        Resolution::Current if previous == IdStatus::Replaced => IdStatus::Replaced,
        Resolution::Current => IdStatus::Current,
        Resolution::Replaced(_) => IdStatus::Replaced,
        Resolution::Unresolved(_) => IdStatus::Unresolved,
    }
}

impl<'a, F: Fetch> IdentifierUpdater<'a, F> {
    pub fn new(fetcher: &'a F, uniprot_url: &str, rcsb_data_url: &str,
               max_consecutive_network_failures: usize) -> IdentifierUpdater<'a, F> {
        IdentifierUpdater {
            fetcher,
            uniprot_url: uniprot_url.to_owned(),
            rcsb_data_url: rcsb_data_url.to_owned(),
            guard: NetworkGuard::new(max_consecutive_network_failures),
            resolved: HashMap::new(),
            summary: UpdateSummary::default(),
        }
    }

    fn lookup_uniprot(&self, accession: &str) -> std::result::Result<Resolution, FetchError> {
        let resolution =
            match fetch_entry(self.fetcher, &self.uniprot_url, accession)? {
                Some(entry) => match entry.accession_state(accession) {
                    AccessionState::Current => Resolution::Current,
                    AccessionState::ReplacedBy(new_id) => Resolution::Replaced(IdentifierMapping {
                        old_id: accession.to_owned(),
                        new_id: new_id.to_string(),
                        id_type: IdType::UniProt,
                    }),
                    AccessionState::Obsolete(reason) => Resolution::Unresolved(reason),
                },
                None => Resolution::Unresolved("not found".to_owned()),
            };
        Ok(resolution)
    }

    fn lookup_pdb(&self, pdb_id: &str) -> std::result::Result<Resolution, FetchError> {
        let resolution =
            match fetch_entry_state(self.fetcher, &self.rcsb_data_url, pdb_id)? {
                EntryState::Current => Resolution::Current,
                EntryState::ReplacedBy(new_id) => Resolution::Replaced(IdentifierMapping {
                    old_id: pdb_id.to_owned(),
                    new_id: new_id.to_string(),
                    id_type: IdType::Pdb,
                }),
                EntryState::Obsolete(reason) => Resolution::Unresolved(reason),
            };
        Ok(resolution)
    }

    // the memoised resolution of one identifier
    pub fn resolve(&mut self, id_type: IdType, id: &str) -> Result<Resolution> {
        let key = (id_type, id.to_uppercase());

        if let Some(resolution) = self.resolved.get(&key) {
            return Ok(resolution.clone());
        }

        self.summary.lookups += 1;

        let result =
            match id_type {
                IdType::UniProt => self.lookup_uniprot(&key.1),
                IdType::Pdb => self.lookup_pdb(&key.1),
            };

        self.guard.check(&result)?;

        let resolution = result.unwrap_or_else(|err| Resolution::Unresolved(err.to_string()));

        match &resolution {
            Resolution::Replaced(mapping) =>
                info!("{} ID {} replaced by {}", id_type, mapping.old_id, mapping.new_id),
            Resolution::Unresolved(reason) =>
                warn!("{}, keeping the {} ID", CurationError::lookup(&key.1, reason), id_type),
            Resolution::Current => (),
        }

        self.resolved.insert(key, resolution.clone());

        Ok(resolution)
    }

    pub fn update_record(&mut self, record: &mut ProteinRecord) -> Result<()> {
        if let Some(uniprot_id) = record.uniprot_id.clone() {
            let resolution = self.resolve(IdType::UniProt, &uniprot_id)?;
            record.uniprot_status = new_status(record.uniprot_status, &resolution);
            match resolution {
                Resolution::Replaced(mapping) => {
                    record.replaced_uniprot_id = Some(uniprot_id);
                    record.uniprot_id = Some(mapping.new_id.into());
                    self.summary.replaced += 1;
                },
                Resolution::Unresolved(_) => self.summary.unresolved += 1,
                Resolution::Current => (),
            }
        } else {
            record.uniprot_status = IdStatus::Missing;
        }

        if let Some(pdb_id) = record.pdb_id.clone() {
            let resolution = self.resolve(IdType::Pdb, &pdb_id)?;
            record.pdb_status = new_status(record.pdb_status, &resolution);
            match resolution {
                Resolution::Replaced(mapping) => {
                    record.replaced_pdb_id = Some(pdb_id);
                    record.pdb_id = Some(mapping.new_id.into());
                    self.summary.replaced += 1;
                },
                Resolution::Unresolved(_) => self.summary.unresolved += 1,
                Resolution::Current => (),
            }
        } else {
            record.pdb_status = IdStatus::Missing;
        }

        Ok(())
    }

    pub fn summary(&self) -> &UpdateSummary {
        &self.summary
    }
}

// Bring every record's identifiers up to date.  Records are never dropped
// or merged, even when two end up with the same identifiers.
pub fn update_records<F: Fetch>(updater: &mut IdentifierUpdater<F>,
                                records: &mut [ProteinRecord]) -> Result<()> {
    for record in records.iter_mut() {
        updater.update_record(record)?;
    }

    let summary = updater.summary();
    info!("identifier update: {} lookups, {} identifiers replaced, {} unresolved",
          summary.lookups, summary.replaced, summary.unresolved);

    Ok(())
}
