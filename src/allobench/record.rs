use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use serde_with::{serde_as, StringWithSeparator};
use serde_with::formats::{CommaSeparator, SemicolonSeparator};

use crate::bio::residue::ResidueSet;
use crate::errors::{CurationError, Result};
use crate::types::{AsdId, ChainId, PdbId, SeqPosition, UniProtAcc};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    #[serde(rename = "ASD")]
    Asd,
    #[serde(rename = "M-CSA")]
    Mcsa,
    #[serde(rename = "UniProt")]
    UniProt,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Source::Asd => "ASD",
            Source::Mcsa => "M-CSA",
            Source::UniProt => "UniProt",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Source, String> {
        match s.trim() {
            "ASD" => Ok(Source::Asd),
            "M-CSA" => Ok(Source::Mcsa),
            "UniProt" => Ok(Source::UniProt),
            _ => Err(format!("unknown source: {}", s)),
        }
    }
}

// how far an identifier has been confirmed against its database
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdStatus {
    #[default]
    Unchecked,
    Current,
    Replaced,
    Unresolved,
    Missing,
}

impl IdStatus {
    // true if the stored identifier is known to be a current one
    pub fn is_resolved(&self) -> bool {
        matches!(self, IdStatus::Current | IdStatus::Replaced)
    }
}

// one chain of a PDB entry and the UniProt accessions mapped to it,
// written "A:P12345" or "A:P12345|Q99999"
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainUniProt {
    pub chain: ChainId,
    pub uniprot_ids: Vec<UniProtAcc>,
}

impl fmt::Display for ChainUniProt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ids: Vec<&str> = self.uniprot_ids.iter().map(|id| id.as_str()).collect();
        write!(f, "{}:{}", self.chain, ids.join("|"))
    }
}

impl FromStr for ChainUniProt {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<ChainUniProt, String> {
        let (chain, ids) = s.trim().split_once(':')
            .ok_or_else(|| format!("can't parse chain mapping \"{}\"", s))?;
        if chain.is_empty() {
            return Err(format!("no chain in \"{}\"", s));
        }
        Ok(ChainUniProt {
            chain: chain.into(),
            uniprot_ids: ids.split('|').filter(|id| !id.is_empty()).map(UniProtAcc::from).collect(),
        })
    }
}

// One ASD allosteric site, with identifiers and residue annotation filled
// in by the later stages.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProteinRecord {
    #[serde(rename = "Protein ASD ID")]
    pub asd_id: AsdId,
    #[serde(rename = "Gene")]
    pub gene: Option<String>,
    #[serde(rename = "Organism")]
    pub organism: Option<String>,
    #[serde(rename = "UniProt ID")]
    pub uniprot_id: Option<UniProtAcc>,
    #[serde(rename = "PDB ID")]
    pub pdb_id: Option<PdbId>,
    #[serde(rename = "Protein Class")]
    pub protein_class: Option<String>,
    #[serde_as(as = "StringWithSeparator::<SemicolonSeparator, String>")]
    #[serde(rename = "EC Number")]
    pub ec_numbers: Vec<String>,
    #[serde(rename = "Modulator ASD ID")]
    pub modulator_asd_id: Option<String>,
    #[serde(rename = "Modulator Alias")]
    pub modulator_alias: Option<String>,
    #[serde(rename = "Modulator Chain")]
    pub modulator_chain: Option<String>,
    #[serde(rename = "Modulator Class")]
    pub modulator_class: Option<String>,
    #[serde(rename = "Allosteric Activity")]
    pub allosteric_activity: Option<String>,
    #[serde(rename = "Modulator Name")]
    pub modulator_name: Option<String>,
    #[serde(rename = "Modulator Residue ID")]
    pub modulator_residue: Option<String>,
    #[serde(rename = "ASD Function")]
    pub asd_function: Option<String>,
    #[serde(rename = "Position")]
    pub position: Option<String>,
    #[serde(rename = "PubMed")]
    pub pubmed_id: Option<String>,
    #[serde(rename = "Reference Title")]
    pub reference_title: Option<String>,
    #[serde(rename = "Site Overlap")]
    pub site_overlap: Option<String>,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, crate::bio::residue::Residue>")]
    #[serde(rename = "ASD Allosteric Site Residues")]
    pub allosteric_residues: ResidueSet,
    #[serde(rename = "Source")]
    pub source: Source,

    #[serde(rename = "UniProt ID Status")]
    pub uniprot_status: IdStatus,
    #[serde(rename = "Replaced UniProt ID")]
    pub replaced_uniprot_id: Option<UniProtAcc>,
    #[serde(rename = "PDB ID Status")]
    pub pdb_status: IdStatus,
    #[serde(rename = "Replaced PDB ID")]
    pub replaced_pdb_id: Option<PdbId>,

    #[serde(rename = "Protein Name")]
    pub protein_name: Option<String>,
    #[serde(rename = "Reviewed")]
    pub reviewed: Option<bool>,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, SeqPosition>")]
    #[serde(rename = "UniProt Active Site Positions")]
    pub uniprot_active_site_positions: BTreeSet<SeqPosition>,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, SeqPosition>")]
    #[serde(rename = "UniProt Binding Site Positions")]
    pub uniprot_binding_site_positions: BTreeSet<SeqPosition>,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, crate::bio::residue::Residue>")]
    #[serde(rename = "Active Site Residues")]
    pub active_site_residues: ResidueSet,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, Source>")]
    #[serde(rename = "Active Site Sources")]
    pub active_site_sources: BTreeSet<Source>,
    #[serde_as(as = "StringWithSeparator::<SemicolonSeparator, ChainUniProt>")]
    #[serde(rename = "Map PDB Chain to UniProt")]
    pub chain_uniprot_map: Vec<ChainUniProt>,
    #[serde(rename = "Oligomeric State")]
    pub oligomeric_state: Option<String>,
    #[serde(rename = "Stoichiometry")]
    pub stoichiometry: Option<String>,
    #[serde(rename = "Experimental Method")]
    pub experimental_method: Option<String>,
    #[serde(rename = "Resolution")]
    pub resolution: Option<f64>,
    #[serde(rename = "Structure File")]
    pub structure_file: Option<String>,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, crate::bio::residue::Residue>")]
    #[serde(rename = "Unmatched Allosteric Residues")]
    pub unmatched_allosteric_residues: ResidueSet,
    #[serde_as(as = "StringWithSeparator::<CommaSeparator, String>")]
    #[serde(rename = "Enrichment Issues")]
    pub enrichment_issues: BTreeSet<String>,
}

impl ProteinRecord {
    pub fn new(asd_id: AsdId) -> ProteinRecord {
        ProteinRecord {
            asd_id,
            gene: None,
            organism: None,
            uniprot_id: None,
            pdb_id: None,
            protein_class: None,
            ec_numbers: vec![],
            modulator_asd_id: None,
            modulator_alias: None,
            modulator_chain: None,
            modulator_class: None,
            allosteric_activity: None,
            modulator_name: None,
            modulator_residue: None,
            asd_function: None,
            position: None,
            pubmed_id: None,
            reference_title: None,
            site_overlap: None,
            allosteric_residues: BTreeSet::new(),
            source: Source::Asd,
            uniprot_status: IdStatus::Unchecked,
            replaced_uniprot_id: None,
            pdb_status: IdStatus::Unchecked,
            replaced_pdb_id: None,
            protein_name: None,
            reviewed: None,
            uniprot_active_site_positions: BTreeSet::new(),
            uniprot_binding_site_positions: BTreeSet::new(),
            active_site_residues: BTreeSet::new(),
            active_site_sources: BTreeSet::new(),
            chain_uniprot_map: vec![],
            oligomeric_state: None,
            stoichiometry: None,
            experimental_method: None,
            resolution: None,
            structure_file: None,
            unmatched_allosteric_residues: BTreeSet::new(),
            enrichment_issues: BTreeSet::new(),
        }
    }

    pub fn add_issue(&mut self, kind: &str) {
        self.enrichment_issues.insert(kind.to_owned());
    }
}

pub fn read_records(path: &Path) -> Result<Vec<ProteinRecord>> {
    if !path.exists() {
        return Err(CurationError::Fatal(format!("input file {} doesn't exist - has the \
                                                 previous stage been run?", path.display())));
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| CurationError::csv(path, err))?;

    let mut records = vec![];

    for result in csv_reader.deserialize() {
        let record: ProteinRecord = result.map_err(|err| CurationError::csv(path, err))?;
        records.push(record);
    }

    Ok(records)
}

pub fn write_csv<W: Write>(writer: W, records: &[ProteinRecord]) -> std::result::Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);

    for record in records {
        csv_writer.serialize(record)?;
    }

    csv_writer.flush()?;

    Ok(())
}

// Write all records to a temporary file next to `path`, then rename it into
// place so a failed run never leaves a partial output file.
pub fn write_records(path: &Path, records: &[ProteinRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
        _ => Path::new(".").to_owned(),
    };

    fs::create_dir_all(&dir).map_err(|err| CurationError::io(&dir, err))?;

    let temp_file = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|err| CurationError::io(&dir, err))?;

    write_csv(temp_file.as_file(), records).map_err(|err| CurationError::csv(path, err))?;

    temp_file.persist(path).map_err(|err| CurationError::io(path, err.error))?;

    info!("wrote {} records to {}", records.len(), path.display());

    Ok(())
}
