use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use allobench::config::Config;
use allobench::fetch::{Fetch, FetchError};
use allobench::record::{IdStatus, ProteinRecord};

// Serves canned responses keyed by URL.  Unknown URLs give NotFound.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Result<Vec<u8>, FetchError>>,
    calls: RefCell<HashMap<String, usize>>,
}

#[allow(dead_code)]
impl FakeFetcher {
    pub fn new() -> FakeFetcher {
        FakeFetcher::default()
    }

    pub fn respond(&mut self, url: &str, body: &str) {
        self.responses.insert(url.to_owned(), Ok(body.as_bytes().to_vec()));
    }

    pub fn fail(&mut self, url: &str, err: FetchError) {
        self.responses.insert(url.to_owned(), Err(err));
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.borrow().get(url).cloned().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    fn response(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self.calls.borrow_mut().entry(url.to_owned()).or_insert(0) += 1;

        self.responses.get(url).cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound { url: url.to_owned() }))
    }
}

impl Fetch for FakeFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.response(url)
    }

    fn post_json(&self, url: &str, _: &serde_json::Value) -> Result<Vec<u8>, FetchError> {
        self.response(url)
    }
}

// A fetcher that behaves as if the network is down.
#[allow(dead_code)]
pub struct OfflineFetcher;

impl Fetch for OfflineFetcher {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Unreachable {
            url: url.to_owned(),
            attempts: 5,
            message: "connection refused".to_owned(),
        })
    }

    fn post_json(&self, url: &str, _: &serde_json::Value) -> Result<Vec<u8>, FetchError> {
        self.get_bytes(url)
    }
}

#[allow(dead_code)]
pub const UNIPROT_URL: &str = "https://uniprot.test";
#[allow(dead_code)]
pub const RCSB_DATA_URL: &str = "https://data.rcsb.test";
#[allow(dead_code)]
pub const RCSB_FILES_URL: &str = "https://files.rcsb.test";
#[allow(dead_code)]
pub const PDBE_URL: &str = "https://pdbe.test/api";
#[allow(dead_code)]
pub const MCSA_URL: &str = "https://mcsa.test/api";

#[allow(dead_code)]
pub fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::new(output_dir.join("asd"), output_dir);
    config.services.uniprot = UNIPROT_URL.to_owned();
    config.services.rcsb_data = RCSB_DATA_URL.to_owned();
    config.services.rcsb_files = RCSB_FILES_URL.to_owned();
    config.services.pdbe = PDBE_URL.to_owned();
    config.services.mcsa = MCSA_URL.to_owned();
    config
}

#[allow(dead_code)]
pub fn test_data_path(file_name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(file_name);
    path
}

#[allow(dead_code)]
pub fn make_record(asd_id: &str, uniprot_id: Option<&str>, pdb_id: Option<&str>) -> ProteinRecord {
    let mut record = ProteinRecord::new(asd_id.into());
    record.uniprot_id = uniprot_id.map(|id| id.into());
    record.pdb_id = pdb_id.map(|id| id.into());
    record.uniprot_status =
        if uniprot_id.is_some() { IdStatus::Unchecked } else { IdStatus::Missing };
    record.pdb_status =
        if pdb_id.is_some() { IdStatus::Unchecked } else { IdStatus::Missing };
    record
}
