use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{CurationError, Result};
use crate::types::ReferenceSetName;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ServiceUrls {
    #[serde(default = "default_uniprot_url")]
    pub uniprot: String,
    // REST holdings and GraphQL
    #[serde(default = "default_rcsb_data_url")]
    pub rcsb_data: String,
    // structure file downloads
    #[serde(default = "default_rcsb_files_url")]
    pub rcsb_files: String,
    // SIFTS residue mappings
    #[serde(default = "default_pdbe_url")]
    pub pdbe: String,
    #[serde(default = "default_mcsa_url")]
    pub mcsa: String,
}

fn default_uniprot_url() -> String { "https://rest.uniprot.org".to_owned() }
fn default_rcsb_data_url() -> String { "https://data.rcsb.org".to_owned() }
fn default_rcsb_files_url() -> String { "https://files.rcsb.org".to_owned() }
fn default_pdbe_url() -> String { "https://www.ebi.ac.uk/pdbe/api".to_owned() }
fn default_mcsa_url() -> String { "https://www.ebi.ac.uk/thornton-srv/m-csa/api".to_owned() }

impl Default for ServiceUrls {
    fn default() -> ServiceUrls {
        ServiceUrls {
            uniprot: default_uniprot_url(),
            rcsb_data: default_rcsb_data_url(),
            rcsb_files: default_rcsb_files_url(),
            pdbe: default_pdbe_url(),
            mcsa: default_mcsa_url(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 { 5 }
fn default_base_delay_ms() -> u64 { 1000 }
fn default_max_delay_ms() -> u64 { 60_000 }

impl Default for RetryConfig {
    fn default() -> RetryConfig {
        RetryConfig {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// the training set of an existing prediction tool, one identifier per line
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ReferenceSetConfig {
    pub name: ReferenceSetName,
    pub file: PathBuf,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct OutputFileNames {
    #[serde(default = "default_loaded_file")]
    pub loaded: String,
    #[serde(default = "default_updated_file")]
    pub updated: String,
    #[serde(default = "default_enriched_file")]
    pub enriched: String,
    #[serde(default = "default_benchmark_file")]
    pub benchmark: String,
}

fn default_loaded_file() -> String { "AlloBench.csv".to_owned() }
fn default_updated_file() -> String { "ASD_Updated.csv".to_owned() }
fn default_enriched_file() -> String { "ASD_Enriched.csv".to_owned() }
fn default_benchmark_file() -> String { "AlloBench_Benchmark.csv".to_owned() }

impl Default for OutputFileNames {
    fn default() -> OutputFileNames {
        OutputFileNames {
            loaded: default_loaded_file(),
            updated: default_updated_file(),
            enriched: default_enriched_file(),
            benchmark: default_benchmark_file(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    // a .tar.gz of ASD XML files or a directory of XML files
    pub asd_archive: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    // relative paths are resolved against output_dir
    #[serde(default = "default_structure_dir")]
    pub structure_dir: PathBuf,
    #[serde(default = "default_mcsa_cache_file")]
    pub mcsa_cache_file: PathBuf,
    #[serde(default)]
    pub output_files: OutputFileNames,
    #[serde(skip_serializing_if="Vec::is_empty", default)]
    pub reference_sets: Vec<ReferenceSetConfig>,
    #[serde(default)]
    pub services: ServiceUrls,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_pdb_batch_size")]
    pub pdb_batch_size: usize,
    // after this many lookups in a row fail on transport errors the run is
    // halted
    #[serde(default = "default_max_consecutive_network_failures")]
    pub max_consecutive_network_failures: usize,
}

fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_structure_dir() -> PathBuf { PathBuf::from("pdb_structures") }
fn default_mcsa_cache_file() -> PathBuf { PathBuf::from("mcsa_residues.json") }
fn default_request_timeout_secs() -> u64 { 120 }
fn default_pdb_batch_size() -> usize { 20 }
fn default_max_consecutive_network_failures() -> usize { 3 }

impl Config {
    pub fn new(asd_archive: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Config {
        Config {
            asd_archive: asd_archive.into(),
            output_dir: output_dir.into(),
            structure_dir: default_structure_dir(),
            mcsa_cache_file: default_mcsa_cache_file(),
            output_files: OutputFileNames::default(),
            reference_sets: vec![],
            services: ServiceUrls::default(),
            retry: RetryConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            pdb_batch_size: default_pdb_batch_size(),
            max_consecutive_network_failures: default_max_consecutive_network_failures(),
        }
    }

    pub fn read(config_file_name: &Path) -> Result<Config> {
        let file = File::open(config_file_name)
            .map_err(|err| CurationError::Fatal(format!("Failed to read {}: {}",
                                                        config_file_name.display(), err)))?;
        let reader = BufReader::new(file);

        serde_json::from_reader(reader)
            .map_err(|err| CurationError::Fatal(format!("failed to parse {}: {}",
                                                        config_file_name.display(), err)))
    }

    fn in_output_dir(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.output_dir.join(path)
        }
    }

    pub fn structure_dir(&self) -> PathBuf {
        self.in_output_dir(&self.structure_dir)
    }

    pub fn mcsa_cache_path(&self) -> PathBuf {
        self.in_output_dir(&self.mcsa_cache_file)
    }

    pub fn loaded_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_files.loaded)
    }

    pub fn updated_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_files.updated)
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_files.enriched)
    }

    pub fn benchmark_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_files.benchmark)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[test]
fn test_config_defaults() {
    let config: Config =
        serde_json::from_str(r#"{ "asd_archive": "ASD_Release_202306_XF.tar.gz",
                                  "output_dir": "out",
                                  "retry": { "max_retries": 2 } }"#).unwrap();

    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert_eq!(config.services.uniprot, "https://rest.uniprot.org");
    assert_eq!(config.loaded_path(), PathBuf::from("out/AlloBench.csv"));
    assert_eq!(config.structure_dir(), PathBuf::from("out/pdb_structures"));
    assert_eq!(config.pdb_batch_size, 20);
    assert!(config.reference_sets.is_empty());
}
