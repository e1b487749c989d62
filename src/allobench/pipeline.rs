use std::fmt;
use std::str::FromStr;

use crate::asd::load_asd;
use crate::config::Config;
use crate::enrich::{enrich_records, Enricher};
use crate::errors::Result;
use crate::fetch::Fetch;
use crate::partition::{partition, read_reference_set, ReferenceSet};
use crate::record::{read_records, write_records};
use crate::update::{update_records, IdentifierUpdater};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Update,
    Enrich,
    Partition,
    All,
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Stage, String> {
        match s.to_lowercase().as_str() {
            "load" => Ok(Stage::Load),
            "update" => Ok(Stage::Update),
            "enrich" => Ok(Stage::Enrich),
            "partition" => Ok(Stage::Partition),
            "all" => Ok(Stage::All),
            _ => Err(format!("unknown stage \"{}\", expected one of: load, update, enrich, \
                              partition, all", s)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Update => "update",
            Stage::Enrich => "enrich",
            Stage::Partition => "partition",
            Stage::All => "all",
        };
        write!(f, "{}", name)
    }
}

// ASD archive -> AlloBench.csv
pub fn run_load(config: &Config) -> Result<()> {
    let (records, _) = load_asd(&config.asd_archive)?;
    write_records(&config.loaded_path(), &records)
}

// AlloBench.csv -> ASD_Updated.csv
pub fn run_update<F: Fetch>(config: &Config, fetcher: &F) -> Result<()> {
    let mut records = read_records(&config.loaded_path())?;

    let mut updater = IdentifierUpdater::new(fetcher, &config.services.uniprot,
                                             &config.services.rcsb_data,
                                             config.max_consecutive_network_failures);
    update_records(&mut updater, &mut records)?;

    write_records(&config.updated_path(), &records)
}

// ASD_Updated.csv -> ASD_Enriched.csv
pub fn run_enrich<F: Fetch>(config: &Config, fetcher: &F) -> Result<()> {
    let mut records = read_records(&config.updated_path())?;

    let mut enricher = Enricher::new(fetcher, config)?;
    enrich_records(&mut enricher, &mut records)?;

    write_records(&config.enriched_path(), &records)
}

// ASD_Enriched.csv -> AlloBench_Benchmark.csv
pub fn run_partition(config: &Config) -> Result<()> {
    let records = read_records(&config.enriched_path())?;

    let reference_sets: Vec<ReferenceSet> =
        config.reference_sets.iter()
        .map(read_reference_set)
        .collect::<Result<_>>()?;

    if reference_sets.is_empty() {
        warn!("no reference sets configured, the benchmark will contain every record");
    }

    let kept = partition(records, &reference_sets);

    write_records(&config.benchmark_path(), &kept)
}

pub fn run_stage<F: Fetch>(stage: Stage, config: &Config, fetcher: &F) -> Result<()> {
    info!("running stage: {}", stage);

    match stage {
        Stage::Load => run_load(config),
        Stage::Update => run_update(config, fetcher),
        Stage::Enrich => run_enrich(config, fetcher),
        Stage::Partition => run_partition(config),
        Stage::All => {
            for stage in [Stage::Load, Stage::Update, Stage::Enrich, Stage::Partition] {
                run_stage(stage, config, fetcher)?;
            }
            Ok(())
        },
    }
}

#[test]
fn test_stage_from_str() {
    assert_eq!("enrich".parse::<Stage>().unwrap(), Stage::Enrich);
    assert_eq!("ALL".parse::<Stage>().unwrap(), Stage::All);
    assert!("download".parse::<Stage>().is_err());
}
