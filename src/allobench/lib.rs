extern crate regex;
extern crate serde_json;
extern crate reqwest;
extern crate flate2;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate serde_derive;
#[macro_use] extern crate tracing;

pub mod types;
pub mod errors;
pub mod config;
pub mod bio;
pub mod record;
pub mod fetch;
pub mod uniprot;
pub mod mcsa;
pub mod pdb;
pub mod asd;
pub mod update;
pub mod enrich;
pub mod partition;
pub mod pipeline;
