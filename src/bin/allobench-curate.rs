extern crate allobench;

use std::env;
use std::path::Path;
use std::process;

use anyhow::Context;
use getopts::Options;
use tracing_subscriber::EnvFilter;

use allobench::config::Config;
use allobench::fetch::HttpFetcher;
use allobench::pipeline::{run_stage, Stage};

fn usage_message(program: &str) -> String {
    format!("Usage: {} -c CONFIG_FILE [options] STAGE

Builds the AlloBench allosteric site dataset from an ASD release.
STAGE is one of:
  load       read the ASD archive and write the raw dataset
  update     replace obsolete UniProt and PDB identifiers
  enrich     add UniProt, M-CSA and PDB annotation
  partition  remove entries found in the configured reference sets
  all        run every stage in order

Each stage reads the output file of the previous one.
",
            program)
}

fn print_usage(program: &str, opts: &Options) {
    let message = usage_message(program);
    print!("{}", opts.usage(&message));
}

fn eprint_usage(program: &str, opts: &Options) {
    let message = usage_message(program);
    eprint!("{}", opts.usage(&message));
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "print this help message");
    opts.optflag("v", "verbose", "log each request and other details");
    opts.optopt("c", "config", "configuration file name", "FILE");

    let program = args.remove(0);

    let matches = match opts.parse(&args) {
        Ok(m) => m,
        Err(e) => {
            eprint_usage(&program, &opts);
            eprintln!("\noption error: {}", e);
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        print_usage(&program, &opts);
        process::exit(0);
    }

    let Some(config_file_name) = matches.opt_str("config") else {
        eprintln!("no --config|-c option");
        eprint_usage(&program, &opts);
        process::exit(1);
    };

    let stage: Stage = match matches.free.first() {
        Some(stage_name) => match stage_name.parse() {
            Ok(stage) => stage,
            Err(err) => {
                eprintln!("{}\n", err);
                eprint_usage(&program, &opts);
                process::exit(1);
            },
        },
        None => {
            eprintln!("missing STAGE argument\n");
            eprint_usage(&program, &opts);
            process::exit(1);
        },
    };

    let level = if matches.opt_present("verbose") { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(format!("allobench={},allobench_curate={}", level, level))
                .context("failed to create log filter")?,
        )
        .init();

    let config = Config::read(Path::new(&config_file_name))?;

    let fetcher = HttpFetcher::new(&config)?;

    run_stage(stage, &config, &fetcher)
        .with_context(|| format!("stage \"{}\" failed", stage))?;

    Ok(())
}
