#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::Parser;
use std::path::PathBuf;
use std::process;

use cohortfit::config::AnalysisConfig;
use cohortfit::pipeline;

#[derive(Parser)]
#[command(
    name = "cohortfit",
    version,
    about = "Logistic regression analysis of a survey cohort: fit, diagnose and evaluate"
)]
struct Cli {
    /// Path to the delimited survey extract (header row required)
    #[arg(value_name = "DATA")]
    data: PathBuf,

    /// TOML analysis configuration; defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { data, config } = Cli::parse();

    let result = load_config(config).and_then(|config| {
        pipeline::run(&data, &config)
            .map(|_| ())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            log::info!("Reading configuration from '{}'", path.display());
            Ok(AnalysisConfig::load(&path)?)
        }
        None => Ok(AnalysisConfig::default()),
    }
}
