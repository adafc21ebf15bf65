//! Heart-failure prediction service and trainer.
//! - `serve`: loads the fitted artifacts and answers `POST /predict`
//! - `train`: fits encoder, scaler, vectorizer and candidate models from the
//!   heart CSV and writes the artifacts of every model rated good

use anyhow::Result;
use heart_failure::config::ServiceConfig;
use heart_failure::train::{self, TrainOptions};
use heart_failure::{artifacts, server};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "heart_failure")]
enum Cli {
    /// Serve predictions over HTTP
    Serve {
        /// Path to config file
        #[structopt(short, long, parse(from_os_str), default_value = "heart_failure.toml")]
        config: PathBuf,
    },
    /// Train, rate and save models
    Train(TrainOptions),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    match Cli::from_args() {
        Cli::Serve { config } => {
            let cfg = ServiceConfig::load(&config)?;
            let predictor = artifacts::load(&cfg.artifact_dir, cfg.model_name()?)?;
            server::serve(&cfg, predictor).await
        }
        Cli::Train(opts) => {
            let report = train::run(&opts)?;
            for score in &report.scores {
                println!("{score}");
            }
            for path in &report.saved {
                println!("saved {}", path.display());
            }
            Ok(())
        }
    }
}
