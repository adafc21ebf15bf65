//! Offline training: fit the feature artifacts on the heart dataset, train the
//! candidate models, rate them and keep the ones rated good.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use ndarray::{Array2, Axis};
use rand::prelude::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use structopt::StructOpt;

use crate::artifacts;
use crate::features::{
    named_sample, CategoricalEncoder, FeaturePipeline, FeatureVectorizer, MinMaxScaler, Sample,
};
use crate::model::{DecisionStump, LogisticModel, Model, RandomForest};
use crate::record::{PatientRecord, TARGET_COLUMN};

const TEST_FRACTION: f64 = 0.2;
const VALIDATION_FRACTION: f64 = 0.25;
const MIN_ROWS: usize = 10;
const FOREST_TREES: usize = 10;

#[derive(Debug, StructOpt)]
pub struct TrainOptions {
    /// Heart dataset CSV with a HeartDisease column
    #[structopt(long, parse(from_os_str))]
    pub data: PathBuf,
    /// Directory the fitted artifacts are written to
    #[structopt(long, parse(from_os_str), default_value = "models")]
    pub out: PathBuf,
    /// Seed of the train/validation/test shuffle
    #[structopt(long, default_value = "42")]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Bad,
    Middle,
    Good,
    Overfit,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rating::Bad => "bad",
            Rating::Middle => "middle",
            Rating::Good => "good",
            Rating::Overfit => "overfit",
        };
        f.write_str(name)
    }
}

/// Rates a model from its train, test and validation accuracy.
pub fn rate(train: f64, test: f64, validation: f64) -> Rating {
    let scores = [train, test, validation];
    if scores.iter().all(|&s| s <= 0.65) {
        Rating::Bad
    } else if scores.iter().all(|&s| s > 0.65 && s < 0.80) {
        Rating::Middle
    } else if scores.iter().all(|&s| (0.80..=0.999).contains(&s)) {
        Rating::Good
    } else {
        Rating::Overfit
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelScore {
    pub name: &'static str,
    pub train: f64,
    pub test: f64,
    pub validation: f64,
    pub rating: Rating,
}

impl fmt::Display for ModelScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} train {:>6.2}%  test {:>6.2}%  val {:>6.2}%  {}",
            self.name,
            self.train * 100.0,
            self.test * 100.0,
            self.validation * 100.0,
            self.rating
        )
    }
}

#[derive(Debug)]
pub struct TrainReport {
    pub scores: Vec<ModelScore>,
    /// Model artifacts written, one per model rated good.
    pub saved: Vec<PathBuf>,
}

/// Row indices of each split.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// Shuffles, holds out 20% for test, then 25% of the rest for validation.
    pub fn shuffled(rows: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..rows).collect();
        indices.shuffle(&mut rng);
        let n_test = (rows as f64 * TEST_FRACTION).ceil() as usize;
        let mut rest = indices.split_off(n_test);
        let test = indices;
        rest.shuffle(&mut rng);
        let n_validation = (rest.len() as f64 * VALIDATION_FRACTION).ceil() as usize;
        let train = rest.split_off(n_validation);
        Self {
            train,
            validation: rest,
            test,
        }
    }
}

pub fn run(opts: &TrainOptions) -> Result<TrainReport> {
    let (records, labels) = load_dataset(&opts.data)?;
    log::info!("Read {} rows from {}", records.len(), opts.data.display());
    let split = Split::shuffled(records.len(), opts.seed);
    train_and_save(&records, &labels, &split, &opts.out, opts.seed)
}

pub fn load_dataset(path: &Path) -> Result<(Vec<PatientRecord>, Vec<u8>)> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_dataset(file)
}

/// Parses the heart CSV into records and their 0/1 targets.
pub fn read_dataset<R: Read>(input: R) -> Result<(Vec<PatientRecord>, Vec<u8>)> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    let target = headers
        .iter()
        .position(|h| h == TARGET_COLUMN)
        .ok_or_else(|| anyhow!("dataset has no {TARGET_COLUMN} column"))?;

    let mut records = Vec::new();
    let mut labels = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let record: PatientRecord = row
            .deserialize(Some(&headers))
            .with_context(|| format!("row {}", line + 1))?;
        let label = match row.get(target).map(str::trim) {
            Some("0") => 0,
            Some("1") => 1,
            other => bail!("row {}: {TARGET_COLUMN} must be 0 or 1, got {:?}", line + 1, other),
        };
        records.push(record);
        labels.push(label);
    }
    Ok((records, labels))
}

fn select(labels: &[u8], indices: &[usize]) -> Vec<u8> {
    indices.iter().map(|&i| labels[i]).collect()
}

/// Fits the artifacts on `split`, scores the candidate models and writes
/// the feature artifacts plus every model rated good into `out`. `seed` drives
/// the forest's bootstrap samples.
pub fn train_and_save(
    records: &[PatientRecord],
    labels: &[u8],
    split: &Split,
    out: &Path,
    seed: u64,
) -> Result<TrainReport> {
    ensure!(
        records.len() >= MIN_ROWS,
        "need at least {MIN_ROWS} rows to train, got {}",
        records.len()
    );
    ensure!(records.len() == labels.len(), "records and labels differ in length");
    ensure!(
        !split.train.is_empty() && !split.validation.is_empty() && !split.test.is_empty(),
        "every split needs at least one row"
    );

    // The encoder sees every row; scaler and vectorizer only the training split.
    let encoder = CategoricalEncoder::fit(records)?;
    let encoded = encoder.encode_all(records)?;
    let encoded_train = encoded.select(Axis(0), &split.train);
    let scaler = MinMaxScaler::fit(&encoded_train)?;
    let samples: Vec<Sample> = scaler
        .transform_all(&encoded_train)?
        .rows()
        .into_iter()
        .map(named_sample)
        .collect();
    let vectorizer = FeatureVectorizer::fit(&samples)?;
    let pipeline = FeaturePipeline::new(encoder, scaler, vectorizer);

    let x_train = pipeline.matrix(&encoded_train)?;
    let x_val = pipeline.matrix(&encoded.select(Axis(0), &split.validation))?;
    let x_test = pipeline.matrix(&encoded.select(Axis(0), &split.test))?;
    let (y_train, y_val, y_test) = (
        select(labels, &split.train),
        select(labels, &split.validation),
        select(labels, &split.test),
    );
    log::info!(
        "Split {} train / {} validation / {} test rows, {} features",
        x_train.nrows(),
        x_val.nrows(),
        x_test.nrows(),
        x_train.ncols()
    );

    let candidates = vec![
        Model::Logistic(LogisticModel::train(&x_train, &y_train)?),
        Model::Stump(DecisionStump::train(&x_train, &y_train)?),
        Model::Forest(RandomForest::train(&x_train, &y_train, FOREST_TREES, seed)?),
    ];

    let evaluate = |model: &Model, x: &Array2<f64>, y: &[u8]| model.score(x, y);
    let mut scores = Vec::with_capacity(candidates.len());
    for model in &candidates {
        let train = evaluate(model, &x_train, &y_train)?;
        let test = evaluate(model, &x_test, &y_test)?;
        let validation = evaluate(model, &x_val, &y_val)?;
        let score = ModelScore {
            name: model.kind(),
            train,
            test,
            validation,
            rating: rate(train, test, validation),
        };
        log::info!("{}", score);
        scores.push(score);
    }

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let mut saved = Vec::new();
    for (model, score) in candidates.iter().zip(&scores) {
        if score.rating == Rating::Good {
            let path = artifacts::save_model(out, score.name, model)?;
            log::info!("Saved {} to {}", score.name, path.display());
            saved.push(path);
        }
    }
    if saved.is_empty() {
        log::warn!("No model rated good; only feature artifacts were written.");
    }
    artifacts::save_pipeline(out, &pipeline)?;

    Ok(TrainReport { scores, saved })
}
