//! Shared test data: the repository's sample patient and a hand-fitted
//! artifact set that scores it at the reference probability of 0.7615.

use ndarray::Array1;
use serde_json::{json, Value};

use crate::features::{
    named_sample, CategoricalEncoder, FeaturePipeline, FeatureVectorizer, MinMaxScaler,
};
use crate::model::{LogisticModel, Model};
use crate::predictor::Predictor;
use crate::record::PatientRecord;

pub const REFERENCE_MODEL: &str = "LogisticRegression";

pub fn sample_json() -> Value {
    json!({
        "Age": 40,
        "Sex": "M",
        "ChestPainType": "ATA",
        "RestingBP": 140,
        "Cholesterol": 289,
        "FastingBS": 0,
        "RestingECG": "Normal",
        "MaxHR": 172,
        "ExerciseAngina": "N",
        "Oldpeak": 0.0,
        "ST_Slope": "Up"
    })
}

pub fn sample_record() -> PatientRecord {
    record(40.0, "M", "ATA", 140.0, 289.0, 0.0, "Normal", 172.0, "N", 0.0, "Up")
}

pub fn low_risk_record() -> PatientRecord {
    record(30.0, "F", "ATA", 120.0, 200.0, 0.0, "Normal", 195.0, "N", -1.0, "Up")
}

#[allow(clippy::too_many_arguments)]
pub fn record(
    age: f64,
    sex: &str,
    chest_pain_type: &str,
    resting_bp: f64,
    cholesterol: f64,
    fasting_bs: f64,
    resting_ecg: &str,
    max_hr: f64,
    exercise_angina: &str,
    oldpeak: f64,
    st_slope: &str,
) -> PatientRecord {
    PatientRecord {
        age,
        sex: sex.into(),
        chest_pain_type: chest_pain_type.into(),
        resting_bp,
        cholesterol,
        fasting_bs,
        resting_ecg: resting_ecg.into(),
        max_hr,
        exercise_angina: exercise_angina.into(),
        oldpeak,
        st_slope: st_slope.into(),
    }
}

/// Records covering every label of every categorical column.
pub fn reference_records() -> Vec<PatientRecord> {
    vec![
        sample_record(),
        low_risk_record(),
        record(65.0, "M", "ASY", 160.0, 250.0, 1.0, "LVH", 110.0, "Y", 2.5, "Flat"),
        record(54.0, "F", "NAP", 130.0, 0.0, 0.0, "ST", 150.0, "N", 1.0, "Down"),
        record(77.0, "M", "TA", 200.0, 603.0, 1.0, "Normal", 60.0, "Y", 6.2, "Flat"),
        record(28.0, "F", "ASY", 0.0, 180.0, 0.0, "LVH", 202.0, "N", -2.6, "Up"),
    ]
}

pub fn reference_scaler() -> MinMaxScaler {
    MinMaxScaler::new(
        vec![28.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 60.0, 0.0, -2.6, 0.0],
        vec![77.0, 1.0, 3.0, 200.0, 603.0, 1.0, 2.0, 202.0, 1.0, 6.2, 2.0],
    )
    .unwrap()
}

pub fn reference_pipeline() -> FeaturePipeline {
    let encoder = CategoricalEncoder::fit(&reference_records()).unwrap();
    let vectorizer =
        FeatureVectorizer::fit(&[named_sample(Array1::<f64>::zeros(11).view())]).unwrap();
    FeaturePipeline::new(encoder, reference_scaler(), vectorizer)
}

/// Weights in vocabulary order: Age, ChestPainType, Cholesterol,
/// ExerciseAngina, FastingBS, MaxHR, Oldpeak, RestingBP, RestingECG,
/// ST_Slope, Sex.
pub fn reference_model() -> Model {
    Model::Logistic(LogisticModel::new(
        2.610788,
        vec![1.8, -0.9, -0.6, 1.1, 0.7, -1.5, 2.2, 0.4, 0.1, -2.0, 0.9],
    ))
}

pub fn reference_predictor() -> Predictor {
    Predictor::new(REFERENCE_MODEL, reference_pipeline(), reference_model())
}
