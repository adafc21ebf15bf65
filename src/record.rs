use serde::{Deserialize, Serialize};

/// Record columns in the order the scaler was fitted on.
pub const COLUMNS: [&str; 11] = [
    "Age",
    "Sex",
    "ChestPainType",
    "RestingBP",
    "Cholesterol",
    "FastingBS",
    "RestingECG",
    "MaxHR",
    "ExerciseAngina",
    "Oldpeak",
    "ST_Slope",
];

/// Columns carrying labels rather than measurements.
pub const CATEGORICAL_COLUMNS: [&str; 5] =
    ["Sex", "ChestPainType", "RestingECG", "ExerciseAngina", "ST_Slope"];

/// Target column of the training CSV.
pub const TARGET_COLUMN: &str = "HeartDisease";

/// One patient as received by `/predict` or read from a training CSV row.
///
/// Every field is required; a missing field or a value of the wrong kind
/// fails deserialization. Unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "Sex")]
    pub sex: String,
    #[serde(rename = "ChestPainType")]
    pub chest_pain_type: String,
    #[serde(rename = "RestingBP")]
    pub resting_bp: f64,
    #[serde(rename = "Cholesterol")]
    pub cholesterol: f64,
    #[serde(rename = "FastingBS")]
    pub fasting_bs: f64,
    #[serde(rename = "RestingECG")]
    pub resting_ecg: String,
    #[serde(rename = "MaxHR")]
    pub max_hr: f64,
    #[serde(rename = "ExerciseAngina")]
    pub exercise_angina: String,
    #[serde(rename = "Oldpeak")]
    pub oldpeak: f64,
    #[serde(rename = "ST_Slope")]
    pub st_slope: String,
}

/// Raw value of a single record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Label(&'a str),
}

impl PatientRecord {
    /// Fields paired with their column names, in `COLUMNS` order.
    pub fn fields(&self) -> [(&'static str, FieldValue<'_>); 11] {
        use FieldValue::{Label, Number};
        [
            ("Age", Number(self.age)),
            ("Sex", Label(&self.sex)),
            ("ChestPainType", Label(&self.chest_pain_type)),
            ("RestingBP", Number(self.resting_bp)),
            ("Cholesterol", Number(self.cholesterol)),
            ("FastingBS", Number(self.fasting_bs)),
            ("RestingECG", Label(&self.resting_ecg)),
            ("MaxHR", Number(self.max_hr)),
            ("ExerciseAngina", Label(&self.exercise_angina)),
            ("Oldpeak", Number(self.oldpeak)),
            ("ST_Slope", Label(&self.st_slope)),
        ]
    }

    /// Label stored in a categorical column, `None` for numeric or unknown columns.
    pub fn label(&self, column: &str) -> Option<&str> {
        self.fields().into_iter().find_map(|(name, value)| match value {
            FieldValue::Label(label) if name == column => Some(label),
            _ => None,
        })
    }
}
