//! Heart-failure risk service.
//!
//! - Patient records deserialized from JSON or the training CSV (`record`)
//! - Fitted encoder, min/max scaler and vectorizer (`features`)
//! - Logistic regression via Linfa and a depth-one decision tree (`model`)
//! - Bincode artifacts shared by trainer and server (`artifacts`)
//! - `POST /predict` over axum (`server`)

pub mod artifacts;
pub mod config;
pub mod features;
pub mod model;
pub mod predictor;
pub mod record;
pub mod server;
pub mod train;

#[cfg(test)]
mod fixtures;
