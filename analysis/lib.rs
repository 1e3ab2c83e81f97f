//! Logistic risk modelling and ROC threshold evaluation for survey extracts.

pub mod config;
pub mod data;
pub mod diagnostics;
pub mod estimate;
pub mod evaluate;
pub mod faer_ndarray;
pub mod matrix;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod split;
pub mod summary;
pub mod types;
