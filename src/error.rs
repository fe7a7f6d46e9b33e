//! Error types for the boundary layers (configuration, price data, I/O).
//!
//! The planner itself never fails: degraded inputs become conservative plans.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("invalid price data: {0}")]
    PriceData(String),

    #[error("invalid time \"{value}\": expected HH:MM")]
    TimeOfDay { value: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, Error>;
