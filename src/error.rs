use crate::operation::Channel;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanError {
    InvalidConfiguration(String),
    ResourceExhausted { pool: String, requested_ul: f64 },
    InvalidTipLifetime { channel: Channel, detail: String },
    Io(String),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {message}")
            }
            PlanError::ResourceExhausted { pool, requested_ul } => {
                write!(
                    f,
                    "source pool '{pool}' exhausted while drawing {requested_ul} uL"
                )
            }
            PlanError::InvalidTipLifetime { channel, detail } => {
                write!(f, "tip lifetime violation on {channel}: {detail}")
            }
            PlanError::Io(message) => write!(f, "io error: {message}"),
        }
    }
}

impl Error for PlanError {}

impl From<std::io::Error> for PlanError {
    fn from(err: std::io::Error) -> Self {
        PlanError::Io(err.to_string())
    }
}

impl From<csv::Error> for PlanError {
    fn from(err: csv::Error) -> Self {
        PlanError::Io(err.to_string())
    }
}
