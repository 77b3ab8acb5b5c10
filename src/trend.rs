use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Net direction of a series, decided by the sign of `last_close - first_close`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Uptrend,
    Downtrend,
    Flat,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Uptrend => write!(f, "Uptrend"),
            Trend::Downtrend => write!(f, "Downtrend"),
            Trend::Flat => write!(f, "Flat"),
        }
    }
}

/// Sign test only, no magnitude threshold.
pub fn classify(closes: &[f64]) -> Result<Trend> {
    if closes.len() < 2 {
        return Err(AnalysisError::insufficient("trend", 2, closes.len()));
    }
    let slope = closes[closes.len() - 1] - closes[0];
    Ok(if slope > 0.0 {
        Trend::Uptrend
    } else if slope < 0.0 {
        Trend::Downtrend
    } else {
        Trend::Flat
    })
}
