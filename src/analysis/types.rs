//! Analysis Data Types
//!
//! Consensus settings travel inside every job payload, so they are plain
//! serializable values fixed at enqueue time.

use crate::error::AnalystError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum share of task runs (0-100 %) that must agree on a value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub struct MatchPercentage(u8);

impl MatchPercentage {
    pub fn new(percent: u8) -> Result<Self, AnalystError> {
        if percent > 100 {
            return Err(AnalystError::Validation(format!(
                "match percentage must be between 0 and 100, got {}",
                percent
            )));
        }
        Ok(Self(percent))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// True when `agreeing` out of `total` runs meets the threshold.
    /// Integer arithmetic, so exactly `ceil(p/100 * total)` runs always pass.
    pub fn is_met(self, agreeing: usize, total: usize) -> bool {
        total > 0 && (agreeing as u64) * 100 >= u64::from(self.0) * total as u64
    }
}

impl TryFrom<u8> for MatchPercentage {
    type Error = AnalystError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        Self::new(percent)
    }
}

impl From<MatchPercentage> for u8 {
    fn from(percent: MatchPercentage) -> Self {
        percent.0
    }
}

/// How values are canonicalised before they are compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Normalization {
    /// Strip leading and trailing whitespace.
    pub trim: bool,
    /// Fold internal runs of whitespace into one space.
    pub collapse_whitespace: bool,
    /// Compare text case-insensitively.
    pub case_insensitive: bool,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            trim: true,
            collapse_whitespace: true,
            case_insensitive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsensusSettings {
    pub match_percentage: MatchPercentage,
    #[serde(default)]
    pub excluded_keys: BTreeSet<String>,
    #[serde(default)]
    pub normalization: Normalization,
}

impl ConsensusSettings {
    pub fn new(match_percentage: MatchPercentage) -> Self {
        Self {
            match_percentage,
            excluded_keys: BTreeSet::new(),
            normalization: Normalization::default(),
        }
    }

    pub fn excluding<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_keys.extend(keys.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyseRequest {
    pub project_short_name: String,
    pub task_id: u64,
}

#[derive(Debug, Serialize)]
pub struct AnalyseResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NextResultParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NextResultResponse {
    pub result_id: u64,
    pub task_id: u64,
}
