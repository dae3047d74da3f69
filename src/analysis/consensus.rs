//! Consensus over task run submissions.
//!
//! `analyse` is a pure function of its inputs: no I/O, no hidden state. Running
//! it twice on the same runs and settings yields the same output, which is what
//! makes concurrent re-analysis of one task safe under last-writer-wins updates.

use super::normalize::comparison_key;
use super::types::ConsensusSettings;
use crate::client::types::{FieldValue, InfoMap, ResultStatus};

use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// There were no task runs, so there is nothing to reconcile.
    NothingToAnalyse,
    Consensus(Consensus),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    /// Winning value for every field that reached the threshold.
    pub info: InfoMap,
    /// Fields seen in the runs that did not reach the threshold, left for a human.
    pub unresolved: Vec<String>,
    pub total_runs: usize,
}

impl Consensus {
    /// `Unverified` when nothing could be agreed but there was something to agree on.
    pub fn status(&self) -> ResultStatus {
        if self.info.is_empty() && !self.unresolved.is_empty() {
            ResultStatus::Unverified
        } else {
            ResultStatus::Analysed
        }
    }
}

/// Votes for one distinct (normalized) value of a field.
struct Vote<'a> {
    key: String,
    /// The first submitted form of this value; it is what ends up in the result.
    value: &'a FieldValue,
    count: usize,
}

/// Reconciles the field maps of one task's runs, given in submission order.
pub fn analyse(runs: &[InfoMap], settings: &ConsensusSettings) -> Analysis {
    if runs.is_empty() {
        return Analysis::NothingToAnalyse;
    }

    let fields: BTreeSet<&String> = runs
        .iter()
        .flat_map(|run| run.keys())
        .filter(|key| !settings.excluded_keys.contains(*key))
        .collect();

    let mut info = InfoMap::new();
    let mut unresolved = Vec::new();

    for field in fields {
        match winning_value(runs, field, settings) {
            Some(value) => {
                info.insert(field.clone(), value.clone());
            }
            None => unresolved.push(field.clone()),
        }
    }

    Analysis::Consensus(Consensus {
        info,
        unresolved,
        total_runs: runs.len(),
    })
}

/// The most agreed-upon value for `field`, if it meets the match percentage.
///
/// Every run counts towards the total, including runs that left the field out
/// or gave a blank answer. Ties go to the value submitted first.
fn winning_value<'a>(
    runs: &'a [InfoMap],
    field: &str,
    settings: &ConsensusSettings,
) -> Option<&'a FieldValue> {
    let mut votes: Vec<Vote<'a>> = Vec::new();

    for value in runs.iter().filter_map(|run| run.get(field)) {
        let Some(key) = comparison_key(value, &settings.normalization) else {
            continue;
        };
        match votes.iter_mut().find(|vote| vote.key == key) {
            Some(vote) => vote.count += 1,
            None => votes.push(Vote {
                key,
                value,
                count: 1,
            }),
        }
    }

    let mut best: Option<&Vote<'a>> = None;
    for vote in &votes {
        if best.is_none_or(|b| vote.count > b.count) {
            best = Some(vote);
        }
    }

    let best = best?;
    if settings.match_percentage.is_met(best.count, runs.len()) {
        Some(best.value)
    } else {
        tracing::trace!(
            "Field '{}' has no consensus ({} of {} runs agree at best)",
            field,
            best.count,
            runs.len()
        );
        None
    }
}
