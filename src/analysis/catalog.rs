//! Analyzer Catalog
//!
//! Maps project categories to the consensus settings used when a task in that
//! category is analysed automatically. Projects in categories without a rule
//! are not analysed automatically.

use super::types::{ConsensusSettings, MatchPercentage};
use crate::error::AnalystError;

use std::collections::HashMap;
use std::str::FromStr;

/// One `--category` rule: `ID[:PCT[:key|key...]]`.
///
/// Missing parts fall back to the global match percentage and excluded keys.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRule {
    pub category_id: u64,
    pub match_percentage: Option<MatchPercentage>,
    pub excluded_keys: Option<Vec<String>>,
}

impl FromStr for CategoryRule {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, ':');
        let invalid = |what: &str| AnalystError::Validation(format!("category rule '{}': {}", s, what));

        let category_id = parts
            .next()
            .and_then(|id| id.trim().parse::<u64>().ok())
            .ok_or_else(|| invalid("category id must be a number"))?;

        let match_percentage = match parts.next().map(str::trim).filter(|p| !p.is_empty()) {
            Some(pct) => {
                let pct: u8 = pct
                    .parse()
                    .map_err(|_| invalid("match percentage must be a number"))?;
                Some(MatchPercentage::new(pct)?)
            }
            None => None,
        };

        let excluded_keys = parts.next().map(|keys| {
            keys.split('|')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect()
        });

        Ok(Self {
            category_id,
            match_percentage,
            excluded_keys,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerCatalog {
    defaults: ConsensusSettings,
    categories: HashMap<u64, ConsensusSettings>,
}

impl AnalyzerCatalog {
    pub fn new(defaults: ConsensusSettings) -> Self {
        Self {
            defaults,
            categories: HashMap::new(),
        }
    }

    pub fn from_rules(defaults: ConsensusSettings, rules: &[CategoryRule]) -> Self {
        let mut catalog = Self::new(defaults);
        for rule in rules {
            catalog.add_rule(rule);
        }
        catalog
    }

    pub fn add_rule(&mut self, rule: &CategoryRule) {
        let mut settings = self.defaults.clone();
        if let Some(pct) = rule.match_percentage {
            settings.match_percentage = pct;
        }
        if let Some(keys) = &rule.excluded_keys {
            settings.excluded_keys = keys.iter().cloned().collect();
        }
        tracing::info!(
            "Category {} analysed at {}% (excluding {:?})",
            rule.category_id,
            settings.match_percentage.get(),
            settings.excluded_keys
        );
        self.categories.insert(rule.category_id, settings);
    }

    pub fn defaults(&self) -> &ConsensusSettings {
        &self.defaults
    }

    /// Settings for automatic analysis of a category, if it has an analyzer.
    pub fn for_category(&self, category_id: Option<u64>) -> Option<&ConsensusSettings> {
        category_id.and_then(|id| self.categories.get(&id))
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}
