//! Service Configuration
//!
//! Every setting can be given as a flag or through its `ANALYST_*` environment
//! variable. Values are read once at startup and copied into each job payload,
//! so a running job never observes a configuration change.

use crate::analysis::catalog::{AnalyzerCatalog, CategoryRule};
use crate::analysis::types::{ConsensusSettings, MatchPercentage, Normalization};
use crate::client::types::ApiCredentials;
use crate::executor::queue::DEFAULT_RETAINED_FINISHED;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "crowd-analyst", version, about = "Consensus analysis and task input packaging for crowdsourcing projects")]
pub struct Config {
    /// Address the HTTP API listens on.
    #[arg(long, env = "ANALYST_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Base URL of the crowdsourcing platform.
    #[arg(long, env = "ANALYST_ENDPOINT")]
    pub endpoint: String,

    #[arg(long, env = "ANALYST_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Share of task runs (%) that must agree on a field value.
    #[arg(long, env = "ANALYST_MATCH_PERCENTAGE", default_value_t = 60,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub match_percentage: u8,

    /// Field keys left out of consensus entirely (comma separated).
    #[arg(long, env = "ANALYST_EXCLUDED_KEYS", value_delimiter = ',')]
    pub excluded_keys: Vec<String>,

    /// Compare text answers case-insensitively.
    #[arg(long, env = "ANALYST_CASE_INSENSITIVE")]
    pub case_insensitive: bool,

    /// Category analyzer rule, `ID[:PCT[:key|key]]`; repeat per category.
    #[arg(long = "category", env = "ANALYST_CATEGORIES", value_delimiter = ',')]
    pub categories: Vec<CategoryRule>,

    /// Default delay between reanalysis submissions, in seconds.
    #[arg(long, env = "ANALYST_PACING_SECS", default_value_t = 2)]
    pub pacing_secs: u64,

    #[arg(long, env = "ANALYST_ANALYSIS_TIMEOUT_SECS", default_value_t = 600)]
    pub analysis_timeout_secs: u64,

    #[arg(long, env = "ANALYST_ZIP_TIMEOUT_SECS", default_value_t = 3600)]
    pub zip_timeout_secs: u64,

    /// Time allowed for listing a project's tasks before reanalysis pacing starts.
    #[arg(long, env = "ANALYST_LISTING_TIMEOUT_SECS", default_value_t = 300)]
    pub listing_timeout_secs: u64,

    #[arg(long, env = "ANALYST_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Directory holding built zip archives.
    #[arg(long, env = "ANALYST_ZIP_DIR", default_value = "zips")]
    pub zip_dir: PathBuf,

    /// Job journal file; without it queued jobs are lost on restart.
    #[arg(long, env = "ANALYST_JOURNAL")]
    pub journal: Option<PathBuf>,

    /// Finished jobs kept for status queries; older ones are forgotten.
    #[arg(long, env = "ANALYST_RETAIN_FINISHED_JOBS", default_value_t = DEFAULT_RETAINED_FINISHED)]
    pub retain_finished_jobs: usize,
}

/// Timing knobs shared by the HTTP layer when it enqueues work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobTimings {
    pub analysis_timeout: Duration,
    pub zip_timeout: Duration,
    pub listing_timeout: Duration,
    pub pacing_delay: Duration,
}

impl Default for JobTimings {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(600),
            zip_timeout: Duration::from_secs(3600),
            listing_timeout: Duration::from_secs(300),
            pacing_delay: Duration::from_secs(2),
        }
    }
}

impl Config {
    pub fn credentials(&self) -> ApiCredentials {
        ApiCredentials {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
        }
    }

    pub fn consensus_defaults(&self) -> anyhow::Result<ConsensusSettings> {
        let mut settings = ConsensusSettings::new(MatchPercentage::new(self.match_percentage)?)
            .excluding(
                self.excluded_keys
                    .iter()
                    .map(|k| k.trim())
                    .filter(|k| !k.is_empty()),
            );
        settings.normalization = Normalization {
            case_insensitive: self.case_insensitive,
            ..Normalization::default()
        };
        Ok(settings)
    }

    pub fn catalog(&self) -> anyhow::Result<AnalyzerCatalog> {
        Ok(AnalyzerCatalog::from_rules(
            self.consensus_defaults()?,
            &self.categories,
        ))
    }

    pub fn timings(&self) -> JobTimings {
        JobTimings {
            analysis_timeout: Duration::from_secs(self.analysis_timeout_secs),
            zip_timeout: Duration::from_secs(self.zip_timeout_secs),
            listing_timeout: Duration::from_secs(self.listing_timeout_secs),
            pacing_delay: Duration::from_secs(self.pacing_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["crowd-analyst", "--endpoint", "http://crowd.test", "--api-key", "k"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.match_percentage, 60);
        assert_eq!(config.pacing_secs, 2);
        assert_eq!(config.workers, 4);
        assert_eq!(config.retain_finished_jobs, 1000);
        assert!(config.categories.is_empty());
        assert_eq!(config.timings(), JobTimings::default());
    }

    #[test]
    fn test_category_rules_build_catalog() {
        let config = parse(&[
            "--excluded-keys", "comment,notes",
            "--category", "1",
            "--category", "2:80:comment",
        ]);
        let catalog = config.catalog().unwrap();

        let first = catalog.for_category(Some(1)).unwrap();
        assert_eq!(first.match_percentage.get(), 60);
        assert!(first.excluded_keys.contains("notes"));

        let second = catalog.for_category(Some(2)).unwrap();
        assert_eq!(second.match_percentage.get(), 80);
        assert!(!second.excluded_keys.contains("notes"));
        assert!(second.excluded_keys.contains("comment"));

        assert!(catalog.for_category(Some(3)).is_none());
        assert!(catalog.for_category(None).is_none());
    }

    #[test]
    fn test_out_of_range_percentage_is_rejected() {
        let argv = [
            "crowd-analyst", "--endpoint", "e", "--api-key", "k", "--match-percentage", "101",
        ];
        assert!(Config::try_parse_from(argv).is_err());
        assert!(Config::try_parse_from([
            "crowd-analyst", "--endpoint", "e", "--api-key", "k", "--category", "x:50",
        ])
        .is_err());
    }
}
