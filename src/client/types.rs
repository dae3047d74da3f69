//! Remote Record Types
//!
//! Typed views of the records the crowdsourcing platform serves. Field maps
//! (`TaskRun.info`, `TaskResult.info`) are schema-less, so their values are
//! modelled as a tagged `FieldValue` rather than fixed structs.

use crate::error::AnalystError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A free-form field map keyed by field name.
pub type InfoMap = BTreeMap<String, FieldValue>;

/// One value inside a field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Flag(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FieldValue>),
    Nested(InfoMap),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

/// Credentials and endpoint for one remote call.
///
/// Passed explicitly on every call so concurrent workers never share mutable
/// client configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiCredentials {
    pub endpoint: String,
    pub api_key: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub short_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,
    pub project_id: u64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub info: serde_json::Value,
}

/// One contributor's submission for a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRun {
    pub id: u64,
    pub task_id: u64,
    pub project_id: u64,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub finish_time: Option<String>,
    #[serde(default)]
    pub info: serde_json::Value,
}

impl TaskRun {
    /// The submission's field map. Anything other than a JSON object is malformed.
    pub fn info_map(&self) -> Result<InfoMap, AnalystError> {
        match &self.info {
            serde_json::Value::Object(_) => serde_json::from_value(self.info.clone())
                .map_err(|e| AnalystError::Validation(format!("task run {}: {}", self.id, e))),
            other => Err(AnalystError::Validation(format!(
                "task run {} info is not a field map: {}",
                self.id, other
            ))),
        }
    }
}

/// Analysis state of a result, kept apart from its field map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResultStatus {
    /// Created by the platform, never analysed.
    Unanalysed,
    /// Analysed, but no field reached consensus; needs a human.
    Unverified,
    /// Holds reconciled field values.
    Analysed,
}

impl ResultStatus {
    /// The marker string the remote platform stores in `info` for this status.
    pub fn sentinel(self) -> Option<&'static str> {
        match self {
            ResultStatus::Unanalysed => Some("Unanalysed"),
            ResultStatus::Unverified => Some("Unverified"),
            ResultStatus::Analysed => None,
        }
    }

    fn from_sentinel(marker: &str) -> Option<Self> {
        match marker {
            "Unanalysed" => Some(ResultStatus::Unanalysed),
            "Unverified" => Some(ResultStatus::Unverified),
            _ => None,
        }
    }
}

impl FromStr for ResultStatus {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unanalysed" | "unanalyzed" => Ok(ResultStatus::Unanalysed),
            "unverified" => Ok(ResultStatus::Unverified),
            "analysed" | "analyzed" => Ok(ResultStatus::Analysed),
            other => Err(AnalystError::Validation(format!(
                "unknown result status: {}",
                other
            ))),
        }
    }
}

/// The reconciled record for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RemoteResult", into = "RemoteResult")]
pub struct TaskResult {
    pub id: u64,
    pub project_id: u64,
    pub task_id: u64,
    pub task_run_ids: Vec<u64>,
    pub status: ResultStatus,
    pub info: InfoMap,
}

/// Wire form of a result: the status lives inside `info` as a marker string.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoteResult {
    id: u64,
    project_id: u64,
    task_id: u64,
    #[serde(default)]
    task_run_ids: Vec<u64>,
    #[serde(default)]
    info: serde_json::Value,
}

impl From<RemoteResult> for TaskResult {
    fn from(remote: RemoteResult) -> Self {
        let (status, info) = match remote.info {
            serde_json::Value::Null => (ResultStatus::Unanalysed, InfoMap::new()),
            serde_json::Value::String(marker) => (
                ResultStatus::from_sentinel(&marker).unwrap_or(ResultStatus::Unverified),
                InfoMap::new(),
            ),
            value @ serde_json::Value::Object(_) => match serde_json::from_value(value) {
                Ok(info) => (ResultStatus::Analysed, info),
                Err(_) => (ResultStatus::Unverified, InfoMap::new()),
            },
            _ => (ResultStatus::Unverified, InfoMap::new()),
        };

        TaskResult {
            id: remote.id,
            project_id: remote.project_id,
            task_id: remote.task_id,
            task_run_ids: remote.task_run_ids,
            status,
            info,
        }
    }
}

impl From<TaskResult> for RemoteResult {
    fn from(result: TaskResult) -> Self {
        let info = match result.status.sentinel() {
            Some(marker) if result.info.is_empty() => serde_json::Value::String(marker.to_string()),
            _ => serde_json::to_value(&result.info).unwrap_or(serde_json::Value::Null),
        };

        RemoteResult {
            id: result.id,
            project_id: result.project_id,
            task_id: result.task_id,
            task_run_ids: result.task_run_ids,
            info,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub id: Option<u64>,
    pub state: Option<String>,
}

impl TaskFilter {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub id: Option<u64>,
    pub task_id: Option<u64>,
    pub status: Option<ResultStatus>,
    pub limit: Option<usize>,
}

impl ResultFilter {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn for_task(task_id: u64) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    pub fn with_status(status: ResultStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn matches(&self, result: &TaskResult) -> bool {
        self.id.is_none_or(|id| result.id == id)
            && self.task_id.is_none_or(|task_id| result.task_id == task_id)
            && self.status.is_none_or(|status| result.status == status)
    }
}
