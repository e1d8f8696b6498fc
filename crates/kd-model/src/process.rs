// process.rs — Runtime process events observed inside a deployment's pods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A process launch observed by the runtime collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessIndicator {
    pub id: String,
    pub deployment_id: String,
    #[serde(default)]
    pub container_name: String,
    #[serde(default)]
    pub pod_id: String,
    pub signal: ProcessSignal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessSignal {
    /// Short process name, e.g. `apt-get`.
    pub name: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub exec_file_path: String,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}
