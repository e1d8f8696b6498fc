// violation.rs — What a matcher hands back when a policy is violated.

use kd_model::ProcessIndicator;
use serde::{Deserialize, Serialize};

/// One human-readable reason a policy fired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertViolation {
    pub message: String,
    /// Reference URL (e.g. a CVE advisory) when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl AlertViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        let link = link.into();
        if !link.is_empty() {
            self.link = Some(link);
        }
        self
    }
}

/// A runtime violation carrying the process events that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessViolation {
    pub message: String,
    pub processes: Vec<ProcessIndicator>,
}

impl ProcessViolation {
    pub fn for_process(process: &ProcessIndicator) -> Self {
        let signal = &process.signal;
        let binary = if signal.exec_file_path.is_empty() {
            signal.name.as_str()
        } else {
            signal.exec_file_path.as_str()
        };
        Self {
            message: format!(
                "Binary '{}' executed with arguments '{}' under user ID {}",
                binary, signal.args, signal.uid
            ),
            processes: vec![process.clone()],
        }
    }
}

/// All violations produced by one `match_one` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violations {
    pub alert_violations: Vec<AlertViolation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_violation: Option<ProcessViolation>,
}

impl Violations {
    /// No violation at all; the policy did not match.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.alert_violations.is_empty() && self.process_violation.is_none()
    }
}
