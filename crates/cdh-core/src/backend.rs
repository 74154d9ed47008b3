//! The remote execution seam.
//!
//! A backend runs one action on a set of hosts and reports one raw record per
//! host. How it reaches the hosts (and whether it fans out concurrently) is its
//! own business; callers see a single blocking call.

use crate::action::Action;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One host's answer to one dispatched action, before classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHostResult {
    pub host: String,
    pub unreachable: bool,
    pub failed: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    /// Action-specific fields such as `rc`, `changed` or `skipped`.
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl RawHostResult {
    pub fn ok(host: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn failed(host: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            failed: true,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn unreachable(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            unreachable: true,
            stderr: reason.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}

pub trait RemoteBackend {
    /// Run `action` on every host in `hosts` and return their raw results.
    ///
    /// An `Err` means the backend itself could not operate (missing client
    /// binary, broken local environment). Per-host problems are reported in
    /// the returned records, never as an `Err`.
    fn dispatch(&self, hosts: &[String], action: &Action) -> Result<Vec<RawHostResult>>;
}
