use crate::outcome::{HostOutcome, HostStatus};
use serde::{Deserialize, Serialize};

/// Captured output of one failing row, kept for logs and summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub host: String,
    pub action: String,
    pub status: HostStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Accumulated outcome table of one task list (or of a whole stage, when
/// several task lists are merged).
///
/// A host passes only if every row recorded for it is `ok`: a failure is
/// never masked by earlier or later progress in the same table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub name: String,
    rows: Vec<HostOutcome>,
}

impl AggregateReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn push_round(&mut self, round: Vec<HostOutcome>) {
        self.rows.extend(round);
    }

    /// Append every row of `other`, e.g. to fold step reports into a stage.
    pub fn absorb(&mut self, other: AggregateReport) {
        self.rows.extend(other.rows);
    }

    pub fn rows(&self) -> &[HostOutcome] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hosts in order of first appearance.
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !hosts.contains(&row.host.as_str()) {
                hosts.push(&row.host);
            }
        }
        hosts
    }

    pub fn latest(&self, host: &str) -> Option<&HostOutcome> {
        self.rows.iter().rev().find(|r| r.host == host)
    }

    pub fn host_passed(&self, host: &str) -> bool {
        self.rows.iter().filter(|r| r.host == host).all(HostOutcome::is_ok)
    }

    /// Hosts with at least one non-ok row, in order of first appearance.
    pub fn failed_hosts(&self) -> Vec<String> {
        self.hosts()
            .into_iter()
            .filter(|h| !self.host_passed(h))
            .map(String::from)
            .collect()
    }

    /// Hosts with at least one row of `status`.
    pub fn hosts_with(&self, status: HostStatus) -> Vec<String> {
        self.hosts()
            .into_iter()
            .filter(|h| self.rows.iter().any(|r| r.host == *h && r.status == status))
            .map(String::from)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.rows.iter().all(HostOutcome::is_ok)
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.rows
            .iter()
            .filter(|r| !r.is_ok())
            .map(|r| Diagnostic {
                host: r.host.clone(),
                action: r.action.clone(),
                status: r.status,
                stdout: r.stdout.clone(),
                stderr: r.stderr.clone(),
            })
            .collect()
    }
}
