//! Task list execution.
//!
//! A `TaskList` is an ordered sequence of actions bound to one `Target`. The
//! executor dispatches the actions strictly one after another, each to every
//! host of the target, and folds the classified results into one
//! `AggregateReport`. It never branches per host and never stops early: a
//! host that failed action *i* still receives action *i+1*. Deciding what a
//! failure means is left to the caller.

use crate::action::Action;
use crate::backend::RemoteBackend;
use crate::error::{InstallError, Result};
use crate::inventory::{Inventory, Target};
use crate::outcome::classify_round;
use crate::report::AggregateReport;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub name: String,
    pub target: Target,
    pub actions: Vec<Action>,
}

impl TaskList {
    pub fn new(name: impl Into<String>, target: Target) -> Self {
        Self {
            name: name.into(),
            target,
            actions: Vec::new(),
        }
    }

    pub fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_all(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }
}

pub struct TaskListExecutor<'a> {
    backend: &'a dyn RemoteBackend,
    inventory: &'a dyn Inventory,
}

impl<'a> TaskListExecutor<'a> {
    pub fn new(backend: &'a dyn RemoteBackend, inventory: &'a dyn Inventory) -> Self {
        Self { backend, inventory }
    }

    pub fn inventory(&self) -> &'a dyn Inventory {
        self.inventory
    }

    /// Run `list` and return its report.
    ///
    /// Per-host failures end up in the report. Only a target that resolves to
    /// nothing or a backend that cannot operate at all yields an `Err`.
    pub fn execute(&self, list: &TaskList) -> Result<AggregateReport> {
        info!(target_hosts = %list.target, task = %list.name, "start run task");

        let hosts = list.target.resolve(self.inventory)?;
        if hosts.is_empty() {
            return Err(InstallError::EmptyGroup(list.target.label()));
        }

        let mut report = AggregateReport::new(list.name.clone());
        for action in &list.actions {
            let shown = action.to_string();
            debug!(hosts = ?hosts, action = %shown, "dispatch");
            let raws = self.backend.dispatch(&hosts, action)?;
            report.push_round(classify_round(&hosts, raws, &shown));
        }

        log_verdict(&list.target, &report);
        Ok(report)
    }
}

fn log_verdict(target: &Target, report: &AggregateReport) {
    if report.is_success() {
        info!(target_hosts = %target, task = %report.name, "run task success");
        return;
    }
    let failed = report.failed_hosts();
    error!(hosts = ?failed, task = %report.name, "run task failed");
    for d in report.diagnostics() {
        error!(
            host = %d.host,
            status = %d.status,
            action = %d.action,
            stdout = %d.stdout.trim(),
            stderr = %d.stderr.trim(),
            "failed step output"
        );
    }
}
