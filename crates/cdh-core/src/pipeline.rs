//! Stage orchestration and gating.
//!
//! The pipeline runs the capability check against the whole fleet, then every
//! included stage in order. Each gate yields a `Verdict`; the configured
//! `GatePolicy` decides whether a failing verdict aborts the run. A `Fatal`
//! verdict (transport defect, unparseable checkpoint, invalid group) always
//! aborts.

use crate::backend::RemoteBackend;
use crate::config::{GatePolicy, OnFailure};
use crate::error::Result;
use crate::executor::{TaskList, TaskListExecutor};
use crate::inventory::Inventory;
use crate::outcome::HostStatus;
use crate::replication::Coordinator;
use crate::report::{AggregateReport, Diagnostic};
use crate::stage::{InstallPlan, Stage, StageKind, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Ok,
    StageFailed {
        hosts: Vec<String>,
        diagnostics: Vec<Diagnostic>,
    },
    Fatal {
        reason: String,
    },
}

impl Verdict {
    pub fn of(report: &AggregateReport) -> Self {
        if report.is_success() {
            Verdict::Ok
        } else {
            Verdict::StageFailed {
                hosts: report.failed_hosts(),
                diagnostics: report.diagnostics(),
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }

    pub fn failed_hosts(&self) -> &[String] {
        match self {
            Verdict::StageFailed { hosts, .. } => hosts,
            _ => &[],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Ok => "ok",
            Verdict::StageFailed { .. } => "failed",
            Verdict::Fatal { .. } => "fatal",
        }
    }

    fn aborts(&self, policy: OnFailure) -> bool {
        match self {
            Verdict::Ok => false,
            Verdict::StageFailed { .. } => policy == OnFailure::Abort,
            Verdict::Fatal { .. } => true,
        }
    }
}

// ---------------------------------------------------------------------------
// RunState / summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running { stage: StageKind },
    Completed,
    Aborted { reason: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub kind: StageKind,
    pub skipped: bool,
    /// `None` only for skipped stages.
    pub verdict: Option<Verdict>,
    pub rows: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    pub capability: Verdict,
    pub stages: Vec<StageSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Stages that ran and did not pass.
    pub fn failed_stages(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .filter(|s| s.verdict.as_ref().is_some_and(|v| !v.is_ok()))
            .map(|s| s.kind)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    executor: TaskListExecutor<'a>,
    policy: GatePolicy,
    state: RunState,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        backend: &'a dyn RemoteBackend,
        inventory: &'a dyn Inventory,
        policy: GatePolicy,
    ) -> Self {
        Self {
            executor: TaskListExecutor::new(backend, inventory),
            policy,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Capability check only; used by `check` and as the first gate of `run`.
    pub fn check(&self, list: &TaskList) -> Verdict {
        let report = match self.executor.execute(list) {
            Ok(report) => report,
            Err(e) => {
                error!(task = %list.name, error = %e, "capability check could not run");
                return Verdict::Fatal {
                    reason: e.to_string(),
                };
            }
        };

        let unreachable = report.hosts_with(HostStatus::Unreachable);
        if !unreachable.is_empty() {
            error!(hosts = ?unreachable, "unreachable hosts, check the network or ssh credentials");
        }
        let failed = report.hosts_with(HostStatus::Failed);
        if !failed.is_empty() {
            error!(hosts = ?failed, "hosts failed the capability check, check the package repository");
        }
        Verdict::of(&report)
    }

    /// Drive `plan` to a terminal state.
    pub fn run(&mut self, plan: &InstallPlan) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, ha = plan.ha, stages = plan.stages.len(), "install run started");

        let capability = self.check(&plan.capability_check);
        let mut stages = Vec::new();

        if capability.aborts(self.policy.capability_check) {
            self.state = RunState::Aborted {
                reason: abort_reason("capability check", &capability),
            };
        } else {
            if !capability.is_ok() {
                warn!(hosts = ?capability.failed_hosts(), "continuing despite failed capability check");
            }
            self.run_stages(plan, &mut stages);
        }

        let summary = RunSummary {
            run_id,
            state: self.state.clone(),
            capability,
            stages,
            started_at,
            finished_at: Utc::now(),
        };
        match &summary.state {
            RunState::Aborted { reason } => error!(%run_id, %reason, "install run aborted"),
            _ => info!(%run_id, failed_stages = ?summary.failed_stages(), "install run completed"),
        }
        summary
    }

    fn run_stages(&mut self, plan: &InstallPlan, stages: &mut Vec<StageSummary>) {
        for stage in &plan.stages {
            if !stage.is_included(plan.ha) {
                info!(stage = %stage.kind, "stage skipped, ha disabled");
                let now = Utc::now();
                stages.push(StageSummary {
                    kind: stage.kind,
                    skipped: true,
                    verdict: None,
                    rows: 0,
                    started_at: now,
                    finished_at: now,
                });
                continue;
            }

            self.state = RunState::Running { stage: stage.kind };
            let started_at = Utc::now();
            let (verdict, rows) = match self.run_stage(stage) {
                Ok(report) => (Verdict::of(&report), report.len()),
                Err(e) => (
                    Verdict::Fatal {
                        reason: e.to_string(),
                    },
                    0,
                ),
            };

            match &verdict {
                Verdict::Ok => info!(stage = %stage.kind, "stage passed"),
                Verdict::StageFailed { hosts, .. } => {
                    error!(stage = %stage.kind, hosts = ?hosts, "stage failed")
                }
                Verdict::Fatal { reason } => error!(stage = %stage.kind, %reason, "stage fatal"),
            }

            let aborts = verdict.aborts(self.policy.stage);
            if aborts {
                self.state = RunState::Aborted {
                    reason: abort_reason(stage.kind.as_str(), &verdict),
                };
            }
            stages.push(StageSummary {
                kind: stage.kind,
                skipped: false,
                verdict: Some(verdict),
                rows,
                started_at,
                finished_at: Utc::now(),
            });
            if aborts {
                return;
            }
        }
        self.state = RunState::Completed;
    }

    /// Run every step of `stage` and merge the step reports. An `Err` from
    /// any step ends the stage immediately.
    fn run_stage(&self, stage: &Stage) -> Result<AggregateReport> {
        info!(stage = %stage.kind, target_hosts = %stage.target, "stage started");
        let mut merged = AggregateReport::new(stage.kind.as_str());
        for step in &stage.steps {
            let report = match step {
                Step::Tasks(list) => self.executor.execute(list)?,
                Step::Replicate { group, coordinator } => {
                    coordinator.coordinate(&self.executor, group)?
                }
            };
            merged.absorb(report);
        }
        Ok(merged)
    }
}

fn abort_reason(gate: &str, verdict: &Verdict) -> String {
    match verdict {
        Verdict::Fatal { reason } => format!("{gate}: {reason}"),
        Verdict::StageFailed { hosts, .. } => {
            format!("{gate} failed on {}", hosts.join(", "))
        }
        Verdict::Ok => gate.to_string(),
    }
}
