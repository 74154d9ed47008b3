//! Pipeline stages and the two install plans.

use crate::config::Config;
use crate::error::Result;
use crate::executor::TaskList;
use crate::inventory::Target;
use crate::recipes::{self, RecipeContext};
use crate::replication::MysqlReplication;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// StageKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    BasePrep,
    Database,
    MgmtServer,
    MgmtAgent,
    HighAvailability,
}

impl StageKind {
    pub fn all() -> &'static [StageKind] {
        &[
            StageKind::BasePrep,
            StageKind::Database,
            StageKind::MgmtServer,
            StageKind::MgmtAgent,
            StageKind::HighAvailability,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::BasePrep => "base_prep",
            StageKind::Database => "database",
            StageKind::MgmtServer => "mgmt_server",
            StageKind::MgmtAgent => "mgmt_agent",
            StageKind::HighAvailability => "ha",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusion {
    Always,
    WhenHa,
}

#[derive(Debug)]
pub enum Step {
    Tasks(TaskList),
    /// Read the primary's checkpoint and bind the secondary to it.
    Replicate {
        group: Target,
        coordinator: MysqlReplication,
    },
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Tasks(list) => &list.name,
            Step::Replicate { .. } => "configure_mysql master/slave",
        }
    }
}

#[derive(Debug)]
pub struct Stage {
    pub kind: StageKind,
    pub target: Target,
    pub steps: Vec<Step>,
    pub inclusion: Inclusion,
}

impl Stage {
    pub fn new(kind: StageKind, target: Target) -> Self {
        Self {
            kind,
            target,
            steps: Vec::new(),
            inclusion: Inclusion::Always,
        }
    }

    pub fn only_when_ha(mut self) -> Self {
        self.inclusion = Inclusion::WhenHa;
        self
    }

    pub fn then(mut self, list: TaskList) -> Self {
        self.steps.push(Step::Tasks(list));
        self
    }

    pub fn then_replicate(mut self, group: Target, coordinator: MysqlReplication) -> Self {
        self.steps.push(Step::Replicate { group, coordinator });
        self
    }

    pub fn is_included(&self, ha: bool) -> bool {
        match self.inclusion {
            Inclusion::Always => true,
            Inclusion::WhenHa => ha,
        }
    }

    /// Plain task lists of this stage, in order.
    pub fn task_lists(&self) -> impl Iterator<Item = &TaskList> {
        self.steps.iter().filter_map(|s| match s {
            Step::Tasks(list) => Some(list),
            Step::Replicate { .. } => None,
        })
    }
}

// ---------------------------------------------------------------------------
// InstallPlan
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct InstallPlan {
    pub capability_check: TaskList,
    pub stages: Vec<Stage>,
    pub ha: bool,
}

fn base_prep(
    config: &Config,
    ctx: &RecipeContext,
    target: Target,
    extra_hosts_file: Option<Target>,
) -> Stage {
    let mut stage = Stage::new(StageKind::BasePrep, target.clone())
        .then(recipes::distribute_files(config, ctx, target.clone()))
        .then(recipes::set_hostname(target.clone()))
        .then(recipes::rewrite_hosts_file(ctx, target.clone()));
    if let Some(cluster) = extra_hosts_file {
        stage = stage.then(recipes::rewrite_hosts_file(ctx, cluster));
    }
    stage
        .then(recipes::disable_firewall(target.clone()))
        .then(recipes::disable_selinux(target.clone()))
        .then(recipes::tune_kernel(target.clone()))
        .then(recipes::install_jdk(config, target.clone()))
        .then(recipes::install_ntp(config, ctx, target))
}

fn mgmt_agent(config: &Config, ctx: &RecipeContext, target: Target) -> Stage {
    Stage::new(StageKind::MgmtAgent, target.clone())
        .then(recipes::unpack_cm(config, target.clone()))
        .then(recipes::install_mgmt_agent(config, ctx, target.clone()))
        .then(recipes::update_log4j(config, target.clone()))
        .then(recipes::start_service("cloudera-scm-agent", target))
}

impl InstallPlan {
    /// Full install against the configured groups.
    pub fn install(config: &Config, ctx: &RecipeContext) -> Result<Self> {
        let groups = &config.groups;
        let cluster = Target::group(&groups.cluster);
        let db = Target::group(&groups.database);
        let server = Target::group(&groups.mgmt_server);

        let mut database = Stage::new(StageKind::Database, db.clone())
            .then(recipes::install_mysql(config, ctx, db.clone()))
            .then(recipes::init_mysql(config, ctx, db.clone()));
        if config.ha {
            database = database
                .then(recipes::grant_replication_user(config, db.clone()))
                .then_replicate(db, MysqlReplication::from_config(config)?);
        }

        // The server host runs an agent too; it reuses the unpacked archive.
        let mgmt_server = Stage::new(StageKind::MgmtServer, server.clone())
            .then(recipes::unpack_cm(config, server.clone()))
            .then(recipes::install_mgmt_server(config, ctx, server.clone()))
            .then(recipes::install_mgmt_agent(config, ctx, server.clone()))
            .then(recipes::update_log4j(config, server.clone()))
            .then(recipes::start_service("cloudera-scm-server", server.clone()))
            .then(recipes::start_service("cloudera-scm-agent", server));

        let lb = Target::group(&groups.load_balancer);
        let ha = Stage::new(StageKind::HighAvailability, lb.clone())
            .only_when_ha()
            .then(recipes::install_haproxy(ctx, lb));

        Ok(Self {
            capability_check: recipes::capability_check(cluster.clone()),
            stages: vec![
                base_prep(config, ctx, cluster, None),
                database,
                mgmt_server,
                mgmt_agent(config, ctx, Target::group(&groups.mgmt_agent)),
                ha,
            ],
            ha: config.ha,
        })
    }

    /// Base preparation and agent install on explicitly listed new hosts.
    /// The cluster's hosts file is refreshed as well so existing nodes can
    /// resolve the newcomers.
    pub fn add_agents(config: &Config, ctx: &RecipeContext, hosts: Vec<String>) -> Self {
        let target = Target::Hosts { hosts };
        let cluster = Target::group(&config.groups.cluster);
        Self {
            capability_check: recipes::capability_check(target.clone()),
            stages: vec![
                base_prep(config, ctx, target.clone(), Some(cluster)),
                mgmt_agent(config, ctx, target),
            ],
            ha: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::FileInventory;
    use std::path::Path;

    const CONFIG: &str = r#"
password:
  my_root: rootpw
  my_repl: replpw
packages:
  mysql: mysql-5.7.tar.gz
  jdk: jdk.rpm
  cdh-parcels: parcels.tar.gz
  cdh-cm: cm.tar.gz
  log4j: log4j2-update.tar.gz
"#;

    const INVENTORY: &str = r#"
hosts:
  10.0.0.1: { hostname: cdh1 }
  10.0.0.2: { hostname: cdh2 }
groups:
  cdh_servers: [10.0.0.1, 10.0.0.2]
  scm_server: [10.0.0.1]
"#;

    fn plan(ha: bool) -> InstallPlan {
        let config: Config = serde_yaml::from_str::<Config>(CONFIG).unwrap().with_ha(ha);
        let inv = FileInventory::from_yaml_str(INVENTORY).unwrap();
        let ctx = RecipeContext::resolve(Path::new("/x"), &config, &inv).unwrap();
        InstallPlan::install(&config, &ctx).unwrap()
    }

    #[test]
    fn install_stages_are_in_fixed_order() {
        let kinds: Vec<_> = plan(false).stages.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, StageKind::all());
    }

    #[test]
    fn base_prep_steps_are_in_fixed_order() {
        let p = plan(false);
        let names: Vec<_> = p.stages[0].steps.iter().map(Step::name).collect();
        assert_eq!(
            names,
            vec![
                "distribute_file",
                "modify_hostname",
                "modify /etc/hosts",
                "close_firewall",
                "close_selinux",
                "modify_kernel_option",
                "install_jdk",
                "install_ntp",
            ]
        );
    }

    #[test]
    fn ha_stage_is_predicated_on_ha_flag() {
        let p = plan(false);
        let ha = p.stages.last().unwrap();
        assert_eq!(ha.kind, StageKind::HighAvailability);
        assert!(!ha.is_included(p.ha));
        assert!(ha.is_included(true));
        assert!(StageKind::all()[..4]
            .iter()
            .all(|k| p.stages.iter().find(|s| s.kind == *k).unwrap().is_included(false)));
    }

    #[test]
    fn replication_only_planned_with_ha() {
        let without = plan(false);
        assert!(!without.stages[1]
            .steps
            .iter()
            .any(|s| matches!(s, Step::Replicate { .. })));

        let with = plan(true);
        assert!(matches!(
            with.stages[1].steps.last(),
            Some(Step::Replicate { .. })
        ));
    }

    #[test]
    fn replication_user_is_granted_only_with_ha() {
        let names = |p: &InstallPlan| -> Vec<String> {
            p.stages[1].steps.iter().map(|s| s.name().to_string()).collect()
        };
        assert_eq!(names(&plan(false)), vec!["install_mysql", "init_mysql"]);
        assert_eq!(
            names(&plan(true)),
            vec![
                "install_mysql",
                "init_mysql",
                "grant replication user",
                "configure_mysql master/slave",
            ]
        );
    }

    #[test]
    fn add_agents_targets_explicit_hosts() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        let inv = FileInventory::from_yaml_str(INVENTORY).unwrap();
        let ctx = RecipeContext::resolve(Path::new("/x"), &config, &inv).unwrap();
        let p = InstallPlan::add_agents(&config, &ctx, vec!["10.0.0.9".to_string()]);
        let kinds: Vec<_> = p.stages.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StageKind::BasePrep, StageKind::MgmtAgent]);
        assert_eq!(p.capability_check.target, Target::hosts(["10.0.0.9"]));
        let hosts_file_targets: Vec<_> = p.stages[0]
            .task_lists()
            .filter(|l| l.name == "modify /etc/hosts")
            .map(|l| l.target.clone())
            .collect();
        assert_eq!(
            hosts_file_targets,
            vec![Target::hosts(["10.0.0.9"]), Target::group("cdh_servers")]
        );
    }
}
