//! Installation recipes: the task lists each stage is built from.
//!
//! Every function returns one named `TaskList` for one target. The content is
//! static apart from values taken from `Config` and the derived
//! `RecipeContext`. Steps that are expensive or not safely repeatable are
//! guarded by an idempotency marker in the remote temp dir.

use crate::action::{Action, ServiceState};
use crate::config::Config;
use crate::error::{InstallError, Result};
use crate::executor::TaskList;
use crate::inventory::{Inventory, Target};
use crate::paths;
use std::path::{Path, PathBuf};
use tracing::warn;

const CLOSE_HUGEPAGE_DEFRAG: &str = "echo never > /sys/kernel/mm/transparent_hugepage/defrag";
const CLOSE_HUGEPAGE_ENABLED: &str = "echo never > /sys/kernel/mm/transparent_hugepage/enabled";
const LIMITS_BLOCK: &str = "*  soft  nproc   65535\n*  hard  nproc   65535\n*  soft  nofile  65535\n*  hard  nofile  65535";
const JDBC_DRIVER_DEST: &str = "/usr/share/java";

// ---------------------------------------------------------------------------
// RecipeContext
// ---------------------------------------------------------------------------

/// Values derived from configuration and inventory once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeContext {
    /// Install root on the control host (holds packages/, scripts/, templates/).
    pub root: PathBuf,
    /// `ip hostname` lines for every inventory host that declares a hostname.
    pub host_mapping: String,
    pub ntp_server: String,
    pub mgmt_server_hostname: String,
}

impl RecipeContext {
    pub fn resolve(root: &Path, config: &Config, inventory: &dyn Inventory) -> Result<Self> {
        let mut lines = Vec::new();
        for host in inventory.all_hosts() {
            match inventory.host_vars(&host).get("hostname") {
                Some(name) => lines.push(format!("{host} {name}")),
                None => warn!(%host, "host has no hostname variable; left out of /etc/hosts"),
            }
        }

        let mgmt_hosts = inventory.resolve_group(&config.groups.mgmt_server)?;
        let mgmt_server = mgmt_hosts.first().ok_or_else(|| {
            InstallError::EmptyGroup(config.groups.mgmt_server.clone())
        })?;

        let mgmt_server_hostname = inventory
            .host_vars(mgmt_server)
            .get("hostname")
            .cloned()
            .ok_or_else(|| {
                InstallError::Config(format!(
                    "management server {mgmt_server} has no hostname variable"
                ))
            })?;

        let ntp_server = config
            .ntp_external_server
            .clone()
            .unwrap_or_else(|| mgmt_server.clone());

        Ok(Self {
            root: root.to_path_buf(),
            host_mapping: lines.join("\n"),
            ntp_server,
            mgmt_server_hostname,
        })
    }
}

fn tmp(config: &Config, file: &str) -> String {
    paths::remote_join(&config.remote_temp_dir, file)
}

fn marker(config: &Config, step: &str) -> String {
    paths::marker(&config.remote_temp_dir, step)
}

// ---------------------------------------------------------------------------
// Capability check
// ---------------------------------------------------------------------------

/// Exercises connectivity, privilege escalation and the package manager.
pub fn capability_check(target: Target) -> TaskList {
    TaskList::new("server check", target).with(Action::command("yum install telnet -y"))
}

// ---------------------------------------------------------------------------
// Base preparation
// ---------------------------------------------------------------------------

pub fn distribute_files(config: &Config, ctx: &RecipeContext, target: Target) -> TaskList {
    let dir = &config.remote_temp_dir;
    let sources = [
        paths::package_path(&ctx.root, &config.packages.cdh_cm),
        paths::package_path(&ctx.root, &config.packages.jdk),
        paths::package_path(&ctx.root, &config.packages.log4j),
        paths::script_path(&ctx.root, "installNTP.sh"),
        paths::script_path(&ctx.root, "installJDK.sh"),
    ];
    TaskList::new("distribute_file", target)
        .with(Action::directory(dir.clone()))
        .with_all(sources.into_iter().map(|src| Action::copy(src, dir.clone())))
}

pub fn set_hostname(target: Target) -> TaskList {
    TaskList::new("modify_hostname", target).with(Action::hostname("{{ hostname }}"))
}

pub fn rewrite_hosts_file(ctx: &RecipeContext, target: Target) -> TaskList {
    TaskList::new("modify /etc/hosts", target)
        .with(Action::command(format!(
            "sed -i \"/127.0.0.1.*{{{{ hostname }}}}/d\" {}",
            paths::ETC_HOSTS
        )))
        .with(Action::block_in_file(paths::ETC_HOSTS, ctx.host_mapping.clone()))
}

pub fn disable_firewall(target: Target) -> TaskList {
    TaskList::new("close_firewall", target).with(Action::service(
        "firewalld",
        ServiceState::Stopped,
        Some(false),
    ))
}

pub fn disable_selinux(target: Target) -> TaskList {
    TaskList::new("close_selinux", target)
        .with(Action::command(
            "if [ \"$(getenforce)\" = 'Enforcing' ]; then setenforce 0; fi",
        ))
        .with(
            Action::line_in_file("/etc/selinux/config", "SELINUX=disabled")
                .with_regexp("^SELINUX=enforcing")
                .with_backup(),
        )
}

pub fn tune_kernel(target: Target) -> TaskList {
    TaskList::new("modify_kernel_option", target)
        .with(Action::line_in_file("/etc/sysctl.conf", "vm.swappiness = 0").with_backup())
        .with(Action::block_in_file(
            "/etc/rc.local",
            format!("{CLOSE_HUGEPAGE_DEFRAG}\n{CLOSE_HUGEPAGE_ENABLED}"),
        ))
        .with(Action::command(format!(
            "{CLOSE_HUGEPAGE_DEFRAG}; {CLOSE_HUGEPAGE_ENABLED}; sysctl -p"
        )))
        .with(Action::block_in_file("/etc/security/limits.conf", LIMITS_BLOCK))
        .with(
            Action::line_in_file(
                "/etc/security/limits.d/20-nproc.conf",
                "*          soft    nproc     65535",
            )
            .with_regexp(r"^\*")
            .with_backup(),
        )
}

pub fn install_jdk(config: &Config, target: Target) -> TaskList {
    let script = tmp(config, "installJDK.sh");
    let jdk = tmp(config, &config.packages.jdk);
    TaskList::new("install_jdk", target).with(Action::guarded(
        format!("sh {script} {jdk}"),
        marker(config, "install_jdk"),
    ))
}

pub fn install_ntp(config: &Config, ctx: &RecipeContext, target: Target) -> TaskList {
    let script = tmp(config, "installNTP.sh");
    TaskList::new("install_ntp", target).with(Action::guarded(
        format!("sh {script} {}", ctx.ntp_server),
        marker(config, "install_ntp"),
    ))
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

pub fn install_mysql(config: &Config, ctx: &RecipeContext, target: Target) -> TaskList {
    let dir = &config.remote_temp_dir;
    let script = tmp(config, "installMysql.sh");
    TaskList::new("install_mysql", target)
        .with(Action::copy(
            paths::package_path(&ctx.root, &config.packages.mysql),
            dir.clone(),
        ))
        .with(Action::copy(
            paths::script_path(&ctx.root, "installMysql.sh"),
            dir.clone(),
        ))
        .with(
            Action::guarded(
                format!(
                    "sh {script} {} {}",
                    config.packages.mysql, config.mysql_install_path
                ),
                marker(config, "install_mysql"),
            )
            .with_chdir(dir.clone()),
        )
}

pub fn init_mysql(config: &Config, ctx: &RecipeContext, target: Target) -> TaskList {
    let sql = tmp(config, "initMysql.sql");
    TaskList::new("init_mysql", target)
        .with(Action::template(
            paths::template_path(&ctx.root, "initMysql.sql.tmpl"),
            sql.clone(),
        ))
        .with(Action::guarded(
            format!("{} -uroot < {sql}", config.mysql_client()),
            marker(config, "init_mysql"),
        ))
}

/// Replication account on every database host. Passwords stay placeholders
/// until the backend renders the command per host.
pub fn grant_replication_user(config: &Config, target: Target) -> TaskList {
    TaskList::new("grant replication user", target).with(Action::guarded(
        format!(
            "{} -uroot -p'{{{{ my_root }}}}' -e \"CREATE USER IF NOT EXISTS 'repl'@'%' \
             IDENTIFIED BY '{{{{ my_repl }}}}'; GRANT REPLICATION SLAVE ON *.* TO 'repl'@'%'; \
             FLUSH PRIVILEGES;\"",
            config.mysql_client()
        ),
        marker(config, "repl_user"),
    ))
}

// ---------------------------------------------------------------------------
// Cloudera Manager
// ---------------------------------------------------------------------------

pub fn unpack_cm(config: &Config, target: Target) -> TaskList {
    let connector = tmp(config, &config.packages.mysql_connector);
    TaskList::new("unzip_scm_package", target)
        .with(Action::command_in(
            config.remote_temp_dir.clone(),
            format!("tar zxf {}", config.packages.cdh_cm),
        ))
        .with(Action::directory(JDBC_DRIVER_DEST))
        .with(Action::command(format!(
            "/usr/bin/cp -f {connector} {JDBC_DRIVER_DEST}/mysql-connector-java.jar"
        )))
}

fn localinstall(config: &Config, role: &str) -> Action {
    Action::command_in(
        tmp(config, "packages"),
        format!("yum -y localinstall cloudera-manager-daemons-* && yum -y localinstall {role}"),
    )
}

pub fn install_mgmt_server(config: &Config, ctx: &RecipeContext, target: Target) -> TaskList {
    let parcels = &config.packages.cdh_parcels;
    TaskList::new("install_scm_server", target)
        .with(localinstall(config, "cloudera-manager-server-6.*"))
        .with(
            Action::template(
                paths::template_path(&ctx.root, "db.properties.tmpl"),
                paths::SCM_DB_PROPERTIES,
            )
            .with_ownership("cloudera-scm", "cloudera-scm", "0600"),
        )
        .with(Action::directory(paths::PARCEL_REPO))
        .with(Action::copy(
            paths::package_path(&ctx.root, parcels),
            paths::PARCEL_REPO,
        ))
        .with(
            Action::guarded(format!("tar zxf {parcels}"), marker(config, "unpack_parcels"))
                .with_chdir(paths::PARCEL_REPO),
        )
}

pub fn install_mgmt_agent(config: &Config, ctx: &RecipeContext, target: Target) -> TaskList {
    TaskList::new("install_scm_agent", target)
        .with(localinstall(config, "cloudera-manager-agent-*"))
        .with(
            Action::line_in_file(
                paths::SCM_AGENT_CONFIG,
                format!("server_host={}", ctx.mgmt_server_hostname),
            )
            .with_regexp("^server_host=localhost")
            .with_backup(),
        )
}

/// Patch the bundled log4j2 (CVE-2021-44228) before services start.
pub fn update_log4j(config: &Config, target: Target) -> TaskList {
    let dir = tmp(config, config.packages.log4j_dir());
    let script = paths::remote_join(&dir, "update_log4j2_for_cdh.sh");
    TaskList::new("update log4j2", target)
        .with(Action::command_in(
            config.remote_temp_dir.clone(),
            format!("tar zxf {}", config.packages.log4j),
        ))
        .with(Action::command_in(dir, format!("sh {script}")))
}

pub fn start_service(name: &str, target: Target) -> TaskList {
    TaskList::new(format!("start {name}"), target).with(Action::service(
        name,
        ServiceState::Started,
        Some(true),
    ))
}

// ---------------------------------------------------------------------------
// Load balancer
// ---------------------------------------------------------------------------

pub fn install_haproxy(ctx: &RecipeContext, target: Target) -> TaskList {
    TaskList::new("install_haproxy", target)
        .with(Action::package("haproxy", true))
        .with(Action::template(
            paths::template_path(&ctx.root, "haproxy.cfg.tmpl"),
            paths::HAPROXY_CFG,
        ))
        .with(Action::service("haproxy", ServiceState::Started, Some(false)))
}
