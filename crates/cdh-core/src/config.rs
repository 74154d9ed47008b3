use crate::error::{InstallError, Result};
use crate::paths;
use crate::template::{self, Vars};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SshConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_ssh_user")]
    pub user: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum number of hosts a single action is fanned out to at once.
    #[serde(default = "default_forks")]
    pub forks: usize,
    /// Per-host wall clock limit for one action. `None` waits indefinitely.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_forks() -> usize {
    5
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            user: default_ssh_user(),
            connect_timeout_secs: default_connect_timeout(),
            forks: default_forks(),
            command_timeout_secs: None,
        }
    }
}

impl SshConfig {
    pub fn is_root(&self) -> bool {
        self.user == "root"
    }
}

// ---------------------------------------------------------------------------
// PackagesConfig
// ---------------------------------------------------------------------------

/// File names under `packages/` on the control host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackagesConfig {
    pub mysql: String,
    pub jdk: String,
    pub cdh_parcels: String,
    pub cdh_cm: String,
    pub log4j: String,
    /// JDBC driver path inside the unpacked CM archive.
    #[serde(default = "default_mysql_connector")]
    pub mysql_connector: String,
    #[serde(default)]
    pub sshpass: Option<String>,
}

fn default_mysql_connector() -> String {
    "packages/mysql-connector-java-5.1.46.jar".to_string()
}

impl PackagesConfig {
    /// Directory name the log4j archive unpacks into.
    pub fn log4j_dir(&self) -> &str {
        self.log4j
            .strip_suffix(".tar.gz")
            .or_else(|| self.log4j.strip_suffix(".tgz"))
            .unwrap_or(&self.log4j)
    }
}

// ---------------------------------------------------------------------------
// GroupsConfig
// ---------------------------------------------------------------------------

/// Inventory group names for each role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    #[serde(default = "default_cluster_group")]
    pub cluster: String,
    #[serde(default = "default_database_group")]
    pub database: String,
    #[serde(default = "default_mgmt_server_group")]
    pub mgmt_server: String,
    #[serde(default = "default_mgmt_agent_group")]
    pub mgmt_agent: String,
    #[serde(default = "default_load_balancer_group")]
    pub load_balancer: String,
}

fn default_cluster_group() -> String {
    "cdh_servers".to_string()
}

fn default_database_group() -> String {
    "db_server".to_string()
}

fn default_mgmt_server_group() -> String {
    "scm_server".to_string()
}

fn default_mgmt_agent_group() -> String {
    "scm_agent".to_string()
}

fn default_load_balancer_group() -> String {
    "haproxy_server".to_string()
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            cluster: default_cluster_group(),
            database: default_database_group(),
            mgmt_server: default_mgmt_server_group(),
            mgmt_agent: default_mgmt_agent_group(),
            load_balancer: default_load_balancer_group(),
        }
    }
}

// ---------------------------------------------------------------------------
// Load balancer backends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpalaConfig {
    #[serde(default)]
    pub impala_server: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HiveConfig {
    #[serde(default)]
    pub hs2_server: Vec<String>,
}

// ---------------------------------------------------------------------------
// GatePolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    Abort,
    Continue,
}

/// What the pipeline does with a failing verdict at each kind of gate.
///
/// The defaults reproduce the historical installer: an unhealthy fleet stops
/// the run before anything is touched, a failing stage is logged and the run
/// moves on. `Fatal` verdicts abort regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    #[serde(default = "default_capability_policy")]
    pub capability_check: OnFailure,
    #[serde(default = "default_stage_policy")]
    pub stage: OnFailure,
}

fn default_capability_policy() -> OnFailure {
    OnFailure::Abort
}

fn default_stage_policy() -> OnFailure {
    OnFailure::Continue
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            capability_check: default_capability_policy(),
            stage: default_stage_policy(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshConfig,
    /// Service credentials, e.g. `my_root`, `my_repl`, `scm`.
    #[serde(default)]
    pub password: BTreeMap<String, String>,
    pub packages: PackagesConfig,
    #[serde(default = "default_mysql_install_path")]
    pub mysql_install_path: String,
    #[serde(default = "default_remote_temp_dir")]
    pub remote_temp_dir: String,
    #[serde(default)]
    pub ha: bool,
    #[serde(default)]
    pub ntp_external_server: Option<String>,
    #[serde(default)]
    pub impala: ImpalaConfig,
    #[serde(default)]
    pub hive: HiveConfig,
    #[serde(default)]
    pub groups: GroupsConfig,
    #[serde(default)]
    pub gating: GatePolicy,
}

fn default_mysql_install_path() -> String {
    "/usr/local".to_string()
}

fn default_remote_temp_dir() -> String {
    paths::DEFAULT_REMOTE_TEMP_DIR.to_string()
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(InstallError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Copy of this config with high-availability mode switched on or off.
    pub fn with_ha(&self, ha: bool) -> Self {
        Self {
            ha,
            ..self.clone()
        }
    }

    pub fn secret(&self, name: &str) -> Result<&str> {
        self.password
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| InstallError::Config(format!("password.{name} is not set")))
    }

    /// Path of the `mysql` client below the configured install prefix.
    pub fn mysql_client(&self) -> String {
        paths::remote_join(&self.mysql_install_path, "mysql/bin/mysql")
    }

    /// Variables every rendered argument and template can reference.
    pub fn template_vars(&self) -> Vars {
        let mut vars = Vars::new();
        for (name, value) in &self.password {
            template::set(&mut vars, name, value);
        }
        template::set(&mut vars, "ssh_port", self.ssh.port.to_string());
        template::set(&mut vars, "mysql_install_path", &self.mysql_install_path);
        vars.insert(
            "impala_server".to_string(),
            json!(self.impala.impala_server),
        );
        vars.insert("hs2_server".to_string(), json!(self.hive.hs2_server));
        vars
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.ssh.port == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "ssh.port must be non-zero".to_string(),
            });
        }

        if self.ssh.forks == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "ssh.forks must be at least 1".to_string(),
            });
        }

        let mut required = vec!["my_root", "scm"];
        if self.ha {
            required.push("my_repl");
        }
        for name in required {
            match self.password.get(name) {
                None => warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("password.{name} is required"),
                }),
                Some(v) if v.is_empty() => warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("password.{name} is empty"),
                }),
                Some(_) => {}
            }
        }

        for (key, value) in [
            ("mysql", &self.packages.mysql),
            ("jdk", &self.packages.jdk),
            ("cdh-parcels", &self.packages.cdh_parcels),
            ("cdh-cm", &self.packages.cdh_cm),
            ("log4j", &self.packages.log4j),
        ] {
            if value.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("packages.{key} is empty"),
                });
            }
        }

        if !self.remote_temp_dir.starts_with('/') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "remote_temp_dir '{}' must be an absolute path",
                    self.remote_temp_dir
                ),
            });
        }

        if self.ha && self.impala.impala_server.is_empty() && self.hive.hs2_server.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "ha is enabled but no impala or hiveserver2 backends are configured"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
