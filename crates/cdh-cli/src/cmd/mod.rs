pub mod add;
pub mod check;
pub mod config;
pub mod install;

use anyhow::Context;
use cdh_core::config::Config;
use cdh_core::inventory::{parse_host_list, FileInventory, Inventory};
use cdh_core::keys;
use cdh_core::outcome::HostStatus;
use cdh_core::paths;
use cdh_core::pipeline::{RunState, RunSummary};
use std::fmt;
use std::path::Path;

/// A required command line input is absent. Reported before anything is
/// dispatched; exits with status 2.
#[derive(Debug)]
pub struct MissingInput(pub &'static str);

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing required input: {}", self.0)
    }
}

impl std::error::Error for MissingInput {}

pub fn require_secret(password: Option<String>) -> anyhow::Result<String> {
    match password {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(MissingInput("--password (or CDH_SSH_PASSWORD)").into()),
    }
}

pub fn require_hosts(hosts: Option<String>) -> anyhow::Result<Vec<String>> {
    let parsed = hosts.as_deref().map(parse_host_list).unwrap_or_default();
    if parsed.is_empty() {
        return Err(MissingInput("--hosts").into());
    }
    Ok(parsed)
}

/// Load configuration and inventory, refusing to go on when validation
/// reports errors.
pub fn load(root: &Path, ha: bool) -> anyhow::Result<(Config, FileInventory)> {
    let loaded = Config::load(root).context("failed to load config")?;
    let config = loaded.with_ha(loaded.ha || ha);
    for w in config.validate() {
        match w.level {
            cdh_core::config::WarnLevel::Warning => tracing::warn!("{}", w.message),
            cdh_core::config::WarnLevel::Error => {
                anyhow::bail!("invalid configuration: {}", w.message)
            }
        }
    }
    let inventory = FileInventory::load(root).context("failed to load inventory")?;
    Ok((config, inventory))
}

/// Generate the local key pair if needed and push it to `hosts`.
pub fn bootstrap_keys(
    root: &Path,
    config: &Config,
    hosts: &[String],
    secret: &str,
) -> anyhow::Result<()> {
    let home = home::home_dir().context("cannot determine home directory")?;
    let key = keys::ensure_key_pair(&home)?;
    let rpm = config
        .packages
        .sshpass
        .as_deref()
        .map(|f| paths::package_path(root, f));
    let statuses = keys::distribute(hosts, &config.ssh, secret, &key, rpm.as_deref());
    let failed = statuses
        .iter()
        .filter(|(_, s)| *s != HostStatus::Ok)
        .count();
    if failed > 0 {
        tracing::warn!(failed, total = statuses.len(), "key distribution incomplete");
    }
    Ok(())
}

pub fn cluster_hosts(config: &Config, inventory: &FileInventory) -> anyhow::Result<Vec<String>> {
    inventory
        .resolve_group(&config.groups.cluster)
        .with_context(|| format!("cannot resolve group '{}'", config.groups.cluster))
}

/// A full install reaches every inventory host, including load balancers and
/// database hosts outside the cluster group.
pub fn install_key_targets(inventory: &dyn Inventory) -> Vec<String> {
    inventory.all_hosts()
}

pub fn finish(summary: &RunSummary) -> anyhow::Result<()> {
    match &summary.state {
        RunState::Aborted { reason } => anyhow::bail!("run aborted: {reason}"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_keys_reach_hosts_outside_the_cluster_group() {
        let inv = FileInventory::from_yaml_str(
            "hosts:\n  10.0.0.1: {}\n  10.0.0.2: {}\n  10.0.0.9: {}\ngroups:\n  cdh_servers: [10.0.0.1, 10.0.0.2]\n  haproxy_server: [10.0.0.9]\n",
        )
        .unwrap();
        assert_eq!(
            install_key_targets(&inv),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.9"]
        );
    }
}
