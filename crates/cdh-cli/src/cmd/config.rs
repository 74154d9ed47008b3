use crate::output::print_json;
use anyhow::Context;
use cdh_core::config::{Config, ConfigWarning, WarnLevel};
use cdh_core::inventory::{FileInventory, Inventory};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate configuration and inventory for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Groups the install plan targets, checked against the inventory.
fn group_warnings(config: &Config, inventory: &dyn Inventory) -> Vec<ConfigWarning> {
    let groups = &config.groups;
    let mut required = vec![
        &groups.cluster,
        &groups.database,
        &groups.mgmt_server,
        &groups.mgmt_agent,
    ];
    if config.ha {
        required.push(&groups.load_balancer);
    }

    let mut warnings = Vec::new();
    for name in required {
        match inventory.resolve_group(name) {
            Ok(hosts) if hosts.is_empty() => warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("inventory group '{name}' has no hosts"),
            }),
            Ok(_) => {}
            Err(e) => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: e.to_string(),
            }),
        }
    }

    if config.ha {
        let db = inventory.resolve_group(&groups.database).unwrap_or_default();
        if db.len() < 2 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "ha needs two hosts in '{}' for replication, found {}",
                    groups.database,
                    db.len()
                ),
            });
        }
    }
    warnings
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let inventory = FileInventory::load(root).context("failed to load inventory")?;

    let mut warnings = config.validate();
    warnings.extend(group_warnings(&config, &inventory));

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
