use crate::cmd;
use crate::output::{print_json, print_table};
use cdh_core::inventory::Target;
use cdh_core::pipeline::{Pipeline, Verdict};
use cdh_core::recipes;
use cdh_core::ssh::SshBackend;
use std::path::Path;

pub fn run(
    root: &Path,
    password: Option<String>,
    hosts: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let secret = cmd::require_secret(password)?;
    let explicit = hosts.is_some();
    let hosts = if explicit {
        cmd::require_hosts(hosts)?
    } else {
        Vec::new()
    };
    let (config, inventory) = cmd::load(root, false)?;
    let hosts = if explicit {
        hosts
    } else {
        cmd::cluster_hosts(&config, &inventory)?
    };

    cmd::bootstrap_keys(root, &config, &hosts, &secret)?;

    let backend = SshBackend::new(&config, &inventory, secret);
    let pipeline = Pipeline::new(&backend, &inventory, config.gating);
    let verdict = pipeline.check(&recipes::capability_check(Target::Hosts { hosts }));

    if json {
        print_json(&verdict)?;
    } else {
        let rows = match &verdict {
            Verdict::Ok => vec![],
            Verdict::StageFailed { diagnostics, .. } => diagnostics
                .iter()
                .map(|d| {
                    vec![
                        d.host.clone(),
                        d.status.to_string(),
                        d.stderr.lines().last().unwrap_or_default().to_string(),
                    ]
                })
                .collect(),
            Verdict::Fatal { reason } => {
                vec![vec!["-".to_string(), "fatal".to_string(), reason.clone()]]
            }
        };
        if rows.is_empty() {
            println!("All hosts passed the capability check.");
        } else {
            print_table(&["HOST", "STATUS", "DETAIL"], rows);
        }
    }

    if !verdict.is_ok() {
        anyhow::bail!("capability check failed");
    }
    Ok(())
}
