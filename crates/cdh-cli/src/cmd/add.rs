use crate::cmd;
use crate::output::print_summary;
use anyhow::Context;
use cdh_core::pipeline::Pipeline;
use cdh_core::recipes::RecipeContext;
use cdh_core::ssh::SshBackend;
use cdh_core::stage::InstallPlan;
use std::path::Path;
use tracing::info;

pub fn run(
    root: &Path,
    hosts: Option<String>,
    password: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let secret = cmd::require_secret(password)?;
    let hosts = cmd::require_hosts(hosts)?;
    let (config, inventory) = cmd::load(root, false)?;

    let ctx = RecipeContext::resolve(root, &config, &inventory)
        .context("failed to derive install context")?;
    info!(hosts = ?hosts, "adding agents");
    cmd::bootstrap_keys(root, &config, &hosts, &secret)?;
    let plan = InstallPlan::add_agents(&config, &ctx, hosts);

    let backend = SshBackend::new(&config, &inventory, secret);
    let mut pipeline = Pipeline::new(&backend, &inventory, config.gating);
    let summary = pipeline.run(&plan);

    print_summary(&summary, json)?;
    cmd::finish(&summary)
}
