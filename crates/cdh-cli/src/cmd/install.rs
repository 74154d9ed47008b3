use crate::cmd;
use crate::output::print_summary;
use anyhow::Context;
use cdh_core::pipeline::Pipeline;
use cdh_core::recipes::RecipeContext;
use cdh_core::ssh::SshBackend;
use cdh_core::stage::InstallPlan;
use std::path::Path;
use tracing::info;

pub fn run(root: &Path, password: Option<String>, ha: bool, json: bool) -> anyhow::Result<()> {
    let secret = cmd::require_secret(password)?;
    let (config, inventory) = cmd::load(root, ha)?;

    let ctx = RecipeContext::resolve(root, &config, &inventory)
        .context("failed to derive install context")?;
    let plan = InstallPlan::install(&config, &ctx).context("failed to build install plan")?;
    info!(ha = config.ha, root = %root.display(), "installing");

    let hosts = cmd::install_key_targets(&inventory);
    cmd::bootstrap_keys(root, &config, &hosts, &secret)?;

    let backend = SshBackend::new(&config, &inventory, secret);
    let mut pipeline = Pipeline::new(&backend, &inventory, config.gating);
    let summary = pipeline.run(&plan);

    print_summary(&summary, json)?;
    cmd::finish(&summary)
}
