use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Context;
use crate::deploy::{parse_env_vars, DeploymentSequencer};
use crate::{LightsailCliError, Result};

pub async fn execute(
    ctx: &Context,
    name: String,
    archive: PathBuf,
    env_vars: Option<String>,
) -> Result<()> {
    // Validate local inputs before any remote call
    let env_vars = match env_vars {
        Some(json) => parse_env_vars(&json)?,
        None => BTreeMap::new(),
    };

    if !archive.is_file() {
        return Err(LightsailCliError::PathNotFound(archive.display().to_string()));
    }

    let clients = ctx.clients().await?;
    let executor = ctx.executor(&clients, &name);
    let sequencer = DeploymentSequencer::new(
        &executor,
        &ctx.settings.app,
        ctx.settings.ssh.copy_timeout(),
    );

    let report = sequencer.deploy(&archive, &env_vars).await;

    let warnings: Vec<_> = report.warnings().map(|s| s.name.as_str()).collect();
    if !warnings.is_empty() {
        println!("Completed with warnings: {}", warnings.join(", "));
    }

    match report.failed_step() {
        None => {
            println!("Deployment successful!");
            Ok(())
        }
        Some(step) => {
            println!("Deployment failed!");
            Err(LightsailCliError::DeploymentFailed(format!(
                "{}: {}",
                step.name, step.result.output
            )))
        }
    }
}
