use std::path::Path;

use super::Context;
use crate::package::{create_deployment_package, deployment_commands, write_deploy_script};
use crate::Result;

pub fn execute(ctx: &Context, source: &Path, output: &Path, script: &Path) -> Result<()> {
    println!("Creating deployment package...");
    let count = create_deployment_package(source, output)?;
    println!("Created deployment package: {} ({} files)", output.display(), count);

    let commands = deployment_commands(source, &ctx.settings.site)?;
    println!("Prepared {} deployment commands", commands.len());

    write_deploy_script(script, &commands)?;
    println!("Created deployment script: {}", script.display());

    println!();
    println!("To complete deployment:");
    println!("  lightsail-cli copy <NAME> {} :/tmp/deploy-script.sh", script.display());
    println!("  lightsail-cli exec <NAME> -c 'bash /tmp/deploy-script.sh'");

    Ok(())
}
