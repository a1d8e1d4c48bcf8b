use std::time::Duration;

use super::Context;
use crate::{LightsailCliError, Result};

pub async fn execute(
    ctx: &Context,
    name: String,
    command: String,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.settings.ssh.command_timeout());

    let clients = ctx.clients().await?;
    let executor = ctx.executor(&clients, &name);

    let result = executor.run_command(&command, timeout).await;
    if result.success {
        Ok(())
    } else {
        Err(LightsailCliError::SshCommand(result.output))
    }
}
