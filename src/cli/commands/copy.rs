use super::Context;
use crate::ssh::parse_transfer;
use crate::{LightsailCliError, Result};

pub async fn execute(
    ctx: &Context,
    name: String,
    src: String,
    dest: String,
    recursive: bool,
) -> Result<()> {
    // Parse source and destination to determine direction
    let transfer = parse_transfer(&src, &dest)?;

    let clients = ctx.clients().await?;
    let executor = ctx.executor(&clients, &name);

    let result = executor
        .copy(&transfer, recursive, ctx.settings.ssh.copy_timeout())
        .await;
    if result.success {
        Ok(())
    } else {
        Err(LightsailCliError::ScpTransfer(result.output))
    }
}
