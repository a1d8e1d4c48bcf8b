use std::time::Duration;

use super::Context;
use crate::aws::Lightsail;
use crate::ssh::{CommandRunner, RemoteExecutor};
use crate::user_data::COMPLETION_MARKER;
use crate::Result;

/// A titled group of diagnostic commands
#[derive(Debug, Clone)]
pub struct CheckSection {
    pub title: &'static str,
    pub commands: Vec<String>,
}

/// Checks for first-boot setup and the Node.js runtime
pub fn runtime_checks() -> Vec<CheckSection> {
    let section = |title, commands: &[&str]| CheckSection {
        title,
        commands: commands.iter().map(|c| c.to_string()).collect(),
    };

    vec![
        section(
            "Checking user_data script execution logs",
            &["sudo tail -50 /var/log/cloud-init-output.log"],
        ),
        CheckSection {
            title: "Checking if user_data completion marker exists",
            commands: vec![format!("ls -la {}", COMPLETION_MARKER)],
        },
        section(
            "Checking Node.js installation",
            &[
                "which node",
                "node --version",
                "which npm",
                "npm --version",
                "ls -la /usr/bin/node*",
                "ls -la /usr/bin/npm*",
                "ls -la /snap/bin/node*",
                "ls -la /snap/bin/npm*",
                "echo $PATH",
            ],
        ),
        section("Checking snap packages", &["snap list | grep node"]),
        section("Checking apt packages", &["dpkg -l | grep node"]),
        section(
            "Checking if NodeSource repository was added",
            &["ls -la /etc/apt/sources.list.d/ | grep node"],
        ),
        section(
            "Checking system logs for Node.js installation attempts",
            &["sudo grep -i node /var/log/cloud-init-output.log | tail -20"],
        ),
    ]
}

/// Run every check; failures are shown and never stop the run
pub async fn run_checks<L: Lightsail, R: CommandRunner>(
    executor: &RemoteExecutor<'_, L, R>,
    sections: &[CheckSection],
    timeout: Duration,
) -> (usize, usize) {
    let mut passed = 0;
    let mut failed = 0;

    for section in sections {
        println!();
        println!("{}:", section.title);
        for command in &section.commands {
            if executor.run_command(command, timeout).await.success {
                passed += 1;
            } else {
                failed += 1;
            }
        }
    }

    (passed, failed)
}

pub async fn execute(ctx: &Context, name: Option<String>) -> Result<()> {
    let name = ctx.instance_name(name)?;

    println!("Checking Node.js Installation Status");
    println!("{}", "=".repeat(50));

    let clients = ctx.clients().await?;
    let executor = ctx.executor(&clients, &name);

    let (passed, failed) =
        run_checks(&executor, &runtime_checks(), ctx.settings.ssh.command_timeout()).await;

    println!();
    println!("{} checks succeeded, {} failed", passed, failed);
    Ok(())
}
