//! Fixed, non-transactional deployment pipeline.
//!
//! Steps run in order through the [`RemoteExecutor`]. A failing required step
//! stops the pipeline; best-effort steps are reported and skipped over. No
//! rollback is attempted; the install script leaves a timestamped backup.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use super::scripts::{env_file_script, install_script, service_unit_script};
use crate::aws::Lightsail;
use crate::config::AppSettings;
use crate::ssh::{CommandResult, CommandRunner, RemoteExecutor};

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub name: String,
    pub required: bool,
    pub result: CommandResult,
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    pub steps: Vec<StepOutcome>,
}

impl DeploymentReport {
    /// The first failed required step, if any
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.required && !s.result.success)
    }

    pub fn succeeded(&self) -> bool {
        self.failed_step().is_none()
    }

    /// Best-effort steps that failed without stopping the deployment
    pub fn warnings(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.required && !s.result.success)
    }
}

pub struct DeploymentSequencer<'e, 'a, L, R> {
    executor: &'e RemoteExecutor<'a, L, R>,
    app: &'e AppSettings,
    copy_timeout: Duration,
}

impl<'e, 'a, L: Lightsail, R: CommandRunner> DeploymentSequencer<'e, 'a, L, R> {
    pub fn new(
        executor: &'e RemoteExecutor<'a, L, R>,
        app: &'e AppSettings,
        copy_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            app,
            copy_timeout,
        }
    }

    pub async fn deploy(
        &self,
        archive: &Path,
        env_vars: &BTreeMap<String, String>,
    ) -> DeploymentReport {
        let mut report = DeploymentReport::default();
        let service = &self.app.service_name;

        println!("Starting application deployment...");

        let upload = self
            .executor
            .copy_file_to_instance(
                &archive.display().to_string(),
                &self.app.remote_archive,
                self.copy_timeout,
            )
            .await;
        if !record(&mut report, "upload archive", true, upload) {
            return report;
        }

        println!("Stopping existing application...");
        self.step(
            &mut report,
            "stop service",
            false,
            &format!("sudo systemctl stop {} || true", service),
            self.app.command_timeout(),
        )
        .await;

        if !self
            .step(
                &mut report,
                "install application",
                true,
                &install_script(self.app),
                self.app.deploy_timeout(),
            )
            .await
        {
            println!("Failed to deploy application");
            return report;
        }

        if !env_vars.is_empty() {
            println!("Creating environment file...");
            self.step(
                &mut report,
                "write environment file",
                false,
                &env_file_script(self.app, env_vars),
                self.app.command_timeout(),
            )
            .await;
        }

        println!("Updating systemd service...");
        self.step(
            &mut report,
            "write service unit",
            false,
            &service_unit_script(self.app),
            self.app.command_timeout(),
        )
        .await;

        println!("Starting application...");
        let restarts = [
            ("reload systemd", "sudo systemctl daemon-reload".to_string()),
            ("enable service", format!("sudo systemctl enable {}", service)),
            ("start service", format!("sudo systemctl start {}", service)),
            (
                "restart web server",
                format!("sudo systemctl restart {}", self.app.web_server),
            ),
        ];
        for (name, command) in &restarts {
            self.step(&mut report, name, false, command, self.app.command_timeout())
                .await;
        }

        tokio::time::sleep(self.app.status_delay()).await;
        self.step(
            &mut report,
            "service status",
            false,
            &format!("sudo systemctl status {} --no-pager", service),
            self.app.command_timeout(),
        )
        .await;

        println!("Application deployment completed!");
        report
    }

    async fn step(
        &self,
        report: &mut DeploymentReport,
        name: &str,
        required: bool,
        command: &str,
        timeout: Duration,
    ) -> bool {
        let result = self.executor.run_command(command, timeout).await;
        record(report, name, required, result)
    }
}

fn record(
    report: &mut DeploymentReport,
    name: &str,
    required: bool,
    result: CommandResult,
) -> bool {
    let success = result.success;
    if !success {
        tracing::warn!(step = name, required, "deployment step failed");
    }
    report.steps.push(StepOutcome {
        name: name.to_string(),
        required,
        result,
    });
    success
}
