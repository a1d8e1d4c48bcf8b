//! Remote command execution with per-call ephemeral credentials.
//!
//! Every call fetches fresh access details from Lightsail, materializes them
//! as [`TemporaryCredentialFiles`], runs one `ssh` or `scp` subprocess, and
//! drops the files before returning. Failures of any kind come back as a
//! failed [`CommandResult`]; nothing propagates to the caller.

use std::process::Output;
use std::time::Duration;

use super::credentials::TemporaryCredentialFiles;
use super::runner::CommandRunner;
use crate::aws::{InstanceAccessDetails, Lightsail};
use crate::config::SshSettings;
use crate::output::{command_preview, print_failure, print_success};
use crate::{LightsailCliError, Result};

/// Outcome of one remote command or copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    /// stdout on success, stderr (or a status message) on failure
    pub output: String,
}

impl CommandResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Binaries and connect timeout for the ssh/scp subprocess
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub ssh_program: String,
    pub scp_program: String,
    pub connect_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self::from(&SshSettings::default())
    }
}

impl From<&SshSettings> for SshOptions {
    fn from(settings: &SshSettings) -> Self {
        Self {
            ssh_program: settings.ssh_program.clone(),
            scp_program: settings.scp_program.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
        }
    }
}

/// Direction of an `scp` copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Upload { local: String, remote: String },
    Download { remote: String, local: String },
}

pub struct RemoteExecutor<'a, L, R> {
    lightsail: &'a L,
    runner: R,
    instance: String,
    options: SshOptions,
}

impl<'a, L: Lightsail, R: CommandRunner> RemoteExecutor<'a, L, R> {
    pub fn new(
        lightsail: &'a L,
        runner: R,
        instance: impl Into<String>,
        options: SshOptions,
    ) -> Self {
        Self {
            lightsail,
            runner,
            instance: instance.into(),
            options,
        }
    }

    /// Run a shell command on the instance
    pub async fn run_command(&self, command: &str, timeout: Duration) -> CommandResult {
        println!("[{}] {}", self.instance, command_preview(command));

        let result = self
            .execute(&self.options.ssh_program, timeout, |details, files| {
                let mut args = self.credential_args(files);
                args.push(details.destination());
                args.push(command.to_string());
                args
            })
            .await;

        self.finish(result)
    }

    /// Copy one file (or tree, with `recursive`) to or from the instance
    pub async fn copy(
        &self,
        transfer: &Transfer,
        recursive: bool,
        timeout: Duration,
    ) -> CommandResult {
        match transfer {
            Transfer::Upload { local, remote } => println!("Copying {} to {}", local, remote),
            Transfer::Download { remote, local } => println!("Copying {} to {}", remote, local),
        }

        let result = self
            .execute(&self.options.scp_program, timeout, |details, files| {
                let mut args = self.credential_args(files);
                if recursive {
                    args.push("-r".to_string());
                }
                match transfer {
                    Transfer::Upload { local, remote } => {
                        args.push(local.clone());
                        args.push(remote_spec(details, remote));
                    }
                    Transfer::Download { remote, local } => {
                        args.push(remote_spec(details, remote));
                        args.push(local.clone());
                    }
                }
                args
            })
            .await;

        self.finish(result)
    }

    /// Upload a single local file
    pub async fn copy_file_to_instance(
        &self,
        local: &str,
        remote: &str,
        timeout: Duration,
    ) -> CommandResult {
        let transfer = Transfer::Upload {
            local: local.to_string(),
            remote: remote.to_string(),
        };
        self.copy(&transfer, false, timeout).await
    }

    async fn execute<F>(&self, program: &str, timeout: Duration, build_args: F) -> Result<Output>
    where
        F: FnOnce(&InstanceAccessDetails, &TemporaryCredentialFiles) -> Vec<String>,
    {
        tracing::debug!(instance = %self.instance, "fetching access details");
        let details = self
            .lightsail
            .get_instance_access_details(&self.instance)
            .await?;

        let files = TemporaryCredentialFiles::create(&details)?;
        let args = build_args(&details, &files);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = self.runner.run_with_timeout(program, &arg_refs, timeout).await;
        drop(files);
        output
    }

    fn credential_args(&self, files: &TemporaryCredentialFiles) -> Vec<String> {
        vec![
            "-i".to_string(),
            files.key_path().display().to_string(),
            "-o".to_string(),
            format!("CertificateFile={}", files.cert_path().display()),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout.as_secs()),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
        ]
    }

    fn finish(&self, result: Result<Output>) -> CommandResult {
        match result {
            Ok(output) => {
                let result = command_result(&output);
                if result.success {
                    print_success(&result.output);
                } else {
                    print_failure(&exit_description(&output), &result.output);
                }
                result
            }
            Err(e) => {
                println!("   Error: {}", e);
                CommandResult::failed(e.to_string())
            }
        }
    }
}

/// scp receives the path as its own argv entry, with no local shell in between
fn remote_spec(details: &InstanceAccessDetails, path: &str) -> String {
    format!("{}:{}", details.destination(), path)
}

fn exit_description(output: &Output) -> String {
    match output.status.code() {
        Some(code) => format!("exit code: {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Convert process output into a `CommandResult`
pub fn command_result(output: &Output) -> CommandResult {
    if output.status.success() {
        CommandResult::ok(String::from_utf8_lossy(&output.stdout).trim())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            CommandResult::failed(format!("Command failed ({})", exit_description(output)))
        } else {
            CommandResult::failed(stderr)
        }
    }
}

/// Parse `SRC DEST` where exactly one side is prefixed with `:` for remote
pub fn parse_transfer(src: &str, dest: &str) -> Result<Transfer> {
    let src_remote = src.strip_prefix(':');
    let dest_remote = dest.strip_prefix(':');

    match (src_remote, dest_remote) {
        (None, Some(remote)) => Ok(Transfer::Upload {
            local: src.to_string(),
            remote: remote.to_string(),
        }),
        (Some(remote), None) => Ok(Transfer::Download {
            remote: remote.to_string(),
            local: dest.to_string(),
        }),
        (Some(_), Some(_)) => Err(LightsailCliError::InvalidPath(
            "Both source and destination cannot be remote".to_string(),
        )),
        (None, None) => Err(LightsailCliError::InvalidPath(
            "One of source or destination must be remote (prefix with :)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::fake::FakeLightsail;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;

    /// Records the call and checks the credential files while "ssh" runs
    #[derive(Clone)]
    struct RecordingRunner {
        calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
        seen_files: Arc<Mutex<Vec<(PathBuf, bool, u32)>>>,
        result: Arc<dyn Fn() -> Result<Output> + Send + Sync>,
    }

    impl RecordingRunner {
        fn returning(result: impl Fn() -> Result<Output> + Send + Sync + 'static) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                seen_files: Arc::new(Mutex::new(Vec::new())),
                result: Arc::new(result),
            }
        }

        fn last_args(&self) -> Vec<String> {
            self.calls.lock().unwrap().last().unwrap().1.clone()
        }

        fn seen_paths(&self) -> Vec<PathBuf> {
            self.seen_files
                .lock()
                .unwrap()
                .iter()
                .map(|(p, _, _)| p.clone())
                .collect()
        }
    }

    impl CommandRunner for RecordingRunner {
        async fn run_with_timeout(
            &self,
            program: &str,
            args: &[&str],
            _timeout: Duration,
        ) -> Result<Output> {
            let key = args[1].to_string();
            let cert = args[3].trim_start_matches("CertificateFile=").to_string();
            for path in [key, cert] {
                let path = PathBuf::from(path);
                let meta = std::fs::metadata(&path);
                #[cfg(unix)]
                let mode = meta
                    .as_ref()
                    .map(|m| std::os::unix::fs::PermissionsExt::mode(&m.permissions()) & 0o777)
                    .unwrap_or(0);
                #[cfg(not(unix))]
                let mode = 0o600;
                self.seen_files
                    .lock()
                    .unwrap()
                    .push((path, meta.is_ok(), mode));
            }
            self.calls.lock().unwrap().push((
                program.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            ));
            (self.result)()
        }
    }

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_returns_stdout_and_cleans_up() {
        let fake = FakeLightsail::running();
        let runner = RecordingRunner::returning(|| Ok(output(0, "v20.11.1\n", "")));
        let executor = RemoteExecutor::new(&fake, runner.clone(), "app", SshOptions::default());

        let result = executor.run_command("node --version", Duration::from_secs(5)).await;

        assert_eq!(result, CommandResult::ok("v20.11.1"));
        let seen = runner.seen_files.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        for (path, existed, mode) in &seen {
            assert!(existed, "{} should exist during the call", path.display());
            assert_eq!(*mode, 0o600);
            assert!(!path.exists(), "{} should be removed", path.display());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ssh_arguments() {
        let fake = FakeLightsail::running();
        let runner = RecordingRunner::returning(|| Ok(output(0, "", "")));
        let options = SshOptions {
            connect_timeout: Duration::from_secs(7),
            ..SshOptions::default()
        };
        let executor = RemoteExecutor::new(&fake, runner.clone(), "app", options);

        executor.run_command("uptime", Duration::from_secs(5)).await;

        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(calls[0].0, "ssh");
        let args = runner.last_args();
        assert_eq!(args[0], "-i");
        assert!(args[3].starts_with("CertificateFile="));
        assert!(args.contains(&"StrictHostKeyChecking=no".to_string()));
        assert!(args.contains(&"UserKnownHostsFile=/dev/null".to_string()));
        assert!(args.contains(&"ConnectTimeout=7".to_string()));
        assert!(args.contains(&"IdentitiesOnly=yes".to_string()));
        assert_eq!(args[args.len() - 2], "ubuntu@203.0.113.10");
        assert_eq!(args[args.len() - 1], "uptime");
        assert_eq!(fake.call_log(), vec!["get_instance_access_details"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_returns_stderr() {
        let fake = FakeLightsail::running();
        let runner = RecordingRunner::returning(|| Ok(output(2, "", "ls: cannot access\n")));
        let executor = RemoteExecutor::new(&fake, runner, "app", SshOptions::default());

        let result = executor.run_command("ls /nope", Duration::from_secs(5)).await;
        assert_eq!(result, CommandResult::failed("ls: cannot access"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_without_stderr_has_message() {
        let fake = FakeLightsail::running();
        let runner = RecordingRunner::returning(|| Ok(output(1, "", "")));
        let executor = RemoteExecutor::new(&fake, runner, "app", SshOptions::default());

        let result = executor.run_command("false", Duration::from_secs(5)).await;
        assert!(!result.success);
        assert!(result.output.contains("exit code: 1"));
    }

    #[tokio::test]
    async fn test_runner_error_is_downgraded_and_cleans_up() {
        let fake = FakeLightsail::running();
        let runner = RecordingRunner::returning(|| {
            Err(LightsailCliError::Timeout("ssh timed out after 1s".to_string()))
        });
        let executor = RemoteExecutor::new(&fake, runner.clone(), "app", SshOptions::default());

        let result = executor.run_command("sleep 100", Duration::from_secs(1)).await;

        assert!(!result.success);
        assert!(result.output.contains("timed out"));
        for path in runner.seen_paths() {
            assert!(!path.exists());
        }
    }

    #[tokio::test]
    async fn test_access_details_failure_skips_subprocess() {
        let fake = FakeLightsail::running().with_access(None);
        let runner = RecordingRunner::returning(|| unreachable!("runner must not be called"));
        let executor = RemoteExecutor::new(&fake, runner.clone(), "missing", SshOptions::default());

        let result = executor.run_command("uptime", Duration::from_secs(1)).await;

        assert!(!result.success);
        assert!(result.output.contains("missing"));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_and_download_arguments() {
        let fake = FakeLightsail::running();
        let runner = RecordingRunner::returning(|| Ok(output(0, "", "")));
        let executor = RemoteExecutor::new(&fake, runner.clone(), "app", SshOptions::default());

        let result = executor
            .copy_file_to_instance("dist/app.tar.gz", "/tmp/app.tar.gz", Duration::from_secs(5))
            .await;
        assert!(result.success);
        let args = runner.last_args();
        assert_eq!(runner.calls.lock().unwrap()[0].0, "scp");
        assert_eq!(args[args.len() - 2], "dist/app.tar.gz");
        assert_eq!(args[args.len() - 1], "ubuntu@203.0.113.10:/tmp/app.tar.gz");

        let download = Transfer::Download {
            remote: "/var/log/my app.log".to_string(),
            local: "app.log".to_string(),
        };
        executor.copy(&download, true, Duration::from_secs(5)).await;
        let args = runner.last_args();
        assert_eq!(args[args.len() - 3], "-r");
        assert_eq!(args[args.len() - 2], "ubuntu@203.0.113.10:/var/log/my app.log");
        assert_eq!(args[args.len() - 1], "app.log");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_process_nonzero_exit() {
        use crate::ssh::TokioCommandRunner;

        let fake = FakeLightsail::running();
        let options = SshOptions {
            ssh_program: "false".to_string(),
            ..SshOptions::default()
        };
        let executor = RemoteExecutor::new(&fake, TokioCommandRunner, "app", options);

        let result = executor.run_command("uptime", Duration::from_secs(10)).await;
        assert!(!result.success);
        assert!(!result.output.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_process_timeout_leaves_no_child() {
        use crate::ssh::TokioCommandRunner;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = dir.path().join("fake-ssh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let fake = FakeLightsail::running();
        let options = SshOptions {
            ssh_program: script.display().to_string(),
            ..SshOptions::default()
        };
        let executor = RemoteExecutor::new(&fake, TokioCommandRunner, "app", options);

        let started = std::time::Instant::now();
        let result = executor.run_command("uptime", Duration::from_millis(500)).await;
        assert!(!result.success);
        assert!(result.output.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let alive = std::process::Command::new("kill")
            .args(["-0", &pid])
            .status()
            .unwrap();
        assert!(!alive.success(), "child {} should have been killed", pid);
    }

    #[test]
    fn test_parse_transfer() {
        assert_eq!(
            parse_transfer("app.tar.gz", ":/tmp/app.tar.gz").unwrap(),
            Transfer::Upload {
                local: "app.tar.gz".to_string(),
                remote: "/tmp/app.tar.gz".to_string()
            }
        );
        assert_eq!(
            parse_transfer(":/var/log/syslog", "syslog").unwrap(),
            Transfer::Download {
                remote: "/var/log/syslog".to_string(),
                local: "syslog".to_string()
            }
        );
        assert!(parse_transfer(":a", ":b").is_err());
        assert!(parse_transfer("a", "b").is_err());
    }
}
