//! Subprocess execution with a hard timeout.

use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;

use crate::{LightsailCliError, Result};

/// Abstracts process execution so the executor can be tested without `ssh`.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program to completion and capture its output.
    ///
    /// On timeout the child must be killed, not left running.
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

/// Production runner on `tokio::process`.
///
/// Dropping the `wait` future alone does not terminate the child on every
/// platform, so the timeout branch kills it explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        tracing::debug!(program, timeout_secs = timeout.as_secs(), "spawning subprocess");

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LightsailCliError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                let status = status.map_err(LightsailCliError::Io)?;
                tracing::debug!(program, code = ?status.code(), "subprocess exited");
                Ok::<_, LightsailCliError>(Output { status, stdout, stderr })
            } => result,
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(program, "subprocess timed out, killing");
                let _ = child.kill().await;
                Err(LightsailCliError::Timeout(format!(
                    "{} timed out after {}s",
                    program,
                    timeout.as_secs_f32()
                )))
            }
        }
    }
}
