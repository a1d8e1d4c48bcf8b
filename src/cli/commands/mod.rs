pub mod bundle;
pub mod config;
pub mod copy;
pub mod deploy;
pub mod exec;
pub mod info;
pub mod inspect;
pub mod provision;

use std::path::PathBuf;

use crate::aws::{AwsClients, Lightsail};
use crate::config::Settings;
use crate::ssh::{RemoteExecutor, SshOptions, TokioCommandRunner};
use crate::Result;

/// Settings resolved once per invocation and shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Load settings, applying the `--region` override
    pub fn load(config_path: Option<PathBuf>, region: Option<String>) -> Result<Self> {
        let mut settings = Settings::load(config_path.as_deref())?;
        if let Some(region) = region {
            settings.region = region;
        }

        Ok(Self {
            settings,
            config_path,
        })
    }

    pub async fn clients(&self) -> Result<AwsClients> {
        AwsClients::with_region(&self.settings.region).await
    }

    pub fn instance_name(&self, name: Option<String>) -> Result<String> {
        self.settings.resolve_instance_name(name)
    }

    pub fn executor<'a, L: Lightsail>(
        &self,
        lightsail: &'a L,
        instance: &str,
    ) -> RemoteExecutor<'a, L, TokioCommandRunner> {
        RemoteExecutor::new(
            lightsail,
            TokioCommandRunner,
            instance,
            SshOptions::from(&self.settings.ssh),
        )
    }
}
