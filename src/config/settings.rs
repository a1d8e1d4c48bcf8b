use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::{LightsailCliError, Result};

/// Global settings for lightsail-cli
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AWS region for the Lightsail client
    pub region: String,

    /// Instance used when a command omits the name
    pub instance_name: Option<String>,

    /// Availability zone for new instances (defaults to `<region>a`)
    pub availability_zone: Option<String>,

    pub blueprint_id: String,
    pub bundle_id: String,

    /// Custom tags to apply to created instances
    pub tags: HashMap<String, String>,

    pub ssh: SshSettings,
    pub readiness: ReadinessSettings,
    pub ports: Vec<PortRule>,
    pub app: AppSettings,
    pub provision: ProvisionSettings,
    pub site: SiteSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            instance_name: None,
            availability_zone: None,
            blueprint_id: "lamp_8_bitnami".to_string(),
            bundle_id: "nano_3_0".to_string(),
            tags: HashMap::new(),
            ssh: SshSettings::default(),
            readiness: ReadinessSettings::default(),
            ports: vec![
                PortRule::tcp(22),
                PortRule::tcp(80),
                PortRule::tcp(443),
            ],
            app: AppSettings::default(),
            provision: ProvisionSettings::default(),
            site: SiteSettings::default(),
        }
    }
}

/// Timeouts and binaries for the ephemeral SSH executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub ssh_program: String,
    pub scp_program: String,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub copy_timeout_secs: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            connect_timeout_secs: 15,
            command_timeout_secs: 60,
            copy_timeout_secs: 300,
        }
    }
}

impl SshSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn copy_timeout(&self) -> Duration {
        Duration::from_secs(self.copy_timeout_secs)
    }
}

/// Polling parameters used while waiting for a new instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Extra wait once the instance reports `running`, for services to start
    pub settle_secs: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 1800,
            poll_interval_secs: 30,
            settle_secs: 120,
        }
    }
}

/// A firewall rule opened on the instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRule {
    pub from_port: i32,
    pub to_port: i32,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

impl PortRule {
    pub fn tcp(port: i32) -> Self {
        Self {
            from_port: port,
            to_port: port,
            protocol: default_protocol(),
        }
    }
}

/// The Node.js service managed by `deploy`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub service_name: String,
    pub description: String,
    pub install_dir: String,
    pub user: String,
    pub group: String,
    pub entrypoint: String,
    pub web_server: String,
    pub remote_archive: String,
    /// Directory the archive unpacks to under /tmp
    pub extracted_dir: String,
    pub deploy_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub status_delay_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            service_name: "lightsail-demo-app".to_string(),
            description: "Lightsail Demo App Node.js Application".to_string(),
            install_dir: "/var/www/lightsail-demo-app".to_string(),
            user: "www-data".to_string(),
            group: "www-data".to_string(),
            entrypoint: "server.js".to_string(),
            web_server: "nginx".to_string(),
            remote_archive: "/tmp/app.tar.gz".to_string(),
            extracted_dir: "/tmp/app".to_string(),
            deploy_timeout_secs: 600,
            command_timeout_secs: 300,
            status_delay_secs: 5,
        }
    }
}

impl AppSettings {
    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_secs(self.deploy_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn status_delay(&self) -> Duration {
        Duration::from_secs(self.status_delay_secs)
    }
}

/// First-boot user data for new instances
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionSettings {
    pub packages: Vec<String>,
    pub setup_commands: Vec<String>,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            packages: vec![
                "php-mbstring".to_string(),
                "php-xml".to_string(),
                "php-curl".to_string(),
                "php-zip".to_string(),
            ],
            setup_commands: Vec::new(),
        }
    }
}

/// File-by-file site deployment generated by `bundle`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub target_dir: String,
    pub owner: String,
    pub extensions: Vec<String>,
    pub post_deploy_commands: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            target_dir: "/opt/bitnami/apache/htdocs/app".to_string(),
            owner: "bitnami:daemon".to_string(),
            extensions: ["php", "sql", "css", "js", "html", "md"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            post_deploy_commands: vec!["sudo /opt/bitnami/ctlscript.sh restart apache".to_string()],
        }
    }
}

impl Settings {
    /// Get the default path to the config file
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lightsail-cli")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Resolve an explicit path or fall back to the default location
    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(p.to_path_buf()),
            None => Self::config_path().ok_or_else(|| {
                LightsailCliError::Config("Cannot determine config directory".to_string())
            }),
        }
    }

    /// Load settings, returning defaults when the file does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path)?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let settings: Settings = serde_json::from_str(&content).map_err(|e| {
            LightsailCliError::Config(format!("Failed to parse config file: {}", e))
        })?;

        Ok(settings)
    }

    /// Save settings with restricted permissions (0600)
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = Self::resolve_path(path)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;

        #[cfg(unix)]
        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            file.write_all(content.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&path, content)?;
        }

        Ok(())
    }

    /// Availability zone for new instances
    pub fn availability_zone(&self) -> String {
        self.availability_zone
            .clone()
            .unwrap_or_else(|| format!("{}a", self.region))
    }

    /// Use the provided name or fall back to the configured default instance
    pub fn resolve_instance_name(&self, name: Option<String>) -> Result<String> {
        name.or_else(|| self.instance_name.clone())
            .filter(|n| !n.trim().is_empty())
            .ok_or(LightsailCliError::NoInstanceName)
    }

    /// Validate a tag key
    pub fn validate_tag_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(LightsailCliError::Config("Tag key cannot be empty".to_string()));
        }
        if key.len() > 128 {
            return Err(LightsailCliError::Config(
                "Tag key cannot exceed 128 characters".to_string(),
            ));
        }
        if key.starts_with("aws:") {
            return Err(LightsailCliError::Config(
                "Tag key cannot start with 'aws:' (reserved prefix)".to_string(),
            ));
        }
        if !key.chars().all(|c| c.is_ascii() && (' '..='~').contains(&c)) {
            return Err(LightsailCliError::Config(
                "Tag key must contain only ASCII printable characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a tag value
    pub fn validate_tag_value(value: &str) -> Result<()> {
        if value.len() > 256 {
            return Err(LightsailCliError::Config(
                "Tag value cannot exceed 256 characters".to_string(),
            ));
        }
        if !value.chars().all(|c| c.is_ascii() && (' '..='~').contains(&c)) {
            return Err(LightsailCliError::Config(
                "Tag value must contain only ASCII printable characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Set a tag (validates key and value)
    pub fn set_tag(&mut self, key: &str, value: &str) -> Result<()> {
        Self::validate_tag_key(key)?;
        Self::validate_tag_value(value)?;
        self.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<String> {
        self.tags.remove(key)
    }
}
