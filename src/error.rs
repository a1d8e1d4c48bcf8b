use thiserror::Error;

#[derive(Error, Debug)]
pub enum LightsailCliError {
    // AWS Errors
    #[error("AWS Lightsail error: {0}")]
    Lightsail(String),

    #[error("AWS credentials not found or invalid")]
    AwsCredentials,

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("No instance name provided and no default instance configured")]
    NoInstanceName,

    #[error("Access details incomplete for instance {instance}: missing {field}")]
    AccessDetails { instance: String, field: &'static str },

    // SSH/SCP Errors
    #[error("SSH command failed: {0}")]
    SshCommand(String),

    #[error("SCP transfer failed: {0}")]
    ScpTransfer(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // Path Errors
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    // Config Errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid JSON for environment variables: {0}")]
    InvalidEnvVars(String),

    // Deployment
    #[error("Deployment failed at step: {0}")]
    DeploymentFailed(String),

    #[error("Instance provisioning failed: {0}")]
    Provisioning(String),

    // File/IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl LightsailCliError {
    pub fn lightsail(err: impl std::fmt::Display) -> Self {
        LightsailCliError::Lightsail(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LightsailCliError>;
