use std::time::Duration;

use tokio::time::Instant;

use super::client::{create_tags, Lightsail};
use super::types::{CreateInstanceRequest, InstanceState, InstanceSummary};
use crate::config::{PortRule, ReadinessSettings, Settings};
use crate::output::create_spinner;
use crate::user_data::generate_user_data;
use crate::{LightsailCliError, Result};

/// How long and how often to poll a new instance
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub settle: Duration,
}

impl From<&ReadinessSettings> for ReadinessPolicy {
    fn from(settings: &ReadinessSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            settle: Duration::from_secs(settings.settle_secs),
        }
    }
}

/// Result of `ensure_instance`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Existing,
    Created { operation_ids: Vec<String> },
}

/// Check if the instance exists. Any lookup error counts as "does not exist".
pub async fn check_instance_exists<L: Lightsail>(lightsail: &L, name: &str) -> bool {
    match lightsail.get_instance(name).await {
        Ok(instance) => {
            println!("Instance '{}' exists", name);
            println!("  State: {}", instance.state);
            true
        }
        Err(LightsailCliError::InstanceNotFound(_)) => {
            println!("Instance '{}' not found", name);
            false
        }
        Err(e) => {
            println!("Error checking instance: {}", e);
            false
        }
    }
}

/// Start creating the instance from settings
pub async fn create_instance<L: Lightsail>(
    lightsail: &L,
    settings: &Settings,
    name: &str,
) -> Result<Vec<String>> {
    println!("Creating Lightsail instance '{}'...", name);

    let request = CreateInstanceRequest {
        instance_name: name.to_string(),
        availability_zone: settings.availability_zone(),
        blueprint_id: settings.blueprint_id.clone(),
        bundle_id: settings.bundle_id.clone(),
        user_data: generate_user_data(&settings.provision, &settings.site),
        tags: create_tags(&settings.tags),
    };

    let operation_ids = lightsail.create_instances(&request).await?;

    println!("Instance creation initiated");
    if let Some(id) = operation_ids.first() {
        println!("  Operation ID: {}", id);
    }

    Ok(operation_ids)
}

/// Poll until the instance is running or the policy timeout passes.
///
/// Transitional states keep polling, API errors are reported and retried on
/// the next tick, and any other state ends the wait as not ready.
pub async fn wait_for_instance_ready<L: Lightsail>(
    lightsail: &L,
    name: &str,
    policy: ReadinessPolicy,
) -> bool {
    let spinner = create_spinner(&format!("Waiting for instance '{}' to be ready...", name));
    let start = Instant::now();

    while start.elapsed() < policy.timeout {
        match lightsail.get_instance(name).await {
            Ok(instance) if instance.state == InstanceState::Running => {
                spinner.set_message("Instance running, waiting for services to initialize...");
                tokio::time::sleep(policy.settle).await;
                spinner.finish_with_message("Instance is running");
                return true;
            }
            Ok(instance) if instance.state.is_transitional() => {
                tracing::debug!(instance = name, state = %instance.state, "instance not ready yet");
                spinner.set_message(format!("Instance state: {} (waiting...)", instance.state));
            }
            Ok(instance) => {
                spinner.finish_with_message(format!(
                    "Unexpected instance state: {}",
                    instance.state
                ));
                return false;
            }
            Err(e) => {
                tracing::warn!(instance = name, error = %e, "failed to poll instance state");
                spinner.set_message(format!("Error checking instance state: {}", e));
            }
        }

        tokio::time::sleep(policy.poll_interval).await;
    }

    spinner.finish_with_message("Timeout waiting for instance to be ready");
    false
}

/// Open the configured firewall ports. Failure is reported as a warning.
pub async fn configure_instance_ports<L: Lightsail>(
    lightsail: &L,
    name: &str,
    ports: &[PortRule],
) -> bool {
    match lightsail.put_instance_public_ports(name, ports).await {
        Ok(()) => {
            let list = ports
                .iter()
                .map(|p| {
                    if p.from_port == p.to_port {
                        p.from_port.to_string()
                    } else {
                        format!("{}-{}", p.from_port, p.to_port)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            println!("Configured instance ports ({})", list);
            true
        }
        Err(e) => {
            println!("Warning: Could not configure ports: {}", e);
            false
        }
    }
}

/// Reuse the instance if it exists, otherwise create it and wait for it
pub async fn ensure_instance<L: Lightsail>(
    lightsail: &L,
    settings: &Settings,
    name: &str,
    policy: ReadinessPolicy,
) -> Result<ProvisionOutcome> {
    if check_instance_exists(lightsail, name).await {
        return Ok(ProvisionOutcome::Existing);
    }

    println!();
    println!("Creating new Lightsail instance...");
    let operation_ids = create_instance(lightsail, settings, name)
        .await
        .map_err(|e| LightsailCliError::Provisioning(format!("Error creating instance: {}", e)))?;

    if !wait_for_instance_ready(lightsail, name, policy).await {
        return Err(LightsailCliError::Provisioning(
            "Instance did not become ready in time".to_string(),
        ));
    }

    Ok(ProvisionOutcome::Created { operation_ids })
}

pub async fn instance_info<L: Lightsail>(lightsail: &L, name: &str) -> Result<InstanceSummary> {
    lightsail.get_instance(name).await
}
