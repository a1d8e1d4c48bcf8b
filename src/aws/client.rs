use aws_config::BehaviorVersion;
use aws_sdk_lightsail::error::DisplayErrorContext;
use aws_sdk_lightsail::types::{InstanceAccessProtocol, NetworkProtocol, PortInfo, Tag};
use aws_sdk_lightsail::Client as LightsailClient;
use aws_sdk_sts::Client as StsClient;

use super::types::{CreateInstanceRequest, InstanceAccessDetails, InstanceState, InstanceSummary};
use crate::config::PortRule;
use crate::{LightsailCliError, Result};

/// The minimal Lightsail control-plane surface used by this tool
#[allow(async_fn_in_trait)]
pub trait Lightsail {
    /// Describe an instance. Missing instances yield `InstanceNotFound`.
    async fn get_instance(&self, name: &str) -> Result<InstanceSummary>;

    /// Fetch a fresh short-lived SSH key and certificate
    async fn get_instance_access_details(&self, name: &str) -> Result<InstanceAccessDetails>;

    /// Start instance creation, returning the operation ids
    async fn create_instances(&self, request: &CreateInstanceRequest) -> Result<Vec<String>>;

    /// Replace the instance firewall with the given rules
    async fn put_instance_public_ports(&self, name: &str, ports: &[PortRule]) -> Result<()>;
}

/// AWS client wrapper holding the service clients
#[derive(Clone)]
pub struct AwsClients {
    pub lightsail: LightsailClient,
    pub sts: StsClient,
    pub region: String,
}

impl AwsClients {
    /// Create new AWS clients for a specific region
    pub async fn with_region(region: &str) -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Ok(Self {
            lightsail: LightsailClient::new(&config),
            sts: StsClient::new(&config),
            region: region.to_string(),
        })
    }

    /// Verify credentials by getting the caller identity
    pub async fn account_id(&self) -> Result<String> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|_| LightsailCliError::AwsCredentials)?;

        identity
            .account()
            .map(String::from)
            .ok_or(LightsailCliError::AwsCredentials)
    }
}

impl Lightsail for AwsClients {
    async fn get_instance(&self, name: &str) -> Result<InstanceSummary> {
        let output = self
            .lightsail
            .get_instance()
            .instance_name(name)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .is_some_and(|se| se.is_not_found_exception());
                if not_found {
                    LightsailCliError::InstanceNotFound(name.to_string())
                } else {
                    LightsailCliError::lightsail(DisplayErrorContext(&e))
                }
            })?;

        let instance = output
            .instance()
            .ok_or_else(|| LightsailCliError::InstanceNotFound(name.to_string()))?;

        let state = instance
            .state()
            .and_then(|s| s.name())
            .map(InstanceState::parse)
            .unwrap_or_else(|| InstanceState::Other("unknown".to_string()));

        Ok(InstanceSummary {
            name: instance.name().unwrap_or(name).to_string(),
            state,
            public_ip: instance.public_ip_address().map(String::from),
            private_ip: instance.private_ip_address().map(String::from),
            blueprint_name: instance.blueprint_name().map(String::from),
            bundle_id: instance.bundle_id().map(String::from),
        })
    }

    async fn get_instance_access_details(&self, name: &str) -> Result<InstanceAccessDetails> {
        let output = self
            .lightsail
            .get_instance_access_details()
            .instance_name(name)
            .protocol(InstanceAccessProtocol::Ssh)
            .send()
            .await
            .map_err(|e| LightsailCliError::lightsail(DisplayErrorContext(&e)))?;

        let details = output.access_details().ok_or_else(|| {
            LightsailCliError::AccessDetails {
                instance: name.to_string(),
                field: "accessDetails",
            }
        })?;

        let field = |value: Option<&str>, field: &'static str| {
            value.map(String::from).ok_or_else(|| LightsailCliError::AccessDetails {
                instance: name.to_string(),
                field,
            })
        };

        Ok(InstanceAccessDetails {
            username: field(details.username(), "username")?,
            host: field(details.ip_address(), "ipAddress")?,
            private_key: field(details.private_key(), "privateKey")?,
            cert_key: field(details.cert_key(), "certKey")?,
        })
    }

    async fn create_instances(&self, request: &CreateInstanceRequest) -> Result<Vec<String>> {
        let mut call = self
            .lightsail
            .create_instances()
            .instance_names(&request.instance_name)
            .availability_zone(&request.availability_zone)
            .blueprint_id(&request.blueprint_id)
            .bundle_id(&request.bundle_id)
            .user_data(&request.user_data);

        for (key, value) in &request.tags {
            call = call.tags(Tag::builder().key(key).value(value).build());
        }

        let output = call
            .send()
            .await
            .map_err(|e| LightsailCliError::lightsail(DisplayErrorContext(&e)))?;

        Ok(output
            .operations()
            .iter()
            .filter_map(|op| op.id().map(String::from))
            .collect())
    }

    async fn put_instance_public_ports(&self, name: &str, ports: &[PortRule]) -> Result<()> {
        let port_infos = ports
            .iter()
            .map(|rule| {
                PortInfo::builder()
                    .from_port(rule.from_port)
                    .to_port(rule.to_port)
                    .protocol(NetworkProtocol::from(rule.protocol.as_str()))
                    .build()
            })
            .collect::<Vec<_>>();

        self.lightsail
            .put_instance_public_ports()
            .instance_name(name)
            .set_port_infos(Some(port_infos))
            .send()
            .await
            .map_err(|e| LightsailCliError::lightsail(DisplayErrorContext(&e)))?;

        Ok(())
    }
}

/// Standard tags applied to instances created by lightsail-cli
pub const MANAGED_TAG_KEY: &str = "lightsail-cli:managed";
pub const MANAGED_TAG_VALUE: &str = "true";

/// Build the tag list for a new instance, including custom tags from settings
pub fn create_tags(
    custom_tags: &std::collections::HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut tags = vec![(MANAGED_TAG_KEY.to_string(), MANAGED_TAG_VALUE.to_string())];

    let mut custom: Vec<_> = custom_tags
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    custom.sort();
    tags.extend(custom);

    tags
}
