pub mod client;
#[cfg(test)]
pub mod fake;
pub mod instance;
pub mod types;

pub use client::{AwsClients, Lightsail};
pub use types::{CreateInstanceRequest, InstanceAccessDetails, InstanceState, InstanceSummary};
