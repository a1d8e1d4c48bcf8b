pub mod aws;
pub mod cli;
pub mod config;
pub mod deploy;
mod error;
pub mod output;
pub mod package;
pub mod ssh;
pub mod user_data;

pub use error::{LightsailCliError, Result};
