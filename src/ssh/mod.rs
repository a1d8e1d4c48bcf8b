mod credentials;
mod executor;
mod runner;

pub use credentials::{format_certificate, TemporaryCredentialFiles};
pub use executor::{
    command_result, parse_transfer, CommandResult, RemoteExecutor, SshOptions, Transfer,
};
pub use runner::{CommandRunner, TokioCommandRunner};
