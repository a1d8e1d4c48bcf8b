mod scripts;
mod sequencer;

pub use scripts::{
    env_file_script, install_script, parse_env_vars, service_unit, service_unit_script,
};
pub use sequencer::{DeploymentReport, DeploymentSequencer, StepOutcome};
