mod bundle;

pub use bundle::{
    collect_files, create_deployment_package, deployment_commands, render_deploy_script,
    write_deploy_script,
};
