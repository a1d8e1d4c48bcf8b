use super::info::print_summary;
use super::Context;
use crate::aws::instance::{
    configure_instance_ports, ensure_instance, instance_info, ProvisionOutcome, ReadinessPolicy,
};
use crate::Result;

pub async fn execute(ctx: &Context, name: Option<String>) -> Result<()> {
    let name = ctx.instance_name(name)?;
    let settings = &ctx.settings;

    println!("AWS Lightsail Provisioner");
    println!("{}", "=".repeat(40));
    println!("  Region: {}", settings.region);

    let clients = ctx.clients().await?;
    let policy = ReadinessPolicy::from(&settings.readiness);

    match ensure_instance(&clients, settings, &name, policy).await? {
        ProvisionOutcome::Existing => {}
        ProvisionOutcome::Created { operation_ids } => {
            tracing::info!(instance = %name, ?operation_ids, "instance created");
        }
    }

    configure_instance_ports(&clients, &name, &settings.ports).await;

    let summary = instance_info(&clients, &name).await?;
    print_summary(&summary);

    println!();
    println!("Instance '{}' is ready!", name);
    println!("  Deploy with: lightsail-cli deploy {} <ARCHIVE>", name);

    Ok(())
}
