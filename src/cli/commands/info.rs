use super::Context;
use crate::aws::instance::instance_info;
use crate::aws::InstanceSummary;
use crate::Result;

pub async fn execute(ctx: &Context, name: Option<String>) -> Result<()> {
    let name = ctx.instance_name(name)?;
    let clients = ctx.clients().await?;

    let summary = instance_info(&clients, &name).await?;
    print_summary(&summary);

    Ok(())
}

pub fn print_summary(instance: &InstanceSummary) {
    let rule = "=".repeat(50);
    println!();
    println!("{}", rule);
    println!("LIGHTSAIL INSTANCE SUMMARY");
    println!("{}", rule);
    println!("Instance Name: {}", instance.name);
    println!("Instance State: {}", instance.state);
    println!(
        "Public IP: {}",
        instance.public_ip.as_deref().unwrap_or("Not assigned")
    );
    println!(
        "Private IP: {}",
        instance.private_ip.as_deref().unwrap_or("Not assigned")
    );
    println!(
        "Blueprint: {}",
        instance.blueprint_name.as_deref().unwrap_or("-")
    );
    println!("Bundle: {}", instance.bundle_id.as_deref().unwrap_or("-"));

    if let Some(ip) = &instance.public_ip {
        println!();
        println!("Application URL:");
        println!("   http://{}/", ip);
        println!();
        println!("SSH Access:");
        println!("   lightsail-cli exec {} -c <COMMAND>", instance.name);
    }
}
