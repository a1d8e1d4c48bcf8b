use std::process::Command;

use dialoguer::Input;

use super::Context;
use crate::config::Settings;
use crate::{LightsailCliError, Result};

pub async fn init(ctx: &Context) -> Result<()> {
    println!("Checking prerequisites...\n");

    let mut all_ok = true;
    let settings = &ctx.settings;

    // Check SSH client
    print!("  SSH client: ");
    match check_ssh(&settings.ssh.ssh_program) {
        Ok(version) => println!("OK ({})", version),
        Err(e) => {
            println!("MISSING");
            println!("    {}", e);
            all_ok = false;
        }
    }

    // Check SCP
    print!("  SCP: ");
    if which(&settings.ssh.scp_program) {
        println!("OK");
    } else {
        println!("MISSING");
        println!("    '{}' was not found on PATH", settings.ssh.scp_program);
        all_ok = false;
    }

    // Check AWS Credentials
    print!("  AWS Credentials: ");
    let verified = match ctx.clients().await {
        Ok(clients) => clients.account_id().await,
        Err(e) => Err(e),
    };
    match verified {
        Ok(account) => {
            println!("OK");
            println!("    Region: {}", settings.region);
            println!("    Account: {}", account);
        }
        Err(_) => {
            println!("MISSING/INVALID");
            println!("    Configure with: aws configure");
            all_ok = false;
        }
    }

    // Default instance
    print!("  Default instance: ");
    match settings.instance_name.clone() {
        Some(name) => println!("OK ({})", name),
        None => {
            println!("NOT SET");
            let name: String = Input::new()
                .with_prompt("    Enter the Lightsail instance name")
                .interact_text()
                .map_err(|e| LightsailCliError::Config(format!("Failed to read input: {}", e)))?;
            let name = name.trim().to_string();
            if name.is_empty() {
                println!("    No instance name given");
                all_ok = false;
            } else {
                let mut stored = Settings::load(ctx.config_path.as_deref())?;
                stored.instance_name = Some(name.clone());
                stored.save(ctx.config_path.as_deref())?;
                println!("    Default instance set to: {}", name);
            }
        }
    }

    println!();

    if all_ok {
        println!("All prerequisites met! You can now use 'lightsail-cli provision'.");
        Ok(())
    } else {
        Err(LightsailCliError::Config(
            "Some prerequisites are not met".to_string(),
        ))
    }
}

pub fn show(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;

    println!("Configuration:");
    println!();

    println!("Config file:");
    match Settings::resolve_path(ctx.config_path.as_deref()) {
        Ok(path) => println!("  {}", path.display()),
        Err(e) => println!("  Error: {}", e),
    }

    println!();
    println!("Instance:");
    println!("  Region: {}", settings.region);
    println!(
        "  Default instance: {}",
        settings.instance_name.as_deref().unwrap_or("(none)")
    );
    println!("  Availability zone: {}", settings.availability_zone());
    println!("  Blueprint: {}", settings.blueprint_id);
    println!("  Bundle: {}", settings.bundle_id);

    println!();
    println!("Application:");
    println!("  Service: {}", settings.app.service_name);
    println!("  Install dir: {}", settings.app.install_dir);
    println!("  Web server: {}", settings.app.web_server);

    println!();
    println!("Custom tags:");
    if settings.tags.is_empty() {
        println!("  (none configured)");
    } else {
        let mut tags: Vec<_> = settings.tags.iter().collect();
        tags.sort();
        for (key, value) in tags {
            println!("  {}={}", key, value);
        }
    }

    println!();
    println!("Effective settings (JSON):");
    println!("{}", serde_json::to_string_pretty(settings)?);

    Ok(())
}

/// Set a custom tag
pub fn tags_set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    // Start from the file so CLI overrides are not persisted
    let mut settings = Settings::load(ctx.config_path.as_deref())?;
    settings.set_tag(key, value)?;
    settings.save(ctx.config_path.as_deref())?;
    println!("Tag '{}' set to '{}'", key, value);
    Ok(())
}

/// List all custom tags
pub fn tags_list(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;

    if settings.tags.is_empty() {
        println!("No custom tags configured.");
        println!();
        println!("Set a tag with: lightsail-cli config tags set <KEY> <VALUE>");
    } else {
        println!("Custom tags:");
        let mut tags: Vec<_> = settings.tags.iter().collect();
        tags.sort();
        for (key, value) in tags {
            println!("  {}={}", key, value);
        }
    }

    Ok(())
}

/// Remove a custom tag
pub fn tags_remove(ctx: &Context, key: &str) -> Result<()> {
    let mut settings = Settings::load(ctx.config_path.as_deref())?;

    if settings.remove_tag(key).is_some() {
        settings.save(ctx.config_path.as_deref())?;
        println!("Tag '{}' removed", key);
    } else {
        println!("Tag '{}' not found", key);
    }

    Ok(())
}

fn check_ssh(program: &str) -> Result<String> {
    // OpenSSH prints its version to stderr
    let output = Command::new(program)
        .arg("-V")
        .output()
        .map_err(|_| LightsailCliError::Config(format!("{} not found", program)))?;

    if output.status.success() {
        let version = String::from_utf8_lossy(&output.stderr)
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches(',')
            .to_string();
        Ok(version)
    } else {
        Err(LightsailCliError::Config(format!("{} not working", program)))
    }
}

fn which(program: &str) -> bool {
    if program.contains('/') {
        return std::path::Path::new(program).is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_in(dir: &tempfile::TempDir) -> Context {
        Context::load(Some(dir.path().join("config.json")), None).unwrap()
    }

    #[test]
    fn test_tags_persist_to_config_file() {
        let dir = tempfile::tempdir().unwrap();

        tags_set(&context_in(&dir), "Project", "QBR-Application").unwrap();
        let reloaded = context_in(&dir);
        assert_eq!(
            reloaded.settings.tags.get("Project"),
            Some(&"QBR-Application".to_string())
        );

        tags_remove(&reloaded, "Project").unwrap();
        assert!(context_in(&dir).settings.tags.is_empty());
    }

    #[test]
    fn test_invalid_tag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tags_set(&context_in(&dir), "aws:reserved", "x").is_err());
        assert!(!dir.path().join("config.json").exists());
    }

    #[test]
    fn test_region_override() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::load(Some(dir.path().join("config.json")), Some("eu-west-1".to_string()))
            .unwrap();
        assert_eq!(ctx.settings.region, "eu-west-1");
    }

    #[test]
    fn test_which() {
        assert!(which("sh"));
        assert!(!which("definitely-not-a-real-binary-xyz"));
    }
}
