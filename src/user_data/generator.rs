use crate::config::{ProvisionSettings, SiteSettings};

/// Marker written once first-boot setup has finished
pub const COMPLETION_MARKER: &str = "/var/log/user-data-complete.marker";

/// Generate the first-boot script passed to `create_instances`
pub fn generate_user_data(provision: &ProvisionSettings, site: &SiteSettings) -> String {
    let mut script = String::from("#!/bin/bash\n\n");

    script.push_str("# Update system\n");
    script.push_str("apt-get update -y\n\n");

    if !provision.packages.is_empty() {
        script.push_str("# Install additional packages\n");
        script.push_str(&format!(
            "apt-get install -y {}\n\n",
            provision.packages.join(" ")
        ));
    }

    if !provision.setup_commands.is_empty() {
        script.push_str("# Instance setup\n");
        for command in &provision.setup_commands {
            script.push_str(command);
            script.push('\n');
        }
        script.push('\n');
    }

    script.push_str("# Create application directory\n");
    script.push_str(&format!("mkdir -p {}\n", site.target_dir));
    script.push_str(&format!("chown -R {} {}\n", site.owner, site.target_dir));
    script.push_str(&format!("chmod -R 755 {}\n\n", site.target_dir));

    script.push_str(&format!("touch {}\n", COMPLETION_MARKER));
    script.push_str("echo 'Lightsail instance setup completed!'\n");

    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_user_data() {
        let script = generate_user_data(&ProvisionSettings::default(), &SiteSettings::default());

        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("apt-get install -y php-mbstring php-xml php-curl php-zip"));
        assert!(script.contains("mkdir -p /opt/bitnami/apache/htdocs/app"));
        assert!(script.contains("chown -R bitnami:daemon"));
        assert!(script.trim_end().ends_with("echo 'Lightsail instance setup completed!'"));
        assert!(script.contains(COMPLETION_MARKER));
    }

    #[test]
    fn test_generate_with_setup_commands_and_no_packages() {
        let provision = ProvisionSettings {
            packages: Vec::new(),
            setup_commands: vec![
                "/opt/bitnami/ctlscript.sh restart apache".to_string(),
                "/opt/bitnami/ctlscript.sh restart mysql".to_string(),
            ],
        };
        let script = generate_user_data(&provision, &SiteSettings::default());

        assert!(!script.contains("apt-get install"));
        let apache = script.find("restart apache").unwrap();
        let mysql = script.find("restart mysql").unwrap();
        let marker = script.find(COMPLETION_MARKER).unwrap();
        assert!(apache < mysql && mysql < marker);
    }
}
