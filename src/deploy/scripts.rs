use std::collections::BTreeMap;
use std::path::Path;

use crate::config::AppSettings;
use crate::{LightsailCliError, Result};

/// Node.js lookup shared by the install script and the unit file
const FIND_NODE: &str = r#"NODE_PATH=$(which node || echo "")
if [ -z "$NODE_PATH" ]; then
    if [ -f "/usr/bin/node" ]; then
        NODE_PATH="/usr/bin/node"
    elif [ -f "/snap/bin/node" ]; then
        NODE_PATH="/snap/bin/node"
    fi
fi
"#;

const FIND_NPM: &str = r#"NPM_PATH=$(which npm || echo "")
if [ -z "$NPM_PATH" ]; then
    if [ -f "/usr/bin/npm" ]; then
        NPM_PATH="/usr/bin/npm"
    elif [ -f "/snap/bin/npm" ]; then
        NPM_PATH="/snap/bin/npm"
    fi
fi
"#;

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.display().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string())
}

/// Unpack the uploaded archive, back up and replace the install, and install
/// production dependencies
pub fn install_script(app: &AppSettings) -> String {
    let install_dir = &app.install_dir;
    let base_dir = parent_dir(install_dir);
    let extract_parent = parent_dir(&app.extracted_dir);
    let owner = format!("{}:{}", app.user, app.group);
    let npm_cache = format!("{}/.npm", base_dir.trim_end_matches('/'));

    let mut script = String::from("\nset -e\n\n");

    script.push_str("# Extract application\n");
    script.push_str(&format!("cd {}\n", extract_parent));
    script.push_str(&format!("tar -xzf {}\n\n", app.remote_archive));

    script.push_str("# Ensure directory structure exists\n");
    script.push_str(&format!("echo \"Creating {} directory...\"\n", base_dir));
    script.push_str(&format!("sudo mkdir -p {}\n", base_dir));
    script.push_str(&format!("sudo chown root:root {}\n", base_dir));
    script.push_str(&format!("sudo chmod 755 {}\n\n", base_dir));

    script.push_str("# Backup current version if it exists\n");
    script.push_str(&format!("if [ -d \"{}\" ]; then\n", install_dir));
    script.push_str("    echo \"Backing up existing application...\"\n");
    script.push_str(&format!(
        "    sudo cp -r {} {}.backup.$(date +%Y%m%d_%H%M%S)\n",
        install_dir, install_dir
    ));
    script.push_str("fi\n\n");

    script.push_str("# Deploy new version\n");
    script.push_str("echo \"Deploying new version...\"\n");
    script.push_str(&format!("sudo rm -rf {}\n", install_dir));
    script.push_str(&format!("sudo mv {} {}\n", app.extracted_dir, install_dir));
    script.push_str(&format!("sudo chown -R {} {}\n\n", owner, install_dir));

    script.push_str("# Install dependencies\n");
    script.push_str(&format!("cd {}\n\n", install_dir));
    script.push_str(FIND_NODE);
    script.push_str("if [ -z \"$NODE_PATH\" ]; then\n    echo \"ERROR: Node.js not found\"\n    exit 1\nfi\n\n");
    script.push_str(FIND_NPM);
    script.push_str("if [ -z \"$NPM_PATH\" ]; then\n    echo \"ERROR: npm not found\"\n    exit 1\nfi\n\n");
    script.push_str("echo \"Using Node.js at: $NODE_PATH\"\n");
    script.push_str("echo \"Using npm at: $NPM_PATH\"\n\n");

    script.push_str("# Fix npm cache permissions\n");
    script.push_str(&format!("sudo mkdir -p {}\n", npm_cache));
    script.push_str(&format!("sudo chown -R {} {}\n", owner, npm_cache));
    script.push_str(&format!("sudo chmod -R 755 {}\n\n", npm_cache));

    script.push_str(&format!(
        "sudo -u {} env PATH=\"/usr/bin:/usr/local/bin:/bin:/sbin:/snap/bin\" HOME=\"{}\" \"$NPM_PATH\" ci --production --cache {}\n",
        app.user, base_dir, npm_cache
    ));

    script
}

/// Path of the environment file inside the install directory
pub fn env_file_path(app: &AppSettings) -> String {
    format!("{}/.env", app.install_dir.trim_end_matches('/'))
}

/// Write `KEY=value` lines through a quoted heredoc so nothing expands
pub fn env_file_script(app: &AppSettings, env_vars: &BTreeMap<String, String>) -> String {
    let content = env_vars
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nsudo tee {} > /dev/null << 'ENVEOF'\n{}\nENVEOF\n",
        env_file_path(app),
        content
    )
}

/// Render the systemd unit. `$NODE_PATH` is resolved on the instance.
pub fn service_unit(app: &AppSettings) -> String {
    format!(
        "[Unit]
Description={description}
After=network.target

[Service]
Type=simple
User={user}
Group={group}
WorkingDirectory={dir}
ExecStart=$NODE_PATH {entrypoint}
Restart=always
RestartSec=10
EnvironmentFile=-{env_file}

# Logging
StandardOutput=syslog
StandardError=syslog
SyslogIdentifier={service}

[Install]
WantedBy=multi-user.target
",
        description = app.description,
        user = app.user,
        group = app.group,
        dir = app.install_dir,
        entrypoint = app.entrypoint,
        env_file = env_file_path(app),
        service = app.service_name,
    )
}

/// Locate node and write the unit file (unquoted heredoc so `$NODE_PATH` expands)
pub fn service_unit_script(app: &AppSettings) -> String {
    format!(
        "\n{}\nsudo tee /etc/systemd/system/{}.service > /dev/null << SERVICEEOF\n{}SERVICEEOF\n",
        FIND_NODE,
        app.service_name,
        service_unit(app)
    )
}

/// Parse the optional `{"KEY": "value"}` argument of `deploy`
pub fn parse_env_vars(json: &str) -> Result<BTreeMap<String, String>> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| LightsailCliError::InvalidEnvVars(e.to_string()))?;

    let object = value.as_object().ok_or_else(|| {
        LightsailCliError::InvalidEnvVars("expected a JSON object".to_string())
    })?;

    let mut vars = BTreeMap::new();
    for (key, value) in object {
        validate_env_key(key)?;
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Null => String::new(),
            _ => {
                return Err(LightsailCliError::InvalidEnvVars(format!(
                    "value for {} must be a string, number or boolean",
                    key
                )))
            }
        };
        if value.contains('\n') || value.contains('\r') {
            return Err(LightsailCliError::InvalidEnvVars(format!(
                "value for {} must be a single line",
                key
            )));
        }
        vars.insert(key.clone(), value);
    }

    Ok(vars)
}

fn validate_env_key(key: &str) -> Result<()> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(LightsailCliError::InvalidEnvVars(format!(
            "invalid variable name: {:?}",
            key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_script_paths() {
        let script = install_script(&AppSettings::default());

        assert!(script.contains("set -e"));
        assert!(script.contains("cd /tmp\ntar -xzf /tmp/app.tar.gz"));
        assert!(script.contains("sudo mkdir -p /var/www\n"));
        assert!(script.contains(
            "sudo cp -r /var/www/lightsail-demo-app /var/www/lightsail-demo-app.backup.$(date +%Y%m%d_%H%M%S)"
        ));
        assert!(script.contains("sudo mv /tmp/app /var/www/lightsail-demo-app"));
        assert!(script.contains("sudo chown -R www-data:www-data /var/www/lightsail-demo-app"));
        assert!(script.contains("ERROR: Node.js not found"));
        assert!(script.contains("ERROR: npm not found"));
        assert!(script.contains("ci --production --cache /var/www/.npm"));
    }

    #[test]
    fn test_backup_happens_before_replace() {
        let script = install_script(&AppSettings::default());
        let backup = script.find("sudo cp -r").unwrap();
        let remove = script.find("sudo rm -rf").unwrap();
        assert!(backup < remove);
    }

    #[test]
    fn test_env_file_script() {
        let mut vars = BTreeMap::new();
        vars.insert("PORT".to_string(), "3000".to_string());
        vars.insert("NODE_ENV".to_string(), "production".to_string());

        let script = env_file_script(&AppSettings::default(), &vars);
        assert!(
            script.contains("sudo tee /var/www/lightsail-demo-app/.env > /dev/null << 'ENVEOF'")
        );
        assert!(script.contains("NODE_ENV=production\nPORT=3000\nENVEOF"));
    }

    #[test]
    fn test_service_unit() {
        let app = AppSettings {
            service_name: "qbr".to_string(),
            entrypoint: "index.js".to_string(),
            ..AppSettings::default()
        };
        let unit = service_unit(&app);

        assert!(unit.contains("ExecStart=$NODE_PATH index.js"));
        assert!(unit.contains("WorkingDirectory=/var/www/lightsail-demo-app"));
        assert!(unit.contains("EnvironmentFile=-/var/www/lightsail-demo-app/.env"));
        assert!(unit.contains("SyslogIdentifier=qbr"));

        let script = service_unit_script(&app);
        assert!(script.contains("sudo tee /etc/systemd/system/qbr.service"));
        assert!(script.trim_end().ends_with("SERVICEEOF"));
    }

    #[test]
    fn test_parse_env_vars() {
        let vars = parse_env_vars(r#"{"PORT": 3000, "DEBUG": false, "DB_HOST": "localhost"}"#)
            .unwrap();
        assert_eq!(vars.get("PORT").unwrap(), "3000");
        assert_eq!(vars.get("DEBUG").unwrap(), "false");
        assert_eq!(vars.get("DB_HOST").unwrap(), "localhost");
    }

    #[test]
    fn test_parse_env_vars_rejects_bad_input() {
        assert!(parse_env_vars("not json").is_err());
        assert!(parse_env_vars("[1, 2]").is_err());
        assert!(parse_env_vars(r#"{"1BAD": "x"}"#).is_err());
        assert!(parse_env_vars(r#"{"KEY WITH SPACE": "x"}"#).is_err());
        assert!(parse_env_vars(r#"{"NESTED": {"a": 1}}"#).is_err());
        assert!(parse_env_vars(r#"{"MULTI": "a\nb"}"#).is_err());
    }
}
