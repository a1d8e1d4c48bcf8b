use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use shell_escape::escape;

use crate::config::SiteSettings;
use crate::{LightsailCliError, Result};

fn skip_dir(name: &str) -> bool {
    name.starts_with('.') || name == "__pycache__"
}

fn skip_file(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(".tar.gz") || name.ends_with(".pyc")
}

/// Relative paths of the files to ship, in sorted order
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(LightsailCliError::PathNotFound(root.display().to_string()));
    }

    let mut files = Vec::new();
    walk(root, Path::new(""), &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(root: &Path, relative: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(root.join(relative))?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry.file_type()?;
        let path = relative.join(&name);

        if file_type.is_dir() {
            if !skip_dir(&name) {
                walk(root, &path, files)?;
            }
        } else if file_type.is_file() && !skip_file(&name) {
            files.push(path);
        }
    }

    Ok(())
}

/// Write a gzip tarball of `source` to `output`, returning the file count
pub fn create_deployment_package(source: &Path, output: &Path) -> Result<usize> {
    let files = collect_files(source)?;

    let encoder = GzEncoder::new(File::create(output)?, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    for relative in &files {
        archive.append_path_with_name(source.join(relative), relative)?;
    }
    archive.into_inner()?.finish()?;

    tracing::debug!(files = files.len(), output = %output.display(), "created deployment package");
    Ok(files.len())
}

fn has_site_extension(path: &Path, site: &SiteSettings) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| site.extensions.iter().any(|allowed| allowed == ext))
}

/// Heredoc delimiter that does not occur as a line of `content`
fn heredoc_delimiter(content: &str) -> String {
    let mut delimiter = "LIGHTSAIL_EOF".to_string();
    let mut n = 0;
    while content.lines().any(|line| line == delimiter) {
        n += 1;
        delimiter = format!("LIGHTSAIL_EOF_{}", n);
    }
    delimiter
}

fn quote(path: &str) -> String {
    escape(Cow::Borrowed(path)).into_owned()
}

/// Shell commands that write every site file under `site.target_dir`
pub fn deployment_commands(source: &Path, site: &SiteSettings) -> Result<Vec<String>> {
    let target = site.target_dir.trim_end_matches('/');
    let mut commands = vec![
        format!("sudo mkdir -p {}", quote(target)),
        format!("sudo chown -R {} {}", site.owner, quote(target)),
    ];

    let mut written = 0;
    for relative in collect_files(source)? {
        if !has_site_extension(&relative, site) {
            continue;
        }

        let content = match std::fs::read_to_string(source.join(&relative)) {
            Ok(content) => content,
            Err(e) => {
                println!("Warning: Could not read {}: {}", relative.display(), e);
                continue;
            }
        };

        let relative = relative.to_string_lossy().replace('\\', "/");
        let target_path = format!("{}/{}", target, relative);
        if let Some((dir, _)) = target_path.rsplit_once('/') {
            if dir != target {
                commands.push(format!("sudo mkdir -p {}", quote(dir)));
            }
        }

        let delimiter = heredoc_delimiter(&content);
        commands.push(format!(
            "sudo tee {} > /dev/null << '{}'\n{}\n{}",
            quote(&target_path),
            delimiter,
            content.trim_end_matches('\n'),
            delimiter
        ));
        commands.push(format!("sudo chown {} {}", site.owner, quote(&target_path)));
        commands.push(format!("sudo chmod 644 {}", quote(&target_path)));
        written += 1;
    }

    println!("Prepared {} application files", written);

    commands.extend(site.post_deploy_commands.iter().cloned());
    Ok(commands)
}

/// A `set -e` script running each command as a numbered step
pub fn render_deploy_script(commands: &[String]) -> String {
    let mut script = String::from("#!/bin/bash\nset -e\n\n");
    script.push_str("echo 'Starting application deployment...'\n\n");

    for (i, command) in commands.iter().enumerate() {
        script.push_str(&format!(
            "echo 'Step {}/{}: Executing command...'\n",
            i + 1,
            commands.len()
        ));
        script.push_str(command);
        script.push('\n');
        script.push_str("echo 'Step completed successfully'\n\n");
    }

    script.push_str("echo 'Application deployment completed successfully!'\n");
    script
}

/// Write the rendered script with the executable bit set
pub fn write_deploy_script(path: &Path, commands: &[String]) -> Result<()> {
    std::fs::write(path, render_deploy_script(commands))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("admin")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("__pycache__")).unwrap();
        std::fs::write(root.join("index.php"), "<?php echo 'hi'; ?>\n").unwrap();
        std::fs::write(root.join("admin/users.php"), "<?php // users\n").unwrap();
        std::fs::write(root.join("deploy.py"), "print('x')\n").unwrap();
        std::fs::write(root.join(".env"), "SECRET=1\n").unwrap();
        std::fs::write(root.join("old.tar.gz"), "gz").unwrap();
        std::fs::write(root.join("mod.pyc"), "pyc").unwrap();
        std::fs::write(root.join(".git/config"), "[core]").unwrap();
        std::fs::write(root.join("__pycache__/x.py"), "").unwrap();
        dir
    }

    #[test]
    fn test_collect_skips_hidden_and_generated() {
        let dir = sample_tree();
        let files = collect_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("admin/users.php"),
                PathBuf::from("deploy.py"),
                PathBuf::from("index.php"),
            ]
        );
    }

    #[test]
    fn test_collect_missing_dir() {
        assert!(matches!(
            collect_files(Path::new("/definitely/not/here")),
            Err(LightsailCliError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_package_contains_relative_paths() {
        let dir = sample_tree();
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("app-deployment.tar.gz");

        let count = create_deployment_package(dir.path(), &output).unwrap();
        assert_eq!(count, 3);

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&output).unwrap()));
        let mut names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["admin/users.php", "deploy.py", "index.php"]);
    }

    #[test]
    fn test_deployment_commands() {
        let dir = sample_tree();
        let site = SiteSettings {
            target_dir: "/opt/bitnami/apache/htdocs/qbr-app".to_string(),
            ..SiteSettings::default()
        };

        let commands = deployment_commands(dir.path(), &site).unwrap();

        assert_eq!(commands[0], "sudo mkdir -p /opt/bitnami/apache/htdocs/qbr-app");
        assert!(commands
            .contains(&"sudo mkdir -p /opt/bitnami/apache/htdocs/qbr-app/admin".to_string()));
        assert!(commands.iter().any(|c| c.starts_with(
            "sudo tee /opt/bitnami/apache/htdocs/qbr-app/index.php > /dev/null << 'LIGHTSAIL_EOF'\n<?php echo 'hi'; ?>\nLIGHTSAIL_EOF"
        )));
        assert!(commands.contains(
            &"sudo chmod 644 /opt/bitnami/apache/htdocs/qbr-app/admin/users.php".to_string()
        ));
        // .py is not a site extension
        assert!(!commands.iter().any(|c| c.contains("deploy.py")));
        assert_eq!(
            commands.last().unwrap(),
            "sudo /opt/bitnami/ctlscript.sh restart apache"
        );
    }

    #[test]
    fn test_heredoc_delimiter_avoids_collision() {
        assert_eq!(heredoc_delimiter("plain"), "LIGHTSAIL_EOF");
        assert_eq!(heredoc_delimiter("a\nLIGHTSAIL_EOF\nb"), "LIGHTSAIL_EOF_1");
    }

    #[test]
    fn test_render_deploy_script() {
        let script = render_deploy_script(&["echo one".to_string(), "echo two".to_string()]);
        assert!(script.starts_with("#!/bin/bash\nset -e\n"));
        assert!(script.contains("echo 'Step 1/2: Executing command...'\necho one\n"));
        assert!(script.contains("echo 'Step 2/2: Executing command...'\necho two\n"));
        assert!(script.trim_end().ends_with("completed successfully!'"));
    }
}
