use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use crate::aws::InstanceAccessDetails;
use crate::Result;

const KEY_FILE: &str = "key.pem";
const CERT_FILE: &str = "key.pem-cert.pub";

/// Private key and certificate on disk for the duration of one command.
///
/// Both files live in a private temporary directory that is removed when the
/// value is dropped, on every exit path of the owning call.
#[derive(Debug)]
pub struct TemporaryCredentialFiles {
    key_path: PathBuf,
    cert_path: PathBuf,
    dir: TempDir,
}

impl TemporaryCredentialFiles {
    pub fn create(details: &InstanceAccessDetails) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("lightsail-ssh-")
            .tempdir()?;

        let key_path = dir.path().join(KEY_FILE);
        let cert_path = dir.path().join(CERT_FILE);

        write_private(&key_path, details.private_key.as_bytes())?;
        write_private(&cert_path, format_certificate(&details.cert_key).as_bytes())?;

        tracing::debug!(dir = %dir.path().display(), "materialized temporary credentials");

        Ok(Self {
            key_path,
            cert_path,
            dir,
        })
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }
}

impl Drop for TemporaryCredentialFiles {
    fn drop(&mut self) {
        for path in [&self.key_path, &self.cert_path] {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!(path = %path.display(), error = %e, "credential file already gone");
            }
        }
        tracing::debug!(dir = %self.dir.path().display(), "removed temporary credentials");
    }
}

/// Keep the key type and blob of an OpenSSH certificate, dropping the comment.
/// A certificate without a space is written as-is.
pub fn format_certificate(cert_key: &str) -> String {
    let parts: Vec<&str> = cert_key.splitn(3, ' ').collect();
    if parts.len() >= 2 {
        format!("{} {}\n", parts[0], parts[1])
    } else {
        format!("{}\n", cert_key)
    }
}

fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(content)?;
        // umask can only narrow the create mode; pin it exactly
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let mut file = std::fs::File::create(path)?;
        file.write_all(content)?;
    }

    Ok(())
}
