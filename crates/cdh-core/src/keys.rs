//! Password-based bootstrap of key authentication.
//!
//! The installer connects with keys only (`BatchMode=yes`). Before the first
//! run the operator's public key is pushed to every host with `sshpass` and
//! `ssh-copy-id`, using the connection password once.

use crate::config::SshConfig;
use crate::error::{InstallError, Result};
use crate::outcome::HostStatus;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info};

/// Exit status of `sshpass` when the password was rejected.
const SSHPASS_BAD_PASSWORD: i32 = 5;

pub fn key_path(home: &Path) -> PathBuf {
    home.join(".ssh").join("id_ed25519")
}

/// Make sure `~/.ssh/id_ed25519` exists, generating it without a passphrase
/// when absent. Returns the private key path.
pub fn ensure_key_pair(home: &Path) -> Result<PathBuf> {
    let key = key_path(home);
    if key.exists() {
        return Ok(key);
    }
    if let Some(dir) = key.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let keygen = which::which("ssh-keygen")
        .map_err(|e| InstallError::KeyBootstrap(format!("ssh-keygen not found: {e}")))?;
    let out = Command::new(keygen)
        .args(["-q", "-t", "ed25519", "-N", "", "-f"])
        .arg(&key)
        .output()?;
    if !out.status.success() {
        return Err(InstallError::KeyBootstrap(format!(
            "ssh-keygen failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    info!(key = %key.display(), "generated ssh key pair");
    Ok(key)
}

/// Locate `sshpass`, installing it from `rpm` when it is missing.
fn sshpass(rpm: Option<&Path>) -> Result<PathBuf> {
    if let Ok(path) = which::which("sshpass") {
        return Ok(path);
    }
    let Some(rpm) = rpm else {
        return Err(InstallError::KeyBootstrap(
            "sshpass is not installed and packages.sshpass is not configured".to_string(),
        ));
    };
    info!(rpm = %rpm.display(), "installing sshpass");
    let out = Command::new("rpm").arg("-ivh").arg(rpm).output()?;
    if !out.status.success() {
        return Err(InstallError::KeyBootstrap(format!(
            "rpm -ivh {} failed: {}",
            rpm.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    which::which("sshpass")
        .map_err(|e| InstallError::KeyBootstrap(format!("sshpass still missing: {e}")))
}

/// Push the public half of `key` to every host. A host that rejects the
/// password or cannot be reached comes back `Unreachable`; the capability
/// check that follows decides what that means for the run. Without a usable
/// `sshpass` every host is `Unreachable`.
pub fn distribute(
    hosts: &[String],
    ssh: &SshConfig,
    secret: &str,
    key: &Path,
    sshpass_rpm: Option<&Path>,
) -> Vec<(String, HostStatus)> {
    copy_keys(sshpass(sshpass_rpm), hosts, ssh, secret, key)
}

fn copy_keys(
    sshpass: Result<PathBuf>,
    hosts: &[String],
    ssh: &SshConfig,
    secret: &str,
    key: &Path,
) -> Vec<(String, HostStatus)> {
    let sshpass = match sshpass {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, hosts = hosts.len(), "cannot push public keys");
            return hosts
                .iter()
                .map(|h| (h.clone(), HostStatus::Unreachable))
                .collect();
        }
    };
    let public = key.with_extension("pub");

    let mut statuses = Vec::with_capacity(hosts.len());
    for host in hosts {
        let out = Command::new(&sshpass)
            .arg("-e")
            .arg("ssh-copy-id")
            .arg("-i")
            .arg(&public)
            .arg("-p")
            .arg(ssh.port.to_string())
            .args(["-o", "StrictHostKeyChecking=no"])
            .arg(format!("{}@{host}", ssh.user))
            .env("SSHPASS", secret)
            .output();

        let status = match out {
            Ok(out) => {
                let status = copy_status(out.status.code());
                if status.is_ok() {
                    info!(%host, "public key installed");
                } else {
                    error!(
                        %host,
                        %status,
                        stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                        "could not install public key"
                    );
                }
                status
            }
            Err(e) => {
                error!(%host, error = %e, "could not run sshpass");
                HostStatus::Unreachable
            }
        };
        statuses.push((host.clone(), status));
    }
    statuses
}

fn copy_status(code: Option<i32>) -> HostStatus {
    match code {
        Some(0) => HostStatus::Ok,
        Some(SSHPASS_BAD_PASSWORD) | Some(255) | None => HostStatus::Unreachable,
        Some(_) => HostStatus::Failed,
    }
}
