use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Local layout (relative to the install root)
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "conf/config.yml";
pub const INVENTORY_FILE: &str = "conf/hosts.yml";
pub const PACKAGES_DIR: &str = "packages";
pub const SCRIPTS_DIR: &str = "scripts";
pub const TEMPLATES_DIR: &str = "templates";
pub const LOG_FILE: &str = "logs/install.log";

// ---------------------------------------------------------------------------
// Remote layout
// ---------------------------------------------------------------------------

pub const DEFAULT_REMOTE_TEMP_DIR: &str = "/tmp/cdh_install_temp";

/// Staging directory for uploads before they are moved into place with
/// elevated rights. Must be writable by the connecting user.
pub const REMOTE_UPLOAD_DIR: &str = "/tmp/.cdh-install-upload";

pub const ETC_HOSTS: &str = "/etc/hosts";
pub const MY_CNF: &str = "/etc/my.cnf";
pub const SCM_AGENT_CONFIG: &str = "/etc/cloudera-scm-agent/config.ini";
pub const SCM_DB_PROPERTIES: &str = "/etc/cloudera-scm-server/db.properties";
pub const PARCEL_REPO: &str = "/opt/cloudera/parcel-repo";
pub const HAPROXY_CFG: &str = "/etc/haproxy/haproxy.cfg";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn inventory_path(root: &Path) -> PathBuf {
    root.join(INVENTORY_FILE)
}

pub fn package_path(root: &Path, file: &str) -> PathBuf {
    root.join(PACKAGES_DIR).join(file)
}

pub fn script_path(root: &Path, file: &str) -> PathBuf {
    root.join(SCRIPTS_DIR).join(file)
}

pub fn template_path(root: &Path, file: &str) -> PathBuf {
    root.join(TEMPLATES_DIR).join(file)
}

pub fn log_path(root: &Path) -> PathBuf {
    root.join(LOG_FILE)
}

/// Join a remote (always POSIX) directory and file name.
pub fn remote_join(dir: &str, file: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), file.trim_start_matches('/'))
}

/// Idempotency marker for a guarded step inside the remote temp dir.
pub fn marker(remote_temp_dir: &str, step: &str) -> String {
    remote_join(remote_temp_dir, &format!("{step}_ok_tag"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_join_normalizes_slashes() {
        assert_eq!(remote_join("/tmp/x/", "/a.sh"), "/tmp/x/a.sh");
        assert_eq!(remote_join("/tmp/x", "a.sh"), "/tmp/x/a.sh");
    }

    #[test]
    fn marker_lives_in_temp_dir() {
        assert_eq!(
            marker(DEFAULT_REMOTE_TEMP_DIR, "install_jdk"),
            "/tmp/cdh_install_temp/install_jdk_ok_tag"
        );
    }
}
