//! `RemoteBackend` over the system OpenSSH client.
//!
//! Every action becomes one or more `ssh`/`scp` invocations per host. Hosts
//! are processed `forks` at a time on scoped threads; the call returns when
//! every host has answered or timed out. Exit status 255 from the client
//! means the host could not be reached, and so does a client killed at the
//! command timeout.

use crate::action::{Action, Module, ServiceState};
use crate::backend::{RawHostResult, RemoteBackend};
use crate::config::{Config, SshConfig};
use crate::edit;
use crate::error::{InstallError, Result};
use crate::inventory::Inventory;
use crate::paths;
use crate::template::{self, Vars};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const SKIPPED: &str = "cdh-install: skipped";
const UNREACHABLE_EXIT: i32 = 255;

pub struct SshBackend {
    ssh: SshConfig,
    secret: String,
    vars: Vars,
    host_vars: BTreeMap<String, BTreeMap<String, String>>,
}

impl fmt::Debug for SshBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshBackend")
            .field("ssh", &self.ssh)
            .field("hosts", &self.host_vars.len())
            .finish_non_exhaustive()
    }
}

impl SshBackend {
    /// `secret` is the connection password, used for `sudo` when the
    /// configured user is not root.
    pub fn new(config: &Config, inventory: &dyn Inventory, secret: impl Into<String>) -> Self {
        let host_vars = inventory
            .all_hosts()
            .into_iter()
            .map(|h| {
                let vars = inventory.host_vars(&h);
                (h, vars)
            })
            .collect();
        let mut vars = config.template_vars();
        // The first database host is the one the management server connects to.
        if let Some(db) = inventory
            .resolve_group(&config.groups.database)
            .ok()
            .and_then(|hosts| hosts.into_iter().next())
        {
            template::set(&mut vars, "db_host", db);
        }
        Self {
            ssh: config.ssh.clone(),
            secret: secret.into(),
            vars,
            host_vars,
        }
    }

    /// Template variables for one host: configuration values overlaid with
    /// the host's inventory variables.
    pub fn vars_for(&self, host: &str) -> Vars {
        let mut vars = self.vars.clone();
        for (name, value) in self.host_vars.get(host).into_iter().flatten() {
            template::set(&mut vars, name, value);
        }
        template::set(&mut vars, "inventory_hostname", host);
        vars
    }

    fn timeout(&self) -> Option<Duration> {
        self.ssh.command_timeout_secs.map(Duration::from_secs)
    }

    fn staging_dir(&self) -> String {
        format!("{}-{}", paths::REMOTE_UPLOAD_DIR, self.ssh.user)
    }
}

impl RemoteBackend for SshBackend {
    fn dispatch(&self, hosts: &[String], action: &Action) -> Result<Vec<RawHostResult>> {
        let tools = Tools {
            ssh: locate("ssh")?,
            scp: match action.module {
                Module::Copy { .. }
                | Module::Template { .. }
                | Module::LineInFile { .. }
                | Module::BlockInFile { .. } => Some(locate("scp")?),
                _ => None,
            },
        };

        let forks = self.ssh.forks.max(1);
        let mut results = Vec::with_capacity(hosts.len());
        for chunk in hosts.chunks(forks) {
            std::thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|host| {
                        let tools = &tools;
                        s.spawn(move || Session::new(self, tools, host).run(action))
                    })
                    .collect();
                for (handle, host) in handles.into_iter().zip(chunk) {
                    results.push(
                        handle
                            .join()
                            .unwrap_or_else(|_| RawHostResult::failed(host, "worker panicked")),
                    );
                }
            });
        }
        Ok(results)
    }
}

fn locate(binary: &str) -> Result<PathBuf> {
    which::which(binary).map_err(|e| InstallError::Transport {
        host: "localhost".to_string(),
        reason: format!("{binary} client not found: {e}"),
    })
}

struct Tools {
    ssh: PathBuf,
    scp: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Session: one action on one host
// ---------------------------------------------------------------------------

struct Session<'a> {
    backend: &'a SshBackend,
    tools: &'a Tools,
    host: &'a str,
}

impl<'a> Session<'a> {
    fn new(backend: &'a SshBackend, tools: &'a Tools, host: &'a str) -> Self {
        Self {
            backend,
            tools,
            host,
        }
    }

    fn run(&self, action: &Action) -> RawHostResult {
        let vars = self.backend.vars_for(self.host);
        let module = match action.module.render(&vars) {
            Ok(m) => m,
            Err(e) => return RawHostResult::failed(self.host, e.to_string()),
        };
        debug!(host = %self.host, module = module.name(), "run on host");

        match &module {
            Module::Command {
                cmd,
                chdir,
                creates,
            } => {
                let background = action.async_timeout.filter(|t| !t.is_zero());
                let script = command_script(cmd, chdir.as_deref(), creates.as_deref(), background);
                let result = self.exec(&script, true).into_result(self.host);
                if result.stdout.starts_with(SKIPPED) {
                    result.with_field("changed", false).with_field("skipped", true)
                } else {
                    result.with_field("changed", true)
                }
            }
            Module::Copy {
                src,
                dest,
                force,
                owner,
                group,
                mode,
            } => self.upload(src, dest, *force, Ownership::of(owner, group, mode)),
            Module::Template {
                src,
                dest,
                owner,
                group,
                mode,
            } => self.upload_template(src, dest, &vars, Ownership::of(owner, group, mode)),
            Module::Service {
                name,
                state,
                enabled,
            } => self
                .exec(&service_script(name, *state, *enabled), true)
                .into_result(self.host),
            Module::LineInFile {
                path,
                regexp,
                line,
                insert_after,
                backup,
            } => {
                let compiled = (compile(regexp.as_deref()), compile(insert_after.as_deref()));
                let (regexp, insert_after) = match compiled {
                    (Ok(r), Ok(a)) => (r, a),
                    (Err(e), _) | (_, Err(e)) => {
                        return RawHostResult::failed(self.host, e.to_string())
                    }
                };
                self.edit(path, *backup, |content| {
                    edit::ensure_line(content, regexp.as_ref(), line, insert_after.as_ref())
                })
            }
            Module::BlockInFile {
                path,
                block,
                backup,
            } => self.edit(path, *backup, |content| edit::ensure_block(content, block)),
            Module::Directory { path } => self
                .exec(&format!("mkdir -p {}", shell_quote(path)), true)
                .into_result(self.host),
            Module::Hostname { name } => self
                .exec(&format!("hostnamectl set-hostname {}", shell_quote(name)), true)
                .into_result(self.host),
            Module::Package {
                name,
                disable_gpg_check,
            } => self
                .exec(&package_script(name, *disable_gpg_check), true)
                .into_result(self.host),
        }
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    fn upload(&self, src: &Path, dest: &str, force: bool, own: Ownership) -> RawHostResult {
        if !src.is_file() {
            return RawHostResult::failed(
                self.host,
                format!("source file {} not found on the control host", src.display()),
            );
        }
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let stat = self.exec(&stat_script(&self.backend.staging_dir(), dest, &name), false);
        if stat.status != Some(0) {
            return stat.into_result(self.host);
        }
        let Some((exists, target)) = parse_stat(&stat.stdout) else {
            return RawHostResult::failed(
                self.host,
                format!("unexpected stat output: {}", stat.stdout.trim()),
            );
        };
        if exists && !force {
            return RawHostResult::ok(self.host, format!("{SKIPPED}, {target} exists"))
                .with_field("dest", target)
                .with_field("changed", false)
                .with_field("skipped", true);
        }
        self.transfer(src, &target, own)
    }

    fn upload_template(
        &self,
        src: &Path,
        dest: &str,
        vars: &Vars,
        own: Ownership,
    ) -> RawHostResult {
        let rendered = std::fs::read_to_string(src)
            .map_err(InstallError::from)
            .and_then(|text| template::render(&text, vars));
        match rendered {
            Ok(text) => self.upload_text(&text, dest, own),
            Err(e) => RawHostResult::failed(
                self.host,
                format!("cannot render {}: {e}", src.display()),
            ),
        }
    }

    /// Write `text` to a local temp file and move it to exactly `dest`.
    fn upload_text(&self, text: &str, dest: &str, own: Ownership) -> RawHostResult {
        let staged = tempfile::NamedTempFile::new().and_then(|mut f| {
            f.write_all(text.as_bytes())?;
            f.flush()?;
            Ok(f)
        });
        match staged {
            Ok(file) => {
                let mkdir = self.exec(
                    &format!("mkdir -p {}", shell_quote(&self.backend.staging_dir())),
                    false,
                );
                if mkdir.status != Some(0) {
                    return mkdir.into_result(self.host);
                }
                self.transfer(file.path(), dest, own)
            }
            Err(e) => RawHostResult::failed(self.host, format!("cannot stage file locally: {e}")),
        }
    }

    /// `scp` into the staging dir, then move into place with elevated rights.
    fn transfer(&self, local: &Path, target: &str, own: Ownership) -> RawHostResult {
        let Some(scp) = &self.tools.scp else {
            return RawHostResult::failed(self.host, "scp client not located");
        };
        let staged = paths::remote_join(
            &self.backend.staging_dir(),
            &Uuid::new_v4().simple().to_string(),
        );
        let ssh = &self.backend.ssh;
        let mut args = vec![
            "-q".to_string(),
            "-P".to_string(),
            ssh.port.to_string(),
        ];
        args.extend(common_options(ssh));
        args.push(local.display().to_string());
        args.push(format!("{}@{}:{staged}", ssh.user, self.host));

        let copied = run_process(scp, &args, None, self.backend.timeout());
        if copied.status != Some(0) {
            return copied.into_result(self.host);
        }

        let script = install_script(&staged, target, &own);
        self.exec(&script, true)
            .into_result(self.host)
            .with_field("dest", target)
            .with_field("changed", true)
    }

    // -----------------------------------------------------------------------
    // In-place edits
    // -----------------------------------------------------------------------

    fn edit<F>(&self, path: &str, backup: bool, apply: F) -> RawHostResult
    where
        F: FnOnce(&str) -> (String, bool),
    {
        let quoted = shell_quote(path);
        let fetched = self.exec(&format!("if [ -e {quoted} ]; then cat {quoted}; fi"), true);
        if fetched.status != Some(0) {
            return fetched.into_result(self.host);
        }

        let (updated, changed) = apply(&fetched.stdout);
        if !changed {
            return RawHostResult::ok(self.host, "")
                .with_field("path", path)
                .with_field("changed", false);
        }

        if backup {
            let stamp = chrono::Utc::now().format("%Y-%m-%d@%H:%M:%S");
            let script = format!("if [ -e {quoted} ]; then cp -p {quoted} {quoted}.{stamp}.bak; fi");
            let saved = self.exec(&script, true);
            if saved.status != Some(0) {
                return saved.into_result(self.host);
            }
        }

        let mode = self.exec(&format!("stat -c %a {quoted} 2>/dev/null || echo 644"), true);
        let own = Ownership {
            mode: mode.stdout.lines().last().map(|m| m.trim().to_string()),
            ..Ownership::default()
        };
        self.upload_text(&updated, path, own)
            .with_field("path", path)
    }

    // -----------------------------------------------------------------------
    // Remote shell
    // -----------------------------------------------------------------------

    /// Run `script` with `sh -c` on the host, through `sudo` when `elevated`
    /// and the connecting user is not root.
    fn exec(&self, script: &str, elevated: bool) -> Exec {
        let ssh = &self.backend.ssh;
        let sudo = elevated && !ssh.is_root();
        let mut args = vec!["-p".to_string(), ssh.port.to_string()];
        args.extend(common_options(ssh));
        args.push(format!("{}@{}", ssh.user, self.host));
        args.push(remote_command(script, sudo));

        let password = format!("{}\n", self.backend.secret);
        let stdin = sudo.then_some(password.as_bytes());
        run_process(&self.tools.ssh, &args, stdin, self.backend.timeout())
    }
}

// ---------------------------------------------------------------------------
// Script builders
// ---------------------------------------------------------------------------

/// Quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn remote_command(script: &str, sudo: bool) -> String {
    if sudo {
        format!("sudo -S -p '' sh -c {}", shell_quote(script))
    } else {
        format!("sh -c {}", shell_quote(script))
    }
}

fn common_options(ssh: &SshConfig) -> Vec<String> {
    [
        "BatchMode=yes".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        format!("ConnectTimeout={}", ssh.connect_timeout_secs),
    ]
    .into_iter()
    .flat_map(|opt| ["-o".to_string(), opt])
    .collect()
}

/// Shell text for a `Command` action.
pub fn command_script(
    cmd: &str,
    chdir: Option<&str>,
    creates: Option<&str>,
    background: Option<Duration>,
) -> String {
    let mut script = String::new();
    if let Some(marker) = creates {
        let quoted = shell_quote(marker);
        script.push_str(&format!(
            "if [ -e {quoted} ]; then echo \"{SKIPPED}, {marker} exists\"; exit 0; fi\n"
        ));
    }
    if let Some(dir) = chdir {
        script.push_str(&format!("cd {} || exit 1\n", shell_quote(dir)));
    }
    match background {
        Some(limit) => script.push_str(&format!(
            "nohup timeout {} sh -c {} >/dev/null 2>&1 &\n",
            limit.as_secs().max(1),
            shell_quote(cmd)
        )),
        None => script.push_str(cmd),
    }
    script
}

fn service_script(name: &str, state: ServiceState, enabled: Option<bool>) -> String {
    let name = shell_quote(name);
    let mut script = format!("systemctl {} {name}", state.systemctl_verb());
    match enabled {
        Some(true) => script.push_str(&format!(" && systemctl enable {name}")),
        Some(false) => script.push_str(&format!(" && systemctl disable {name}")),
        None => {}
    }
    script
}

fn package_script(name: &str, disable_gpg_check: bool) -> String {
    let flag = if disable_gpg_check { " --nogpgcheck" } else { "" };
    format!("yum install -y{flag} {}", shell_quote(name))
}

/// Create the staging dir and report whether the copy target exists. A
/// directory `dest` receives the file under its own name.
fn stat_script(staging: &str, dest: &str, name: &str) -> String {
    let dest = shell_quote(dest);
    let name = shell_quote(name);
    format!(
        "mkdir -p {staging} && chmod 700 {staging} || exit 1\n\
         if [ -d {dest} ]; then t={dest}/{name}; else t={dest}; fi\n\
         if [ -e \"$t\" ]; then echo \"exists $t\"; else echo \"absent $t\"; fi",
        staging = shell_quote(staging),
    )
}

fn parse_stat(stdout: &str) -> Option<(bool, String)> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    let (state, target) = line.split_once(' ')?;
    match state {
        "exists" => Some((true, target.to_string())),
        "absent" => Some((false, target.to_string())),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<String>,
    group: Option<String>,
    mode: Option<String>,
}

impl Ownership {
    fn of(owner: &Option<String>, group: &Option<String>, mode: &Option<String>) -> Self {
        Self {
            owner: owner.clone(),
            group: group.clone(),
            mode: mode.clone(),
        }
    }
}

fn install_script(staged: &str, target: &str, own: &Ownership) -> String {
    let target_q = shell_quote(target);
    let mut script = format!("mv -f {} {target_q}", shell_quote(staged));
    match (&own.owner, &own.group) {
        (Some(o), Some(g)) => script.push_str(&format!(" && chown {}:{} {target_q}", o, g)),
        (Some(o), None) => script.push_str(&format!(" && chown {o} {target_q}")),
        (None, Some(g)) => script.push_str(&format!(" && chgrp {g} {target_q}")),
        (None, None) => {}
    }
    if let Some(mode) = &own.mode {
        script.push_str(&format!(" && chmod {mode} {target_q}"));
    }
    script
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern.map(Regex::new).transpose().map_err(InstallError::from)
}

// ---------------------------------------------------------------------------
// Local process execution
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Exec {
    /// `None` when the process was killed or could not be started.
    status: Option<i32>,
    /// Killed after the command timeout; the host stopped answering.
    timed_out: bool,
    stdout: String,
    stderr: String,
}

impl Exec {
    fn into_result(self, host: &str) -> RawHostResult {
        if self.timed_out {
            let mut result = RawHostResult::unreachable(host, self.stderr);
            result.stdout = self.stdout;
            return result;
        }
        match self.status {
            Some(0) => {
                let mut result = RawHostResult::ok(host, self.stdout).with_field("rc", 0);
                result.stderr = self.stderr;
                result
            }
            Some(UNREACHABLE_EXIT) => RawHostResult::unreachable(host, self.stderr),
            Some(rc) => {
                let mut result = RawHostResult::failed(host, self.stderr).with_field("rc", rc);
                result.stdout = self.stdout;
                result
            }
            None => {
                let mut result = RawHostResult::failed(host, self.stderr);
                result.stdout = self.stdout;
                result
            }
        }
    }
}

/// Run a local client process and collect its output.
///
/// Stdout and stderr are drained on dedicated threads so a chatty remote
/// command cannot fill a pipe and stall; the wait happens on a third thread
/// so the timeout can be enforced with `recv_timeout`.
fn run_process(
    program: &Path,
    args: &[String],
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
) -> Exec {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            return Exec {
                status: None,
                timed_out: false,
                stdout: String::new(),
                stderr: format!("failed to spawn {}: {e}", program.display()),
            }
        }
    };

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        if let Err(e) = pipe.write_all(input) {
            warn!(error = %e, "could not write to client stdin");
        }
    }

    let child_pid = child.id();
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || drain(stdout_handle));
    let stderr_thread = std::thread::spawn(move || drain(stderr_handle));

    let wait_result = match timeout {
        None => child.wait(),
        Some(limit) => {
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });
            match rx.recv_timeout(limit) {
                Ok(result) => result,
                Err(_) => {
                    kill_process(child_pid);
                    return Exec {
                        status: None,
                        timed_out: true,
                        stdout: stdout_thread.join().unwrap_or_default(),
                        stderr: format!("timed out after {}s", limit.as_secs()),
                    };
                }
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();
    match wait_result {
        Ok(status) => Exec {
            status: status.code(),
            timed_out: false,
            stdout,
            stderr,
        },
        Err(e) => Exec {
            status: None,
            timed_out: false,
            stdout,
            stderr: format!("wait failed: {e}"),
        },
    }
}

fn drain<R: Read>(handle: Option<R>) -> String {
    let mut buf = String::new();
    if let Some(mut r) = handle {
        let _ = r.read_to_string(&mut buf);
    }
    buf
}

fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::FileInventory;

    #[test]
    fn guarded_command_checks_marker_first() {
        let script = command_script(
            "sh /tmp/t/installJDK.sh jdk.rpm && touch /tmp/t/install_jdk_ok_tag",
            None,
            Some("/tmp/t/install_jdk_ok_tag"),
            None,
        );
        let mut lines = script.lines();
        assert_eq!(
            lines.next().unwrap(),
            "if [ -e '/tmp/t/install_jdk_ok_tag' ]; then echo \"cdh-install: skipped, /tmp/t/install_jdk_ok_tag exists\"; exit 0; fi"
        );
        assert!(lines.next().unwrap().starts_with("sh /tmp/t/installJDK.sh"));
    }

    #[test]
    fn chdir_precedes_command() {
        let script = command_script("tar zxf cm.tar.gz", Some("/tmp/t"), None, None);
        assert_eq!(script, "cd '/tmp/t' || exit 1\ntar zxf cm.tar.gz");
    }

    #[test]
    fn background_command_is_detached() {
        let script = command_script("sleep 100", None, None, Some(Duration::from_secs(600)));
        assert_eq!(
            script,
            "nohup timeout 600 sh -c 'sleep 100' >/dev/null 2>&1 &\n"
        );
    }

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(
            remote_command("echo 'x'", true),
            r"sudo -S -p '' sh -c 'echo '\''x'\'''"
        );
    }

    #[test]
    fn service_script_handles_enablement() {
        assert_eq!(
            service_script("firewalld", ServiceState::Stopped, Some(false)),
            "systemctl stop 'firewalld' && systemctl disable 'firewalld'"
        );
        assert_eq!(
            service_script("mysqld", ServiceState::Restarted, None),
            "systemctl restart 'mysqld'"
        );
    }

    #[test]
    fn package_script_honours_gpg_flag() {
        assert_eq!(package_script("haproxy", true), "yum install -y --nogpgcheck 'haproxy'");
        assert_eq!(package_script("haproxy", false), "yum install -y 'haproxy'");
    }

    #[test]
    fn stat_output_is_parsed_from_last_line() {
        assert_eq!(
            parse_stat("motd noise\nexists /tmp/t/jdk.rpm\n"),
            Some((true, "/tmp/t/jdk.rpm".to_string()))
        );
        assert_eq!(
            parse_stat("absent /etc/my file.cnf"),
            Some((false, "/etc/my file.cnf".to_string()))
        );
        assert_eq!(parse_stat("garbage"), None);
    }

    #[test]
    fn install_script_applies_ownership() {
        let own = Ownership {
            owner: Some("cloudera-scm".into()),
            group: Some("cloudera-scm".into()),
            mode: Some("0600".into()),
        };
        assert_eq!(
            install_script("/tmp/up/x", "/etc/db.properties", &own),
            "mv -f '/tmp/up/x' '/etc/db.properties' && chown cloudera-scm:cloudera-scm '/etc/db.properties' && chmod 0600 '/etc/db.properties'"
        );
    }

    #[test]
    fn exit_status_maps_to_host_state() {
        let exec = |status| Exec {
            status,
            timed_out: false,
            stdout: "out".into(),
            stderr: "err".into(),
        };
        let ok = exec(Some(0)).into_result("h");
        assert!(!ok.failed && !ok.unreachable);
        assert_eq!(ok.payload["rc"], 0);

        let unreachable = exec(Some(255)).into_result("h");
        assert!(unreachable.unreachable);

        let failed = exec(Some(1)).into_result("h");
        assert!(failed.failed && !failed.unreachable);
        assert_eq!(failed.stdout, "out");
        assert_eq!(failed.payload["rc"], 1);

        assert!(exec(None).into_result("h").failed);
    }

    #[test]
    fn timeout_maps_to_unreachable() {
        let sleep = which::which("sleep").unwrap();
        let started = std::time::Instant::now();
        let exec = run_process(
            &sleep,
            &["5".to_string()],
            None,
            Some(Duration::from_millis(200)),
        );
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(exec.timed_out);
        let result = exec.into_result("h");
        assert!(result.unreachable && !result.failed);
        assert!(result.stderr.contains("timed out"));
    }

    #[test]
    fn host_vars_overlay_config_vars() {
        let config: Config = serde_yaml::from_str(
            "password: { my_root: pw }\npackages: { mysql: m, jdk: j, cdh-parcels: p, cdh-cm: c, log4j: l }\n",
        )
        .unwrap();
        let inv = FileInventory::from_yaml_str(
            "hosts:\n  10.0.0.1: { hostname: cdh1 }\ngroups:\n  g: [10.0.0.1]\n",
        )
        .unwrap();
        let backend = SshBackend::new(&config, &inv, "sekret");
        let vars = backend.vars_for("10.0.0.1");
        assert_eq!(vars["hostname"], "cdh1");
        assert_eq!(vars["my_root"], "pw");
        assert_eq!(vars["inventory_hostname"], "10.0.0.1");
        assert!(!backend.vars_for("10.0.0.9").contains_key("hostname"));
        assert!(!format!("{backend:?}").contains("sekret"));
    }
}
