#![allow(dead_code)]

use cdh_core::action::Action;
use cdh_core::backend::{RawHostResult, RemoteBackend};
use cdh_core::config::Config;
use cdh_core::inventory::FileInventory;
use cdh_core::recipes::RecipeContext;
use cdh_core::{InstallError, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

pub const CONFIG: &str = r#"
password:
  my_root: rootpw
  my_repl: replpw
  scm: scmpw
packages:
  mysql: mysql-5.7.34-linux-glibc2.12-x86_64.tar.gz
  jdk: jdk-8u181-linux-x64.rpm
  cdh-parcels: cdh6.3.2-parcels.tar.gz
  cdh-cm: cm6.3.1-redhat7.tar.gz
  log4j: log4j2-update.tar.gz
impala:
  impala_server: [cdh2, cdh3]
hive:
  hs2_server: [cdh2, cdh3]
"#;

pub const INVENTORY: &str = r#"
hosts:
  10.0.0.1: { hostname: cdh1 }
  10.0.0.2: { hostname: cdh2 }
  10.0.0.3: { hostname: cdh3 }
groups:
  cdh_servers: [10.0.0.1, 10.0.0.2, 10.0.0.3]
  db_server: [10.0.0.1, 10.0.0.2]
  scm_server: [10.0.0.1]
  scm_agent: [10.0.0.2, 10.0.0.3]
  haproxy_server: [10.0.0.3]
  lonely: [10.0.0.1]
  empty: []
"#;

pub const PRIMARY: &str = "10.0.0.1";
pub const SECONDARY: &str = "10.0.0.2";

pub fn config(ha: bool) -> Config {
    serde_yaml::from_str::<Config>(CONFIG).unwrap().with_ha(ha)
}

pub fn inventory() -> FileInventory {
    FileInventory::from_yaml_str(INVENTORY).unwrap()
}

pub fn context(config: &Config, inventory: &FileInventory) -> RecipeContext {
    RecipeContext::resolve(Path::new("/opt/cdh-install"), config, inventory).unwrap()
}

pub fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// FakeBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Response {
    Stdout(String),
    Fail(String),
    Unreachable,
    /// Leave the host out of the returned records.
    Omit,
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    host: Option<String>,
    response: Response,
}

/// One `dispatch` call as the backend saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub hosts: Vec<String>,
    pub action: String,
}

/// Records every dispatch, answers `ok` unless a scripted rule matches, and
/// keeps idempotency markers per host the way a real host would.
#[derive(Default)]
pub struct FakeBackend {
    rules: Vec<Rule>,
    transport_failures: Vec<String>,
    calls: Mutex<Vec<Call>>,
    executions: Mutex<Vec<(String, String)>>,
    markers: Mutex<BTreeSet<(String, String)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer actions whose display contains `needle` with `response`, on
    /// `host` only or on every host.
    pub fn on(mut self, needle: &str, host: Option<&str>, response: Response) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            host: host.map(String::from),
            response,
        });
        self
    }

    pub fn transport_error_on(mut self, needle: &str) -> Self {
        self.transport_failures.push(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn dispatched(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.action.contains(needle))
    }

    /// Hosts each matching action was sent to, in dispatch order.
    pub fn targets_of(&self, needle: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.action.contains(needle))
            .map(|c| c.hosts)
            .collect()
    }

    /// How often a matching action actually ran on a host, marker skips
    /// excluded.
    pub fn executions(&self, needle: &str) -> usize {
        self.executions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, action)| action.contains(needle))
            .count()
    }

    fn respond(&self, host: &str, action: &Action, shown: &str) -> Option<RawHostResult> {
        let marker = action.marker().map(String::from);
        if let Some(m) = &marker {
            if self.markers.lock().unwrap().contains(&(host.to_string(), m.clone())) {
                return Some(
                    RawHostResult::ok(host, format!("skipped, {m} exists"))
                        .with_field("skipped", true),
                );
            }
        }
        self.executions
            .lock()
            .unwrap()
            .push((host.to_string(), shown.to_string()));

        let rule = self.rules.iter().find(|r| {
            shown.contains(&r.needle) && r.host.as_deref().map_or(true, |h| h == host)
        });
        let result = match rule.map(|r| &r.response) {
            None => RawHostResult::ok(host, ""),
            Some(Response::Stdout(out)) => RawHostResult::ok(host, out.clone()),
            Some(Response::Fail(stderr)) => {
                RawHostResult::failed(host, stderr.clone()).with_field("rc", 1)
            }
            Some(Response::Unreachable) => {
                RawHostResult::unreachable(host, "ssh: connect to host port 22: No route to host")
            }
            Some(Response::Omit) => return None,
        };
        if let (Some(m), false) = (marker, result.failed || result.unreachable) {
            self.markers.lock().unwrap().insert((host.to_string(), m));
        }
        Some(result)
    }
}

impl RemoteBackend for FakeBackend {
    fn dispatch(&self, hosts: &[String], action: &Action) -> Result<Vec<RawHostResult>> {
        let shown = action.to_string();
        self.calls.lock().unwrap().push(Call {
            hosts: hosts.to_vec(),
            action: shown.clone(),
        });
        if self.transport_failures.iter().any(|n| shown.contains(n)) {
            return Err(InstallError::Transport {
                host: "localhost".to_string(),
                reason: "ssh client not found".to_string(),
            });
        }
        Ok(hosts
            .iter()
            .filter_map(|h| self.respond(h, action, &shown))
            .collect())
    }
}
