//! Host groups and per-host variables.
//!
//! The on-disk inventory is a small YAML document:
//!
//! ```yaml
//! hosts:
//!   192.168.100.11: { hostname: cdh1 }
//!   192.168.100.12: { hostname: cdh2 }
//! groups:
//!   cdh_servers: [192.168.100.11, 192.168.100.12]
//!   scm_server: [192.168.100.11]
//! ```
//!
//! The implicit group `all` lists every host in declaration order. A group
//! name containing a comma is an ad-hoc host list (`"10.0.0.5,"`).

use crate::error::{InstallError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const ALL_GROUP: &str = "all";

/// Source of host-group membership and host variables.
pub trait Inventory {
    /// Ordered, duplicate-free host identifiers for `name`.
    fn resolve_group(&self, name: &str) -> Result<Vec<String>>;

    /// Variables of one host. Hosts the inventory does not know have none.
    fn host_vars(&self, host: &str) -> BTreeMap<String, String>;

    fn all_hosts(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// What a task list is bound to. Resolved at every submission so that hosts
/// added between stages are picked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    Group { name: String },
    Hosts { hosts: Vec<String> },
}

impl Target {
    pub fn group(name: impl Into<String>) -> Self {
        Target::Group { name: name.into() }
    }

    pub fn hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Target::Hosts {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn resolve(&self, inventory: &dyn Inventory) -> Result<Vec<String>> {
        match self {
            Target::Group { name } => inventory.resolve_group(name),
            Target::Hosts { hosts } => Ok(dedup(hosts.iter().cloned())),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Target::Group { name } => name.clone(),
            Target::Hosts { hosts } => hosts.join(","),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Split an ad-hoc host list such as `"a,b,"`, dropping blanks.
pub fn parse_host_list(list: &str) -> Vec<String> {
    dedup(
        list.split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from),
    )
}

fn dedup(hosts: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for h in hosts {
        if !out.contains(&h) {
            out.push(h);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// FileInventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileInventory {
    #[serde(default)]
    hosts: indexed::HostMap,
    #[serde(default)]
    groups: BTreeMap<String, Vec<String>>,
}

impl FileInventory {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::inventory_path(root);
        if !path.exists() {
            return Err(InstallError::InventoryNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self> {
        let inv: FileInventory = serde_yaml::from_str(data)?;
        inv.check()?;
        Ok(inv)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Every group member must be declared under `hosts`.
    fn check(&self) -> Result<()> {
        for (group, members) in &self.groups {
            if group == ALL_GROUP {
                return Err(InstallError::Config(
                    "inventory group 'all' is implicit and cannot be declared".to_string(),
                ));
            }
            for member in members {
                if !self.hosts.contains(member) {
                    return Err(InstallError::Config(format!(
                        "host '{member}' in group '{group}' is not declared under hosts"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Inventory for FileInventory {
    fn resolve_group(&self, name: &str) -> Result<Vec<String>> {
        if name.contains(',') {
            return Ok(parse_host_list(name));
        }
        if name == ALL_GROUP {
            return Ok(self.all_hosts());
        }
        match self.groups.get(name) {
            Some(members) => Ok(dedup(members.iter().cloned())),
            None if self.hosts.contains(name) => Ok(vec![name.to_string()]),
            None => Err(InstallError::UnknownGroup(name.to_string())),
        }
    }

    fn host_vars(&self, host: &str) -> BTreeMap<String, String> {
        self.hosts.vars(host).cloned().unwrap_or_default()
    }

    fn all_hosts(&self) -> Vec<String> {
        self.hosts.names()
    }
}

/// Declaration-ordered host table. YAML mappings keep their order on the
/// wire; a `Vec` keeps it in memory.
mod indexed {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;
    use std::fmt;

    type Vars = BTreeMap<String, String>;

    #[derive(Debug, Clone, Default)]
    pub struct HostMap(Vec<(String, Vars)>);

    impl HostMap {
        pub fn contains(&self, host: &str) -> bool {
            self.0.iter().any(|(h, _)| h == host)
        }

        pub fn vars(&self, host: &str) -> Option<&Vars> {
            self.0.iter().find(|(h, _)| h == host).map(|(_, v)| v)
        }

        pub fn names(&self) -> Vec<String> {
            self.0.iter().map(|(h, _)| h.clone()).collect()
        }
    }

    impl Serialize for HostMap {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            let mut map = s.serialize_map(Some(self.0.len()))?;
            for (host, vars) in &self.0 {
                map.serialize_entry(host, vars)?;
            }
            map.end()
        }
    }

    impl<'de> Deserialize<'de> for HostMap {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            struct HostMapVisitor;

            impl<'de> Visitor<'de> for HostMapVisitor {
                type Value = HostMap;

                fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    f.write_str("a mapping of host address to variables")
                }

                fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HostMap, A::Error> {
                    let mut hosts: Vec<(String, Vars)> = Vec::new();
                    while let Some((host, vars)) = access.next_entry::<String, Option<Vars>>()? {
                        if hosts.iter().any(|(h, _)| *h == host) {
                            return Err(serde::de::Error::custom(format!(
                                "host '{host}' declared twice"
                            )));
                        }
                        hosts.push((host, vars.unwrap_or_default()));
                    }
                    Ok(HostMap(hosts))
                }
            }

            d.deserialize_map(HostMapVisitor)
        }
    }
}
