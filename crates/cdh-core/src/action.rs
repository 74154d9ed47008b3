//! Remote operation descriptions.
//!
//! An `Action` is pure data: which module to run, with typed arguments, and
//! whether to wait for it. It carries no host binding; the executor binds it
//! to a `Target` at dispatch time. String arguments may contain `{{ var }}`
//! placeholders, rendered per host by the backend.

use crate::error::Result;
use crate::template::{self, Vars};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ServiceState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Started,
    Stopped,
    Restarted,
}

impl ServiceState {
    pub fn systemctl_verb(self) -> &'static str {
        match self {
            ServiceState::Started => "start",
            ServiceState::Stopped => "stop",
            ServiceState::Restarted => "restart",
        }
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "module", rename_all = "snake_case")]
pub enum Module {
    /// Shell command. With `creates`, the command is skipped when the marker
    /// exists on the host and the marker is touched after it succeeds.
    Command {
        cmd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chdir: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        creates: Option<String>,
    },
    /// Transfer a local file. `dest` may be a directory.
    Copy {
        src: PathBuf,
        dest: String,
        force: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
    /// Render a local template per host and transfer the result.
    Template {
        src: PathBuf,
        dest: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
    Service {
        name: String,
        state: ServiceState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enabled: Option<bool>,
    },
    /// Make sure `line` is present. A line matching `regexp` is replaced;
    /// otherwise the line goes after the last `insert_after` match, or at EOF.
    LineInFile {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regexp: Option<String>,
        line: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insert_after: Option<String>,
        backup: bool,
    },
    /// Make sure a marker-delimited block with exactly `block` is present.
    BlockInFile {
        path: String,
        block: String,
        backup: bool,
    },
    Directory {
        path: String,
    },
    Hostname {
        name: String,
    },
    Package {
        name: String,
        #[serde(default)]
        disable_gpg_check: bool,
    },
}

impl Module {
    pub fn name(&self) -> &'static str {
        match self {
            Module::Command { .. } => "command",
            Module::Copy { .. } => "copy",
            Module::Template { .. } => "template",
            Module::Service { .. } => "service",
            Module::LineInFile { .. } => "lineinfile",
            Module::BlockInFile { .. } => "blockinfile",
            Module::Directory { .. } => "directory",
            Module::Hostname { .. } => "hostname",
            Module::Package { .. } => "package",
        }
    }

    /// Copy of this module with every `{{ var }}` in its remote-side string
    /// arguments resolved. Local source paths are left as they are.
    pub fn render(&self, vars: &Vars) -> Result<Module> {
        let r = |s: &str| template::render(s, vars);
        let opt = |s: &Option<String>| s.as_deref().map(r).transpose();
        Ok(match self {
            Module::Command { cmd, chdir, creates } => Module::Command {
                cmd: r(cmd)?,
                chdir: opt(chdir)?,
                creates: opt(creates)?,
            },
            Module::Copy {
                src,
                dest,
                force,
                owner,
                group,
                mode,
            } => Module::Copy {
                src: src.clone(),
                dest: r(dest)?,
                force: *force,
                owner: opt(owner)?,
                group: opt(group)?,
                mode: opt(mode)?,
            },
            Module::Template {
                src,
                dest,
                owner,
                group,
                mode,
            } => Module::Template {
                src: src.clone(),
                dest: r(dest)?,
                owner: opt(owner)?,
                group: opt(group)?,
                mode: opt(mode)?,
            },
            Module::Service {
                name,
                state,
                enabled,
            } => Module::Service {
                name: r(name)?,
                state: *state,
                enabled: *enabled,
            },
            Module::LineInFile {
                path,
                regexp,
                line,
                insert_after,
                backup,
            } => Module::LineInFile {
                path: r(path)?,
                regexp: opt(regexp)?,
                line: r(line)?,
                insert_after: opt(insert_after)?,
                backup: *backup,
            },
            Module::BlockInFile {
                path,
                block,
                backup,
            } => Module::BlockInFile {
                path: r(path)?,
                block: r(block)?,
                backup: *backup,
            },
            Module::Directory { path } => Module::Directory { path: r(path)? },
            Module::Hostname { name } => Module::Hostname { name: r(name)? },
            Module::Package {
                name,
                disable_gpg_check,
            } => Module::Package {
                name: r(name)?,
                disable_gpg_check: *disable_gpg_check,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub module: Module,
    /// When set the action is launched in the background and not waited on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_timeout: Option<Duration>,
    /// Text substituted for the raw command in logs, for commands that carry
    /// credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted: Option<String>,
}

impl Action {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            async_timeout: None,
            redacted: None,
        }
    }

    pub fn command(cmd: impl Into<String>) -> Self {
        Self::new(Module::Command {
            cmd: cmd.into(),
            chdir: None,
            creates: None,
        })
    }

    /// A command run from inside `dir`.
    pub fn command_in(dir: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self::new(Module::Command {
            cmd: cmd.into(),
            chdir: Some(dir.into()),
            creates: None,
        })
    }

    /// A marker-guarded command: skipped when `marker` exists, and `marker` is
    /// touched once `cmd` succeeds.
    pub fn guarded(cmd: impl Into<String>, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        Self::new(Module::Command {
            cmd: format!("{} && touch {}", cmd.into(), marker),
            chdir: None,
            creates: Some(marker),
        })
    }

    pub fn copy(src: impl Into<PathBuf>, dest: impl Into<String>) -> Self {
        Self::new(Module::Copy {
            src: src.into(),
            dest: dest.into(),
            force: false,
            owner: None,
            group: None,
            mode: None,
        })
    }

    pub fn template(src: impl Into<PathBuf>, dest: impl Into<String>) -> Self {
        Self::new(Module::Template {
            src: src.into(),
            dest: dest.into(),
            owner: None,
            group: None,
            mode: None,
        })
    }

    pub fn service(name: impl Into<String>, state: ServiceState, enabled: Option<bool>) -> Self {
        Self::new(Module::Service {
            name: name.into(),
            state,
            enabled,
        })
    }

    pub fn line_in_file(path: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(Module::LineInFile {
            path: path.into(),
            regexp: None,
            line: line.into(),
            insert_after: None,
            backup: false,
        })
    }

    pub fn block_in_file(path: impl Into<String>, block: impl Into<String>) -> Self {
        Self::new(Module::BlockInFile {
            path: path.into(),
            block: block.into(),
            backup: true,
        })
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self::new(Module::Directory { path: path.into() })
    }

    pub fn hostname(name: impl Into<String>) -> Self {
        Self::new(Module::Hostname { name: name.into() })
    }

    pub fn package(name: impl Into<String>, disable_gpg_check: bool) -> Self {
        Self::new(Module::Package {
            name: name.into(),
            disable_gpg_check,
        })
    }

    // -----------------------------------------------------------------------
    // Refinements
    // -----------------------------------------------------------------------

    pub fn with_regexp(mut self, pattern: impl Into<String>) -> Self {
        if let Module::LineInFile { regexp, .. } = &mut self.module {
            *regexp = Some(pattern.into());
        }
        self
    }

    pub fn with_insert_after(mut self, pattern: impl Into<String>) -> Self {
        if let Module::LineInFile { insert_after, .. } = &mut self.module {
            *insert_after = Some(pattern.into());
        }
        self
    }

    pub fn with_backup(mut self) -> Self {
        match &mut self.module {
            Module::LineInFile { backup, .. } | Module::BlockInFile { backup, .. } => {
                *backup = true
            }
            _ => {}
        }
        self
    }

    pub fn with_chdir(mut self, dir: impl Into<String>) -> Self {
        if let Module::Command { chdir, .. } = &mut self.module {
            *chdir = Some(dir.into());
        }
        self
    }

    pub fn with_ownership(
        mut self,
        new_owner: impl Into<String>,
        new_group: impl Into<String>,
        new_mode: impl Into<String>,
    ) -> Self {
        match &mut self.module {
            Module::Copy {
                owner, group, mode, ..
            }
            | Module::Template {
                owner, group, mode, ..
            } => {
                *owner = Some(new_owner.into());
                *group = Some(new_group.into());
                *mode = Some(new_mode.into());
            }
            _ => {}
        }
        self
    }

    pub fn forced(mut self) -> Self {
        if let Module::Copy { force, .. } = &mut self.module {
            *force = true;
        }
        self
    }

    pub fn in_background(mut self, timeout: Duration) -> Self {
        self.async_timeout = Some(timeout);
        self
    }

    pub fn redact(mut self, shown: impl Into<String>) -> Self {
        self.redacted = Some(shown.into());
        self
    }

    /// Always zero: background actions are fire-and-observe.
    pub fn poll_interval(&self) -> Duration {
        Duration::ZERO
    }

    pub fn is_async(&self) -> bool {
        self.async_timeout.is_some_and(|d| !d.is_zero())
    }

    /// The idempotency marker of a guarded command.
    pub fn marker(&self) -> Option<&str> {
        match &self.module {
            Module::Command { creates, .. } => creates.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(shown) = &self.redacted {
            return write!(f, "{}: {}", self.module.name(), shown);
        }
        match &self.module {
            Module::Command { cmd, chdir, .. } => match chdir {
                Some(dir) => write!(f, "command: (cd {dir}) {cmd}"),
                None => write!(f, "command: {cmd}"),
            },
            Module::Copy { src, dest, .. } => write!(f, "copy: {} -> {dest}", src.display()),
            Module::Template { src, dest, .. } => {
                write!(f, "template: {} -> {dest}", src.display())
            }
            Module::Service { name, state, .. } => {
                write!(f, "service: {name} {}", state.systemctl_verb())
            }
            Module::LineInFile { path, line, .. } => write!(f, "lineinfile: {path} <- {line}"),
            Module::BlockInFile { path, .. } => write!(f, "blockinfile: {path}"),
            Module::Directory { path } => write!(f, "directory: {path}"),
            Module::Hostname { name } => write!(f, "hostname: {name}"),
            Module::Package { name, .. } => write!(f, "package: {name}"),
        }
    }
}
