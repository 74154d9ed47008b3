//! Primary/secondary coordination.
//!
//! A `Coordinator` reads a runtime value from the first host of a group
//! (`extract`) and uses it to configure the second host (`apply`). Rows of
//! both phases end up in the returned report. The two phases are strictly
//! ordered: `apply` consumes the checkpoint by value, so
//! it cannot run without a successful `extract` in the same invocation, and
//! nothing is cached between runs.

use crate::action::{Action, ServiceState};
use crate::config::Config;
use crate::error::{InstallError, Result};
use crate::executor::{TaskList, TaskListExecutor};
use crate::inventory::{Inventory, Target};
use crate::paths;
use crate::report::AggregateReport;
use std::fmt;
use tracing::info;

pub trait Coordinator {
    type Checkpoint;

    /// The checkpoint together with the report of the query that read it.
    fn extract(
        &self,
        executor: &TaskListExecutor,
        group: &Target,
    ) -> Result<(Self::Checkpoint, AggregateReport)>;

    fn apply(
        &self,
        executor: &TaskListExecutor,
        group: &Target,
        checkpoint: Self::Checkpoint,
    ) -> Result<AggregateReport>;

    fn coordinate(&self, executor: &TaskListExecutor, group: &Target) -> Result<AggregateReport> {
        let (checkpoint, mut report) = self.extract(executor, group)?;
        report.absorb(self.apply(executor, group, checkpoint)?);
        Ok(report)
    }
}

/// First host is the primary, second the secondary. Anything beyond the
/// second host is left alone.
pub fn primary_secondary(inventory: &dyn Inventory, group: &Target) -> Result<(String, String)> {
    let hosts = group.resolve(inventory)?;
    match hosts.as_slice() {
        [primary, secondary, ..] => Ok((primary.clone(), secondary.clone())),
        _ => Err(InstallError::Config(format!(
            "replication group '{}' needs at least two hosts, found {}",
            group.label(),
            hosts.len()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Binary log position of the primary database.
#[derive(Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub log_file: String,
    pub log_position: u64,
}

/// Parse the last non-empty line of `output` as `<log file> <position> ...`.
pub fn parse_checkpoint(output: &str) -> Result<Checkpoint> {
    let line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    let mut tokens = line.split_whitespace();
    let (Some(log_file), Some(position)) = (tokens.next(), tokens.next()) else {
        return Err(InstallError::Checkpoint {
            line: line.to_string(),
            reason: "expected a log file name and a position".to_string(),
        });
    };
    let log_position = position.parse::<u64>().map_err(|e| InstallError::Checkpoint {
        line: line.to_string(),
        reason: format!("position '{position}' is not a non-negative integer: {e}"),
    })?;

    Ok(Checkpoint {
        log_file: log_file.to_string(),
        log_position,
    })
}

// ---------------------------------------------------------------------------
// MysqlReplication
// ---------------------------------------------------------------------------

const SLAVE_SETTINGS: &str = "read-only = 1\nlog_slave_updates=ON\nrelay-log = relay-bin";
const REPLICATION_USER: &str = "repl";

pub struct MysqlReplication {
    mysql: String,
    status_file: String,
    marker: String,
    root_password: String,
    repl_password: String,
}

impl fmt::Debug for MysqlReplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlReplication")
            .field("mysql", &self.mysql)
            .field("status_file", &self.status_file)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

impl MysqlReplication {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            mysql: config.mysql_client(),
            status_file: paths::remote_join(&config.remote_temp_dir, "master_status"),
            marker: paths::marker(&config.remote_temp_dir, "repl_mysql"),
            root_password: config.secret("my_root")?.to_string(),
            repl_password: config.secret("my_repl")?.to_string(),
        })
    }

    fn query_actions(&self) -> Vec<Action> {
        let query = format!(
            "{} -uroot -p{} -e \"show master status;\" > {}",
            self.mysql, self.root_password, self.status_file
        );
        let shown = format!(
            "{} -uroot -p****** -e \"show master status;\" > {}",
            self.mysql, self.status_file
        );
        vec![
            Action::command(query).redact(shown),
            Action::command(format!("tail -n 1 {}", self.status_file)),
        ]
    }

    fn secondary_actions(&self, primary: &str, checkpoint: Checkpoint) -> Vec<Action> {
        let change_master = |password: &str| {
            format!(
                "change master to master_host='{primary}',master_user='{REPLICATION_USER}',\
                 master_password='{password}',master_log_file='{}',master_log_pos={};start slave;",
                checkpoint.log_file, checkpoint.log_position
            )
        };
        let bind = format!(
            "{} -uroot -p{} -e \"{}\"",
            self.mysql,
            self.root_password,
            change_master(&self.repl_password)
        );
        let shown = format!(
            "{} -uroot -p****** -e \"{}\" && touch {}",
            self.mysql,
            change_master("******"),
            self.marker
        );

        vec![
            Action::line_in_file(paths::MY_CNF, "server-id = 2")
                .with_regexp("^server-id = 1")
                .with_backup(),
            Action::line_in_file(paths::MY_CNF, SLAVE_SETTINGS).with_insert_after("^binlog_format"),
            Action::service("mysqld", ServiceState::Restarted, None),
            Action::guarded(bind, self.marker.clone()).redact(shown),
        ]
    }
}

impl Coordinator for MysqlReplication {
    type Checkpoint = Checkpoint;

    fn extract(
        &self,
        executor: &TaskListExecutor,
        group: &Target,
    ) -> Result<(Checkpoint, AggregateReport)> {
        let (primary, _) = primary_secondary(executor.inventory(), group)?;
        let list = TaskList::new("query mysql master status", Target::hosts([primary.clone()]))
            .with_all(self.query_actions());
        let report = executor.execute(&list)?;

        if !report.is_success() {
            let reason = report
                .diagnostics()
                .into_iter()
                .map(|d| format!("{}: {}", d.status, d.stderr.trim()))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(InstallError::CheckpointQuery {
                host: primary,
                reason,
            });
        }

        let stdout = report
            .latest(&primary)
            .map(|row| row.stdout.as_str())
            .unwrap_or_default();
        let checkpoint = parse_checkpoint(stdout)?;
        info!(
            %primary,
            log_file = %checkpoint.log_file,
            log_position = checkpoint.log_position,
            "read replication checkpoint"
        );
        Ok((checkpoint, report))
    }

    fn apply(
        &self,
        executor: &TaskListExecutor,
        group: &Target,
        checkpoint: Checkpoint,
    ) -> Result<AggregateReport> {
        let (primary, secondary) = primary_secondary(executor.inventory(), group)?;
        let list = TaskList::new("configure_mysql master/slave", Target::hosts([secondary]))
            .with_all(self.secondary_actions(&primary, checkpoint));
        executor.execute(&list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Module;

    #[test]
    fn parses_two_token_line() {
        let cp = parse_checkpoint("mysql-bin.000003    154\n").unwrap();
        assert_eq!(
            cp,
            Checkpoint {
                log_file: "mysql-bin.000003".to_string(),
                log_position: 154
            }
        );
    }

    #[test]
    fn uses_last_line_and_ignores_extra_columns() {
        let out = "File\tPosition\tBinlog_Do_DB\nmysql-bin.000007\t4242\t\t\n\n";
        let cp = parse_checkpoint(out).unwrap();
        assert_eq!(cp.log_file, "mysql-bin.000007");
        assert_eq!(cp.log_position, 4242);
    }

    #[test]
    fn non_numeric_position_is_rejected() {
        let err = parse_checkpoint("mysql-bin.000003 abc\n").unwrap_err();
        assert!(matches!(err, InstallError::Checkpoint { .. }));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn negative_position_is_rejected() {
        assert!(parse_checkpoint("mysql-bin.000003 -1").is_err());
    }

    #[test]
    fn header_only_output_is_rejected() {
        assert!(parse_checkpoint("File\tPosition\n").is_err());
    }

    #[test]
    fn empty_output_is_rejected() {
        let err = parse_checkpoint("").unwrap_err();
        assert!(err.to_string().contains("expected a log file name"));
    }

    fn replication() -> MysqlReplication {
        MysqlReplication {
            mysql: "/usr/local/mysql/bin/mysql".to_string(),
            status_file: "/tmp/cdh_install_temp/master_status".to_string(),
            marker: "/tmp/cdh_install_temp/repl_mysql_ok_tag".to_string(),
            root_password: "rootpw".to_string(),
            repl_password: "replpw".to_string(),
        }
    }

    #[test]
    fn secondary_binding_uses_checkpoint_and_marker() {
        let actions = replication().secondary_actions(
            "10.0.0.1",
            Checkpoint {
                log_file: "mysql-bin.000003".to_string(),
                log_position: 154,
            },
        );
        assert_eq!(actions.len(), 4);
        let bind = actions.last().unwrap();
        assert_eq!(bind.marker(), Some("/tmp/cdh_install_temp/repl_mysql_ok_tag"));
        let Module::Command { cmd, .. } = &bind.module else {
            panic!("expected a command");
        };
        assert!(cmd.contains("master_host='10.0.0.1'"));
        assert!(cmd.contains("master_log_file='mysql-bin.000003'"));
        assert!(cmd.contains("master_log_pos=154;start slave;"));
        assert!(cmd.contains("master_password='replpw'"));
        let shown = bind.to_string();
        assert!(!shown.contains("replpw"));
        assert!(!shown.contains("rootpw"));
    }

    #[test]
    fn debug_hides_passwords() {
        let dbg = format!("{:?}", replication());
        assert!(!dbg.contains("rootpw"));
        assert!(!dbg.contains("replpw"));
    }
}
