mod common;

use cdh_core::action::Action;
use cdh_core::executor::{TaskList, TaskListExecutor};
use cdh_core::inventory::Target;
use cdh_core::outcome::HostStatus;
use cdh_core::InstallError;
use common::{hosts, inventory, FakeBackend, Response};

fn three_steps(target: Target) -> TaskList {
    TaskList::new("prepare", target)
        .with(Action::command("echo step-1"))
        .with(Action::command("echo step-2"))
        .with(Action::command("echo step-3"))
}

#[test]
fn report_has_one_row_per_host_and_action() {
    let backend = FakeBackend::new();
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let report = executor
        .execute(&three_steps(Target::group("cdh_servers")))
        .unwrap();

    assert_eq!(report.len(), 9);
    assert!(report.is_success());
    assert_eq!(backend.dispatch_count(), 3);
    assert!(backend
        .calls()
        .iter()
        .all(|c| c.hosts == hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3"])));
}

#[test]
fn failed_host_still_receives_later_actions() {
    let backend = FakeBackend::new().on("step-1", Some("10.0.0.2"), Response::Fail("boom".into()));
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let report = executor
        .execute(&three_steps(Target::group("cdh_servers")))
        .unwrap();

    assert_eq!(report.len(), 9);
    assert!(!report.is_success());
    assert_eq!(report.failed_hosts(), hosts(&["10.0.0.2"]));
    assert_eq!(report.latest("10.0.0.2").unwrap().status, HostStatus::Ok);
    assert_eq!(backend.executions("step-3"), 3);

    let diagnostics = report.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].stderr, "boom");
    assert!(diagnostics[0].action.contains("step-1"));
}

#[test]
fn unreachable_wins_and_is_reported_per_host() {
    let backend = FakeBackend::new().on("step-2", Some("10.0.0.3"), Response::Unreachable);
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let report = executor
        .execute(&three_steps(Target::group("cdh_servers")))
        .unwrap();

    assert_eq!(report.hosts_with(HostStatus::Unreachable), hosts(&["10.0.0.3"]));
    assert!(report.hosts_with(HostStatus::Failed).is_empty());
}

#[test]
fn host_missing_from_backend_answer_is_unreachable() {
    let backend = FakeBackend::new().on("step-1", Some("10.0.0.1"), Response::Omit);
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let report = executor
        .execute(&three_steps(Target::group("cdh_servers")))
        .unwrap();

    assert_eq!(report.len(), 9);
    assert_eq!(report.failed_hosts(), hosts(&["10.0.0.1"]));
    assert_eq!(report.rows()[0].status, HostStatus::Unreachable);
}

#[test]
fn empty_group_is_an_error_without_dispatch() {
    let backend = FakeBackend::new();
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let err = executor
        .execute(&three_steps(Target::group("empty")))
        .unwrap_err();

    assert!(matches!(err, InstallError::EmptyGroup(ref g) if g == "empty"));
    assert_eq!(backend.dispatch_count(), 0);
}

#[test]
fn unknown_group_is_an_error_without_dispatch() {
    let backend = FakeBackend::new();
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let err = executor
        .execute(&three_steps(Target::group("nope")))
        .unwrap_err();

    assert!(matches!(err, InstallError::UnknownGroup(_)));
    assert_eq!(backend.dispatch_count(), 0);
}

#[test]
fn ad_hoc_host_list_is_accepted() {
    let backend = FakeBackend::new();
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let report = executor
        .execute(&three_steps(Target::group("10.0.0.9,")))
        .unwrap();

    assert_eq!(report.hosts(), vec!["10.0.0.9"]);
    assert_eq!(report.len(), 3);
}

#[test]
fn transport_error_propagates() {
    let backend = FakeBackend::new().transport_error_on("step-2");
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);

    let err = executor
        .execute(&three_steps(Target::group("cdh_servers")))
        .unwrap_err();

    assert!(matches!(err, InstallError::Transport { .. }));
    assert_eq!(backend.dispatch_count(), 2);
}

#[test]
fn guarded_step_runs_once_across_reruns() {
    let backend = FakeBackend::new();
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);
    let list = TaskList::new("install_jdk", Target::group("cdh_servers")).with(Action::guarded(
        "sh /tmp/cdh_install_temp/installJDK.sh jdk.rpm",
        "/tmp/cdh_install_temp/install_jdk_ok_tag",
    ));

    let first = executor.execute(&list).unwrap();
    let second = executor.execute(&list).unwrap();

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(backend.dispatch_count(), 2);
    assert_eq!(backend.executions("installJDK.sh"), 3);
    assert!(second
        .rows()
        .iter()
        .all(|r| r.payload.get("skipped") == Some(&serde_json::Value::Bool(true))));
}

#[test]
fn failed_guarded_step_is_retried_on_rerun() {
    let backend = FakeBackend::new().on("installMysql.sh", Some("10.0.0.2"), Response::Fail("no space".into()));
    let inv = inventory();
    let executor = TaskListExecutor::new(&backend, &inv);
    let list = TaskList::new("install_mysql", Target::group("db_server")).with(Action::guarded(
        "sh /tmp/cdh_install_temp/installMysql.sh",
        "/tmp/cdh_install_temp/install_mysql_ok_tag",
    ));

    executor.execute(&list).unwrap();
    let rerun = executor.execute(&list).unwrap();

    assert_eq!(rerun.failed_hosts(), hosts(&["10.0.0.2"]));
    assert_eq!(backend.executions("installMysql.sh"), 3);
}
