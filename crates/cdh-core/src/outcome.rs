//! Result classification.
//!
//! Turns backend records into `HostOutcome`s that carry everything
//! downstream consumers need: the host, the classification and the captured
//! output. Classification is total over the targeted hosts.

use crate::backend::RawHostResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    Ok,
    Failed,
    Unreachable,
}

impl HostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HostStatus::Ok => "ok",
            HostStatus::Failed => "failed",
            HostStatus::Unreachable => "unreachable",
        }
    }

    pub fn is_ok(self) -> bool {
        self == HostStatus::Ok
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostOutcome {
    pub host: String,
    pub status: HostStatus,
    /// Display form of the action this row belongs to.
    pub action: String,
    pub stdout: String,
    pub stderr: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl HostOutcome {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Unreachable wins over failed; anything else is ok.
pub fn classify_status(raw: &RawHostResult) -> HostStatus {
    if raw.unreachable {
        HostStatus::Unreachable
    } else if raw.failed {
        HostStatus::Failed
    } else {
        HostStatus::Ok
    }
}

pub fn classify(raw: RawHostResult, action: &str) -> HostOutcome {
    let status = classify_status(&raw);
    let mut payload = raw.payload;
    payload.insert("host".to_string(), raw.host.clone().into());
    payload.insert("run_status".to_string(), status.as_str().into());
    HostOutcome {
        host: raw.host,
        status,
        action: action.to_string(),
        stdout: raw.stdout,
        stderr: raw.stderr,
        payload,
    }
}

/// Classify one dispatch round.
///
/// Returns exactly one outcome per targeted host, in target order. A host the
/// backend did not answer for is recorded as unreachable; records for hosts
/// that were not targeted, and repeated records, are dropped. Both are logged
/// as backend defects.
pub fn classify_round(targets: &[String], raws: Vec<RawHostResult>, action: &str) -> Vec<HostOutcome> {
    let mut slots: Vec<Option<RawHostResult>> = vec![None; targets.len()];

    for raw in raws {
        match targets.iter().position(|t| *t == raw.host) {
            Some(i) if slots[i].is_none() => slots[i] = Some(raw),
            Some(_) => warn!(host = %raw.host, %action, "backend returned a duplicate result; keeping the first"),
            None => warn!(host = %raw.host, %action, "backend returned a result for an untargeted host"),
        }
    }

    targets
        .iter()
        .zip(slots)
        .map(|(host, slot)| match slot {
            Some(raw) => classify(raw, action),
            None => {
                warn!(%host, %action, "backend returned no result for host");
                classify(
                    RawHostResult::unreachable(host.clone(), "no result returned by backend"),
                    action,
                )
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classification_is_total() {
        let cases = [
            (false, false, HostStatus::Ok),
            (false, true, HostStatus::Failed),
            (true, false, HostStatus::Unreachable),
            (true, true, HostStatus::Unreachable),
        ];
        for (unreachable, failed, expected) in cases {
            let raw = RawHostResult {
                host: "h".into(),
                unreachable,
                failed,
                ..Default::default()
            };
            assert_eq!(
                classify_status(&raw),
                expected,
                "unreachable={unreachable} failed={failed}"
            );
        }
    }

    #[test]
    fn outcome_is_tagged_with_host_and_status() {
        let raw = RawHostResult::failed("10.0.0.1", "boom").with_field("rc", 2);
        let out = classify(raw, "command: false");
        assert_eq!(out.host, "10.0.0.1");
        assert_eq!(out.status, HostStatus::Failed);
        assert_eq!(out.stderr, "boom");
        assert_eq!(out.payload["host"], "10.0.0.1");
        assert_eq!(out.payload["run_status"], "failed");
        assert_eq!(out.payload["rc"], 2);
    }

    #[test]
    fn round_keeps_target_order() {
        let targets = hosts(&["a", "b", "c"]);
        let raws = vec![
            RawHostResult::ok("c", ""),
            RawHostResult::ok("a", ""),
            RawHostResult::failed("b", "x"),
        ];
        let out = classify_round(&targets, raws, "x");
        let got: Vec<_> = out.iter().map(|o| (o.host.as_str(), o.status)).collect();
        assert_eq!(
            got,
            vec![
                ("a", HostStatus::Ok),
                ("b", HostStatus::Failed),
                ("c", HostStatus::Ok)
            ]
        );
    }

    #[test]
    fn missing_host_becomes_unreachable() {
        let targets = hosts(&["a", "b"]);
        let out = classify_round(&targets, vec![RawHostResult::ok("a", "")], "x");
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].host, "b");
        assert_eq!(out[1].status, HostStatus::Unreachable);
        assert!(out[1].stderr.contains("no result"));
    }

    #[test]
    fn extra_and_duplicate_records_are_dropped() {
        let targets = hosts(&["a"]);
        let raws = vec![
            RawHostResult::ok("a", "first"),
            RawHostResult::failed("a", "second"),
            RawHostResult::ok("z", ""),
        ];
        let out = classify_round(&targets, raws, "x");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].stdout, "first");
        assert!(out[0].is_ok());
    }
}
