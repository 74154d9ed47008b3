//! In-process text edits behind `LineInFile` and `BlockInFile`.
//!
//! The backend fetches the remote file, applies one of these functions and
//! writes the file back only when the returned flag says it changed.

use regex::Regex;

pub const BLOCK_BEGIN: &str = "# BEGIN CDH-INSTALL MANAGED BLOCK";
pub const BLOCK_END: &str = "# END CDH-INSTALL MANAGED BLOCK";

/// Ensure `line` (which may span several lines) is present.
///
/// - the last line matching `regexp` is replaced by `line`;
/// - otherwise nothing happens if `line` is already present verbatim;
/// - otherwise `line` is inserted after the last line matching `insert_after`,
///   or appended when there is no such line.
pub fn ensure_line(
    content: &str,
    regexp: Option<&Regex>,
    line: &str,
    insert_after: Option<&Regex>,
) -> (String, bool) {
    let mut lines: Vec<&str> = content.lines().collect();
    let wanted: Vec<&str> = line.lines().collect();

    if let Some(re) = regexp {
        if let Some(idx) = lines.iter().rposition(|l| re.is_match(l)) {
            if lines[idx] == line {
                return (content.to_string(), false);
            }
            lines.splice(idx..=idx, wanted.iter().copied());
            return (join(&lines), true);
        }
    }

    if contains_run(&lines, &wanted) {
        return (content.to_string(), false);
    }

    let at = insert_after
        .and_then(|re| lines.iter().rposition(|l| re.is_match(l)))
        .map(|idx| idx + 1)
        .unwrap_or(lines.len());
    lines.splice(at..at, wanted.iter().copied());
    (join(&lines), true)
}

/// Ensure a managed block with exactly `block` as its body is present,
/// replacing a previous managed block in place.
pub fn ensure_block(content: &str, block: &str) -> (String, bool) {
    let lines: Vec<&str> = content.lines().collect();
    let mut managed = vec![BLOCK_BEGIN];
    managed.extend(block.lines());
    managed.push(BLOCK_END);

    let begin = lines.iter().position(|l| *l == BLOCK_BEGIN);
    let end = begin.and_then(|b| {
        lines[b..]
            .iter()
            .position(|l| *l == BLOCK_END)
            .map(|offset| b + offset)
    });

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + managed.len());
    match (begin, end) {
        (Some(b), Some(e)) => {
            out.extend_from_slice(&lines[..b]);
            out.extend_from_slice(&managed);
            out.extend_from_slice(&lines[e + 1..]);
        }
        _ => {
            out.extend_from_slice(&lines);
            out.extend_from_slice(&managed);
        }
    }

    let updated = join(&out);
    let changed = updated != content;
    (updated, changed)
}

fn contains_run(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn join(lines: &[&str]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut s = lines.join("\n");
    s.push('\n');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(p: &str) -> Regex {
        Regex::new(p).unwrap()
    }

    #[test]
    fn regexp_match_is_replaced() {
        let cnf = "[mysqld]\nserver-id = 1\nlog-bin = mysql-bin\n";
        let (out, changed) = ensure_line(cnf, Some(&re("^server-id = 1")), "server-id = 2", None);
        assert!(changed);
        assert_eq!(out, "[mysqld]\nserver-id = 2\nlog-bin = mysql-bin\n");

        let (again, changed) =
            ensure_line(&out, Some(&re("^server-id = 1")), "server-id = 2", None);
        assert!(!changed);
        assert_eq!(again, out);
    }

    #[test]
    fn only_last_match_is_replaced() {
        let text = "a=1\na=2\n";
        let (out, _) = ensure_line(text, Some(&re("^a=")), "a=3", None);
        assert_eq!(out, "a=1\na=3\n");
    }

    #[test]
    fn missing_line_is_appended() {
        let (out, changed) = ensure_line("kernel.x = 1", None, "vm.swappiness = 0", None);
        assert!(changed);
        assert_eq!(out, "kernel.x = 1\nvm.swappiness = 0\n");
    }

    #[test]
    fn present_line_is_left_alone() {
        let text = "vm.swappiness = 0\n";
        let (out, changed) = ensure_line(text, None, "vm.swappiness = 0", None);
        assert!(!changed);
        assert_eq!(out, text);
    }

    #[test]
    fn multi_line_insert_after_anchor() {
        let cnf = "[mysqld]\nbinlog_format = ROW\nport = 3306\n";
        let slave = "read-only = 1\nlog_slave_updates=ON\nrelay-log = relay-bin";
        let (out, changed) = ensure_line(cnf, None, slave, Some(&re("^binlog_format")));
        assert!(changed);
        assert_eq!(
            out,
            "[mysqld]\nbinlog_format = ROW\nread-only = 1\nlog_slave_updates=ON\nrelay-log = relay-bin\nport = 3306\n"
        );
        let (_, changed) = ensure_line(&out, None, slave, Some(&re("^binlog_format")));
        assert!(!changed, "multi-line insert must be idempotent");
    }

    #[test]
    fn unmatched_anchor_appends() {
        let (out, _) = ensure_line("x\n", None, "y", Some(&re("^nothing")));
        assert_eq!(out, "x\ny\n");
    }

    #[test]
    fn block_is_appended_then_replaced() {
        let hosts = "127.0.0.1 localhost\n";
        let (first, changed) = ensure_block(hosts, "10.0.0.1 cdh1\n10.0.0.2 cdh2");
        assert!(changed);
        assert_eq!(
            first,
            format!("127.0.0.1 localhost\n{BLOCK_BEGIN}\n10.0.0.1 cdh1\n10.0.0.2 cdh2\n{BLOCK_END}\n")
        );

        let (same, changed) = ensure_block(&first, "10.0.0.1 cdh1\n10.0.0.2 cdh2");
        assert!(!changed);
        assert_eq!(same, first);

        let (second, changed) = ensure_block(&format!("{first}# trailing\n"), "10.0.0.3 cdh3");
        assert!(changed);
        assert_eq!(
            second,
            format!("127.0.0.1 localhost\n{BLOCK_BEGIN}\n10.0.0.3 cdh3\n{BLOCK_END}\n# trailing\n")
        );
    }

    #[test]
    fn block_into_empty_file() {
        let (out, changed) = ensure_block("", "* soft nofile 65535");
        assert!(changed);
        assert_eq!(out, format!("{BLOCK_BEGIN}\n* soft nofile 65535\n{BLOCK_END}\n"));
    }
}
