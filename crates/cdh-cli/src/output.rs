use cdh_core::pipeline::{RunState, RunSummary, Verdict};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

fn failed_cell(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Ok => "-".to_string(),
        Verdict::StageFailed { hosts, .. } => hosts.join(","),
        Verdict::Fatal { reason } => reason.clone(),
    }
}

/// One line per gate, then the terminal state.
pub fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(summary);
    }

    let mut rows = vec![vec![
        "capability_check".to_string(),
        summary.capability.label().to_string(),
        "-".to_string(),
        failed_cell(&summary.capability),
    ]];
    for stage in &summary.stages {
        let row = match &stage.verdict {
            Some(v) => vec![
                stage.kind.to_string(),
                v.label().to_string(),
                stage.rows.to_string(),
                failed_cell(v),
            ],
            None => vec![
                stage.kind.to_string(),
                "skipped".to_string(),
                "0".to_string(),
                "-".to_string(),
            ],
        };
        rows.push(row);
    }
    print_table(&["STAGE", "VERDICT", "ROWS", "FAILED"], rows);

    println!();
    match &summary.state {
        RunState::Completed => println!("Run {} completed.", summary.run_id),
        RunState::Aborted { reason } => println!("Run {} aborted: {reason}", summary.run_id),
        other => println!("Run {} ended in state {other:?}", summary.run_id),
    }
    Ok(())
}
