//! Terminal rendering of query outcomes.

use crate::query::QueryOutcome;
use crate::store::ResultSet;

/// Cells wider than this are cut with an ellipsis.
const MAX_CELL_CHARS: usize = 60;

/// Aligned text table with a header row and separator.
pub fn render_table(rs: &ResultSet) -> String {
    if rs.is_empty() {
        return "(no rows)".to_string();
    }

    let cells: Vec<Vec<String>> = rs
        .rows
        .iter()
        .map(|row| row.iter().map(|v| cell_text(&v.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = rs.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format_row(&rs.columns, &widths));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        out.push('\n');
        out.push_str(&format_row(row, &widths));
    }
    out.push_str(&format!(
        "\n({} row{})",
        rs.len(),
        if rs.len() == 1 { "" } else { "s" }
    ));
    out
}

/// SQL followed by the table, or the failure message.
pub fn render_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Succeeded { rows, sql } => {
            format!("SQL Query:\n{sql}\n\nResults:\n{}", render_table(rows))
        }
        QueryOutcome::Failed { message, sql } => match sql {
            Some(sql) => format!("{message}\n\nSQL Query:\n{sql}"),
            None => message.clone(),
        },
    }
}

/// Pretty JSON of the outcome.
pub fn render_json(outcome: &QueryOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(outcome)
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}", w = *w))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn cell_text(raw: &str) -> String {
    let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_CELL_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(MAX_CELL_CHARS - 1).collect();
    format!("{cut}…")
}
