//! Model output sanitization — turns raw completion text into one statement.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::QueryError;

/// Opening or closing fence, with an optional language tag (```sql, ```).
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\w*").expect("fence pattern is valid"));

/// Statement terminator.
pub const TERMINATOR: char = ';';

/// Strip fenced code markers and stray backticks, then trim.
pub fn clean_model_output(raw: &str) -> String {
    let without_fences = FENCE.replace_all(raw, "");
    without_fences.replace('`', "").trim().to_string()
}

/// Case-insensitive `SELECT` substring test. Deliberately loose.
pub fn contains_select(sql: &str) -> bool {
    sql.to_uppercase().contains("SELECT")
}

/// Append a terminator when the statement lacks one.
pub fn ensure_terminated(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.ends_with(TERMINATOR) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{TERMINATOR}")
    }
}

/// Clean, validate and terminate raw model output.
pub fn extract_statement(raw: &str) -> Result<String, QueryError> {
    let cleaned = clean_model_output(raw);
    if !contains_select(&cleaned) {
        return Err(QueryError::Translation(
            "no valid query in model output".to_string(),
        ));
    }
    Ok(ensure_terminated(&cleaned))
}
