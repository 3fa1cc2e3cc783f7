//! Dialect compatibility pass.
//!
//! The prompt is the main compatibility mechanism; this pass only guarantees
//! a deterministic ordering when the model left one out.

use crate::query::sanitize::TERMINATOR;
use crate::store::TIMESTAMP_COLUMN;

/// Append `ORDER BY date DESC` when the statement has no `ORDER BY`.
///
/// Case-insensitive substring test. Idempotent.
pub fn ensure_order_by(sql: &str) -> String {
    if sql.to_uppercase().contains("ORDER BY") {
        return sql.to_string();
    }
    let body = sql.trim_end().trim_end_matches(TERMINATOR).trim_end();
    format!("{body} ORDER BY {TIMESTAMP_COLUMN} DESC{TERMINATOR}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_order_before_terminator() {
        assert_eq!(
            ensure_order_by("SELECT * FROM emails WHERE sender LIKE '%John%';"),
            "SELECT * FROM emails WHERE sender LIKE '%John%' ORDER BY date DESC;"
        );
    }

    #[test]
    fn appends_terminator_when_missing() {
        assert_eq!(
            ensure_order_by("SELECT * FROM emails"),
            "SELECT * FROM emails ORDER BY date DESC;"
        );
    }

    #[test]
    fn collapses_repeated_terminators() {
        assert_eq!(
            ensure_order_by("SELECT 1;;"),
            "SELECT 1 ORDER BY date DESC;"
        );
    }

    #[test]
    fn existing_order_by_is_untouched_in_any_case() {
        for sql in [
            "SELECT * FROM emails ORDER BY date ASC;",
            "select * from emails order by subject;",
            "SELECT * FROM emails Order By sender",
        ] {
            assert_eq!(ensure_order_by(sql), sql);
        }
    }

    #[test]
    fn idempotent() {
        for sql in [
            "SELECT * FROM emails;",
            "SELECT COUNT(*) FROM emails WHERE date >= '2025-03-03'",
            "SELECT * FROM emails ORDER BY date;",
        ] {
            let once = ensure_order_by(sql);
            assert_eq!(ensure_order_by(&once), once);
        }
    }

    #[test]
    fn appends_exactly_one_clause() {
        let fixed = ensure_order_by("SELECT * FROM emails;");
        assert_eq!(fixed.matches("ORDER BY").count(), 1);
        assert!(fixed.ends_with("DESC;"));
    }
}
