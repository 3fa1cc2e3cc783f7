//! Prompt construction for SQL generation.

use crate::query::context::DateContext;
use crate::store::{TABLE_NAME, TIMESTAMP_COLUMN};

/// Build the system instruction for one request.
pub fn build_system_prompt(ctx: &DateContext) -> String {
    let (week_start, week_end) = ctx.last_week();

    let mut prompt = String::with_capacity(2048);
    prompt.push_str(
        "You are a SQL expert. Convert natural language queries to SQL for a SQLite database.\n\
         Return ONLY the raw SQL query without ANY markdown formatting, code blocks, backticks, or explanations.\n\n",
    );

    prompt.push_str(&ctx.render());
    prompt.push_str("\n\n");

    prompt.push_str(&format!(
        "The database has a table '{TABLE_NAME}' with columns:\n\
         - id (TEXT)\n\
         - sender (TEXT) - Contains both name and email address like \"John Doe <john@example.com>\"\n\
         - recipient (TEXT)\n\
         - {TIMESTAMP_COLUMN} (DATETIME) - Stored in format YYYY-MM-DD HH:MM:SS\n\
         - subject (TEXT)\n\
         - content (TEXT)\n\n"
    ));

    prompt.push_str(
        "IMPORTANT RULES:\n\
         1. Use SQLite syntax:\n\
         \x20  - Instead of CURDATE(), use DATE('now')\n\
         \x20  - Instead of NOW(), use DATETIME('now')\n\
         \x20  - For date operations, use DATE() and DATETIME() functions\n\n\
         2. For searching people:\n\
         \x20  - Always use LIKE '%name%' instead of equality to enable partial matching\n\
         \x20  - If query mentions a name without an email, search in the sender field with LIKE\n\n\
         3. For string searches:\n\
         \x20  - Use the LIKE operator with % wildcards\n\
         \x20  - Make searches case-insensitive when possible\n\n",
    );

    prompt.push_str(&format!(
        "4. Sort by {TIMESTAMP_COLUMN} in descending order (newest first) unless specified otherwise\n\n\
         5. For time-based queries, convert relative time references to absolute dates:\n\
         \x20  - \"last week\" means emails from the past 7 days\n\
         \x20  - \"last month\" means emails from the past 30 days\n\
         \x20  - \"today\" means emails from today's date\n\
         \x20  - \"yesterday\" means emails from yesterday's date\n\
         \x20  - \"this week\" means emails since the start of the current week\n\
         \x20  - \"last year\" means emails from the past 365 days\n\n\
         6. For combined queries like \"show emails from last week sent by John\":\n\
         \x20  - Combine time conditions AND sender conditions\n\
         \x20  - For example: \"WHERE {TIMESTAMP_COLUMN} >= '{week_start}' AND {TIMESTAMP_COLUMN} <= '{week_end} 23:59:59' AND sender LIKE '%John%'\"\n\n\
         Remember, return ONLY a single raw SQL query. Do not include any backticks, markdown formatting, or explanations."
    ));

    prompt
}

/// Build the user prompt for a question.
pub fn build_user_prompt(question: &str) -> String {
    format!("Write SQL query for: {}", question.trim())
}
