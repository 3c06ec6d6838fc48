//! Multi-statement script execution with a per-statement fallback.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Outcome of running a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptReport {
    /// Why the single-batch attempt failed, if it did.
    pub batch_error: Option<String>,
    /// Statements that succeeded during the fallback pass.
    pub executed: usize,
    /// Statements that failed during the fallback pass.
    pub warnings: Vec<String>,
}

impl ScriptReport {
    pub fn fallback(&self) -> bool {
        self.batch_error.is_some()
    }

    pub fn is_clean(&self) -> bool {
        self.batch_error.is_none() && self.warnings.is_empty()
    }
}

/// Run `sql` as one batch; if that fails, split it on `;` and run each
/// statement on its own, collecting failures as warnings.
///
/// Splitting is naive, so trigger bodies only load through the batch path.
pub fn run(conn: &Connection, sql: &str) -> Result<ScriptReport> {
    let batch_error = match conn.execute_batch(sql) {
        Ok(()) => return Ok(ScriptReport::default()),
        Err(err) => err,
    };
    warn!(error = %batch_error, "script failed as a batch, retrying statement by statement");

    if !conn.is_autocommit() {
        conn.execute_batch("ROLLBACK")?;
    }

    let mut report = ScriptReport {
        batch_error: Some(batch_error.to_string()),
        ..ScriptReport::default()
    };
    for statement in split_statements(sql) {
        match conn.execute_batch(statement) {
            Ok(()) => report.executed += 1,
            Err(err) => {
                warn!(error = %err, "statement failed");
                report.warnings.push(err.to_string());
            }
        }
    }
    debug!(
        executed = report.executed,
        failed = report.warnings.len(),
        "fallback pass finished"
    );
    Ok(report)
}

/// Non-empty `;`-separated pieces that contain more than comments.
fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';')
        .map(str::trim)
        .filter(|piece| !strip_leading_comments(piece).is_empty())
}

fn strip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}
