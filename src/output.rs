//! Shared output helpers for consistent user-facing text.

use std::fmt::Display;
use std::io::{self, Write};

use tabled::builder::Builder;
use tabled::settings::Style;

use crate::sqlite::Row;

/// Print a successful status line.
pub fn ok<W: Write>(out: &mut W, message: impl Display) -> io::Result<()> {
    writeln!(out, "✓ {message}")
}

/// Print a warning line.
pub fn warn<W: Write>(out: &mut W, message: impl Display) -> io::Result<()> {
    writeln!(out, "Warning: {message}")
}

/// Print an error line.
pub fn error<W: Write>(out: &mut W, message: impl Display) -> io::Result<()> {
    writeln!(out, "Error: {message}")
}

/// Print a title framed by `=` rules.
pub fn banner_rule<W: Write>(out: &mut W, title: &str, width: usize) -> io::Result<()> {
    let rule = "=".repeat(width);
    writeln!(out, "{rule}")?;
    writeln!(out, "{title}")?;
    writeln!(out, "{rule}")
}

/// Render rows as a text table, header taken from the first row.
pub fn rows_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let mut builder = Builder::default();
    builder.push_record(first.column_names().map(str::to_string).collect::<Vec<_>>());
    for row in rows {
        builder.push_record(row.values().map(|v| v.render_plain()).collect::<Vec<_>>());
    }

    let mut table = builder.build();
    table.with(Style::psql());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::Value;

    #[test]
    fn status_lines() {
        let mut out = Vec::new();
        ok(&mut out, "done").unwrap();
        error(&mut out, "boom").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "✓ done\nError: boom\n");
    }

    #[test]
    fn table_has_header_and_plain_values() {
        let rows = vec![Row::new(vec![
            ("title".to_string(), Value::from("1984")),
            ("price".to_string(), Value::Real(15.99)),
        ])];
        let rendered = rows_table(&rows);
        assert!(rendered.contains("title"));
        assert!(rendered.contains("1984"));
        assert!(!rendered.contains("'1984'"));
        assert!(rendered.contains("15.99"));
    }

    #[test]
    fn empty_rows_render_nothing() {
        assert!(rows_table(&[]).is_empty());
    }
}
