//! SQL text dump of a whole database.
//!
//! The output replays into an empty database: schema and rows of every user
//! table inside one transaction, then indexes, triggers and views, then the
//! AUTOINCREMENT counters. Row literals come from the engine's `quote()` so
//! they round-trip exactly.

use std::io::Write;

use rusqlite::Connection;

use crate::error::Result;

struct SchemaEntry {
    name: String,
    sql: String,
}

/// Write the dump to `out`, one statement per line. Returns the line count.
pub fn write_dump<W: Write>(conn: &Connection, out: &mut W) -> Result<usize> {
    let lines = dump_lines(conn)?;
    for line in &lines {
        writeln!(out, "{line}")?;
    }
    Ok(lines.len())
}

pub fn dump_lines(conn: &Connection) -> Result<Vec<String>> {
    let mut lines = vec![
        "PRAGMA foreign_keys=OFF;".to_string(),
        "BEGIN TRANSACTION;".to_string(),
    ];
    let mut sequence = Vec::new();
    let mut writable_schema = false;

    let tables = schema_entries(
        conn,
        r#"SELECT "name", "sql" FROM "sqlite_master"
           WHERE "sql" NOT NULL AND "type" == 'table' ORDER BY "name""#,
    )?;
    for table in &tables {
        match table.name.as_str() {
            "sqlite_sequence" => {
                sequence.push(r#"DELETE FROM "sqlite_sequence";"#.to_string());
                sequence.extend(insert_statements(conn, &table.name)?);
                continue;
            }
            "sqlite_stat1" => lines.push(r#"ANALYZE "sqlite_master";"#.to_string()),
            name if name.starts_with("sqlite_") => continue,
            name if table.sql.starts_with("CREATE VIRTUAL TABLE") => {
                if !writable_schema {
                    lines.push("PRAGMA writable_schema=ON;".to_string());
                    writable_schema = true;
                }
                let name = quote_literal(name);
                lines.push(format!(
                    "INSERT INTO sqlite_master(type,name,tbl_name,rootpage,sql) \
                     VALUES('table',{name},{name},0,{});",
                    quote_literal(&table.sql)
                ));
            }
            _ => lines.push(format!("{};", table.sql)),
        }
        lines.extend(insert_statements(conn, &table.name)?);
    }

    // creation order, so views built on views replay correctly
    let others = schema_entries(
        conn,
        r#"SELECT "name", "sql" FROM "sqlite_master"
           WHERE "sql" NOT NULL AND "type" IN ('index', 'trigger', 'view')"#,
    )?;
    lines.extend(others.into_iter().map(|entry| format!("{};", entry.sql)));

    if writable_schema {
        lines.push("PRAGMA writable_schema=OFF;".to_string());
    }
    lines.extend(sequence);
    lines.push("COMMIT;".to_string());
    Ok(lines)
}

fn schema_entries(conn: &Connection, query: &str) -> Result<Vec<SchemaEntry>> {
    let mut stmt = conn.prepare(query)?;
    let entries = stmt
        .query_map([], |row| {
            Ok(SchemaEntry {
                name: row.get(0)?,
                sql: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// One `INSERT INTO "table" VALUES(...);` per row, built by the engine.
fn insert_statements(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let ident = quote_ident(table);
    let values = columns
        .iter()
        .map(|column| format!("quote({})", quote_ident(column)))
        .collect::<Vec<_>>()
        .join(" || ',' || ");
    let query = format!(
        "SELECT {} || {values} || ');' FROM {ident}",
        quote_literal(&format!("INSERT INTO {ident} VALUES("))
    );

    let mut stmt = conn.prepare(&query)?;
    let inserts = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(inserts)
}

/// `"name"` with embedded double quotes doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `'text'` with embedded single quotes doubled.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
