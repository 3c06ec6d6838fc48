use std::convert::Infallible;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::dump;
use crate::error::{Error, Result};
use crate::script::{self, ScriptReport};

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text without SQL quoting, for tabular output.
    pub fn render_plain(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Renders the value as an SQL literal.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r:?}"),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Blob(bytes) => {
                f.write_str("X'")?;
                for byte in bytes {
                    write!(f, "{byte:02X}")?;
                }
                f.write_str("'")
            }
            Value::Boolean(b) => write!(f, "{}", i64::from(*b)),
        }
    }
}

/// Parses a command-line parameter: `NULL`, integers and decimals keep their
/// type, everything else binds as text.
impl FromStr for Value {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        if let Ok(i) = s.parse::<i64>() {
            // keeps zero-padded codes such as "007" as text
            if i.to_string() == s {
                return Ok(Value::Integer(i));
            }
        }
        if s.contains(['.', 'e', 'E']) {
            if let Ok(r) = s.parse::<f64>() {
                if r.is_finite() {
                    return Ok(Value::Real(r));
                }
            }
        }
        Ok(Value::Text(s.to_string()))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Owned;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Owned::Null),
            Value::Integer(i) => ToSqlOutput::Owned(Owned::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(Owned::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Boolean(b) => ToSqlOutput::Owned(Owned::Integer(i64::from(*b))),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(value.into())
    }
}

/// Positional bindings for `?` placeholders
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    pub values: Vec<Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }
    /// Append the value bound to the next placeholder
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// SQL Query with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// One result row, columns in statement order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Value of the first column called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Result of [`DatabaseManager::execute_query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The statement produced a result set (possibly empty).
    Rows(Vec<Row>),
    /// Rows changed by a statement without a result set.
    Affected(usize),
}

impl QueryOutcome {
    pub fn rows(&self) -> &[Row] {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Affected(_) => &[],
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Affected(_) => Vec::new(),
        }
    }
}

/// Column description as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    /// Declared type, empty for untyped columns.
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.declared_type)?;
        if self.primary_key {
            f.write_str(" (PRIMARY KEY)")?;
        }
        if self.not_null {
            f.write_str(" NOT NULL")?;
        }
        if let Some(default) = self.default_value.as_deref().filter(|d| !d.is_empty()) {
            write!(f, " DEFAULT {default}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Tables and columns of an open database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseInfo {
    pub path: PathBuf,
    pub tables: Vec<TableInfo>,
}

const INFO_RULE_WIDTH: usize = 60;

impl fmt::Display for DatabaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(INFO_RULE_WIDTH);
        writeln!(f)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Database: {}", self.path.display())?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Tables ({}):", self.tables.len())?;
        for table in &self.tables {
            writeln!(f)?;
            writeln!(f, "  # {}", table.name)?;
            if !table.columns.is_empty() {
                writeln!(f, "    Columns:")?;
                for column in &table.columns {
                    writeln!(f, "      - {column}")?;
                }
            }
        }
        writeln!(f)?;
        writeln!(f, "{rule}")
    }
}

/// What [`DatabaseManager::create_database`] does with an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    #[default]
    Refuse,
    Overwrite,
}

/// Owns at most one SQLite connection and the path it was opened from.
#[derive(Debug, Default)]
pub struct DatabaseManager {
    options: DatabaseConfig,
    path: Option<PathBuf>,
    conn: Option<Connection>,
}

impl DatabaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DatabaseConfig) -> Self {
        Self {
            options,
            path: None,
            conn: None,
        }
    }

    pub fn options(&self) -> &DatabaseConfig {
        &self.options
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// The open connection, or [`Error::NotConnected`].
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::NotConnected)
    }

    /// Open (creating if needed) the database at `path`, replacing any
    /// connection already held. Missing parent directories are created.
    pub fn connect(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::NoPath);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        self.configure(&conn)?;
        self.conn = Some(conn);
        self.path = Some(path.to_path_buf());

        info!(path = %path.display(), "connected to database");
        Ok(())
    }

    fn configure(&self, conn: &Connection) -> Result<()> {
        if self.options.busy_timeout_ms > i32::MAX as u64 {
            return Err(Error::Config(format!(
                "busy timeout of {} ms is out of range",
                self.options.busy_timeout_ms
            )));
        }
        conn.busy_timeout(self.options.busy_timeout())?;
        conn.pragma_update(None, "foreign_keys", self.options.foreign_keys)?;
        Ok(())
    }

    /// Create a database at `path`, optionally loading a schema file into it.
    ///
    /// A missing schema file is reported before anything on disk changes.
    /// Returns the schema load report when a schema was given.
    pub fn create_database(
        &mut self,
        path: impl AsRef<Path>,
        schema_file: Option<&Path>,
        policy: OverwritePolicy,
    ) -> Result<Option<ScriptReport>> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::NoPath);
        }
        if let Some(schema) = schema_file {
            if !schema.is_file() {
                return Err(Error::FileNotFound(schema.to_path_buf()));
            }
        }

        if path.exists() {
            match policy {
                OverwritePolicy::Refuse => return Err(Error::AlreadyExists(path.to_path_buf())),
                OverwritePolicy::Overwrite => {
                    if self.path() == Some(path) {
                        self.close()?;
                    }
                    fs::remove_file(path)?;
                    debug!(path = %path.display(), "removed existing database");
                }
            }
        }

        self.connect(path)?;
        let report = schema_file
            .map(|schema| self.execute_schema_file(schema))
            .transpose()?;

        info!(path = %path.display(), "database created");
        Ok(report)
    }

    /// Run a multi-statement script, falling back to one statement at a time
    /// if the batch fails.
    pub fn execute_script(&self, sql: &str) -> Result<ScriptReport> {
        script::run(self.connection()?, sql)
    }

    pub fn execute_schema_file(&self, schema_file: impl AsRef<Path>) -> Result<ScriptReport> {
        let conn = self.connection()?;
        let schema_file = schema_file.as_ref();
        let sql = read_sql_file(schema_file)?;

        let report = script::run(conn, &sql)?;
        info!(
            file = %schema_file.display(),
            fallback = report.fallback(),
            warnings = report.warnings.len(),
            "schema loaded"
        );
        Ok(report)
    }

    /// Execute one statement with positional parameters.
    ///
    /// Statements that produce columns return their rows; everything else
    /// reports the number of rows changed. Changes commit immediately unless
    /// the caller opened a transaction.
    pub fn execute_query(&self, query: &str, params: &[Value]) -> Result<QueryOutcome> {
        let conn = self.connection()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("empty SQL statement".to_string()));
        }
        debug!(query, params = params.len(), "executing query");

        let mut stmt = conn.prepare(query)?;
        if stmt.column_count() == 0 {
            let affected = stmt.execute(params_from_iter(params.iter()))?;
            return Ok(QueryOutcome::Affected(affected));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                values.push((name.clone(), Value::from(row.get_ref(i)?)));
            }
            result.push(Row::new(values));
        }
        Ok(QueryOutcome::Rows(result))
    }

    /// Execute a prepared [`SqlQuery`].
    pub fn run(&self, query: &SqlQuery) -> Result<QueryOutcome> {
        self.execute_query(&query.statement, &query.params.values)
    }

    /// Names of all tables, engine tables such as `sqlite_sequence` included.
    pub fn get_tables(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Columns of `table`; empty when no such table exists.
    pub fn get_table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn database_info(&self) -> Result<DatabaseInfo> {
        let tables = self
            .get_tables()?
            .into_iter()
            .map(|name| {
                let columns = self.get_table_schema(&name)?;
                Ok(TableInfo { name, columns })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DatabaseInfo {
            path: self
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from(":memory:")),
            tables,
        })
    }

    /// The whole database as SQL text.
    pub fn dump(&self) -> Result<String> {
        let lines = dump::dump_lines(self.connection()?)?;
        let mut text = lines.join("\n");
        text.push('\n');
        Ok(text)
    }

    /// Write the SQL dump to `output_file`, returning the number of lines.
    pub fn export_to_sql(&self, output_file: impl AsRef<Path>) -> Result<usize> {
        let conn = self.connection()?;
        let output_file = output_file.as_ref();

        let mut writer = BufWriter::new(File::create(output_file)?);
        let lines = dump::write_dump(conn, &mut writer)?;
        writer.flush()?;

        info!(file = %output_file.display(), lines, "database exported");
        Ok(lines)
    }

    /// Execute an SQL file in one batch.
    ///
    /// A transaction left open by a failing script is rolled back, and the
    /// connection pragmas are re-applied afterwards since dumps switch
    /// foreign keys off.
    pub fn import_from_sql(&self, sql_file: impl AsRef<Path>) -> Result<()> {
        let conn = self.connection()?;
        let sql_file = sql_file.as_ref();
        let sql = read_sql_file(sql_file)?;

        if let Err(err) = conn.execute_batch(&sql) {
            if !conn.is_autocommit() {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!(error = %rollback, "rollback after failed import failed");
                }
            }
            self.configure(conn)?;
            return Err(err.into());
        }
        self.configure(conn)?;

        info!(file = %sql_file.display(), "SQL file imported");
        Ok(())
    }

    /// Close the connection. Closing an unconnected manager is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.path = None;
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| err)?;
            info!("database connection closed");
        }
        Ok(())
    }
}

fn read_sql_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}
