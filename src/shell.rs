//! Menu-driven interactive database manager.
//!
//! Input arrives through [`LineReader`] so the same loop drives a terminal
//! (via `rustyline`) and scripted tests.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::Error;
use crate::output;
use crate::script::ScriptReport;
use crate::sqlite::{DatabaseManager, OverwritePolicy, QueryOutcome};

const BANNER: &str = r"
╔═══════════════════════════════════════════════════════════╗
║         SQL Database Manager - High Quality Edition       ║
║                Create • Save • Open • Manage              ║
╚═══════════════════════════════════════════════════════════╝
";

const MENU: &str = "
Options:
1. Create new database
2. Open existing database
3. Show database info
4. Execute SQL query
5. Export database to SQL file
6. Import SQL file
7. Load schema from file
8. Close database
9. Exit";

/// Source of input lines.
pub trait LineReader {
    /// Show `prompt` and read one line. `Ok(None)` means end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Terminal input with line editing and optional persistent history.
pub struct EditorInput {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl EditorInput {
    pub fn new(history: Option<PathBuf>) -> rustyline::Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &history {
            if let Err(err) = editor.load_history(path) {
                debug!(error = %err, path = %path.display(), "no shell history loaded");
            }
        }
        Ok(Self { editor, history })
    }
}

impl LineReader for EditorInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        debug!(error = %err, "failed to record shell history entry");
                    }
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) => Ok(None),
            // Ctrl-C abandons the current line only
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err.to_string())),
        }
    }
}

impl Drop for EditorInput {
    fn drop(&mut self) {
        let Some(path) = &self.history else {
            return;
        };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(err) = self.editor.save_history(path) {
            debug!(error = %err, path = %path.display(), "failed to save shell history");
        }
    }
}

/// Pre-recorded input, used by tests and piped sessions.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineReader for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Create,
    Open,
    Info,
    Query,
    Export,
    Import,
    LoadSchema,
    Close,
    Exit,
}

impl FromStr for MenuChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "1" => MenuChoice::Create,
            "2" => MenuChoice::Open,
            "3" => MenuChoice::Info,
            "4" => MenuChoice::Query,
            "5" => MenuChoice::Export,
            "6" => MenuChoice::Import,
            "7" => MenuChoice::LoadSchema,
            "8" => MenuChoice::Close,
            "9" => MenuChoice::Exit,
            other => return Err(Error::InvalidInput(format!("unknown menu choice '{other}'"))),
        })
    }
}

enum Flow {
    Continue,
    Exit,
}

/// The interactive loop: prints the menu, reads a choice, runs it.
pub struct Shell<R, W> {
    reader: R,
    out: W,
    manager: DatabaseManager,
    banner: bool,
}

impl<R: LineReader, W: Write> Shell<R, W> {
    pub fn new(reader: R, out: W, options: DatabaseConfig) -> Self {
        Self {
            reader,
            out,
            manager: DatabaseManager::with_options(options),
            banner: true,
        }
    }

    pub fn with_banner(mut self, banner: bool) -> Self {
        self.banner = banner;
        self
    }

    pub fn manager(&self) -> &DatabaseManager {
        &self.manager
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.out)
    }

    /// Run until the user exits or input ends. Only failures writing output
    /// or reading input end the loop early; operation errors are printed.
    pub fn run(&mut self) -> io::Result<()> {
        if self.banner {
            writeln!(self.out, "{BANNER}")?;
        }

        loop {
            writeln!(self.out, "{MENU}")?;
            let Some(input) = self.ask("\nEnter your choice (1-9): ")? else {
                self.exit()?;
                return Ok(());
            };
            let choice = match input.parse::<MenuChoice>() {
                Ok(choice) => choice,
                Err(_) => {
                    writeln!(self.out, "Invalid choice. Please enter 1-9.")?;
                    continue;
                }
            };
            debug!(?choice, "menu choice");

            if let Flow::Exit = self.dispatch(choice)? {
                return Ok(());
            }
        }
    }

    fn dispatch(&mut self, choice: MenuChoice) -> io::Result<Flow> {
        match choice {
            MenuChoice::Create => self.create(),
            MenuChoice::Open => self.open(),
            MenuChoice::Info => self.info(),
            MenuChoice::Query => self.query(),
            MenuChoice::Export => self.export(),
            MenuChoice::Import => self.import(),
            MenuChoice::LoadSchema => self.load_schema(),
            MenuChoice::Close => self.close(),
            MenuChoice::Exit => self.exit(),
        }
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.out.flush()?;
        Ok(self
            .reader
            .read_line(prompt)?
            .map(|line| line.trim().to_string()))
    }

    fn create(&mut self) -> io::Result<Flow> {
        let Some(path) = self.ask("Enter database path (e.g., mydatabase.db): ")? else {
            return self.exit();
        };
        let Some(schema) = self.ask("Enter schema file path (or press Enter to skip): ")? else {
            return self.exit();
        };
        let schema = (!schema.is_empty()).then(|| PathBuf::from(schema));

        let mut policy = OverwritePolicy::Refuse;
        if !path.is_empty() && Path::new(&path).exists() {
            let prompt = format!("Database {path} already exists. Overwrite? (yes/no): ");
            let Some(answer) = self.ask(&prompt)? else {
                return self.exit();
            };
            if answer.to_lowercase() != "yes" {
                writeln!(self.out, "Operation cancelled.")?;
                return Ok(Flow::Continue);
            }
            policy = OverwritePolicy::Overwrite;
        }

        match self.manager.create_database(&path, schema.as_deref(), policy) {
            Ok(report) => {
                output::ok(&mut self.out, format!("Connected to database: {path}"))?;
                if let (Some(schema), Some(report)) = (&schema, report) {
                    self.print_schema_report(schema, &report)?;
                }
                output::ok(&mut self.out, format!("Database created: {path}"))?;
            }
            Err(err) => output::error(&mut self.out, err)?,
        }
        Ok(Flow::Continue)
    }

    fn open(&mut self) -> io::Result<Flow> {
        let Some(path) = self.ask("Enter database path: ")? else {
            return self.exit();
        };
        if path.is_empty() || !Path::new(&path).exists() {
            writeln!(self.out, "Error: Database {path} not found")?;
            return Ok(Flow::Continue);
        }
        match self.manager.connect(&path) {
            Ok(()) => output::ok(&mut self.out, format!("Connected to database: {path}"))?,
            Err(err) => output::error(&mut self.out, err)?,
        }
        Ok(Flow::Continue)
    }

    fn info(&mut self) -> io::Result<Flow> {
        if !self.manager.is_connected() {
            writeln!(self.out, "Not connected to any database")?;
            return Ok(Flow::Continue);
        }
        match self.manager.database_info() {
            Ok(info) => write!(self.out, "{info}")?,
            Err(err) => output::error(&mut self.out, err)?,
        }
        Ok(Flow::Continue)
    }

    /// Prints the "no database" error and reports whether one is open.
    fn require_connection(&mut self) -> io::Result<bool> {
        if self.manager.is_connected() {
            return Ok(true);
        }
        output::error(&mut self.out, "No database connected")?;
        Ok(false)
    }

    fn query(&mut self) -> io::Result<Flow> {
        if !self.require_connection()? {
            return Ok(Flow::Continue);
        }
        let Some(query) = self.ask("Enter SQL query: ")? else {
            return self.exit();
        };
        match self.manager.execute_query(&query, &[]) {
            Ok(QueryOutcome::Rows(rows)) if !rows.is_empty() => {
                writeln!(self.out, "\nResults ({} rows):", rows.len())?;
                for row in &rows {
                    writeln!(self.out, "{row}")?;
                }
            }
            Ok(_) => output::ok(&mut self.out, "Query executed successfully")?,
            Err(err) => output::error(&mut self.out, err)?,
        }
        Ok(Flow::Continue)
    }

    fn export(&mut self) -> io::Result<Flow> {
        if !self.require_connection()? {
            return Ok(Flow::Continue);
        }
        let Some(file) = self.ask("Enter output SQL file path: ")? else {
            return self.exit();
        };
        match self.manager.export_to_sql(&file) {
            Ok(_) => output::ok(&mut self.out, format!("Database exported to: {file}"))?,
            Err(err) => output::error(&mut self.out, err)?,
        }
        Ok(Flow::Continue)
    }

    fn import(&mut self) -> io::Result<Flow> {
        if !self.require_connection()? {
            return Ok(Flow::Continue);
        }
        let Some(file) = self.ask("Enter SQL file path: ")? else {
            return self.exit();
        };
        match self.manager.import_from_sql(&file) {
            Ok(()) => output::ok(&mut self.out, format!("SQL file imported: {file}"))?,
            Err(err) => output::error(&mut self.out, err)?,
        }
        Ok(Flow::Continue)
    }

    fn load_schema(&mut self) -> io::Result<Flow> {
        if !self.require_connection()? {
            return Ok(Flow::Continue);
        }
        let Some(file) = self.ask("Enter schema file path: ")? else {
            return self.exit();
        };
        let file = PathBuf::from(file);
        match self.manager.execute_schema_file(&file) {
            Ok(report) => self.print_schema_report(&file, &report)?,
            Err(err) => output::error(&mut self.out, err)?,
        }
        Ok(Flow::Continue)
    }

    fn print_schema_report(&mut self, file: &Path, report: &ScriptReport) -> io::Result<()> {
        if let Some(batch_error) = &report.batch_error {
            writeln!(self.out, "Error loading schema: {batch_error}")?;
        }
        for warning in &report.warnings {
            output::warn(&mut self.out, warning)?;
        }
        output::ok(&mut self.out, format!("Schema loaded from: {}", file.display()))
    }

    fn close(&mut self) -> io::Result<Flow> {
        if self.manager.is_connected() {
            match self.manager.close() {
                Ok(()) => output::ok(&mut self.out, "Database connection closed")?,
                Err(err) => output::error(&mut self.out, err)?,
            }
        }
        self.manager = DatabaseManager::with_options(self.manager.options().clone());
        Ok(Flow::Continue)
    }

    fn exit(&mut self) -> io::Result<Flow> {
        self.close()?;
        writeln!(self.out, "\nGoodbye! Happy database designing!")?;
        self.out.flush()?;
        Ok(Flow::Exit)
    }
}
