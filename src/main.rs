//! sql-pancake - create, open, query and dump SQLite databases

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sql_pancake::config::Config;
use sql_pancake::shell::{EditorInput, Shell};
use sql_pancake::{demo, output, templates};
use sql_pancake::{DatabaseManager, Error, OverwritePolicy, QueryOutcome, Value};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "sql-pancake")]
#[command(author, version, about = "Create, open, query and dump SQLite databases", long_about = None)]
struct Cli {
    /// Defaults to the interactive shell
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive menu
    Shell,

    /// Create a new database, optionally loading a schema
    Create {
        path: PathBuf,
        /// SQL schema file to load
        #[arg(short, long, conflicts_with = "template")]
        schema: Option<PathBuf>,
        /// Bundled schema to load (see `templates`)
        #[arg(short, long)]
        template: Option<String>,
        /// Replace an existing database
        #[arg(long)]
        force: bool,
    },

    /// Open an existing database and describe it
    Open { path: PathBuf },

    /// Show tables and columns
    Info { path: PathBuf },

    /// List table names
    Tables { path: PathBuf },

    /// Execute one SQL statement
    Query {
        path: PathBuf,
        sql: String,
        /// Value bound to the next `?` placeholder (repeatable)
        #[arg(short, long = "param")]
        params: Vec<Value>,
    },

    /// Dump the database to an SQL file
    Export { path: PathBuf, output: PathBuf },

    /// Execute an SQL file against the database
    Import { path: PathBuf, file: PathBuf },

    /// Load a schema file, tolerating statements that fail
    Schema { path: PathBuf, file: PathBuf },

    /// List bundled schema templates
    Templates,

    /// Build and export a sample library database
    Demo {
        /// Where to write demo_library.db and library_backup.sql
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // reset and path must keep working when config.toml is broken
    let repairing = matches!(
        cli.command,
        Some(Commands::Config {
            action: ConfigAction::Reset | ConfigAction::Path
        })
    );
    let mut unreadable = None;
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) if repairing => {
            unreadable = Some(format!("{err:#}"));
            Config::default()
        }
        Err(err) => {
            let mut stderr = io::stderr();
            let _ = output::error(&mut stderr, format!("{err:#}"));
            if let Some(suggestion) = err.downcast_ref::<Error>().and_then(Error::suggestion) {
                eprintln!("  hint: {suggestion}");
            }
            return ExitCode::FAILURE;
        }
    };
    config.logging.init();
    if let Some(err) = unreadable {
        warn!(error = %err, "config file is unreadable, using defaults");
    }

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut stderr = io::stderr();
            let _ = output::error(&mut stderr, format!("{err:#}"));
            if let Some(err) = err.downcast_ref::<Error>() {
                debug!(code = err.code(), "command failed");
                if let Some(suggestion) = err.suggestion() {
                    eprintln!("  hint: {suggestion}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let format = cli.format;
    let quiet = cli.quiet;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => cmd_shell(&config),
        Commands::Create {
            path,
            schema,
            template,
            force,
        } => cmd_create(
            &config,
            &path,
            schema.as_deref(),
            template.as_deref(),
            force,
            format,
            quiet,
        ),
        Commands::Open { path } => {
            let db = open_existing(&config, &path)?;
            if !quiet {
                output::ok(&mut io::stdout(), format!("Connected to database: {}", path.display()))?;
            }
            print_info(&db, format)
        }
        Commands::Info { path } => print_info(&open_existing(&config, &path)?, format),
        Commands::Tables { path } => {
            let tables = open_existing(&config, &path)?.get_tables()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tables)?),
                OutputFormat::Text => tables.iter().for_each(|table| println!("{table}")),
            }
            Ok(())
        }
        Commands::Query { path, sql, params } => cmd_query(&config, &path, &sql, &params, format, quiet),
        Commands::Export { path, output: file } => {
            let lines = open_existing(&config, &path)?.export_to_sql(&file)?;
            if !quiet {
                output::ok(
                    &mut io::stdout(),
                    format!("Database exported to: {} ({} statements)", file.display(), lines),
                )?;
            }
            Ok(())
        }
        Commands::Import { path, file } => {
            open_existing(&config, &path)?.import_from_sql(&file)?;
            if !quiet {
                output::ok(&mut io::stdout(), format!("SQL file imported: {}", file.display()))?;
            }
            Ok(())
        }
        Commands::Schema { path, file } => {
            let report = open_existing(&config, &path)?.execute_schema_file(&file)?;
            print_script_report(&file.display().to_string(), &report, format, quiet)
        }
        Commands::Templates => {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&templates::TEMPLATES)?),
                OutputFormat::Text => {
                    for template in &templates::TEMPLATES {
                        println!("{:<10} {}", template.name, template.description);
                    }
                }
            }
            Ok(())
        }
        Commands::Demo { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::temp_dir(),
            };
            let summary = if quiet || format == OutputFormat::Json {
                demo::run(&dir, config.database.clone(), &mut io::sink())?
            } else {
                demo::run(&dir, config.database.clone(), &mut io::stdout())?
            };
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        Commands::Config { action } => cmd_config(action, quiet),
    }
}

/// Connect to a database that must already exist.
fn open_existing(config: &Config, path: &Path) -> anyhow::Result<DatabaseManager> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()).into());
    }
    let mut db = DatabaseManager::with_options(config.database.clone());
    db.connect(path)?;
    Ok(db)
}

// ============================================================================
// Command Implementations
// ============================================================================

fn cmd_shell(config: &Config) -> anyhow::Result<()> {
    let history = if config.shell.history {
        Some(Config::history_path()?)
    } else {
        None
    };
    let input = EditorInput::new(history).context("Failed to initialise line editor")?;
    let banner = config.shell.banner && io::stdout().is_terminal();

    let mut shell = Shell::new(input, io::stdout(), config.database.clone()).with_banner(banner);
    shell.run()?;
    Ok(())
}

fn cmd_create(
    config: &Config,
    path: &Path,
    schema: Option<&Path>,
    template: Option<&str>,
    force: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let template = template.map(templates::find).transpose()?;
    let policy = if force {
        OverwritePolicy::Overwrite
    } else {
        OverwritePolicy::Refuse
    };

    let mut db = DatabaseManager::with_options(config.database.clone());
    let report = match (schema, template) {
        (Some(schema), _) => db.create_database(path, Some(schema), policy)?,
        (None, Some(template)) => {
            db.create_database(path, None, policy)?;
            Some(db.execute_script(template.sql)?)
        }
        (None, None) => db.create_database(path, None, policy)?,
    };

    db.close()?;

    if format == OutputFormat::Json {
        let created = serde_json::json!({
            "database": path.display().to_string(),
            "schema": report,
        });
        println!("{}", serde_json::to_string_pretty(&created)?);
        return Ok(());
    }

    if let Some(report) = &report {
        let source = schema
            .map(|s| s.display().to_string())
            .or_else(|| template.map(|t| format!("template '{}'", t.name)))
            .unwrap_or_default();
        print_script_report(&source, report, format, quiet)?;
    }
    if !quiet {
        output::ok(&mut io::stdout(), format!("Database created: {}", path.display()))?;
    }
    Ok(())
}

fn cmd_query(
    config: &Config,
    path: &Path,
    sql: &str,
    params: &[Value],
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let db = open_existing(config, path)?;
    let outcome = db.execute_query(sql, params)?;

    match (format, outcome) {
        (OutputFormat::Json, QueryOutcome::Rows(rows)) => {
            println!("{}", serde_json::to_string_pretty(&rows)?)
        }
        (OutputFormat::Json, QueryOutcome::Affected(n)) => {
            println!("{}", serde_json::json!({ "affected": n }))
        }
        (OutputFormat::Text, QueryOutcome::Rows(rows)) if !rows.is_empty() => {
            println!("{}", output::rows_table(&rows));
            if !quiet {
                println!("({} rows)", rows.len());
            }
        }
        (OutputFormat::Text, QueryOutcome::Rows(_)) => {
            if !quiet {
                println!("(0 rows)");
            }
        }
        (OutputFormat::Text, QueryOutcome::Affected(n)) => {
            if !quiet {
                output::ok(
                    &mut io::stdout(),
                    format!("Query executed successfully ({} rows affected)", n),
                )?;
            }
        }
    }
    Ok(())
}

fn print_info(db: &DatabaseManager, format: OutputFormat) -> anyhow::Result<()> {
    let info = db.database_info()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        OutputFormat::Text => print!("{info}"),
    }
    Ok(())
}

fn print_script_report(
    source: &str,
    report: &sql_pancake::ScriptReport,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let mut stdout = io::stdout();
    if let Some(batch_error) = &report.batch_error {
        println!("Error loading schema: {batch_error}");
    }
    for warning in &report.warnings {
        output::warn(&mut stdout, warning)?;
    }
    if !quiet {
        output::ok(&mut stdout, format!("Schema loaded from: {source}"))?;
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            println!("{}", Config::load()?.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            for (key, value) in Config::load()?.list() {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            let path = Config::config_path()?;
            if !path.exists() {
                if !quiet {
                    println!("Configuration already at defaults.");
                }
                return Ok(());
            }
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            if !path.exists() && !quiet {
                println!("(file does not exist yet; defaults are in effect)");
            }
        }
    }
    Ok(())
}
