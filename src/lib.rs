//! SQLite database manager for teaching relational database design.
//!
//! # Intention
//!
//! - Create, open, query, introspect and dump SQLite databases through one
//!   small API ([`DatabaseManager`]) shared by the command line and the
//!   interactive shell.
//! - Ship illustrative schemas and a guided demo.
//!
//! # Architectural Boundaries
//!
//! - Durability, transactions and query execution belong to the embedded
//!   SQLite engine; this crate only forwards to it.
//! - Printing lives in [`shell`], [`demo`] and the binary; library
//!   operations return values and log through `tracing`.

pub mod config;
pub mod demo;
pub mod dump;
pub mod error;
pub mod output;
pub mod script;
pub mod shell;
pub mod sqlite;
pub mod templates;

pub use error::{Error, Result};
pub use script::ScriptReport;
pub use sqlite::{
    ColumnInfo, DatabaseInfo, DatabaseManager, OverwritePolicy, Params, QueryOutcome, Row,
    SqlQuery, TableInfo, Value,
};
