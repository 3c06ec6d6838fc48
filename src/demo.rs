//! Guided walkthrough that builds a small library catalogue.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::output;
use crate::sqlite::{DatabaseManager, OverwritePolicy, Params, SqlQuery, Value};

const RULE_WIDTH: usize = 70;

const AUTHORS_TABLE: &str = "
    CREATE TABLE authors (
        author_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        country TEXT,
        birth_year INTEGER,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )";

const BOOKS_TABLE: &str = "
    CREATE TABLE books (
        book_id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        author_id INTEGER NOT NULL,
        isbn TEXT UNIQUE,
        published_year INTEGER CHECK(published_year >= 1000 AND published_year <= 2100),
        genre TEXT,
        price REAL CHECK(price >= 0),
        stock INTEGER DEFAULT 0 CHECK(stock >= 0),
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (author_id) REFERENCES authors(author_id) ON DELETE CASCADE
    )";

const AUTHORS: [(&str, &str, i64); 3] = [
    ("J.K. Rowling", "United Kingdom", 1965),
    ("George Orwell", "United Kingdom", 1903),
    ("Gabriel García Márquez", "Colombia", 1927),
];

struct Book {
    title: &'static str,
    author_id: i64,
    isbn: &'static str,
    year: i64,
    genre: &'static str,
    price: f64,
    stock: i64,
}

const BOOKS: [Book; 4] = [
    Book {
        title: "Harry Potter and the Philosopher's Stone",
        author_id: 1,
        isbn: "978-0439708180",
        year: 1997,
        genre: "Fantasy",
        price: 29.99,
        stock: 50,
    },
    Book {
        title: "1984",
        author_id: 2,
        isbn: "978-0451524935",
        year: 1949,
        genre: "Dystopian",
        price: 15.99,
        stock: 30,
    },
    Book {
        title: "Animal Farm",
        author_id: 2,
        isbn: "978-0451526342",
        year: 1945,
        genre: "Political Fiction",
        price: 12.99,
        stock: 25,
    },
    Book {
        title: "One Hundred Years of Solitude",
        author_id: 3,
        isbn: "978-0060883287",
        year: 1967,
        genre: "Magical Realism",
        price: 18.99,
        stock: 20,
    },
];

/// What the demo produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoSummary {
    pub database: PathBuf,
    pub export: PathBuf,
    pub authors: usize,
    pub books: usize,
    pub database_bytes: u64,
    pub export_bytes: u64,
}

/// Build `demo_library.db` in `dir`, narrate each step to `out`, and export
/// a backup to `library_backup.sql`. An earlier demo database is replaced.
pub fn run<W: Write>(dir: &Path, options: DatabaseConfig, out: &mut W) -> Result<DemoSummary> {
    let database = dir.join("demo_library.db");
    let export = dir.join("library_backup.sql");
    let mut db = DatabaseManager::with_options(options);

    output::banner_rule(
        out,
        "SQL-PANCAKE DEMONSTRATION\nCreating a database with keys, constraints and indexes",
        RULE_WIDTH,
    )?;

    writeln!(out, "\nStep 1: Creating a new database...")?;
    db.create_database(&database, None, OverwritePolicy::Overwrite)?;
    output::ok(out, format!("Database created: {}", database.display()))?;

    writeln!(out, "\nStep 2: Creating tables...")?;
    db.execute_query(AUTHORS_TABLE, &[])?;
    output::ok(out, "Created 'authors' table")?;
    db.execute_query(BOOKS_TABLE, &[])?;
    output::ok(out, "Created 'books' table with foreign key constraint")?;
    db.execute_query("CREATE INDEX idx_books_author ON books(author_id)", &[])?;
    db.execute_query("CREATE INDEX idx_books_genre ON books(genre)", &[])?;
    output::ok(out, "Created indexes on books(author_id) and books(genre)")?;

    writeln!(out, "\nStep 3: Inserting sample data with parameterized queries...")?;
    for (name, country, birth_year) in AUTHORS {
        let insert = SqlQuery::new("INSERT INTO authors (name, country, birth_year) VALUES (?, ?, ?)")
            .with_params(Params::new().with_value(name).with_value(country).with_value(birth_year));
        db.run(&insert)?;
    }
    output::ok(out, format!("Inserted {} authors", AUTHORS.len()))?;

    for book in &BOOKS {
        db.execute_query(
            "INSERT INTO books (title, author_id, isbn, published_year, genre, price, stock)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            &[
                Value::from(book.title),
                Value::from(book.author_id),
                Value::from(book.isbn),
                Value::from(book.year),
                Value::from(book.genre),
                Value::from(book.price),
                Value::from(book.stock),
            ],
        )?;
    }
    output::ok(out, format!("Inserted {} books", BOOKS.len()))?;

    writeln!(out, "\nStep 4: Querying data with JOIN...")?;
    let catalogue = db
        .execute_query(
            "SELECT b.title, a.name AS author, b.published_year AS year, b.genre, b.price, b.stock
             FROM books b
             JOIN authors a ON b.author_id = a.author_id
             ORDER BY b.published_year DESC",
            &[],
        )?
        .into_rows();
    writeln!(out, "\nLibrary Catalog:")?;
    writeln!(out, "{}", output::rows_table(&catalogue))?;

    writeln!(out, "\nStep 5: Running aggregation queries...")?;
    let by_genre = db
        .execute_query(
            "SELECT genre, COUNT(*) AS book_count, AVG(price) AS avg_price
             FROM books
             GROUP BY genre
             ORDER BY book_count DESC, genre",
            &[],
        )?
        .into_rows();
    writeln!(out, "\nBooks by Genre:")?;
    for row in &by_genre {
        writeln!(
            out,
            "  - {}: {} books, avg price: ${:.2}",
            row.get("genre").map(Value::render_plain).unwrap_or_default(),
            row.get("book_count").and_then(Value::as_i64).unwrap_or(0),
            row.get("avg_price").and_then(Value::as_f64).unwrap_or(0.0),
        )?;
    }

    let by_author = db
        .execute_query(
            "SELECT a.name, COUNT(b.book_id) AS book_count
             FROM authors a
             LEFT JOIN books b ON a.author_id = b.author_id
             GROUP BY a.author_id
             ORDER BY book_count DESC, a.name",
            &[],
        )?
        .into_rows();
    writeln!(out, "\nBooks per Author:")?;
    for row in &by_author {
        writeln!(
            out,
            "  - {}: {} book(s)",
            row.get("name").map(Value::render_plain).unwrap_or_default(),
            row.get("book_count").and_then(Value::as_i64).unwrap_or(0),
        )?;
    }

    writeln!(out, "\nStep 6: Database structure overview...")?;
    write!(out, "{}", db.database_info()?)?;

    writeln!(out, "\nStep 7: Exporting database for backup...")?;
    db.export_to_sql(&export)?;
    output::ok(out, format!("Database exported to: {}", export.display()))?;

    let summary = DemoSummary {
        authors: AUTHORS.len(),
        books: BOOKS.len(),
        database_bytes: fs::metadata(&database)?.len(),
        export_bytes: fs::metadata(&export)?.len(),
        database,
        export,
    };
    writeln!(out, "  Database file size: {} bytes", summary.database_bytes)?;
    writeln!(out, "  Export file size: {} bytes", summary.export_bytes)?;

    writeln!(out, "\nStep 8: Closing database connection...")?;
    db.close()?;
    output::ok(out, "Database connection closed")?;

    writeln!(out)?;
    output::banner_rule(out, "DEMONSTRATION COMPLETE", RULE_WIDTH)?;
    writeln!(out, "Your database is ready at: {}", summary.database.display())?;
    writeln!(out, "Export file available at: {}", summary.export.display())?;
    writeln!(out, "Open it with: sql-pancake open {}", summary.database.display())?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn demo_builds_catalogue_and_backup() {
        let dir = TempDir::new().unwrap();
        let mut out = Vec::new();

        let summary = run(dir.path(), DatabaseConfig::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(summary.authors, 3);
        assert_eq!(summary.books, 4);
        assert!(summary.database_bytes > 0);
        assert!(summary.export_bytes > 0);
        assert!(text.contains("Dystopian: 1 books, avg price: $15.99"));
        assert!(text.contains("George Orwell: 2 book(s)"));
        assert!(text.contains("Harry Potter and the Philosopher's Stone"));

        let backup = fs::read_to_string(&summary.export).unwrap();
        assert!(backup.contains("CREATE INDEX idx_books_genre ON books(genre);"));
    }

    #[test]
    fn demo_can_run_twice() {
        let dir = TempDir::new().unwrap();
        run(dir.path(), DatabaseConfig::default(), &mut Vec::new()).unwrap();
        run(dir.path(), DatabaseConfig::default(), &mut Vec::new()).unwrap();
    }
}
