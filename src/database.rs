//! `SQLite` database for persistent show resolution.
//!
//! Stores the canonical shows, which raw file name tokens map to which show,
//! and the library directories chosen for each show and season.
//! Existing bindings are never overwritten: writing a different value for an
//! existing key is a [`FatalError::CacheConflict`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::FatalError;
use crate::types::ShowIdentity;

/// Default database filename.
const DATABASE_FILENAME: &str = "tvsort.db";

/// Database wrapper for show resolution bindings.
pub struct Database {
    connection: Connection,
    path: Option<PathBuf>,
}

/// One row of the season directory table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonDirEntry {
    pub show_id: i64,
    pub season: u32,
    pub season_dir: String,
}

impl Database {
    /// Open or create the database at the default path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open_default() -> Result<Self> {
        Self::open(&Self::database_path())
    }

    /// Open or create the database at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
        }

        let connection =
            Connection::open(path).with_context(|| format!("Failed to open database: {}", path.display()))?;

        connection
            .busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout")?;

        let database = Self {
            connection,
            path: Some(path.to_path_buf()),
        };
        database.initialize()?;

        Ok(database)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let database = Self { connection, path: None };
        database.initialize()?;

        Ok(database)
    }

    /// Get the default database path.
    ///
    /// Uses the platform-specific local data directory:
    /// - Windows: `%LOCALAPPDATA%\tv-sort\tvsort.db`
    /// - macOS: `~/Library/Application Support/tv-sort/tvsort.db`
    /// - Linux: `~/.local/share/tv-sort/tvsort.db`
    #[must_use]
    pub fn database_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(env!("CARGO_PKG_NAME"))
            .join(DATABASE_FILENAME)
    }

    /// Delete the database file together with its WAL and shared memory files.
    ///
    /// Returns the removed files.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be removed.
    pub fn remove_files(path: &Path) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for suffix in ["", "-wal", "-shm"] {
            let mut name = path.as_os_str().to_os_string();
            name.push(suffix);
            let file = PathBuf::from(name);
            if file.exists() {
                std::fs::remove_file(&file)
                    .with_context(|| format!("Failed to delete database file: {}", file.display()))?;
                removed.push(file);
            }
        }
        Ok(removed)
    }

    /// Path of the opened database file, `None` for an in-memory database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Find the show id bound to a raw file name token.
    pub fn search_file_name(&self, file_name: &str) -> Result<Option<i64>> {
        self.connection
            .query_row(
                "SELECT show_id FROM file_name WHERE file_name = ?1",
                params![file_name],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query file name table")
    }

    /// Bind a raw file name token to a show.
    ///
    /// Binding the same show again is a no-op.
    ///
    /// # Errors
    /// Returns [`FatalError::CacheConflict`] if the token is already bound to a different show.
    pub fn add_file_name(&self, file_name: &str, show_id: i64) -> Result<()> {
        match self.search_file_name(file_name)? {
            Some(existing) if existing == show_id => Ok(()),
            Some(existing) => Err(FatalError::CacheConflict {
                table: "file_name",
                key: file_name.to_string(),
                existing: existing.to_string(),
                new: show_id.to_string(),
            }
            .into()),
            None => {
                self.connection
                    .execute(
                        "INSERT INTO file_name (file_name, show_id) VALUES (?1, ?2)",
                        params![file_name, show_id],
                    )
                    .context("Failed to insert file name")?;
                Ok(())
            }
        }
    }

    /// Find a show by its exact canonical name.
    pub fn show_by_name(&self, show_name: &str) -> Result<Option<ShowIdentity>> {
        self.connection
            .query_row(
                "SELECT show_id, show_name FROM tv_library WHERE show_name = ?1",
                params![show_name],
                |row| {
                    Ok(ShowIdentity {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query TV library")
    }

    /// Find a show by id.
    pub fn show_by_id(&self, show_id: i64) -> Result<Option<ShowIdentity>> {
        self.connection
            .query_row(
                "SELECT show_id, show_name FROM tv_library WHERE show_id = ?1",
                params![show_id],
                |row| {
                    Ok(ShowIdentity {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to query TV library")
    }

    /// Get all shows sorted by name.
    pub fn all_shows(&self) -> Result<Vec<ShowIdentity>> {
        let mut stmt = self
            .connection
            .prepare("SELECT show_id, show_name FROM tv_library ORDER BY show_name")
            .context("Failed to prepare query")?;

        let shows = stmt
            .query_map([], |row| {
                Ok(ShowIdentity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to execute query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect results")?;

        Ok(shows)
    }

    /// Register a new show and return its identity.
    ///
    /// # Errors
    /// Returns [`FatalError::CacheConflict`] if a show with the same name already exists.
    pub fn add_show(&self, show_name: &str) -> Result<ShowIdentity> {
        if let Some(existing) = self.show_by_name(show_name)? {
            return Err(FatalError::CacheConflict {
                table: "tv_library",
                key: show_name.to_string(),
                existing: existing.to_string(),
                new: show_name.to_string(),
            }
            .into());
        }

        self.connection
            .execute("INSERT INTO tv_library (show_name) VALUES (?1)", params![show_name])
            .context("Failed to insert show")?;

        Ok(ShowIdentity {
            id: self.connection.last_insert_rowid(),
            name: show_name.to_string(),
        })
    }

    /// Get the library directory bound to a show.
    pub fn show_dir(&self, show_id: i64) -> Result<Option<String>> {
        let show_dir: Option<Option<String>> = self
            .connection
            .query_row(
                "SELECT show_dir FROM tv_library WHERE show_id = ?1",
                params![show_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query show directory")?;

        match show_dir {
            Some(dir) => Ok(dir),
            None => Err(FatalError::CacheCorruption(format!("show id {show_id} not found in TV library")).into()),
        }
    }

    /// Bind a library directory to a show.
    ///
    /// # Errors
    /// Returns [`FatalError::CacheConflict`] if a different directory is already stored.
    pub fn set_show_dir(&self, show_id: i64, show_dir: &str) -> Result<()> {
        match self.show_dir(show_id)? {
            Some(existing) if existing == show_dir => Ok(()),
            Some(existing) => Err(FatalError::CacheConflict {
                table: "tv_library",
                key: format!("show {show_id} directory"),
                existing,
                new: show_dir.to_string(),
            }
            .into()),
            None => {
                self.connection
                    .execute(
                        "UPDATE tv_library SET show_dir = ?1 WHERE show_id = ?2",
                        params![show_dir, show_id],
                    )
                    .context("Failed to update show directory")?;
                Ok(())
            }
        }
    }

    /// Get the season directory bound to a show season.
    ///
    /// An empty string means files go directly to the show directory.
    pub fn season_dir(&self, show_id: i64, season: u32) -> Result<Option<String>> {
        self.connection
            .query_row(
                "SELECT season_dir FROM season_dir WHERE show_id = ?1 AND season = ?2",
                params![show_id, season],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query season directory")
    }

    /// Bind a season directory to a show season.
    ///
    /// Storing the same value again is a no-op.
    ///
    /// # Errors
    /// Returns [`FatalError::CacheConflict`] if a different directory is already stored.
    pub fn add_season_dir(&self, show_id: i64, season: u32, season_dir: &str) -> Result<()> {
        match self.season_dir(show_id, season)? {
            Some(existing) if existing == season_dir => Ok(()),
            Some(existing) => Err(FatalError::CacheConflict {
                table: "season_dir",
                key: format!("show {show_id} season {season}"),
                existing,
                new: season_dir.to_string(),
            }
            .into()),
            None => {
                self.connection
                    .execute(
                        "INSERT INTO season_dir (show_id, season, season_dir) VALUES (?1, ?2, ?3)",
                        params![show_id, season, season_dir],
                    )
                    .context("Failed to insert season directory")?;
                Ok(())
            }
        }
    }

    /// Get all file name bindings sorted by file name.
    pub fn file_names(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .connection
            .prepare("SELECT file_name, show_id FROM file_name ORDER BY file_name")
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("Failed to execute query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect results")?;

        Ok(rows)
    }

    /// Get all season directory bindings.
    pub fn season_dirs(&self) -> Result<Vec<SeasonDirEntry>> {
        let mut stmt = self
            .connection
            .prepare("SELECT show_id, season, season_dir FROM season_dir ORDER BY show_id, season")
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SeasonDirEntry {
                    show_id: row.get(0)?,
                    season: row.get(1)?,
                    season_dir: row.get(2)?,
                })
            })
            .context("Failed to execute query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect results")?;

        Ok(rows)
    }

    /// Print the contents of every table.
    pub fn print_tables(&self) -> Result<()> {
        match self.path() {
            Some(path) => println!("{}", format!("Database: {}", path.display()).bold()),
            None => println!("{}", "Database: in-memory".bold()),
        }

        println!("{}", "TV library".cyan().bold());
        for show in self.all_shows()? {
            let show_dir = self.show_dir(show.id)?.unwrap_or_default();
            println!("  {:>4}  {:<40} {}", show.id, show.name, show_dir);
        }

        println!("{}", "File names".cyan().bold());
        for (file_name, show_id) in self.file_names()? {
            println!("  {file_name:<40} {show_id:>4}");
        }

        println!("{}", "Season directories".cyan().bold());
        for entry in self.season_dirs()? {
            println!("  {:>4}  {:>3}  {}", entry.show_id, entry.season, entry.season_dir);
        }

        Ok(())
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<()> {
        self.connection
            .execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS tv_library (
                    show_id INTEGER PRIMARY KEY,
                    show_name TEXT NOT NULL UNIQUE,
                    show_dir TEXT
                );

                CREATE TABLE IF NOT EXISTS file_name (
                    file_name TEXT PRIMARY KEY,
                    show_id INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS season_dir (
                    show_id INTEGER NOT NULL,
                    season INTEGER NOT NULL,
                    season_dir TEXT NOT NULL,
                    PRIMARY KEY (show_id, season)
                );

                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )
            .context("Failed to initialize database schema")?;

        Ok(())
    }
}

#[cfg(test)]
mod database_tests {
    use super::*;

    fn conflict_table(error: &anyhow::Error) -> Option<&'static str> {
        match error.downcast_ref::<FatalError>() {
            Some(FatalError::CacheConflict { table, .. }) => Some(*table),
            _ => None,
        }
    }

    #[test]
    fn open_in_memory_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.all_shows().unwrap().is_empty());
        assert!(db.path().is_none());
    }

    #[test]
    fn remove_files_deletes_wal_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_FILENAME);
        let db = Database::open(&path).unwrap();
        db.add_show("Lost").unwrap();
        drop(db);
        // Left behind by a process that did not close the database cleanly.
        std::fs::write(dir.path().join(format!("{DATABASE_FILENAME}-wal")), "").unwrap();
        std::fs::write(dir.path().join(format!("{DATABASE_FILENAME}-shm")), "").unwrap();

        let removed = Database::remove_files(&path).unwrap();
        assert_eq!(removed.first(), Some(&path));
        assert!(!path.exists());
        assert!(!dir.path().join(format!("{DATABASE_FILENAME}-wal")).exists());
        assert!(!dir.path().join(format!("{DATABASE_FILENAME}-shm")).exists());
        assert!(Database::remove_files(&path).unwrap().is_empty());
    }

    #[test]
    fn open_file_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DATABASE_FILENAME);
        let db = Database::open(&path).unwrap();
        db.add_show("Lost").unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        assert_eq!(db.show_by_name("Lost").unwrap().unwrap().name, "Lost");
        assert_eq!(db.path(), Some(path.as_path()));
    }

    #[test]
    fn add_show_allocates_ids() {
        let db = Database::open_in_memory().unwrap();
        let first = db.add_show("The Office (US)").unwrap();
        let second = db.add_show("Parks and Recreation").unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(db.show_by_id(first.id).unwrap(), Some(first));
        assert_eq!(db.show_by_name("Parks and Recreation").unwrap(), Some(second));
        assert_eq!(db.show_by_name("parks and recreation").unwrap(), None);
    }

    #[test]
    fn add_show_twice_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.add_show("Lost").unwrap();
        let error = db.add_show("Lost").unwrap_err();
        assert_eq!(conflict_table(&error), Some("tv_library"));
    }

    #[test]
    fn all_shows_sorted_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.add_show("Zoey 101").unwrap();
        db.add_show("Arrested Development").unwrap();
        let names: Vec<String> = db.all_shows().unwrap().into_iter().map(|show| show.name).collect();
        assert_eq!(names, vec!["Arrested Development", "Zoey 101"]);
    }

    #[test]
    fn file_name_binding() {
        let db = Database::open_in_memory().unwrap();
        let show = db.add_show("The Office (US)").unwrap();
        let other = db.add_show("The Office (UK)").unwrap();

        assert_eq!(db.search_file_name("theofficeus").unwrap(), None);
        db.add_file_name("theofficeus", show.id).unwrap();
        db.add_file_name("theofficeus", show.id).unwrap();
        assert_eq!(db.search_file_name("theofficeus").unwrap(), Some(show.id));

        let error = db.add_file_name("theofficeus", other.id).unwrap_err();
        assert_eq!(conflict_table(&error), Some("file_name"));
        assert_eq!(db.file_names().unwrap().len(), 1);
    }

    #[test]
    fn season_dir_conflict_is_fatal() {
        let db = Database::open_in_memory().unwrap();
        db.add_season_dir(3, 5, "Season 5").unwrap();
        db.add_season_dir(3, 5, "Season 5").unwrap();

        let error = db.add_season_dir(3, 5, "Season Five").unwrap_err();
        assert!(FatalError::is_fatal(&error));
        assert_eq!(conflict_table(&error), Some("season_dir"));
        assert_eq!(db.season_dir(3, 5).unwrap().as_deref(), Some("Season 5"));
    }

    #[test]
    fn empty_season_dir_is_stored() {
        let db = Database::open_in_memory().unwrap();
        db.add_season_dir(1, 1, "").unwrap();
        assert_eq!(db.season_dir(1, 1).unwrap().as_deref(), Some(""));
        assert_eq!(db.season_dir(1, 2).unwrap(), None);
    }

    #[test]
    fn show_dir_is_append_only() {
        let db = Database::open_in_memory().unwrap();
        let show = db.add_show("Lost").unwrap();
        assert_eq!(db.show_dir(show.id).unwrap(), None);

        db.set_show_dir(show.id, "Lost").unwrap();
        db.set_show_dir(show.id, "Lost").unwrap();
        assert_eq!(db.show_dir(show.id).unwrap().as_deref(), Some("Lost"));

        let error = db.set_show_dir(show.id, "LOST (2004)").unwrap_err();
        assert_eq!(conflict_table(&error), Some("tv_library"));
    }

    #[test]
    fn show_dir_for_missing_show_is_corruption() {
        let db = Database::open_in_memory().unwrap();
        let error = db.show_dir(42).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<FatalError>(),
            Some(FatalError::CacheCorruption(_))
        ));
    }
}
