//! Primary SQLite index: `name`/`summary`/`description`/`pkgId` lookups
//! over a Yum-classic `*-primary.sqlite` file.
//!
//! Grounded on `zif-repo-md-primary.c` (the query shapes: resolve, search,
//! find, find_by_pkgid) and `soar_core::database::connection::Database`
//! (the `Arc<Mutex<Connection>>`, lazy-open pattern) for the SQLite access
//! idiom — used instead of the newer Diesel-based `soar-db` crate because
//! this schema is externally produced, read-only, and never migrated.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::RepomdError;

/// A remote package row as projected from the primary SQLite schema (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePackageRow {
    pub pkg_id: String,
    pub name: String,
    pub arch: String,
    pub version: String,
    pub epoch: String,
    pub release: String,
    pub summary: String,
    pub description: String,
    pub url: String,
    pub license: String,
    pub group: String,
    pub size: u64,
    pub location_href: String,
    pub source_repo_id: String,
}

fn row_to_package(row: &Row<'_>, source_repo_id: &str) -> rusqlite::Result<RemotePackageRow> {
    Ok(RemotePackageRow {
        pkg_id: row.get("pkgId")?,
        name: row.get("name")?,
        arch: row.get("arch")?,
        version: row.get("version")?,
        epoch: row.get("epoch")?,
        release: row.get("release")?,
        summary: row.get("summary")?,
        description: row.get("description")?,
        url: row.get("url")?,
        license: row.get("rpm_license")?,
        group: row.get("rpm_group")?,
        size: row.get::<_, i64>("size_package")? as u64,
        location_href: row.get("location_href")?,
        source_repo_id: source_repo_id.to_string(),
    })
}

const SELECT_COLUMNS: &str = "pkgId, name, arch, version, epoch, release, summary, description, \
     url, rpm_license, rpm_group, size_package, location_href";

/// Opens the uncompressed primary DB lazily: the connection is established
/// on the first query, not at construction.
pub struct PrimaryStore {
    path: PathBuf,
    repo_id: String,
    conn: Mutex<Option<Connection>>,
}

impl PrimaryStore {
    pub fn new(path: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            repo_id: repo_id.into(),
            conn: Mutex::new(None),
        }
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, RepomdError> {
        let mut guard = self.conn.lock().unwrap();
        if guard.is_none() {
            let conn = Connection::open(&self.path)?;
            conn.execute_batch("PRAGMA synchronous = OFF;")?;
            *guard = Some(conn);
        }
        let conn = guard.as_ref().unwrap();
        Ok(f(conn)?)
    }

    pub fn resolve(&self, name: &str) -> Result<Vec<RemotePackageRow>, RepomdError> {
        let repo_id = self.repo_id.clone();
        self.with_connection(move |conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM packages WHERE name = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([name], |row| row_to_package(row, &repo_id))?;
            rows.collect()
        })
    }

    pub fn search_name(&self, substr: &str) -> Result<Vec<RemotePackageRow>, RepomdError> {
        let repo_id = self.repo_id.clone();
        let pattern = format!("%{substr}%");
        self.with_connection(move |conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM packages WHERE name LIKE ?1");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([pattern], |row| row_to_package(row, &repo_id))?;
            rows.collect()
        })
    }

    pub fn search_details(&self, substr: &str) -> Result<Vec<RemotePackageRow>, RepomdError> {
        let repo_id = self.repo_id.clone();
        let pattern = format!("%{substr}%");
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM packages \
                 WHERE name LIKE ?1 OR summary LIKE ?1 OR description LIKE ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([pattern], |row| row_to_package(row, &repo_id))?;
            rows.collect()
        })
    }

    pub fn find(&self, name: &str, arch: &str) -> Result<Vec<RemotePackageRow>, RepomdError> {
        let repo_id = self.repo_id.clone();
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM packages WHERE name = ?1 AND arch = ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([name, arch], |row| row_to_package(row, &repo_id))?;
            rows.collect()
        })
    }

    pub fn find_by_pkgid(&self, hex: &str) -> Result<Option<RemotePackageRow>, RepomdError> {
        let repo_id = self.repo_id.clone();
        self.with_connection(move |conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM packages WHERE pkgId = ?1");
            conn.query_row([hex], |row| row_to_package(row, &repo_id))
                .optional()
        })
    }

    pub fn all(&self) -> Result<Vec<RemotePackageRow>, RepomdError> {
        let repo_id = self.repo_id.clone();
        self.with_connection(move |conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM packages");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row_to_package(row, &repo_id))?;
            rows.collect()
        })
    }

    /// Delete the underlying SQLite file, if present, and drop any open
    /// connection. Absence of the file is not an error.
    pub fn clean(&self) -> Result<(), RepomdError> {
        *self.conn.lock().unwrap() = None;
        crate::repomd::clean_file(&self.path)?;
        Ok(())
    }
}
