//! Filelists SQLite search: resolve a full path to the `pkgId`s of
//! packages that own it.
//!
//! Grounded on `zif-repo-md-filelists.c`'s dirname/filenames split and
//! `soar_core`'s lazy-connection idiom (see `primary.rs`).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::RepomdError;

pub struct FilelistsStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl FilelistsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
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

    /// Search for every `pkgId` that owns the full path `full_path`
    /// (e.g. `/usr/bin/gnome-power-manager`): look up rows whose `dirname`
    /// matches the path's parent, split each row's `/`-packed `filenames`
    /// and keep the `pkgKey`s whose basename matches, then resolve each
    /// `pkgKey` to a `pkgId` via the `packages` table.
    pub fn search(&self, full_path: &str) -> Result<Vec<String>, RepomdError> {
        let path = Path::new(full_path);
        let base = match path.file_name().and_then(|n| n.to_str()) {
            Some(b) => b.to_string(),
            None => return Ok(Vec::new()),
        };
        let dirname = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dirname = if dirname.is_empty() { "/".to_string() } else { dirname };

        self.with_connection(move |conn| {
            let mut stmt =
                conn.prepare("SELECT pkgKey, filenames FROM filelist WHERE dirname = ?1")?;
            let rows = stmt.query_map([dirname.as_str()], |row| {
                let pkg_key: i64 = row.get(0)?;
                let filenames: String = row.get(1)?;
                Ok((pkg_key, filenames))
            })?;

            let mut pkg_keys = Vec::new();
            for row in rows {
                let (pkg_key, filenames) = row?;
                if filenames.split('/').any(|name| name == base) {
                    pkg_keys.push(pkg_key);
                }
            }

            let mut pkg_ids = Vec::new();
            let mut pkgid_stmt = conn.prepare("SELECT pkgId FROM packages WHERE pkgKey = ?1")?;
            for pkg_key in pkg_keys {
                let pkg_id: String = pkgid_stmt.query_row([pkg_key], |row| row.get(0))?;
                pkg_ids.push(pkg_id);
            }
            Ok(pkg_ids)
        })
    }

    pub fn clean(&self) -> Result<(), RepomdError> {
        *self.conn.lock().unwrap() = None;
        crate::repomd::clean_file(&self.path)?;
        Ok(())
    }
}
