use crate::errors::Result;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Source of connections for a lookup.
///
/// Implementations decide whether a connection lives for one call or is
/// reused; callers of [`crate::CacheLookup`] never see the difference.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Run `f` against a connection. The connection must be released (or
    /// returned to its owner) before this returns, on success and on error.
    fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>;

    /// Human readable location, used in log lines.
    fn describe(&self) -> String;
}

/// Opens a fresh read-only connection for every call and closes it afterwards.
#[derive(Debug, Clone)]
pub struct PerCallConnection {
    path: PathBuf,
}

impl PerCallConnection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionProvider for PerCallConnection {
    fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        // Opening read-only never creates the file, but SQLite reports a
        // missing file as a generic CANTOPEN. Stat first to tell them apart.
        std::fs::metadata(&self.path)?;

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        log::trace!("Opened cache connection at: {:?}", self.path);

        let result = f(&conn);

        if let Err((_, e)) = conn.close() {
            log::warn!("Failed to close cache connection at {:?}: {}", self.path, e);
        }
        result
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Removes any progress handler from a connection when dropped, including
/// while unwinding, so a deadline never outlives the call that set it.
pub(crate) struct ProgressHandlerReset<'a> {
    conn: &'a Connection,
}

impl<'a> ProgressHandlerReset<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl Drop for ProgressHandlerReset<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

/// One long-lived connection shared by every lookup.
///
/// This is the pooled variant: swap it in for [`PerCallConnection`] when a
/// caller performs many lookups against the same store.
#[derive(Debug, Clone)]
pub struct SharedConnection {
    connection: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SharedConnection {
    /// Open an existing store read-only.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::metadata(&path)?;

        log::info!("Opening shared cache connection at: {:?}", path);
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self::from_connection(conn, path))
    }

    /// Create an in-memory store, mainly for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, PathBuf::from(":memory:")))
    }

    pub fn from_connection(conn: Connection, path: PathBuf) -> Self {
        Self {
            connection: Arc::new(Mutex::new(conn)),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionProvider for SharedConnection {
    fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _reset = ProgressHandlerReset::new(&conn);
        f(&conn)
    }

    fn describe(&self) -> String {
        format!("shared:{}", self.path.display())
    }
}
