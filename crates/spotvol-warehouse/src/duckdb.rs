//! `DuckDB` connection pool management.
//!
//! DuckDB allows a single database instance per file inside one process, so
//! the pool keeps one root connection open and hands out clones of it. Clones
//! share the same database instance and see each other's committed writes.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

use crate::WarehouseError;

struct PoolInner {
    db_path: PathBuf,
    max_pool_size: usize,
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
}

/// A connection pool manager for `DuckDB` connections.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Open the database file and create a pool around it.
    ///
    /// # Arguments
    /// * `path` - Path to the `DuckDB` database file
    /// * `max_pool_size` - Maximum number of idle connections to keep in the pool
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_pool_size: usize) -> Result<Self, WarehouseError> {
        let db_path = path.into();
        let root = Connection::open(db_path.as_path())?;
        configure_connection(&root)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_pool_size: max_pool_size.max(1),
                root: Mutex::new(root),
                idle: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Acquire a connection from the pool, cloning the root connection when
    /// no idle connection is available.
    ///
    /// # Errors
    /// Returns an error if a pool mutex is poisoned or the clone fails.
    pub fn acquire(&self) -> Result<PooledConnection, WarehouseError> {
        let idle = self
            .inner
            .idle
            .lock()
            .map_err(|_| WarehouseError::PoolPoisoned)?
            .pop();

        let connection = match idle {
            Some(connection) => connection,
            None => {
                let root = self
                    .inner
                    .root
                    .lock()
                    .map_err(|_| WarehouseError::PoolPoisoned)?;
                let connection = root.try_clone()?;
                configure_connection(&connection)?;
                connection
            }
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if let Ok(mut idle) = self.pool.idle.lock() {
            if idle.len() < self.pool.max_pool_size {
                idle.push(connection);
            }
        }
    }
}

/// Configure a database connection with appropriate settings.
fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}
