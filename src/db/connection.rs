use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

impl Location {
    fn open(&self) -> Result<Connection> {
        let conn = match self {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create database directory {}", parent.display())
                    })?;
                }
                let conn = Connection::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    warn!("WAL unavailable for {}: {err}", path.display());
                }
                conn
            }
            Location::Memory => {
                Connection::open_in_memory().context("failed to open in-memory database")?
            }
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        Ok(conn)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Memory => f.write_str(":memory:"),
        }
    }
}

/// Owns the worker thread. Closing the job channel ends its receive loop.
struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn submit(&self, job: Job) -> Result<()> {
        self.jobs
            .as_ref()
            .ok_or_else(|| anyhow!("database worker already stopped"))?
            .send(job)
            .map_err(|_| anyhow!("database worker is no longer running"))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Database worker panicked before shutdown");
            }
        }
    }
}

/// Handle to the attendance database. All statements run on one dedicated
/// thread that owns the connection; clones share that thread, which stops
/// when the last clone is dropped.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<Location>,
}

impl Database {
    /// Opens (creating if needed) the database file at `db_path` and brings
    /// its schema up to date.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        Self::start(Location::File(db_path))
    }

    /// A private database that lives as long as the handle.
    pub fn in_memory() -> Result<Self> {
        Self::start(Location::Memory)
    }

    fn start(location: Location) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let target = location.clone();

        let thread = thread::Builder::new()
            .name("rollcall-db".into())
            .spawn(move || {
                let opened = target.open().and_then(|mut conn| {
                    run_migrations(&mut conn).context("failed to run database migrations")?;
                    Ok(conn)
                });
                let mut conn = match opened {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for job in job_rx {
                    job(&mut conn);
                }
                debug!("Database worker for {target} stopped");
            })
            .context("failed to spawn database worker thread")?;

        let worker = Worker {
            jobs: Some(job_tx),
            thread: Some(thread),
        };
        ready_rx
            .recv()
            .context("database worker exited before it was ready")??;

        info!("Attendance database ready at {location}");
        Ok(Self {
            worker: Arc::new(worker),
            location: Arc::new(location),
        })
    }

    /// File backing this database; `None` for an in-memory one.
    pub fn path(&self) -> Option<&Path> {
        match self.location.as_ref() {
            Location::File(path) => Some(path.as_path()),
            Location::Memory => None,
        }
    }

    /// Runs `task` on the database thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.worker.submit(Box::new(move |conn| {
            // The caller may have stopped waiting.
            let _ = reply_tx.send(task(conn));
        }))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database worker stopped before replying"))?
    }
}
