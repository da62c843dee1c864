use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};
use tokio::io::AsyncWriteExt;

use crate::cancel::Cancel;
use crate::config::{PolicySettings, SinkSettings};
use crate::db;
use crate::error::{SinkCause, SinkError};
use crate::model::DirectorDealing;

/// A destination for finished records.
pub enum Sink {
    /// One JSON line per record on stdout.
    Console,
    /// One JSON line per record appended to a file.
    JsonLines(PathBuf),
    /// One row per record in `director_dealings`.
    Sqlite(SqliteSink),
}

pub struct SqliteSink {
    conn: Connection,
    run_id: Option<String>,
    write_timeout: Duration,
}

impl SqliteSink {
    pub fn open(path: &Path, write_timeout: Duration) -> rusqlite::Result<Self> {
        Self::from_connection(db::connect(path)?, write_timeout)
    }

    pub fn from_connection(conn: Connection, write_timeout: Duration) -> rusqlite::Result<Self> {
        db::init_schema(&conn)?;
        db::set_write_timeout(&conn, write_timeout)?;
        Ok(Self {
            conn,
            run_id: None,
            write_timeout,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Sink {
    pub fn name(&self) -> String {
        match self {
            Sink::Console => "console".to_string(),
            Sink::JsonLines(path) => format!("json:{}", path.display()),
            Sink::Sqlite(_) => "sqlite".to_string(),
        }
    }

    async fn write(&mut self, record: &DirectorDealing) -> Result<(), SinkCause> {
        match self {
            Sink::Console => {
                let line = record.to_json()?;
                writeln!(std::io::stdout().lock(), "{}", line)?;
            }
            Sink::JsonLines(path) => {
                let mut line = record.to_json()?;
                line.push('\n');
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&*path)
                    .await?;
                file.write_all(line.as_bytes()).await?;
                file.flush().await?;
            }
            Sink::Sqlite(store) => {
                // The busy timeout is the write timeout for a locked store.
                db::insert_dealing(&store.conn, store.run_id.as_deref(), record).map_err(
                    |e| match e.sqlite_error_code() {
                        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                            SinkCause::Timeout(store.write_timeout)
                        }
                        _ => SinkCause::Sqlite(e),
                    },
                )?;
            }
        }
        Ok(())
    }
}

/// Fans each record out to every configured sink.
pub struct SinkDispatcher {
    sinks: Vec<Sink>,
    write_timeout: Duration,
}

impl SinkDispatcher {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            write_timeout,
        }
    }

    pub fn from_settings(
        sinks: &SinkSettings,
        policy: &PolicySettings,
    ) -> rusqlite::Result<Self> {
        let mut dispatcher = Self::new(policy.write_timeout());
        if sinks.console {
            dispatcher.push(Sink::Console);
        }
        if let Some(path) = &sinks.json_path {
            dispatcher.push(Sink::JsonLines(path.clone()));
        }
        if let Some(path) = &sinks.sqlite_path {
            dispatcher.push(Sink::Sqlite(SqliteSink::open(path, policy.write_timeout())?));
        }
        Ok(dispatcher)
    }

    pub fn push(&mut self, sink: Sink) {
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: Sink) -> Self {
        self.push(sink);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.sinks.iter().map(Sink::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Tag subsequent store inserts with this run.
    pub fn set_run_id(&mut self, run_id: &str) {
        for sink in &mut self.sinks {
            if let Sink::Sqlite(store) = sink {
                store.run_id = Some(run_id.to_string());
            }
        }
    }

    /// The first SQLite sink's connection, if any.
    pub fn store(&self) -> Option<&Connection> {
        self.sinks.iter().find_map(|s| match s {
            Sink::Sqlite(store) => Some(store.connection()),
            _ => None,
        })
    }

    /// Write `record` to every sink in order. A failing sink never stops the
    /// others; all failures are returned.
    pub async fn dispatch(
        &mut self,
        record: &DirectorDealing,
        cancel: &mut Cancel,
    ) -> Vec<SinkError> {
        let timeout = self.write_timeout;
        let mut errors = Vec::new();

        for sink in &mut self.sinks {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SinkCause::Cancelled),
                r = tokio::time::timeout(timeout, sink.write(record)) => {
                    r.unwrap_or(Err(SinkCause::Timeout(timeout)))
                }
            };
            if let Err(cause) = outcome {
                errors.push(SinkError {
                    sink: sink.name(),
                    cause,
                });
            }
        }

        errors
    }
}
