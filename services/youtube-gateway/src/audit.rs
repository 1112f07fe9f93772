//! Best-effort audit log
//!
//! Handlers record notable events (tokens received, videos fetched, comment
//! writes, failures) through an `AuditLog` handle. Records go onto a bounded
//! channel and a background writer drains them into a `LogStore`. Recording
//! never blocks and never fails the caller: a full queue or a store that
//! cannot write only costs the record.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::metrics;

const MAX_CONNECTIONS: u32 = 5;

/// Upper bound on waiting for a pooled connection, so a hung database fails
/// each write quickly instead of stalling the writer.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Records queued ahead of the writer before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    /// Value stored in the `event_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub level: Level,
    pub message: String,
    pub metadata: Value,
}

impl AuditRecord {
    /// The stored `details` document: `{message, ...metadata}`.
    ///
    /// Object metadata is merged in at the top level; anything else is kept
    /// under `metadata`. A metadata `message` key never replaces the message.
    pub fn details(&self) -> Value {
        let mut details = Map::new();
        match &self.metadata {
            Value::Object(fields) => {
                details.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Value::Null => {}
            other => {
                details.insert("metadata".into(), other.clone());
            }
        }
        details.insert("message".into(), Value::String(self.message.clone()));
        Value::Object(details)
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("database write failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Destination for audit records.
///
/// Dyn-compatible so the writer task can hold any store behind an `Arc`.
pub trait LogStore: Send + Sync {
    fn write<'a>(
        &'a self,
        record: &'a AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + 'a>>;
}

/// Postgres-backed store writing to the `logs` table.
///
/// Expected schema: `logs (event_type TEXT, details JSONB)`.
pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    /// Create the store without connecting. The first write opens the pool,
    /// so an unreachable database never blocks startup.
    pub fn connect_lazy(database_url: &str) -> Result<Self, AuditError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }
}

impl LogStore for PgLogStore {
    fn write<'a>(
        &'a self,
        record: &'a AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query("INSERT INTO logs (event_type, details) VALUES ($1, $2)")
                .bind(record.level.as_str())
                .bind(sqlx::types::Json(record.details()))
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }
}

/// Cloneable handle for recording audit events.
#[derive(Clone, Debug)]
pub struct AuditLog {
    tx: Option<mpsc::Sender<AuditRecord>>,
}

impl AuditLog {
    /// Handle that drops every record.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Start the writer task draining into `store`.
    ///
    /// The task ends once every handle has been dropped and the queue is
    /// empty, so awaiting the returned handle flushes pending records.
    pub fn spawn(store: Arc<dyn LogStore>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_capacity(store, QUEUE_CAPACITY)
    }

    /// Like `spawn`, with an explicit queue bound.
    pub fn spawn_with_capacity(
        store: Arc<dyn LogStore>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity);
        let writer = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = store.write(&record).await {
                    warn!(
                        error = %e,
                        event_type = record.level.as_str(),
                        message = %record.message,
                        "audit write failed, record dropped"
                    );
                }
            }
            debug!("audit writer stopped");
        });
        (Self { tx: Some(tx) }, writer)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn info(&self, message: &str, metadata: Value) {
        self.record(Level::Info, message, metadata);
    }

    pub fn warn(&self, message: &str, metadata: Value) {
        self.record(Level::Warn, message, metadata);
    }

    pub fn error(&self, message: &str, metadata: Value) {
        self.record(Level::Error, message, metadata);
    }

    fn record(&self, level: Level, message: &str, metadata: Value) {
        let Some(tx) = &self.tx else {
            return;
        };
        let record = AuditRecord {
            level,
            message: message.to_string(),
            metadata,
        };
        match tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                metrics::record_audit_dropped();
                warn!(
                    event_type = record.level.as_str(),
                    message = %record.message,
                    "audit queue full, record dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!("audit writer gone, record dropped");
            }
        }
    }
}

/// In-memory store capturing every record it is given.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryLogStore {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

#[cfg(test)]
impl MemoryLogStore {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl LogStore for MemoryLogStore {
    fn write<'a>(
        &'a self,
        record: &'a AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + 'a>> {
        self.records.lock().unwrap().push(record.clone());
        Box::pin(async { Ok(()) })
    }
}

/// Store whose every write fails; counts the attempts.
#[cfg(test)]
#[derive(Default)]
pub struct FailingLogStore {
    pub attempts: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl LogStore for FailingLogStore {
    fn write<'a>(
        &'a self,
        _record: &'a AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuditError>> + Send + 'a>> {
        self.attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Box::pin(async { Err(AuditError::Database(sqlx::Error::PoolClosed)) })
    }
}
