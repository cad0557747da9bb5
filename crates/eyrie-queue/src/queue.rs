use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::QueueResult;
use crate::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a claimed item stays hidden from other consumers by default.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(5 * 60);

/// A leased row, identified by its id and the lease it was claimed with.
struct Claim {
    id: i64,
    payload: Vec<u8>,
    attempt: i64,
    lease_until: i64,
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Named queues of opaque payloads with delayed retry.
///
/// A consumer leases the row it claims in a short immediate transaction,
/// so concurrent consumers (threads or processes) never see the same row,
/// and producers are not blocked while a handler runs.
#[derive(Clone)]
pub struct RetryQueue {
    pool: Pool<SqliteConnectionManager>,
    lease: Duration,
}

impl std::fmt::Debug for RetryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryQueue")
            .field("connections", &self.pool.state().connections)
            .field("lease", &self.lease)
            .finish()
    }
}

impl RetryQueue {
    /// Open (or create) the queue database at `path`.
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;
            Ok(())
        });
        let pool = Pool::builder().max_size(4).build(manager)?;
        schema::migrate(&*pool.get()?)?;
        Ok(Self {
            pool,
            lease: DEFAULT_LEASE,
        })
    }

    /// Hide claimed items from other consumers for `lease` instead of
    /// [`DEFAULT_LEASE`]. Handlers should finish well within it.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Schedule `payload` on queue `name` for immediate delivery.
    pub fn enqueue(&self, name: &str, payload: &[u8]) -> QueueResult<()> {
        self.enqueue_at(name, payload, Utc::now())
    }

    /// Schedule `payload` on queue `name` for delivery at `at` or later.
    pub fn enqueue_at(&self, name: &str, payload: &[u8], at: DateTime<Utc>) -> QueueResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO queue (name, payload, attempt, scheduled_at) VALUES (?1, ?2, 0, ?3)",
            params![name, payload, at.timestamp_millis()],
        )?;
        debug!(queue = name, bytes = payload.len(), at = %at, "enqueued");
        Ok(())
    }

    /// Claim the earliest due item on `name` and hand it to `handler`.
    ///
    /// The handler gets the payload and the 1-based attempt number, and
    /// returns a retry delay. A non-zero delay schedules the payload again,
    /// `delay` from when the handler finished. Returns `false` when nothing
    /// was due.
    ///
    /// The item is leased, not deleted, while the handler runs, and no
    /// transaction is open meanwhile. If the lease runs out first (the
    /// handler is slow or the process died) the item becomes claimable again
    /// and this call's outcome is discarded.
    pub fn dequeue<F>(&self, name: &str, handler: F) -> QueueResult<bool>
    where
        F: FnOnce(&[u8], u32) -> Duration,
    {
        let Some(claim) = self.claim(name)? else {
            return Ok(false);
        };

        let delay = handler(&claim.payload, u32::try_from(claim.attempt + 1).unwrap_or(u32::MAX));
        self.settle(name, &claim, delay)?;
        Ok(true)
    }

    fn claim(&self, name: &str) -> QueueResult<Option<Claim>> {
        let now = Utc::now().timestamp_millis();
        let lease_until = now.saturating_add(millis(self.lease));

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let claim = tx
            .query_row(
                "UPDATE queue SET locked_until = ?3 WHERE id = (
                     SELECT id FROM queue
                     WHERE name = ?1 AND scheduled_at <= ?2 AND locked_until <= ?2
                     ORDER BY scheduled_at, id
                     LIMIT 1
                 )
                 RETURNING id, payload, attempt",
                params![name, now, lease_until],
                |row| {
                    Ok(Claim {
                        id: row.get(0)?,
                        payload: row.get(1)?,
                        attempt: row.get(2)?,
                        lease_until,
                    })
                },
            )
            .optional()?;
        tx.commit()?;
        Ok(claim)
    }

    /// Drop the claimed row and, for a non-zero delay, insert its retry.
    fn settle(&self, name: &str, claim: &Claim, delay: Duration) -> QueueResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let removed = tx.execute(
            "DELETE FROM queue WHERE id = ?1 AND locked_until = ?2",
            params![claim.id, claim.lease_until],
        )?;
        if removed == 0 {
            warn!(queue = name, id = claim.id, "lease expired before the handler finished");
            return Ok(());
        }

        if !delay.is_zero() {
            let at = Utc::now().timestamp_millis().saturating_add(millis(delay));
            tx.execute(
                "INSERT INTO queue (name, payload, attempt, scheduled_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, claim.payload, claim.attempt + 1, at],
            )?;
            debug!(queue = name, attempt = claim.attempt + 1, ?delay, "rescheduled");
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of rows on `name`, due or not.
    pub fn len(&self, name: &str) -> QueueResult<usize> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Call `dequeue` on `name` every `interval` until `cancel` fires.
    ///
    /// Each call runs on the blocking pool. Errors are logged and the loop
    /// keeps going.
    pub async fn listen<F>(
        &self,
        name: &str,
        interval: Duration,
        cancel: CancellationToken,
        handler: F,
    ) where
        F: Fn(&[u8], u32) -> Duration + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(queue = name, ?interval, "queue listener started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let queue = self.clone();
                    let handler = Arc::clone(&handler);
                    let queue_name = name.to_string();
                    let outcome = tokio::task::spawn_blocking(move || {
                        queue.dequeue(&queue_name, |payload, attempt| handler(payload, attempt))
                    })
                    .await;
                    match outcome {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(queue = name, error = %e, "dequeue failed"),
                        Err(e) => error!(queue = name, error = %e, "dequeue task panicked"),
                    }
                }
            }
        }
        info!(queue = name, "queue listener stopped");
    }
}
