//! `SQLite`-backed wallet journal implementation.
//!
//! [`SqliteRewardLedger`] owns the three tables defined in `schema.sql`: the
//! append-only `transactions` journal, the `claim_keys` idempotency index,
//! and the rebuildable `achievement_progress` mirror.

// SQLite returns i64 for row IDs and counts, but they're always non-negative.
// Timestamps won't overflow u64 until the year 2554.
// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::missing_panics_doc
)]

use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transaction with this claim key already exists for the user.
    #[error("claim key already recorded: {claim_key}")]
    DuplicateClaimKey {
        /// The claim key that lost the uniqueness check.
        claim_key: String,
    },

    /// A debit would take the balance below zero.
    #[error("insufficient funds: balance {balance}, change {amount}")]
    InsufficientFunds {
        /// Balance before the refused entry.
        balance: i64,
        /// The refused (negative) amount.
        amount: i64,
    },
}

/// A single immutable row of the wallet journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    /// Sequence ID assigned by the ledger; the insertion order tiebreaker.
    pub seq_id: u64,

    /// User the transaction belongs to.
    pub user_id: String,

    /// Signed balance change. Positive for claims, negative for redemptions.
    pub amount: i64,

    /// Audit reason. For claims this is the literal idempotency key
    /// (`ach:<id>` or `daily:<id>:<date>`).
    pub reason: String,

    /// Timestamp in nanoseconds since Unix epoch.
    pub timestamp_ns: u64,

    /// Running balance after this transaction. Cached; must always equal the
    /// sum of `amount` up to and including this row.
    pub resulting_balance: i64,
}

/// Outcome of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendedTransaction {
    /// Sequence ID assigned to the new row.
    pub seq_id: u64,

    /// Running balance after the append.
    pub resulting_balance: i64,
}

/// A row of the rebuildable achievement-progress mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// User the progress belongs to.
    pub user_id: String,

    /// Achievement being tracked.
    pub achievement_id: String,

    /// Completion fraction in `[0, 1]`.
    pub progress: f64,

    /// Whether a milestone has been claimed.
    pub unlocked: bool,
}

/// Statistics about the ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerStats {
    /// Total journal rows.
    pub transaction_count: u64,

    /// Total recorded claim keys.
    pub claim_count: u64,

    /// Highest sequence ID (0 if empty).
    pub max_seq_id: u64,

    /// Database file size in bytes.
    pub db_size_bytes: u64,
}

/// The append-only wallet journal backed by `SQLite`.
///
/// Uses WAL mode to allow concurrent reads while writes are in progress.
/// Rows are stored with monotonically increasing sequence numbers and can
/// never be modified or deleted. Claim appends are guarded by the
/// `claim_keys` primary key, so of two racing appends for the same key
/// exactly one commits and the other fails with
/// [`LedgerError::DuplicateClaimKey`].
pub struct SqliteRewardLedger {
    conn: Arc<std::sync::Mutex<Connection>>,
    #[allow(dead_code)]
    path: Option<std::path::PathBuf>,
}

/// Short alias used throughout the crate.
pub type RewardLedger = SqliteRewardLedger;

impl SqliteRewardLedger {
    /// Opens or creates a ledger at the specified path.
    ///
    /// If the database doesn't exist, it is created with the appropriate
    /// schema. WAL mode is enabled for concurrent reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(std::sync::Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(std::sync::Mutex::new(conn)),
            path: None,
        })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), LedgerError> {
        // Execute schema (includes PRAGMA statements)
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Appends a claim transaction guarded by its idempotency key.
    ///
    /// Reads the prior balance, inserts the journal row, and reserves the
    /// claim key, all inside one `SQLite` transaction. If the key is already
    /// recorded for the user, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateClaimKey`] if the key is taken, or a
    /// database error if the insert fails.
    pub fn append_claim(
        &self,
        user: &str,
        amount: i64,
        claim_key: &str,
        timestamp_ns: u64,
    ) -> Result<AppendedTransaction, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let prior = Self::latest_balance_tx(&tx, user)?;
        let resulting_balance = prior + amount;

        tx.execute(
            "INSERT INTO transactions (user_id, amount, reason, timestamp_ns, resulting_balance)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user, amount, claim_key, timestamp_ns, resulting_balance],
        )?;
        let seq_id = tx.last_insert_rowid() as u64;

        let reserved = tx.execute(
            "INSERT INTO claim_keys (user_id, claim_key, seq_id) VALUES (?1, ?2, ?3)",
            params![user, claim_key, seq_id],
        );
        if let Err(err) = reserved {
            // Dropping the transaction rolls back the journal row.
            if is_unique_violation(&err) {
                return Err(LedgerError::DuplicateClaimKey {
                    claim_key: claim_key.to_string(),
                });
            }
            return Err(err.into());
        }

        tx.commit()?;
        Ok(AppendedTransaction {
            seq_id,
            resulting_balance,
        })
    }

    /// Appends a non-claim journal entry, such as a redemption debit.
    ///
    /// No idempotency key is reserved; the reason is a pure audit string and
    /// may repeat. Entries that would take the balance below zero are
    /// refused without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] on overdraft, or a
    /// database error if the insert fails.
    pub fn append_entry(
        &self,
        user: &str,
        amount: i64,
        reason: &str,
        timestamp_ns: u64,
    ) -> Result<AppendedTransaction, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let prior = Self::latest_balance_tx(&tx, user)?;
        let resulting_balance = prior + amount;
        if resulting_balance < 0 {
            return Err(LedgerError::InsufficientFunds {
                balance: prior,
                amount,
            });
        }

        tx.execute(
            "INSERT INTO transactions (user_id, amount, reason, timestamp_ns, resulting_balance)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user, amount, reason, timestamp_ns, resulting_balance],
        )?;
        let seq_id = tx.last_insert_rowid() as u64;

        tx.commit()?;
        Ok(AppendedTransaction {
            seq_id,
            resulting_balance,
        })
    }

    /// Whether a claim key has already been recorded for the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn claim_exists(&self, user: &str, claim_key: &str) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM claim_keys WHERE user_id = ?1 AND claim_key = ?2",
                params![user, claim_key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    /// The cached running balance on the user's most recent transaction, or
    /// `None` if the user has no transactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn latest_resulting_balance(&self, user: &str) -> Result<Option<i64>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        Self::latest_balance_opt(&conn, user)
    }

    /// Independently sums every transaction amount for the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn sum_amounts(&self, user: &str) -> Result<i64, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let sum: Option<i64> = conn.query_row(
            "SELECT SUM(amount) FROM transactions WHERE user_id = ?1",
            params![user],
            |row| row.get(0),
        )?;

        Ok(sum.unwrap_or(0))
    }

    /// Reads the user's most recent transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn history(&self, user: &str, limit: u64) -> Result<Vec<TransactionRecord>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT seq_id, user_id, amount, reason, timestamp_ns, resulting_balance
             FROM transactions
             WHERE user_id = ?1
             ORDER BY seq_id DESC
             LIMIT ?2",
        )?;

        let records = stmt
            .query_map(params![user, limit], |row| {
                Ok(TransactionRecord {
                    seq_id: row.get::<_, i64>(0)? as u64,
                    user_id: row.get(1)?,
                    amount: row.get(2)?,
                    reason: row.get(3)?,
                    timestamp_ns: row.get::<_, i64>(4)? as u64,
                    resulting_balance: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Gets statistics about the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let transaction_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

        let claim_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM claim_keys", [], |row| row.get(0))?;

        let max_seq_id: Option<i64> =
            conn.query_row("SELECT MAX(seq_id) FROM transactions", [], |row| row.get(0))?;

        // Page count times page size gives the database size
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        let db_size_bytes = (page_count * page_size) as u64;

        Ok(LedgerStats {
            transaction_count: transaction_count as u64,
            claim_count: claim_count as u64,
            max_seq_id: max_seq_id.unwrap_or(0) as u64,
            db_size_bytes,
        })
    }

    /// Writes a progress mirror row, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO achievement_progress (user_id, achievement_id, progress, unlocked)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, achievement_id)
             DO UPDATE SET progress = excluded.progress, unlocked = excluded.unlocked",
            params![
                record.user_id,
                record.achievement_id,
                record.progress,
                record.unlocked,
            ],
        )?;

        Ok(())
    }

    /// Adds `increment` to a progress row, clamped to `[0, 1]`, creating the
    /// row if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn bump_progress(
        &self,
        user: &str,
        achievement_id: &str,
        increment: f64,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO achievement_progress (user_id, achievement_id, progress, unlocked)
             VALUES (?1, ?2, MIN(1.0, MAX(0.0, ?3)), 0)
             ON CONFLICT (user_id, achievement_id)
             DO UPDATE SET progress =
                 MIN(1.0, MAX(0.0, achievement_progress.progress + ?3))",
            params![user, achievement_id, increment],
        )?;

        Ok(())
    }

    /// Reads one progress mirror row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn progress(
        &self,
        user: &str,
        achievement_id: &str,
    ) -> Result<Option<ProgressRecord>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let record = conn
            .query_row(
                "SELECT user_id, achievement_id, progress, unlocked
                 FROM achievement_progress
                 WHERE user_id = ?1 AND achievement_id = ?2",
                params![user, achievement_id],
                |row| {
                    Ok(ProgressRecord {
                        user_id: row.get(0)?,
                        achievement_id: row.get(1)?,
                        progress: row.get(2)?,
                        unlocked: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    /// Reads every progress mirror row for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn progress_for_user(&self, user: &str) -> Result<Vec<ProgressRecord>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT user_id, achievement_id, progress, unlocked
             FROM achievement_progress
             WHERE user_id = ?1
             ORDER BY achievement_id ASC",
        )?;

        let records = stmt
            .query_map(params![user], |row| {
                Ok(ProgressRecord {
                    user_id: row.get(0)?,
                    achievement_id: row.get(1)?,
                    progress: row.get(2)?,
                    unlocked: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Deletes a user's progress mirror rows. The mirror is a cache; this
    /// loses no durable information.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear_progress(&self, user: &str) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM achievement_progress WHERE user_id = ?1",
            params![user],
        )?;

        Ok(())
    }

    fn latest_balance_tx(tx: &rusqlite::Transaction<'_>, user: &str) -> Result<i64, LedgerError> {
        let balance: Option<i64> = tx
            .query_row(
                "SELECT resulting_balance FROM transactions
                 WHERE user_id = ?1
                 ORDER BY seq_id DESC
                 LIMIT 1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;

        Ok(balance.unwrap_or(0))
    }

    fn latest_balance_opt(conn: &Connection, user: &str) -> Result<Option<i64>, LedgerError> {
        let balance: Option<i64> = conn
            .query_row(
                "SELECT resulting_balance FROM transactions
                 WHERE user_id = ?1
                 ORDER BY seq_id DESC
                 LIMIT 1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;

        Ok(balance)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
