//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;

use storefront_types::{
    CreateOrderRequest, DomainError, LockError, LockLease, Order, OrderId, PaymentCommit,
    PaymentDetails, PaymentLock, PaymentStatus, RepoError, Session, StorefrontRepository, UserId,
};

use crate::security;
use crate::types::lite::{DbOrder, DbPaymentDetails, DbSession, ts};

const MIGRATIONS: [(&str, &str); 2] = [
    ("0001", include_str!("../migrations/0001_create_orders.sql")),
    (
        "0002",
        include_str!("../migrations/0002_create_sessions_and_locks.sql"),
    ),
];

const ORDER_COLUMNS: &str = "id, user_id, amount, payment_status, created_at, updated_at";
const DETAILS_COLUMNS: &str =
    "order_id, gateway, authority, ref_id, amount, status, card_pan, fee, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure on-disk SQLite target directory exists.
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if !in_memory {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        // Several processes may share one file; WAL keeps readers off the
        // write lock that payment commits and lease upserts take.
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` opens a separate database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema.
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        for (name, sql) in MIGRATIONS {
            for statement in sql.split(';') {
                let stmt = statement.trim();
                if stmt.is_empty() {
                    continue;
                }
                sqlx::query(stmt).execute(&self.pool).await.map_err(|e| {
                    RepoError::Database(format!("Migration {} failed: {}", name, e))
                })?;
            }
            tracing::debug!(migration = name, "Applied migration");
        }
        Ok(())
    }
}

async fn fetch_order(
    conn: &mut sqlx::SqliteConnection,
    id: OrderId,
) -> Result<Option<Order>, RepoError> {
    let row: Option<DbOrder> = sqlx::query_as(&format!(
        "SELECT {} FROM orders WHERE id = ?",
        ORDER_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    row.map(DbOrder::into_domain).transpose()
}

async fn fetch_details(
    conn: &mut sqlx::SqliteConnection,
    order_id: OrderId,
) -> Result<Option<PaymentDetails>, RepoError> {
    let row: Option<DbPaymentDetails> = sqlx::query_as(&format!(
        "SELECT {} FROM payment_details WHERE order_id = ?",
        DETAILS_COLUMNS
    ))
    .bind(order_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    row.map(DbPaymentDetails::into_domain).transpose()
}

async fn upsert_details(
    conn: &mut sqlx::SqliteConnection,
    details: &PaymentDetails,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payment_details (order_id, gateway, authority, ref_id, amount, status, card_pan, fee, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT (order_id) DO UPDATE SET
               gateway = excluded.gateway,
               authority = excluded.authority,
               ref_id = excluded.ref_id,
               amount = excluded.amount,
               status = excluded.status,
               card_pan = excluded.card_pan,
               fee = excluded.fee,
               updated_at = excluded.updated_at"#,
    )
    .bind(details.order_id.to_string())
    .bind(&details.gateway)
    .bind(&details.authority)
    .bind(&details.ref_id)
    .bind(details.amount)
    .bind(details.status.to_string())
    .bind(&details.card_pan)
    .bind(details.fee)
    .bind(ts(details.created_at))
    .bind(ts(details.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    Ok(())
}

async fn set_order_status(
    conn: &mut sqlx::SqliteConnection,
    order_id: OrderId,
    status: PaymentStatus,
) -> Result<(), RepoError> {
    let result = sqlx::query("UPDATE orders SET payment_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(ts(Utc::now()))
        .bind(order_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl StorefrontRepository for SqliteRepo {
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, RepoError> {
        let order = Order::new(req.user_id, req.amount).map_err(RepoError::Domain)?;

        sqlx::query(
            r#"INSERT INTO orders (id, user_id, amount, payment_status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(order.id.to_string())
        .bind(order.user_id.to_string())
        .bind(order.amount)
        .bind(order.payment_status.to_string())
        .bind(ts(order.created_at))
        .bind(ts(order.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        fetch_order(&mut conn, id).await
    }

    async fn get_payment_details(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentDetails>, RepoError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        fetch_details(&mut conn, order_id).await
    }

    async fn record_payment_request(
        &self,
        details: PaymentDetails,
    ) -> Result<PaymentDetails, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let order = fetch_order(&mut db_tx, details.order_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        if order.is_paid() {
            return Err(RepoError::Domain(DomainError::AlreadyPaid(order.id)));
        }

        let existing = fetch_details(&mut db_tx, details.order_id).await?;
        let details = PaymentDetails {
            created_at: existing.map(|d| d.created_at).unwrap_or(details.created_at),
            ..details
        };

        upsert_details(&mut db_tx, &details).await?;
        set_order_status(&mut db_tx, details.order_id, PaymentStatus::Pending).await?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(details)
    }

    async fn commit_payment(&self, commit: PaymentCommit) -> Result<PaymentDetails, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let order = fetch_order(&mut db_tx, commit.order_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        if order.is_paid() {
            return Err(RepoError::Domain(DomainError::AlreadyPaid(order.id)));
        }

        let existing = fetch_details(&mut db_tx, commit.order_id).await?;
        let details = commit.into_details(existing);

        upsert_details(&mut db_tx, &details).await?;
        set_order_status(&mut db_tx, details.order_id, PaymentStatus::Paid).await?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(details)
    }

    async fn mark_payment_failed(
        &self,
        order_id: OrderId,
        gateway: &str,
        authority: &str,
    ) -> Result<bool, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let order = fetch_order(&mut db_tx, order_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        if order.is_paid() {
            return Ok(false);
        }

        let existing = fetch_details(&mut db_tx, order_id).await?;
        let mut details = PaymentDetails::pending(order_id, gateway, authority, order.amount);
        details.status = PaymentStatus::Failed;
        if let Some(prev) = existing {
            details.created_at = prev.created_at;
        }

        upsert_details(&mut db_tx, &details).await?;
        set_order_status(&mut db_tx, order_id, PaymentStatus::Failed).await?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(true)
    }

    async fn create_session(
        &self,
        user_id: UserId,
        ttl: chrono::Duration,
    ) -> Result<(Session, String), RepoError> {
        let raw_token = security::generate_session_token();
        let session = Session::new(user_id, security::hash_session_token(&raw_token), ttl);

        sqlx::query(
            r#"INSERT INTO sessions (token_hash, user_id, created_at, expires_at_ms) VALUES (?, ?, ?, ?)"#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id.to_string())
        .bind(ts(session.created_at))
        .bind(session.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok((session, raw_token))
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, RepoError> {
        let row: Option<DbSession> = sqlx::query_as(
            r#"SELECT token_hash, user_id, created_at, expires_at_ms FROM sessions WHERE token_hash = ? AND expires_at_ms > ?"#,
        )
        .bind(token_hash)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbSession::into_domain).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lease lock
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentLock for SqliteRepo {
    async fn try_acquire(
        &self,
        order_id: OrderId,
        ttl: chrono::Duration,
    ) -> Result<Option<LockLease>, LockError> {
        let lease = LockLease::new(order_id, ttl);

        // Takes a free slot, or steals one whose lease has run out.
        let result = sqlx::query(
            r#"INSERT INTO payment_locks (order_id, token, expires_at_ms) VALUES (?, ?, ?)
               ON CONFLICT (order_id) DO UPDATE SET
                   token = excluded.token,
                   expires_at_ms = excluded.expires_at_ms
               WHERE payment_locks.expires_at_ms <= ?"#,
        )
        .bind(order_id.to_string())
        .bind(lease.token.to_string())
        .bind(lease.expires_at.timestamp_millis())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok((result.rows_affected() == 1).then_some(lease))
    }

    async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
        let result = sqlx::query("DELETE FROM payment_locks WHERE order_id = ? AND token = ?")
            .bind(lease.order_id.to_string())
            .bind(lease.token.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            tracing::debug!(order_id = %lease.order_id, "Lease expired before release");
        }
        Ok(())
    }
}
