//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use storefront_types::{
    CreateOrderRequest, DomainError, LockError, LockLease, Order, OrderId, PaymentCommit,
    PaymentDetails, PaymentLock, PaymentStatus, RepoError, Session, StorefrontRepository, UserId,
};

use crate::security;
use crate::types::pg::{DbOrder, DbPaymentDetails, DbSession};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with row-level locking.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    tracing::debug!(migration = name, "Applied migration");
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_orders_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_sessions_and_locks_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

/// Reads an order, locking its row until the surrounding transaction ends.
async fn lock_order(conn: &mut PgConnection, id: OrderId) -> Result<Order, RepoError> {
    let row: Option<DbOrder> = sqlx::query_as(
        r#"SELECT id, user_id, amount, payment_status, created_at, updated_at
           FROM orders WHERE id = $1 FOR UPDATE"#,
    )
    .bind(id.into_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    row.ok_or(RepoError::NotFound)?.into_domain()
}

async fn fetch_details(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<PaymentDetails>, RepoError> {
    let row: Option<DbPaymentDetails> = sqlx::query_as(
        r#"SELECT order_id, gateway, authority, ref_id, amount, status, card_pan, fee, created_at, updated_at
           FROM payment_details WHERE order_id = $1"#,
    )
    .bind(order_id.into_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    row.map(DbPaymentDetails::into_domain).transpose()
}

async fn upsert_details(conn: &mut PgConnection, details: &PaymentDetails) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO payment_details (order_id, gateway, authority, ref_id, amount, status, card_pan, fee, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
           ON CONFLICT (order_id) DO UPDATE SET
               gateway = EXCLUDED.gateway,
               authority = EXCLUDED.authority,
               ref_id = EXCLUDED.ref_id,
               amount = EXCLUDED.amount,
               status = EXCLUDED.status,
               card_pan = EXCLUDED.card_pan,
               fee = EXCLUDED.fee,
               updated_at = EXCLUDED.updated_at"#,
    )
    .bind(details.order_id.into_uuid())
    .bind(&details.gateway)
    .bind(&details.authority)
    .bind(&details.ref_id)
    .bind(details.amount)
    .bind(details.status.to_string())
    .bind(&details.card_pan)
    .bind(details.fee)
    .bind(details.created_at)
    .bind(details.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| RepoError::Database(e.to_string()))?;

    Ok(())
}

async fn set_order_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: PaymentStatus,
) -> Result<(), RepoError> {
    sqlx::query(r#"UPDATE orders SET payment_status = $1, updated_at = $2 WHERE id = $3"#)
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(order_id.into_uuid())
        .execute(&mut *conn)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl StorefrontRepository for PostgresRepo {
    async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, RepoError> {
        let order = Order::new(req.user_id, req.amount).map_err(RepoError::Domain)?;

        sqlx::query(
            r#"INSERT INTO orders (id, user_id, amount, payment_status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(order.id.into_uuid())
        .bind(order.user_id.into_uuid())
        .bind(order.amount)
        .bind(order.payment_status.to_string())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        let row: Option<DbOrder> = sqlx::query_as(
            r#"SELECT id, user_id, amount, payment_status, created_at, updated_at FROM orders WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbOrder::into_domain).transpose()
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

        let order = lock_order(&mut db_tx, details.order_id).await?;
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

        // The row lock serialises commits even if a lease was lost.
        let order = lock_order(&mut db_tx, commit.order_id).await?;
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

        let order = lock_order(&mut db_tx, order_id).await?;
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
            r#"INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id.into_uuid())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok((session, raw_token))
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, RepoError> {
        let row: Option<DbSession> = sqlx::query_as(
            r#"SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = $1 AND expires_at > NOW()"#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(row.map(DbSession::into_domain))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lease lock
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentLock for PostgresRepo {
    async fn try_acquire(
        &self,
        order_id: OrderId,
        ttl: chrono::Duration,
    ) -> Result<Option<LockLease>, LockError> {
        let lease = LockLease::new(order_id, ttl);

        // Takes a free slot, or steals one whose lease has run out.
        let result = sqlx::query(
            r#"INSERT INTO payment_locks (order_id, token, expires_at) VALUES ($1, $2, $3)
               ON CONFLICT (order_id) DO UPDATE SET
                   token = EXCLUDED.token,
                   expires_at = EXCLUDED.expires_at
               WHERE payment_locks.expires_at <= NOW()"#,
        )
        .bind(order_id.into_uuid())
        .bind(lease.token)
        .bind(lease.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok((result.rows_affected() == 1).then_some(lease))
    }

    async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
        let result = sqlx::query(r#"DELETE FROM payment_locks WHERE order_id = $1 AND token = $2"#)
            .bind(lease.order_id.into_uuid())
            .bind(lease.token)
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            tracing::debug!(order_id = %lease.order_id, "Lease expired before release");
        }
        Ok(())
    }
}
