//! Database row types for SQLite and PostgreSQL.
//!
//! SQLite stores ids and timestamps as text (and lease expiries as epoch
//! milliseconds); PostgreSQL uses native `UUID` and `TIMESTAMPTZ` columns.

use storefront_types::{PaymentStatus, RepoError};

fn parse_status(raw: &str) -> Result<PaymentStatus, RepoError> {
    raw.parse::<PaymentStatus>().map_err(RepoError::Domain)
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL rows
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "postgres")]
pub mod pg {
    use chrono::{DateTime, Utc};
    use sqlx::FromRow;
    use uuid::Uuid;

    use storefront_types::{Order, OrderId, PaymentDetails, RepoError, Session, UserId};

    use super::parse_status;

    /// Order row from database.
    #[derive(FromRow)]
    pub struct DbOrder {
        pub id: Uuid,
        pub user_id: Uuid,
        pub amount: i64,
        pub payment_status: String,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl DbOrder {
        pub fn into_domain(self) -> Result<Order, RepoError> {
            Ok(Order {
                id: OrderId::from_uuid(self.id),
                user_id: UserId::from_uuid(self.user_id),
                amount: self.amount,
                payment_status: parse_status(&self.payment_status)?,
                created_at: self.created_at,
                updated_at: self.updated_at,
            })
        }
    }

    /// Payment details row from database.
    #[derive(FromRow)]
    pub struct DbPaymentDetails {
        pub order_id: Uuid,
        pub gateway: String,
        pub authority: String,
        pub ref_id: Option<String>,
        pub amount: i64,
        pub status: String,
        pub card_pan: Option<String>,
        pub fee: Option<i64>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl DbPaymentDetails {
        pub fn into_domain(self) -> Result<PaymentDetails, RepoError> {
            Ok(PaymentDetails {
                order_id: OrderId::from_uuid(self.order_id),
                gateway: self.gateway,
                authority: self.authority,
                ref_id: self.ref_id,
                amount: self.amount,
                status: parse_status(&self.status)?,
                card_pan: self.card_pan,
                fee: self.fee,
                created_at: self.created_at,
                updated_at: self.updated_at,
            })
        }
    }

    /// Session row from database.
    #[derive(FromRow)]
    pub struct DbSession {
        pub token_hash: String,
        pub user_id: Uuid,
        pub created_at: DateTime<Utc>,
        pub expires_at: DateTime<Utc>,
    }

    impl DbSession {
        pub fn into_domain(self) -> Session {
            Session {
                token_hash: self.token_hash,
                user_id: UserId::from_uuid(self.user_id),
                created_at: self.created_at,
                expires_at: self.expires_at,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite rows
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub mod lite {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use sqlx::FromRow;

    use storefront_types::{Order, OrderId, PaymentDetails, RepoError, Session, UserId};

    use super::parse_status;

    /// Formats a timestamp for a text column.
    pub fn ts(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_ts(raw: &str) -> Result<DateTime<Utc>, RepoError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepoError::Database(e.to_string()))
    }

    pub fn from_millis(ms: i64) -> Result<DateTime<Utc>, RepoError> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| RepoError::Database(format!("Invalid timestamp: {}", ms)))
    }

    fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T, RepoError>
    where
        T::Err: std::fmt::Display,
    {
        raw.parse::<T>()
            .map_err(|e| RepoError::Database(e.to_string()))
    }

    /// Order row from database.
    #[derive(FromRow)]
    pub struct DbOrder {
        pub id: String,
        pub user_id: String,
        pub amount: i64,
        pub payment_status: String,
        pub created_at: String,
        pub updated_at: String,
    }

    impl DbOrder {
        pub fn into_domain(self) -> Result<Order, RepoError> {
            Ok(Order {
                id: parse_id::<OrderId>(&self.id)?,
                user_id: parse_id::<UserId>(&self.user_id)?,
                amount: self.amount,
                payment_status: parse_status(&self.payment_status)?,
                created_at: parse_ts(&self.created_at)?,
                updated_at: parse_ts(&self.updated_at)?,
            })
        }
    }

    /// Payment details row from database.
    #[derive(FromRow)]
    pub struct DbPaymentDetails {
        pub order_id: String,
        pub gateway: String,
        pub authority: String,
        pub ref_id: Option<String>,
        pub amount: i64,
        pub status: String,
        pub card_pan: Option<String>,
        pub fee: Option<i64>,
        pub created_at: String,
        pub updated_at: String,
    }

    impl DbPaymentDetails {
        pub fn into_domain(self) -> Result<PaymentDetails, RepoError> {
            Ok(PaymentDetails {
                order_id: parse_id::<OrderId>(&self.order_id)?,
                gateway: self.gateway,
                authority: self.authority,
                ref_id: self.ref_id,
                amount: self.amount,
                status: parse_status(&self.status)?,
                card_pan: self.card_pan,
                fee: self.fee,
                created_at: parse_ts(&self.created_at)?,
                updated_at: parse_ts(&self.updated_at)?,
            })
        }
    }

    /// Session row from database.
    #[derive(FromRow)]
    pub struct DbSession {
        pub token_hash: String,
        pub user_id: String,
        pub created_at: String,
        pub expires_at_ms: i64,
    }

    impl DbSession {
        pub fn into_domain(self) -> Result<Session, RepoError> {
            Ok(Session {
                token_hash: self.token_hash,
                user_id: parse_id::<UserId>(&self.user_id)?,
                created_at: parse_ts(&self.created_at)?,
                expires_at: from_millis(self.expires_at_ms)?,
            })
        }
    }
}
