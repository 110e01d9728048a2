use async_trait::async_trait;
use berth_core::repository::{TicketStore, TierCounts, UnitOfWork};
use berth_core::{PoolLayout, StoreError};
use berth_shared::{
    Berth, BerthKind, BerthStatus, Gender, HistoryEvent, Passenger, Ticket, TicketStatus, Tier,
};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::store_error;

const TICKET_SELECT: &str = r#"
    SELECT t.id, t.tier, t.status, t.berth_id, t.created_at, t.updated_at,
           p.id AS passenger_id, p.name, p.age, p.gender, p.travels_with_minor, p.is_minor
    FROM tickets t
    JOIN passengers p ON p.ticket_id = t.id
"#;

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BerthRow {
    id: i32,
    kind: String,
    status: String,
}

impl TryFrom<BerthRow> for Berth {
    type Error = StoreError;

    fn try_from(row: BerthRow) -> Result<Self, Self::Error> {
        Ok(Berth {
            id: row.id,
            kind: row.kind.parse()?,
            status: row.status.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    tier: String,
    status: String,
    berth_id: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    passenger_id: Uuid,
    name: String,
    age: i32,
    gender: Option<String>,
    travels_with_minor: bool,
    is_minor: bool,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let gender = row.gender.as_deref().map(str::parse::<Gender>).transpose()?;
        let passenger = Passenger::from_stored(
            row.passenger_id,
            row.name,
            row.age,
            gender,
            row.travels_with_minor,
            row.is_minor,
        );
        Ok(Ticket {
            id: row.id,
            tier: row.tier.parse()?,
            status: row.status.parse()?,
            passenger,
            berth_id: row.berth_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const HISTORY_SELECT: &str = "SELECT id, ticket_id, action, recorded_at FROM ticket_history \
     WHERE ticket_id = $1 ORDER BY recorded_at DESC, id DESC";

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    ticket_id: Uuid,
    action: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEvent {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(HistoryEvent {
            id: row.id,
            ticket_id: row.ticket_id,
            action: row.action.parse()?,
            recorded_at: row.recorded_at,
        })
    }
}

fn into_tickets(rows: Vec<TicketRow>) -> Result<Vec<Ticket>, StoreError> {
    rows.into_iter().map(Ticket::try_from).collect()
}

/// Postgres-backed store. Units of work serialize on the `tier_locks` rows
/// and bound every lock wait with `lock_timeout`.
pub struct PgTicketStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgTicketStore {
    /// `lock_timeout` is floored at 1ms; Postgres treats zero as no timeout.
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool,
            lock_timeout: lock_timeout.max(Duration::from_millis(1)),
        }
    }

    async fn locked_transaction(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        sqlx::query("SELECT tier FROM tier_locks ORDER BY tier FOR UPDATE")
            .fetch_all(&mut *tx)
            .await
            .map_err(store_error)?;

        Ok(tx)
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.locked_transaction().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn initialize_pool(&self, layout: &PoolLayout) -> Result<usize, StoreError> {
        let mut tx = self.locked_transaction().await?;

        let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM berths")
            .fetch_one(&mut *tx)
            .await
            .map_err(store_error)?;
        if existing > 0 {
            debug!("Berth pool already seeded with {} berths", existing);
            return Ok(0);
        }

        let kinds = layout.kinds();
        let ids: Vec<i32> = (1..=kinds.len() as i32).collect();
        let labels: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();

        sqlx::query("INSERT INTO berths (id, kind) SELECT * FROM UNNEST($1::int4[], $2::text[])")
            .bind(&ids)
            .bind(&labels)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        info!("Seeded berth pool with {} berths", ids.len());
        Ok(ids.len())
    }

    async fn list_berths(&self, status: Option<BerthStatus>) -> Result<Vec<Berth>, StoreError> {
        let rows: Vec<BerthRow> = match status {
            Some(status) => {
                sqlx::query_as("SELECT id, kind, status FROM berths WHERE status = $1 ORDER BY id")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as("SELECT id, kind, status FROM berths ORDER BY id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(store_error)?;

        rows.into_iter().map(Berth::try_from).collect()
    }

    async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, StoreError> {
        let rows: Vec<TicketRow> = match status {
            Some(status) => {
                let sql = format!("{TICKET_SELECT} WHERE t.status = $1 ORDER BY t.created_at DESC");
                sqlx::query_as(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("{TICKET_SELECT} ORDER BY t.created_at DESC");
                sqlx::query_as(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(store_error)?;

        into_tickets(rows)
    }

    async fn find_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("{TICKET_SELECT} WHERE t.id = $1");
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.map(Ticket::try_from).transpose()
    }

    async fn history(&self, ticket_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(HISTORY_SELECT)
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(HistoryEvent::try_from).collect()
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    /// Database clock, nudged past the newest recorded event. Every writer
    /// holds the tier locks here, so engines on different hosts still hand
    /// out strictly increasing timestamps.
    async fn now(&mut self) -> Result<DateTime<Utc>, StoreError> {
        let (now,): (DateTime<Utc>,) = sqlx::query_as(
            "SELECT GREATEST(clock_timestamp(), \
             COALESCE(MAX(recorded_at) + INTERVAL '1 microsecond', clock_timestamp())) \
             FROM ticket_history",
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(now)
    }

    async fn tier_counts(&mut self) -> Result<TierCounts, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT tier, COUNT(*) FROM tickets WHERE status = 'admitted' GROUP BY tier",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?;

        let mut counts = TierCounts::default();
        for (tier, count) in rows {
            let tier: Tier = tier.parse()?;
            counts.add(tier, u32::try_from(count).unwrap_or(u32::MAX));
        }
        Ok(counts)
    }

    async fn free_berths(&mut self, kinds: &[BerthKind]) -> Result<Vec<Berth>, StoreError> {
        let labels: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
        let rows: Vec<BerthRow> = sqlx::query_as(
            "SELECT id, kind, status FROM berths \
             WHERE status = 'free' AND kind = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&labels)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(Berth::try_from).collect()
    }

    async fn find_berth(&mut self, id: i32) -> Result<Option<Berth>, StoreError> {
        let row: Option<BerthRow> =
            sqlx::query_as("SELECT id, kind, status FROM berths WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(store_error)?;

        row.map(Berth::try_from).transpose()
    }

    async fn save_berth(&mut self, berth: &Berth) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE berths SET status = $2 WHERE id = $1")
            .bind(berth.id)
            .bind(berth.status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("berth {} is not part of the pool", berth.id)));
        }
        Ok(())
    }

    async fn find_ticket(&mut self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("{TICKET_SELECT} WHERE t.id = $1 FOR UPDATE OF t");
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;

        row.map(Ticket::try_from).transpose()
    }

    async fn oldest_admitted(&mut self, tier: Tier) -> Result<Option<Ticket>, StoreError> {
        let sql = format!(
            "{TICKET_SELECT} WHERE t.status = 'admitted' AND t.tier = $1 \
             ORDER BY t.created_at, t.id LIMIT 1 FOR UPDATE OF t"
        );
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(tier.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;

        row.map(Ticket::try_from).transpose()
    }

    async fn save_ticket(&mut self, ticket: &Ticket) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tickets (id, tier, status, berth_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                tier = EXCLUDED.tier,
                status = EXCLUDED.status,
                berth_id = EXCLUDED.berth_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.tier.as_str())
        .bind(ticket.status.as_str())
        .bind(ticket.berth_id)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;

        let passenger = &ticket.passenger;
        sqlx::query(
            r#"
            INSERT INTO passengers (id, ticket_id, name, age, gender, travels_with_minor, is_minor)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                age = EXCLUDED.age,
                gender = EXCLUDED.gender,
                travels_with_minor = EXCLUDED.travels_with_minor,
                is_minor = EXCLUDED.is_minor
            "#,
        )
        .bind(passenger.id)
        .bind(ticket.id)
        .bind(passenger.name.expose())
        .bind(passenger.age())
        .bind(passenger.gender.map(|g| g.as_str()))
        .bind(passenger.travels_with_minor)
        .bind(passenger.is_minor())
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn delete_ticket(&mut self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn append_history(&mut self, event: &HistoryEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO ticket_history (id, ticket_id, action, recorded_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(event.id)
        .bind(event.ticket_id)
        .bind(event.action.as_str())
        .bind(event.recorded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn history(&mut self, ticket_id: Uuid) -> Result<Vec<HistoryEvent>, StoreError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(HISTORY_SELECT)
            .bind(ticket_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;

        rows.into_iter().map(HistoryEvent::try_from).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_error)
    }
}
