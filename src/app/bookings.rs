use anyhow::Result;
use rand::Rng;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::booking::{booking_status, Booking};
use crate::infra::db::Db;

const BOOKING_COLUMNS: &str =
    "id, user_id, pnr, status, amount_cents, currency, ticket_url, created_at";
const PNR_LEN: usize = 6;
const LIST_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct BookingService {
    db: Db,
}

impl BookingService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<Booking> {
        let pnr = generate_pnr();
        let row = sqlx::query(&format!(
            "INSERT INTO bookings (user_id, pnr, amount_cents, currency) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .bind(&pnr)
        .bind(amount_cents)
        .bind(currency)
        .fetch_one(self.db.pool())
        .await?;

        Ok(map_booking(&row))
    }

    pub async fn get(&self, booking_id: Uuid, user_id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bookings WHERE id = $1 AND user_id = $2",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_booking(&row)))
    }

    /// Lookup without an ownership filter, for admin tooling and webhook
    /// processing.
    pub async fn get_any(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_booking(&row)))
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .bind(LIST_LIMIT)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(map_booking).collect())
    }

    /// Transition a booking to cancelled. `None` when no non-cancelled row
    /// matched.
    pub async fn cancel(&self, booking_id: Uuid, user_id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "UPDATE bookings SET status = $3 \
             WHERE id = $1 AND user_id = $2 AND status <> $3 \
             RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(user_id)
        .bind(booking_status::CANCELLED)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_booking(&row)))
    }
}

pub(crate) fn map_booking(row: &PgRow) -> Booking {
    Booking {
        id: row.get("id"),
        user_id: row.get("user_id"),
        pnr: row.get("pnr"),
        status: row.get("status"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        ticket_url: row.get("ticket_url"),
        created_at: row.get("created_at"),
    }
}

fn generate_pnr() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..PNR_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
