use anyhow::Result;
use uuid::Uuid;

use crate::app::bookings::map_booking;
use crate::domain::booking::Booking;
use crate::infra::db::Db;

const BOOKING_COLUMNS: &str =
    "id, user_id, pnr, status, amount_cents, currency, ticket_url, created_at";

/// Attaches issued tickets to bookings. The ticket file itself lives in the
/// external storage service; only its URL is recorded here.
#[derive(Clone)]
pub struct TicketService {
    db: Db,
}

impl TicketService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn attach_ticket(
        &self,
        booking_id: Uuid,
        ticket_url: &str,
    ) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "UPDATE bookings SET ticket_url = $2 WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(ticket_url)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_booking(&row)))
    }
}
