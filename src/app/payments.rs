use anyhow::Result;
use uuid::Uuid;

use crate::app::bookings::map_booking;
use crate::domain::booking::{booking_status, Booking};
use crate::infra::db::Db;

const BOOKING_COLUMNS: &str =
    "id, user_id, pnr, status, amount_cents, currency, ticket_url, created_at";

/// Records gateway payment outcomes onto bookings. The gateway integration
/// itself lives outside this service; only its callback contract is consumed.
#[derive(Clone)]
pub struct PaymentService {
    db: Db,
}

impl PaymentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Apply a gateway outcome to a pending booking. `None` when the booking
    /// does not exist or is not awaiting payment.
    pub async fn record_outcome(&self, booking_id: Uuid, success: bool) -> Result<Option<Booking>> {
        let status = if success {
            booking_status::PAID
        } else {
            booking_status::PAYMENT_FAILED
        };

        let row = sqlx::query(&format!(
            "UPDATE bookings SET status = $2 \
             WHERE id = $1 AND status IN ($3, $4) \
             RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(status)
        .bind(booking_status::PENDING)
        .bind(booking_status::PAYMENT_FAILED)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| map_booking(&row)))
    }
}
