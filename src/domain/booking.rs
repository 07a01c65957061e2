use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub mod booking_status {
    pub const PENDING: &str = "pending";
    pub const PAID: &str = "paid";
    pub const PAYMENT_FAILED: &str = "payment_failed";
    pub const CANCELLED: &str = "cancelled";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pnr: String,
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
    pub ticket_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
