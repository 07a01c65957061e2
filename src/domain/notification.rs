use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Closed set of notification categories. Stored as text; unknown values read
/// back from the database fall back to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TicketUploaded,
    PaymentSuccess,
    PaymentFailed,
    BookingConfirmed,
    BookingCancelled,
    PasswordChanged,
    General,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::TicketUploaded => "ticket_uploaded",
            NotificationType::PaymentSuccess => "payment_success",
            NotificationType::PaymentFailed => "payment_failed",
            NotificationType::BookingConfirmed => "booking_confirmed",
            NotificationType::BookingCancelled => "booking_cancelled",
            NotificationType::PasswordChanged => "password_changed",
            NotificationType::General => "general",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "ticket_uploaded" => NotificationType::TicketUploaded,
            "payment_success" => NotificationType::PaymentSuccess,
            "payment_failed" => NotificationType::PaymentFailed,
            "booking_confirmed" => NotificationType::BookingConfirmed,
            "booking_cancelled" => NotificationType::BookingCancelled,
            "password_changed" => NotificationType::PasswordChanged,
            _ => NotificationType::General,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
