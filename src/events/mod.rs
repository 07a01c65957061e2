pub mod dispatcher;
pub mod handlers;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broker topic names. One handler is registered per topic; the payload's
/// `event_type` discriminator selects the variant within the topic.
pub mod topics {
    pub const USER_EVENTS: &str = "user.events";
    pub const BOOKING_EVENTS: &str = "booking.events";
    pub const PAYMENT_EVENTS: &str = "payment.events";
    pub const TICKET_EVENTS: &str = "ticket.events";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UserEvent {
    UserRegistered {
        user_id: Uuid,
        email: String,
    },
    PasswordResetRequested {
        email: String,
        reset_token: String,
    },
    PasswordChanged {
        user_id: Uuid,
        email: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BookingEvent {
    BookingCreated {
        booking_id: Uuid,
        user_id: Option<Uuid>,
        user_email: String,
        pnr: String,
    },
    BookingCancelled {
        booking_id: Uuid,
        user_id: Option<Uuid>,
        user_email: String,
        pnr: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PaymentEvent {
    PaymentSuccessful {
        booking_id: Uuid,
        user_id: Option<Uuid>,
        user_email: Option<String>,
        pnr: String,
    },
    PaymentFailed {
        booking_id: Uuid,
        user_id: Option<Uuid>,
        pnr: String,
        #[serde(default = "default_failure_reason")]
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TicketEvent {
    TicketUploaded {
        booking_id: Uuid,
        user_id: Option<Uuid>,
        user_email: Option<String>,
        pnr: String,
    },
}

fn default_failure_reason() -> String {
    "Unknown error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_tag_selects_variant() {
        let event: BookingEvent = serde_json::from_value(json!({
            "event_type": "booking_created",
            "booking_id": "6d9e2c34-5f7a-4b2d-9c1e-8a4f3b2d1c0e",
            "user_id": null,
            "user_email": "traveler@example.com",
            "pnr": "AB12CD",
        }))
        .unwrap();

        assert!(matches!(event, BookingEvent::BookingCreated { .. }));
    }

    #[test]
    fn unknown_event_type_is_a_decode_error() {
        let result: Result<PaymentEvent, _> = serde_json::from_value(json!({
            "event_type": "payment_reversed",
            "booking_id": "6d9e2c34-5f7a-4b2d-9c1e-8a4f3b2d1c0e",
            "pnr": "AB12CD",
        }));

        assert!(result.is_err());
    }

    #[test]
    fn payment_failed_reason_defaults() {
        let event: PaymentEvent = serde_json::from_value(json!({
            "event_type": "payment_failed",
            "booking_id": "6d9e2c34-5f7a-4b2d-9c1e-8a4f3b2d1c0e",
            "user_id": "6d9e2c34-5f7a-4b2d-9c1e-8a4f3b2d1c0e",
            "pnr": "AB12CD",
        }))
        .unwrap();

        match event {
            PaymentEvent::PaymentFailed { reason, .. } => assert_eq!(reason, "Unknown error"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
