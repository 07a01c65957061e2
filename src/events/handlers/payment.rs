use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::app::users::UserService;
use crate::domain::notification::NotificationType;
use crate::events::PaymentEvent;
use crate::infra::mailer::Mailer;
use crate::AppState;

/// Handler for the `payment.events` topic. The failure path deliberately
/// creates only the in-app notification; there is no failure email.
#[derive(Clone)]
pub struct PaymentEventHandler {
    mailer: Mailer,
    users: UserService,
    notifications: NotificationService,
}

impl PaymentEventHandler {
    pub fn new(mailer: Mailer, users: UserService, notifications: NotificationService) -> Self {
        Self {
            mailer,
            users,
            notifications,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.mailer.clone(),
            UserService::new(state.db.clone()),
            NotificationService::new(state.db.clone(), state.fanout.clone()),
        )
    }

    pub async fn handle(&self, message: Value) {
        let event: PaymentEvent = match serde_json::from_value(message) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "unknown or malformed payment event, dropping");
                return;
            }
        };

        match event {
            PaymentEvent::PaymentSuccessful {
                booking_id,
                user_id,
                user_email,
                pnr,
            } => {
                info!(%booking_id, "processing payment_successful");
                self.payment_successful(booking_id, user_id, user_email.as_deref(), &pnr)
                    .await;
            }
            PaymentEvent::PaymentFailed {
                booking_id,
                user_id,
                pnr,
                reason,
            } => {
                info!(%booking_id, "processing payment_failed");
                self.payment_failed(user_id, &pnr, &reason).await;
            }
        }
    }

    async fn payment_successful(
        &self,
        booking_id: Uuid,
        user_id: Option<Uuid>,
        user_email: Option<&str>,
        pnr: &str,
    ) {
        if let Some(user_email) = user_email {
            if let Err(err) = self
                .mailer
                .send(
                    &[user_email.to_string()],
                    "Payment Successful : Aerovia",
                    &format!(
                        "Your payment for flight booking {} (PNR {}) was successful.",
                        booking_id, pnr
                    ),
                )
                .await
            {
                error!(error = ?err, user_email, "failed to send payment success email");
            }
        }

        let admin_emails = match self.users.admin_emails().await {
            Ok(emails) => emails,
            Err(err) => {
                error!(error = ?err, "failed to load admin emails");
                Vec::new()
            }
        };
        if !admin_emails.is_empty() {
            if let Err(err) = self
                .mailer
                .send(
                    &admin_emails,
                    "[ADMIN] Payment Completed for Booking",
                    &format!(
                        "Payment completed for booking {} (PNR {}), customer: {}.",
                        booking_id,
                        pnr,
                        user_email.unwrap_or("unknown")
                    ),
                )
                .await
            {
                error!(error = ?err, "failed to send admin payment notification email");
            }
        }

        if let Some(user_id) = user_id {
            if let Err(err) = self
                .notifications
                .create_and_publish(
                    user_id,
                    &format!("Payment successful for flight with PNR {}", pnr),
                    NotificationType::PaymentSuccess,
                )
                .await
            {
                error!(error = ?err, %user_id, "failed to create payment success notification");
            }
        }
    }

    async fn payment_failed(&self, user_id: Option<Uuid>, pnr: &str, reason: &str) {
        let Some(user_id) = user_id else {
            return;
        };

        match self
            .notifications
            .create_and_publish(
                user_id,
                &format!(
                    "Payment failed for flight with PNR {}. Reason: {}",
                    pnr, reason
                ),
                NotificationType::PaymentFailed,
            )
            .await
        {
            Ok(_) => info!(%user_id, "payment failure notification created"),
            Err(err) => {
                error!(error = ?err, %user_id, "failed to create payment failure notification")
            }
        }
    }
}
