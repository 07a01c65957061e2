use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::app::users::UserService;
use crate::domain::notification::NotificationType;
use crate::events::BookingEvent;
use crate::infra::mailer::Mailer;
use crate::AppState;

/// Handler for the `booking.events` topic.
///
/// Each side effect is contained individually: a failed email must not
/// suppress the in-app notification and vice versa. Nothing escapes
/// `handle`.
#[derive(Clone)]
pub struct BookingEventHandler {
    mailer: Mailer,
    users: UserService,
    notifications: NotificationService,
}

impl BookingEventHandler {
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
        let event: BookingEvent = match serde_json::from_value(message) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "unknown or malformed booking event, dropping");
                return;
            }
        };

        match event {
            BookingEvent::BookingCreated {
                booking_id,
                user_id,
                user_email,
                pnr,
            } => {
                info!(%booking_id, "processing booking_created");
                self.booking_created(booking_id, user_id, &user_email, &pnr)
                    .await;
            }
            BookingEvent::BookingCancelled {
                booking_id,
                user_id,
                user_email,
                pnr,
                reason,
            } => {
                info!(%booking_id, "processing booking_cancelled");
                self.booking_cancelled(booking_id, user_id, &user_email, &pnr, reason.as_deref())
                    .await;
            }
        }
    }

    async fn booking_created(
        &self,
        booking_id: Uuid,
        user_id: Option<Uuid>,
        user_email: &str,
        pnr: &str,
    ) {
        if let Err(err) = self
            .mailer
            .send(
                &[user_email.to_string()],
                "Your Booking Order Received : Aerovia",
                &format!(
                    "We received your flight booking order. PNR: {}. Booking reference: {}.",
                    pnr, booking_id
                ),
            )
            .await
        {
            error!(error = ?err, user_email, "failed to send booking confirmation email");
        }

        self.notify_admins_by_email(
            "[ADMIN] New Booking Order Placed",
            &format!(
                "A new booking order was placed. PNR: {}, customer: {}, booking: {}.",
                pnr, user_email, booking_id
            ),
        )
        .await;

        if let Some(user_id) = user_id {
            if let Err(err) = self
                .notifications
                .create_and_publish(
                    user_id,
                    &format!("Your flight booking has been confirmed. PNR: {}", pnr),
                    NotificationType::BookingConfirmed,
                )
                .await
            {
                error!(error = ?err, %user_id, "failed to create booking confirmation notification");
            }
        }
    }

    async fn booking_cancelled(
        &self,
        booking_id: Uuid,
        user_id: Option<Uuid>,
        user_email: &str,
        pnr: &str,
        reason: Option<&str>,
    ) {
        let reason_line = reason
            .map(|reason| format!(" Reason: {}.", reason))
            .unwrap_or_default();

        if let Err(err) = self
            .mailer
            .send(
                &[user_email.to_string()],
                "Your Booking Was Cancelled : Aerovia",
                &format!(
                    "Your flight booking with PNR {} has been cancelled.{}",
                    pnr, reason_line
                ),
            )
            .await
        {
            error!(error = ?err, user_email, "failed to send cancellation email");
        }

        self.notify_admins_by_email(
            "[ADMIN] Booking Cancelled",
            &format!(
                "Booking {} (PNR {}) for {} was cancelled.{}",
                booking_id, pnr, user_email, reason_line
            ),
        )
        .await;

        if let Some(user_id) = user_id {
            if let Err(err) = self
                .notifications
                .create_and_publish(
                    user_id,
                    &format!("Your flight booking with PNR: {} has been cancelled.", pnr),
                    NotificationType::BookingCancelled,
                )
                .await
            {
                error!(error = ?err, %user_id, "failed to create cancellation notification");
            }
        }

        match self.users.admin_users().await {
            Ok(admins) => {
                for admin in admins {
                    if let Err(err) = self
                        .notifications
                        .create_and_publish(
                            admin.id,
                            &format!("Booking with PNR: {} was cancelled.", pnr),
                            NotificationType::BookingCancelled,
                        )
                        .await
                    {
                        error!(error = ?err, admin_id = %admin.id, "failed to create admin cancellation notification");
                    }
                }
            }
            Err(err) => error!(error = ?err, "failed to load admin users"),
        }
    }

    async fn notify_admins_by_email(&self, subject: &str, body: &str) {
        let admin_emails = match self.users.admin_emails().await {
            Ok(emails) => emails,
            Err(err) => {
                error!(error = ?err, "failed to load admin emails");
                return;
            }
        };
        if admin_emails.is_empty() {
            return;
        }

        match self.mailer.send(&admin_emails, subject, body).await {
            Ok(()) => info!(count = admin_emails.len(), "admin notification email sent"),
            Err(err) => error!(error = ?err, "failed to send admin notification email"),
        }
    }
}
