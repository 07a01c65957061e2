use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::app::users::UserService;
use crate::domain::notification::NotificationType;
use crate::events::TicketEvent;
use crate::infra::mailer::Mailer;
use crate::AppState;

/// Handler for the `ticket.events` topic.
#[derive(Clone)]
pub struct TicketEventHandler {
    mailer: Mailer,
    users: UserService,
    notifications: NotificationService,
}

impl TicketEventHandler {
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
        let event: TicketEvent = match serde_json::from_value(message) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "unknown or malformed ticket event, dropping");
                return;
            }
        };

        match event {
            TicketEvent::TicketUploaded {
                booking_id,
                user_id,
                user_email,
                pnr,
            } => {
                info!(%booking_id, "processing ticket_uploaded");
                self.ticket_uploaded(booking_id, user_id, user_email.as_deref(), &pnr)
                    .await;
            }
        }
    }

    async fn ticket_uploaded(
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
                    "Ticket Uploaded Successfully : Aerovia",
                    &format!(
                        "Your ticket for booking {} (PNR {}) is ready.",
                        booking_id, pnr
                    ),
                )
                .await
            {
                error!(error = ?err, user_email, "failed to send ticket upload email");
            }
        }

        if let Some(user_id) = user_id {
            if let Err(err) = self
                .notifications
                .create_and_publish(
                    user_id,
                    &format!(
                        "Your ticket for flight with PNR: {} has been uploaded successfully.",
                        pnr
                    ),
                    NotificationType::TicketUploaded,
                )
                .await
            {
                error!(error = ?err, %user_id, "failed to create ticket upload notification");
            }
        }

        match self.users.admin_users().await {
            Ok(admins) => {
                let count = admins.len();
                for admin in admins {
                    if let Err(err) = self
                        .notifications
                        .create_and_publish(
                            admin.id,
                            &format!("Ticket uploaded for flight with PNR: {}.", pnr),
                            NotificationType::TicketUploaded,
                        )
                        .await
                    {
                        error!(error = ?err, admin_id = %admin.id, "failed to create admin ticket notification");
                    }
                }
                info!(count, "admin ticket upload notifications created");
            }
            Err(err) => error!(error = ?err, "failed to load admin users"),
        }
    }
}
