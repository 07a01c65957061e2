use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::domain::notification::NotificationType;
use crate::events::UserEvent;
use crate::infra::mailer::Mailer;
use crate::AppState;

/// Handler for the `user.events` topic: account lifecycle emails plus the
/// in-app trail for password changes.
#[derive(Clone)]
pub struct UserEventHandler {
    mailer: Mailer,
    notifications: NotificationService,
    frontend_base_url: String,
}

impl UserEventHandler {
    pub fn new(mailer: Mailer, notifications: NotificationService, frontend_base_url: String) -> Self {
        Self {
            mailer,
            notifications,
            frontend_base_url,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.mailer.clone(),
            NotificationService::new(state.db.clone(), state.fanout.clone()),
            state.frontend_base_url.clone(),
        )
    }

    pub async fn handle(&self, message: Value) {
        let event: UserEvent = match serde_json::from_value(message) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "unknown or malformed user event, dropping");
                return;
            }
        };

        match event {
            UserEvent::UserRegistered { user_id, email } => {
                info!(%user_id, "processing user_registered");
                if let Err(err) = self
                    .mailer
                    .send(
                        &[email.clone()],
                        "Welcome to Aerovia",
                        "Your account is ready. Search flights and manage your bookings any time.",
                    )
                    .await
                {
                    error!(error = ?err, email = %email, "failed to send welcome email");
                }
            }
            UserEvent::PasswordResetRequested { email, reset_token } => {
                info!("processing password_reset_requested");
                let reset_link = format!(
                    "{}/reset-password?token={}",
                    self.frontend_base_url, reset_token
                );
                if let Err(err) = self
                    .mailer
                    .send(
                        &[email.clone()],
                        "Password Reset Request : Aerovia",
                        &format!(
                            "A password reset was requested for your account. \
                             Use this link to choose a new password: {}",
                            reset_link
                        ),
                    )
                    .await
                {
                    error!(error = ?err, email = %email, "failed to send password reset email");
                }
            }
            UserEvent::PasswordChanged { user_id, email } => {
                info!(%user_id, "processing password_changed");
                self.password_changed(user_id, &email).await;
            }
        }
    }

    async fn password_changed(&self, user_id: Uuid, email: &str) {
        if let Err(err) = self
            .mailer
            .send(
                &[email.to_string()],
                "Password Changed : Aerovia",
                "Your account password was changed. If this was not you, contact support immediately.",
            )
            .await
        {
            error!(error = ?err, email, "failed to send password changed email");
        }

        if let Err(err) = self
            .notifications
            .create_and_publish(
                user_id,
                "Your account password was changed.",
                NotificationType::PasswordChanged,
            )
            .await
        {
            error!(error = ?err, %user_id, "failed to create password changed notification");
        }
    }
}
