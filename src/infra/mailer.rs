use anyhow::{anyhow, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::AppConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// SMTP not configured; log the send and report success. Local dev only.
    Log,
    /// Captures sends for assertion instead of delivering them.
    Memory(Arc<Mutex<Vec<OutboundEmail>>>),
}

#[derive(Clone)]
pub struct Mailer {
    transport: MailTransport,
    from: String,
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let transport = match &config.smtp_host {
            Some(host) => {
                let smtp = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                    .map_err(|err| anyhow!("invalid SMTP relay {}: {}", host, err))?
                    .port(config.smtp_port)
                    .credentials(Credentials::new(
                        config.smtp_username.clone(),
                        config.smtp_password.clone(),
                    ))
                    .build();
                MailTransport::Smtp(smtp)
            }
            None => MailTransport::Log,
        };

        Ok(Self {
            transport,
            from: config.mail_from.clone(),
        })
    }

    /// Mailer that records every send into the returned outbox.
    pub fn memory() -> (Self, Arc<Mutex<Vec<OutboundEmail>>>) {
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let mailer = Self {
            transport: MailTransport::Memory(outbox.clone()),
            from: "Aerovia <no-reply@aerovia.example>".to_string(),
        };
        (mailer, outbox)
    }

    pub async fn send(&self, recipients: &[String], subject: &str, body_text: &str) -> Result<()> {
        if recipients.is_empty() {
            return Err(anyhow!("no recipients"));
        }

        match &self.transport {
            MailTransport::Smtp(smtp) => {
                let from: Mailbox = self
                    .from
                    .parse()
                    .map_err(|err| anyhow!("invalid MAIL_FROM: {}", err))?;
                let mut builder = Message::builder()
                    .from(from)
                    .subject(subject)
                    .header(ContentType::TEXT_HTML);
                for recipient in recipients {
                    let to: Mailbox = recipient
                        .parse()
                        .map_err(|err| anyhow!("invalid recipient {}: {}", recipient, err))?;
                    builder = builder.to(to);
                }
                let email = builder.body(render_html(subject, body_text))?;
                smtp.send(email).await?;
                Ok(())
            }
            MailTransport::Log => {
                info!(recipients = ?recipients, subject, "smtp not configured, logging email");
                Ok(())
            }
            MailTransport::Memory(outbox) => {
                let mut outbox = outbox.lock().expect("mail outbox poisoned");
                outbox.push(OutboundEmail {
                    recipients: recipients.to_vec(),
                    subject: subject.to_string(),
                    body: body_text.to_string(),
                });
                Ok(())
            }
        }
    }
}

fn render_html(subject: &str, body_text: &str) -> String {
    format!(
        "<h2>{}</h2>\n<br/>\n<p>{}</p>\n<br/>\n<p>Best regards</p>\n<p>The Aerovia Team</p>\n",
        subject, body_text
    )
}
