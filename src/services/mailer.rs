//! Outgoing mail
//!
//! `SmtpMailer` relays through the configured SMTP server. When no SMTP host
//! is configured, `LogMailer` writes each message to the log instead so
//! development setups still see activation and reset links.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::MailConfig;

/// Something that can deliver a plain-text email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP mailer backed by lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Mailer that only logs
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, "Mail (SMTP not configured):\n{}", body);
        Ok(())
    }
}

/// Pick the mailer for the given configuration
pub fn create_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.smtp_host.as_deref().map(str::trim) {
        Some(host) if !host.is_empty() => {
            tracing::info!("Sending mail through SMTP host {}", host);
            Ok(Arc::new(SmtpMailer::new(config, host)?))
        }
        _ => {
            tracing::info!("SMTP host not configured, outgoing mail will be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Subject and body of the account activation email
pub fn activation_email(site_url: &str, username: &str, token: &str) -> (String, String) {
    let link = format!(
        "{}/api/users/activate/{}",
        site_url.trim_end_matches('/'),
        token
    );
    (
        "Activate your Authors Haven account".to_string(),
        format!(
            "Hi {},\n\nThanks for signing up. Follow the link below to activate your account:\n\n{}\n\nThe link expires in 3 days.\n\nAuthors Haven",
            username, link
        ),
    )
}

/// Subject and body of the password reset email
pub fn password_reset_email(site_url: &str, username: &str, email: &str, token: &str) -> (String, String) {
    let link = format!(
        "{}/api/users/password/reset?email={}&token={}",
        site_url.trim_end_matches('/'),
        urlencoding::encode(email),
        urlencoding::encode(token)
    );
    (
        "Reset your Authors Haven password".to_string(),
        format!(
            "Hi {},\n\nSomeone asked to reset the password for this account. Use the link below to choose a new one:\n\n{}\n\nIf you did not ask for this, ignore this email.\n\nAuthors Haven",
            username, link
        ),
    )
}

/// Subject and body of a notification digest email
pub fn notification_email(site_url: &str, username: &str, text: &str, article_slug: Option<&str>) -> (String, String) {
    let mut body = format!("Hi {},\n\n{}\n", username, text);
    if let Some(slug) = article_slug {
        body.push_str(&format!(
            "\nRead it here: {}/api/articles/{}\n",
            site_url.trim_end_matches('/'),
            slug
        ));
    }
    body.push_str("\nYou can turn off email notifications with PUT /api/notifications/switch_email.\n\nAuthors Haven");
    ("New notification on Authors Haven".to_string(), body)
}

/// Mailer that keeps messages in memory for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<(String, String, String)>>,
    pub fail_for: Option<String>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn failing_for(address: &str) -> Self {
        Self {
            sent: Default::default(),
            fail_for: Some(address.to_string()),
        }
    }

    pub fn messages(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.fail_for.as_deref() == Some(to) {
            return Err(anyhow!("Failed to send email: mailbox unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mailer_without_host_logs() {
        let config = MailConfig::default();
        assert!(config.smtp_host.is_none());
        assert!(create_mailer(&config).is_ok());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_from() {
        let config = MailConfig {
            from: "not an address".to_string(),
            ..MailConfig::default()
        };
        assert!(SmtpMailer::new(&config, "smtp.example.com").is_err());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        LogMailer.send("amina@example.com", "hi", "body").await.unwrap();
    }

    #[test]
    fn test_activation_email_contains_link() {
        let (subject, body) = activation_email("http://localhost:8080/", "amina", "abc.def");
        assert!(subject.contains("Activate"));
        assert!(body.contains("http://localhost:8080/api/users/activate/abc.def"));
    }

    #[test]
    fn test_reset_email_encodes_query() {
        let (_, body) = password_reset_email("http://haven.test", "amina", "a+b@example.com", "1-ff");
        assert!(body.contains("email=a%2Bb%40example.com&token=1-ff"));
    }

    #[test]
    fn test_notification_email_links_article() {
        let (_, body) = notification_email("http://haven.test", "brian", "amina has created an article. Title: Hi", Some("hi"));
        assert!(body.contains("http://haven.test/api/articles/hi"));
        let (_, body) = notification_email("http://haven.test", "brian", "text", None);
        assert!(!body.contains("Read it here"));
    }
}
