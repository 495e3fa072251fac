//! Outbound email.
//!
//! Account flows send OTP codes and admin notifications through the [`Mailer`] trait. Delivery
//! failures come back as `PortalError::Email` and the caller decides whether that is fatal.

use crate::{PortalError, PortalResult};
use crate::config::number_from_env_value;
use crate::constants::OCTET_STREAM;
use async_trait::async_trait;
use lettre::{
    message::{
        header::ContentType, Attachment as MimeAttachment, MessageBuilder, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

/// A file sent alongside an email body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a plain text email to every address in `to`.
    async fn send(&self, subject: &str, body: &str, to: &[String]) -> PortalResult<()>;

    /// Send a plain text body with files attached as a `multipart/mixed` email.
    async fn send_with_attachments(
        &self,
        subject: &str,
        body: &str,
        to: &[String],
        attachments: &[Attachment],
    ) -> PortalResult<()>;
}

/// Mailer used when no SMTP server is configured.
///
/// Records the attempt and reports delivery as unavailable, so account flows fall back to
/// surfacing the code outside production.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, subject: &str, _body: &str, to: &[String]) -> PortalResult<()> {
        tracing::warn!(
            "email delivery not configured; dropped {:?} to {} recipient(s)",
            subject,
            to.len()
        );
        Err(unconfigured())
    }

    async fn send_with_attachments(
        &self,
        subject: &str,
        _body: &str,
        to: &[String],
        attachments: &[Attachment],
    ) -> PortalResult<()> {
        tracing::warn!(
            "email delivery not configured; dropped {:?} with {} attachment(s) to {} recipient(s)",
            subject,
            attachments.len(),
            to.len()
        );
        Err(unconfigured())
    }
}

fn unconfigured() -> PortalError {
    PortalError::Email("SMTP is not configured. Set SMTP_HOST and SMTP_PORT.".into())
}

/// SMTP delivery over `lettre`'s async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Port 465 uses implicit TLS; other ports use STARTTLS when `use_tls` is set.
    pub fn new(
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        use_tls: bool,
        from: String,
    ) -> PortalResult<Self> {
        let mut builder = if use_tls {
            let tls_params = TlsParameters::new(host.clone())
                .map_err(|e| PortalError::Email(format!("TLS configuration error: {}", e)))?;

            if port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
                    .map_err(|e| PortalError::Email(format!("SMTP relay error: {}", e)))?
                    .port(port)
                    .tls(Tls::Wrapper(tls_params))
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
                    .map_err(|e| PortalError::Email(format!("SMTP relay error: {}", e)))?
                    .port(port)
                    .tls(Tls::Required(tls_params))
            }
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host).port(port)
        };

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl SmtpMailer {
    fn envelope(&self, subject: &str, to: &[String]) -> PortalResult<MessageBuilder> {
        let mut message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| PortalError::Email(format!("Invalid from address: {}", e)))?,
            )
            .subject(subject);
        for recipient in to {
            message = message.to(recipient
                .parse()
                .map_err(|e| PortalError::Email(format!("Invalid to address: {}", e)))?);
        }
        Ok(message)
    }

    async fn deliver(&self, message: Message, subject: &str, to: &[String]) -> PortalResult<()> {
        self.transport
            .send(message)
            .await
            .map_err(|e| PortalError::Email(e.to_string()))?;
        tracing::info!("sent {:?} to {} recipient(s)", subject, to.len());
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str, to: &[String]) -> PortalResult<()> {
        if to.is_empty() {
            return Ok(());
        }
        let message = self
            .envelope(subject, to)?
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| PortalError::Email(format!("Failed to build email: {}", e)))?;
        self.deliver(message, subject, to).await
    }

    async fn send_with_attachments(
        &self,
        subject: &str,
        body: &str,
        to: &[String],
        attachments: &[Attachment],
    ) -> PortalResult<()> {
        if to.is_empty() {
            return Ok(());
        }
        let message = self
            .envelope(subject, to)?
            .multipart(mixed_body(body, attachments))
            .map_err(|e| PortalError::Email(format!("Failed to build email: {}", e)))?;
        self.deliver(message, subject, to).await
    }
}

/// Text part first, then one part per attachment. Unparseable content types are sent as
/// `application/octet-stream`.
fn mixed_body(body: &str, attachments: &[Attachment]) -> MultiPart {
    attachments.iter().fold(
        MultiPart::mixed().singlepart(SinglePart::plain(body.to_string())),
        |parts, file| {
            let content_type = ContentType::parse(&file.content_type)
                .or_else(|_| ContentType::parse(OCTET_STREAM))
                .unwrap_or(ContentType::TEXT_PLAIN);
            parts.singlepart(
                MimeAttachment::new(file.filename.clone()).body(file.data.clone(), content_type),
            )
        },
    )
}

/// Picks SMTP delivery when `SMTP_HOST` is set, otherwise [`LogMailer`].
///
/// `SMTP_PORT` defaults to 587 and `SMTP_USE_TLS` to true.
pub fn mailer_from_env_values(
    lookup: impl Fn(&str) -> Option<String>,
    from: &str,
) -> PortalResult<Arc<dyn Mailer>> {
    let Some(host) = lookup("SMTP_HOST").filter(|h| !h.trim().is_empty()) else {
        tracing::info!("SMTP_HOST not set; outbound email disabled");
        return Ok(Arc::new(LogMailer));
    };
    let port = number_from_env_value("SMTP_PORT", lookup("SMTP_PORT"), 587u16)?;
    let use_tls = lookup("SMTP_USE_TLS")
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
        .unwrap_or(true);
    let mailer = SmtpMailer::new(
        host.trim().to_string(),
        port,
        lookup("SMTP_USERNAME"),
        lookup("SMTP_PASSWORD"),
        use_tls,
        from.to_string(),
    )?;
    Ok(Arc::new(mailer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_mailer_creation_no_tls() {
        let mailer = SmtpMailer::new(
            "localhost".to_string(),
            25,
            None,
            None,
            false,
            "no-reply@physihome.com".to_string(),
        );
        assert!(mailer.is_ok());
    }

    #[test]
    fn test_smtp_mailer_creation_with_credentials() {
        let mailer = SmtpMailer::new(
            "localhost".to_string(),
            587,
            Some("user".to_string()),
            Some("pass".to_string()),
            false,
            "no-reply@physihome.com".to_string(),
        );
        assert!(mailer.is_ok());
    }

    #[tokio::test]
    async fn test_log_mailer_reports_unconfigured() {
        let err = LogMailer
            .send("subject", "body", &["a@x.com".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Email(m) if m.contains("SMTP is not configured")));
    }

    #[tokio::test]
    async fn test_log_mailer_reports_unconfigured_with_attachments() {
        let card = Attachment {
            filename: "card.png".into(),
            content_type: "image/png".into(),
            data: vec![1, 2, 3],
        };
        let err = LogMailer
            .send_with_attachments("subject", "body", &["a@x.com".to_string()], &[card])
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Email(_)));
    }

    #[test]
    fn test_mixed_body_carries_every_attachment() {
        let files = [
            Attachment {
                filename: "degree.pdf".into(),
                content_type: "application/pdf".into(),
                data: b"%PDF-1.4".to_vec(),
            },
            Attachment {
                filename: "card.bin".into(),
                content_type: "not a type".into(),
                data: vec![0, 1],
            },
        ];
        let formatted = String::from_utf8(mixed_body("see attached", &files).formatted()).unwrap();
        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("see attached"));
        assert!(formatted.contains("filename=\"degree.pdf\""));
        assert!(formatted.contains("application/pdf"));
        assert!(formatted.contains("filename=\"card.bin\""));
        assert!(formatted.contains("application/octet-stream"));
    }

    #[test]
    fn test_mailer_from_env_values_without_host_is_log_only() {
        assert!(mailer_from_env_values(|_| None, "no-reply@physihome.com").is_ok());
        let bad_port = mailer_from_env_values(
            |k| match k {
                "SMTP_HOST" => Some("localhost".into()),
                "SMTP_PORT" => Some("smtp".into()),
                _ => None,
            },
            "no-reply@physihome.com",
        );
        assert!(bad_port.is_err());
    }
}
