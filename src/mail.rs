//! Email delivery.
//!
//! [`SmtpMailer`] sends one `multipart/mixed` message per run: a
//! `multipart/alternative` part with the text and HTML bodies, then the MP3
//! when a podcast was produced. [`DryRunMailer`] only logs what would be sent.
//! Neither retries.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use crate::config::SmtpConfig;
use crate::error::{DigestError, Result};

pub const AUDIO_MPEG: &str = "audio/mpeg";

/// A composed email, independent of the transport.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachment: Option<AudioAttachment>,
}

#[derive(Clone)]
pub struct AudioAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for AudioAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioAttachment")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

pub trait Mailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

fn mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e| DigestError::Email(format!("invalid address {addr:?}: {e}")))
}

/// Build the MIME message.
pub fn build_message(from: &str, email: &OutgoingEmail) -> Result<Message> {
    if email.to.is_empty() {
        return Err(DigestError::Email("no recipients".into()));
    }

    let mut builder = Message::builder().from(mailbox(from)?).subject(&email.subject);
    for to in &email.to {
        builder = builder.to(mailbox(to)?);
    }

    let body = MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(email.text.clone()),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(email.html.clone()),
        );

    let mut mixed = MultiPart::mixed().multipart(body);
    if let Some(audio) = &email.attachment {
        let content_type = ContentType::parse(AUDIO_MPEG)
            .map_err(|e| DigestError::Email(format!("content type: {e}")))?;
        mixed = mixed.singlepart(Attachment::new(audio.file_name.clone()).body(audio.bytes.clone(), content_type));
    }

    builder
        .multipart(mixed)
        .map_err(|e| DigestError::Email(format!("failed to build message: {e}")))
}

/// STARTTLS relay with username/password credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| DigestError::Email(format!("SMTP transport for {}: {e}", config.host)))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

impl Mailer for SmtpMailer {
    #[instrument(level = "info", skip_all, fields(recipients = email.to.len(), subject = %email.subject))]
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = build_message(&self.from, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DigestError::Email(e.to_string()))?;
        info!(attachment = email.attachment.is_some(), "Email sent");
        Ok(())
    }
}

/// Logs the message instead of sending it.
pub struct DryRunMailer;

impl Mailer for DryRunMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!(
            to = ?email.to,
            subject = %email.subject,
            text_chars = email.text.chars().count(),
            html_chars = email.html.chars().count(),
            attachment = ?email.attachment.as_ref().map(|a| a.file_name.as_str()),
            "Dry run; email not sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(attachment: Option<AudioAttachment>) -> OutgoingEmail {
        OutgoingEmail {
            to: vec!["kid@example.com".into(), "parent@example.com".into()],
            subject: "Daily News + Books for JoJo (2025-05-06)".into(),
            text: "Hi JoJo! Here are today's updates.".into(),
            html: "<p>Hi JoJo!</p>".into(),
            attachment,
        }
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn test_build_message_without_attachment() {
        let message = build_message("sender@example.com", &email(None)).unwrap();
        assert_eq!(message.envelope().to().len(), 2);

        let raw = formatted(&message);
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(!raw.contains(AUDIO_MPEG));
    }

    #[test]
    fn test_build_message_with_audio() {
        let audio = AudioAttachment {
            file_name: "kids-digest-2025-05-06.mp3".into(),
            bytes: b"ID3fake-mp3".to_vec(),
        };
        let raw = formatted(&build_message("sender@example.com", &email(Some(audio))).unwrap());
        assert!(raw.contains(AUDIO_MPEG));
        assert!(raw.contains("kids-digest-2025-05-06.mp3"));
        assert!(raw.contains("attachment"));
    }

    #[test]
    fn test_build_message_rejects_bad_input() {
        assert!(build_message("not an address", &email(None)).is_err());

        let mut e = email(None);
        e.to.clear();
        assert!(build_message("sender@example.com", &e).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_mailer() {
        assert!(DryRunMailer.send(&email(None)).await.is_ok());
    }
}
