//! SMTP delivery adapter

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use lettre::{
    message::{
        header::ContentType, Attachment as AttachmentPart, Body, Mailbox as SmtpMailbox,
        MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, Message as SmtpMessage, SmtpTransport, Transport,
};

use crate::{
    domain::mail::{errors::DeliveryError, Attachment, Mailbox, Message, Sender},
    infrastructure::email::AdapterConfigError,
};

/// SMTP configuration
#[derive(Clone, Default, Debug, Parser)]
pub struct SmtpConfig {
    /// The SMTP host
    #[clap(long, env = "SMTP_HOST")]
    pub host: String,

    /// The SMTP port
    #[clap(long, env = "SMTP_PORT", default_value_t = 587)]
    pub port: u16,

    /// The SMTP username
    #[clap(long, env = "SMTP_USER")]
    pub username: String,

    /// The SMTP password
    #[clap(long, env = "SMTP_PASSWORD")]
    pub password: String,

    /// Verify the TLS certificate
    #[clap(long, env = "SMTP_VERIFY_TLS", default_value = "true")]
    pub verify_tls: bool,

    /// Enable STARTTLS (TLS upgrade on connection)
    #[clap(long, env = "SMTP_STARTTLS", default_value = "true")]
    pub starttls: bool,
}

/// SMTP delivery backend
#[derive(Debug, Default, Clone)]
pub struct SmtpSender {
    config: SmtpConfig,
}

impl SmtpSender {
    /// Create a new SMTP sender, rejecting an incomplete configuration
    pub fn new(config: SmtpConfig) -> Result<Self, AdapterConfigError> {
        for (field, value) in [
            ("host", &config.host),
            ("username", &config.username),
            ("password", &config.password),
        ] {
            if value.is_empty() {
                return Err(AdapterConfigError::MissingField {
                    adapter: "smtp",
                    field,
                });
            }
        }

        Ok(Self { config })
    }

    /// Build the transport for the configured relay
    pub fn mailer(&self) -> Result<SmtpTransport> {
        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let relay = if self.config.starttls {
            SmtpTransport::starttls_relay(&self.config.host)?
        } else {
            SmtpTransport::relay(&self.config.host)?
        };

        Ok(relay
            .credentials(creds)
            .port(self.config.port)
            .tls(Tls::Opportunistic(
                TlsParameters::builder(self.config.host.to_string())
                    .dangerous_accept_invalid_certs(!self.config.verify_tls)
                    .build()?,
            ))
            .build())
    }

    fn build_message(&self, message: &Message) -> Result<SmtpMessage, DeliveryError> {
        let mut builder = SmtpMessage::builder().from(smtp_mailbox(&message.from)?);

        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(smtp_mailbox(reply_to)?);
        }

        for to in &message.to {
            builder = builder.to(smtp_mailbox(to)?);
        }

        for cc in &message.cc {
            builder = builder.cc(smtp_mailbox(cc)?);
        }

        for bcc in &message.bcc {
            builder = builder.bcc(smtp_mailbox(bcc)?);
        }

        let builder = builder.subject(message.subject.clone());

        let email = if message.attachments.is_empty() {
            if message.is_html {
                builder.multipart(MultiPart::alternative_plain_html(
                    message.plain_body(),
                    message.body.clone(),
                ))
            } else {
                builder.singlepart(SinglePart::plain(message.body.clone()))
            }
        } else {
            let mut mixed = if message.is_html {
                MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
                    message.plain_body(),
                    message.body.clone(),
                ))
            } else {
                MultiPart::mixed().singlepart(SinglePart::plain(message.body.clone()))
            };

            for attachment in &message.attachments {
                mixed = mixed.singlepart(attachment_part(attachment)?);
            }

            builder.multipart(mixed)
        };

        email.map_err(|err| DeliveryError::UnknownError(anyhow::Error::new(err)))
    }
}

fn smtp_mailbox(mailbox: &Mailbox) -> Result<SmtpMailbox, DeliveryError> {
    let address = mailbox
        .address
        .as_str()
        .parse::<Address>()
        .map_err(|_| DeliveryError::InvalidAddress(mailbox.address.to_string()))?;

    Ok(SmtpMailbox::new(mailbox.name.clone(), address))
}

fn attachment_part(attachment: &Attachment) -> Result<SinglePart, DeliveryError> {
    let content = std::fs::read(&attachment.file).map_err(|err| {
        DeliveryError::UnknownError(anyhow::anyhow!(
            "unable to read attachment {}: {}",
            attachment.file.display(),
            err
        ))
    })?;

    let content_type = ContentType::parse("application/octet-stream")
        .map_err(|err| DeliveryError::UnknownError(anyhow::Error::new(err)))?;

    Ok(AttachmentPart::new(attachment.display_name()).body(Body::new(content), content_type))
}

#[async_trait]
impl Sender for SmtpSender {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        let email = self.build_message(message)?;

        let mailer = self.mailer().map_err(DeliveryError::UnknownError)?;

        match mailer.send(&email) {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => Err(DeliveryError::Rejected(e.to_string())),
            Err(e) => Err(DeliveryError::UnknownError(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::mail::EmailAddress;

    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "user".to_string(),
            password: "secret".to_string(),
            verify_tls: true,
            starttls: true,
        }
    }

    #[test]
    fn test_a_complete_configuration_is_accepted() -> TestResult {
        SmtpSender::new(config())?;

        Ok(())
    }

    #[test]
    fn test_a_missing_field_is_named_in_the_error() {
        let mut config = config();
        config.password.clear();

        let result = SmtpSender::new(config);

        assert_eq!(
            result.unwrap_err(),
            AdapterConfigError::MissingField {
                adapter: "smtp",
                field: "password",
            }
        );
    }

    #[test]
    fn test_mailboxes_convert_with_and_without_names() -> TestResult {
        let bare = smtp_mailbox(&Mailbox::new(EmailAddress::new("jane@example.com")?))?;
        let named = smtp_mailbox(&Mailbox::named(
            EmailAddress::new("jane@example.com")?,
            "Jane Doe",
        ))?;

        assert_eq!(bare.email.to_string(), "jane@example.com");
        assert_eq!(bare.name, None);
        assert_eq!(named.name.as_deref(), Some("Jane Doe"));

        Ok(())
    }

    #[test]
    fn test_an_unparseable_address_is_reported() {
        let result = smtp_mailbox(&Mailbox::new(EmailAddress::new_unchecked("not an address")));

        assert!(matches!(result, Err(DeliveryError::InvalidAddress(_))));
    }

    #[test]
    fn test_building_a_message_with_recipients_succeeds() -> TestResult {
        let mut message = Message::new(
            Mailbox::named(EmailAddress::new("sender@example.com")?, "Sender"),
            "Monthly report",
            "<p>The report is attached.</p>",
        );
        message.reply_to = Some(Mailbox::new(EmailAddress::new("replies@example.com")?));
        message
            .to
            .push(Mailbox::new(EmailAddress::new("to@example.com")?));
        message
            .cc
            .push(Mailbox::new(EmailAddress::new("cc@example.com")?));

        let sender = SmtpSender::new(config())?;

        sender.build_message(&message)?;

        Ok(())
    }
}
