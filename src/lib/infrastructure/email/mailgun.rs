//! Mailgun HTTP API delivery adapter

use async_trait::async_trait;
use clap::Parser;
use reqwest::multipart::{Form, Part};

use crate::{
    domain::mail::{errors::DeliveryError, Message, Sender},
    infrastructure::email::AdapterConfigError,
};

/// Mailgun configuration
#[derive(Clone, Debug, Parser)]
pub struct MailgunConfig {
    /// The Mailgun API key
    #[clap(long, env = "MAILGUN_API_KEY")]
    pub api_key: String,

    /// The sending domain registered with Mailgun
    #[clap(long, env = "MAILGUN_DOMAIN")]
    pub domain: String,

    /// The API base URL
    #[clap(
        long,
        env = "MAILGUN_BASE_URL",
        default_value = "https://api.mailgun.net/v3"
    )]
    pub base_url: String,
}

/// Mailgun delivery backend
///
/// Posts each message to the `/{domain}/messages` endpoint as a multipart
/// form, authenticated with the `api` basic-auth user.
#[derive(Debug, Clone)]
pub struct MailgunSender {
    config: MailgunConfig,
    client: reqwest::Client,
}

impl MailgunSender {
    /// Create a new Mailgun sender, rejecting an incomplete configuration
    pub fn new(config: MailgunConfig) -> Result<Self, AdapterConfigError> {
        for (field, value) in [
            ("api_key", &config.api_key),
            ("domain", &config.domain),
            ("base_url", &config.base_url),
        ] {
            if value.is_empty() {
                return Err(AdapterConfigError::MissingField {
                    adapter: "mailgun",
                    field,
                });
            }
        }

        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    async fn form(&self, message: &Message) -> Result<Form, DeliveryError> {
        let mut form = Form::new()
            .text("from", message.from.to_string())
            .text("subject", message.subject.clone());

        if let Some(reply_to) = &message.reply_to {
            form = form.text("h:Reply-To", reply_to.to_string());
        }

        for to in &message.to {
            form = form.text("to", to.to_string());
        }

        for cc in &message.cc {
            form = form.text("cc", cc.to_string());
        }

        for bcc in &message.bcc {
            form = form.text("bcc", bcc.to_string());
        }

        if message.is_html {
            form = form
                .text("html", message.body.clone())
                .text("text", message.plain_body());
        } else {
            form = form.text("text", message.body.clone());
        }

        for attachment in &message.attachments {
            let content = tokio::fs::read(&attachment.file).await.map_err(|err| {
                DeliveryError::UnknownError(anyhow::anyhow!(
                    "unable to read attachment {}: {}",
                    attachment.file.display(),
                    err
                ))
            })?;

            form = form.part(
                "attachment",
                Part::bytes(content).file_name(attachment.display_name()),
            );
        }

        Ok(form)
    }
}

#[async_trait]
impl Sender for MailgunSender {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        let form = self.form(message).await?;

        let response = self
            .client
            .post(format!(
                "{}/{}/messages",
                self.config.base_url, self.config.domain
            ))
            .basic_auth("api", Some(&self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|err| DeliveryError::UnknownError(anyhow::Error::new(err)))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Err(DeliveryError::Rejected(format!("{status}: {body}")))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn config() -> MailgunConfig {
        MailgunConfig {
            api_key: "key-123".to_string(),
            domain: "mail.example.com".to_string(),
            base_url: "https://api.mailgun.net/v3".to_string(),
        }
    }

    #[test]
    fn test_a_complete_configuration_is_accepted() -> TestResult {
        MailgunSender::new(config())?;

        Ok(())
    }

    #[test]
    fn test_a_missing_domain_is_named_in_the_error() {
        let mut config = config();
        config.domain.clear();

        let result = MailgunSender::new(config);

        assert_eq!(
            result.unwrap_err(),
            AdapterConfigError::MissingField {
                adapter: "mailgun",
                field: "domain",
            }
        );
    }

    #[test]
    fn test_a_missing_api_key_is_named_in_the_error() {
        let mut config = config();
        config.api_key.clear();

        let result = MailgunSender::new(config);

        assert_eq!(
            result.unwrap_err(),
            AdapterConfigError::MissingField {
                adapter: "mailgun",
                field: "api_key",
            }
        );
    }
}
