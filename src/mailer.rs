// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound email for verification and password-reset codes.
//!
//! Delivery goes through an HTTP mail relay when `MAIL_RELAY_URL` is set.
//! Without a relay the [`LogMailer`] only records that a message would have
//! been sent; the code itself is never logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::MailSettings;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Request(String),

    #[error("mail relay rejected message: {0}")]
    Rejected(String),
}

/// One outgoing message.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutgoingMail {
    /// Message carrying a one-time code.
    pub fn verification_code(to: &str, user_name: &str, code: &str, subject: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            text: format!("Hi {user_name}, your verification code is {code}"),
            html: format!(
                "Hi {user_name},<br/> Thanks for contacting our support!<br/><br/> \
                 Your verification code is {code}<br/><br/>"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Builds the mailer selected by configuration.
pub fn mailer_from_settings(settings: &MailSettings) -> Result<Box<dyn Mailer>, MailError> {
    match &settings.relay_url {
        Some(url) => Ok(Box::new(RelayMailer::new(
            url.clone(),
            settings.relay_token.clone(),
            settings.from.clone(),
        )?)),
        None => {
            tracing::warn!("MAIL_RELAY_URL not set; emails will only be logged");
            Ok(Box::new(LogMailer))
        }
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct RelayMailer {
    http: Client,
    url: url::Url,
    token: Option<String>,
    from: String,
}

impl RelayMailer {
    pub fn new(url: url::Url, token: Option<String>, from: String) -> Result<Self, MailError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MailError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url,
            token,
            from,
        })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let mut request = self.http.post(self.url.clone()).json(&RelayRequest {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.text,
            html: &mail.html,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{status}: {body}")));
        }

        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail sent via relay");
        Ok(())
    }
}

/// Development mailer that drops messages after logging their envelope.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail not sent (no relay configured)");
        Ok(())
    }
}
