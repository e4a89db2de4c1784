//! Outbound mail gateway client.
//!
//! Mail is a best-effort side channel: the gateway is optional, calls are
//! fire-and-forget and a failure never propagates past a log line.

use crate::config::MailConfig;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

pub struct MailClient {
    http: reqwest::Client,
    endpoint: String,
    from_address: String,
}

impl MailClient {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            from_address: config.from_address.clone(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        let request = MailRequest {
            from: &self.from_address,
            to,
            subject,
            body,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("mail gateway returned {}", response.status()));
        }

        tracing::debug!(to = to, subject = subject, "mail handed to gateway");
        Ok(())
    }
}
