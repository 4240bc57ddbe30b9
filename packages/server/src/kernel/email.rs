//! Email notifications via Resend.
//!
//! Sends two kinds of mail: "your results are ready" on completion and
//! "we need a bit more input" when a search exhausts its batch budget.
//! Delivery failure is the caller's problem to swallow, not the job's.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::traits::Mailer;

const RESEND_URL: &str = "https://api.resend.com/emails";

pub struct ResendMailer {
    http_client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let response = self
            .http_client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .context("email request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("email delivery failed ({status}): {body}");
        }

        info!(to, subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_results_ready(&self, to: &str, job_id: &str, good_count: i64) -> Result<()> {
        let subject = "Your domain search results are ready";
        let html = format!(
            "<p>Good news! We found {good_count} strong domain options for you.</p>\
             <p>Search reference: <code>{job_id}</code></p>"
        );
        self.send(to, subject, &html).await
    }

    async fn send_followup_request(&self, to: &str, job_id: &str) -> Result<()> {
        let subject = "A few more questions about your domain search";
        let html = format!(
            "<p>We searched widely but need a little more direction to find \
             names you'll love. Answer three quick questions to continue.</p>\
             <p>Search reference: <code>{job_id}</code></p>"
        );
        self.send(to, subject, &html).await
    }
}
