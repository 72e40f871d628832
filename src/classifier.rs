//! External scam classifier client
//!
//! The classifier is a remote HTTP service and must fail soft: any
//! transport, status or decode error yields probability 0 with a
//! diagnostic reason, so a classifier outage never blocks the watcher —
//! messages simply stay where they are.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    from: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Verdict for one message.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationResult {
    /// Scam likelihood, 0-100
    pub scam_probability: u8,
    /// Optional diagnostic, also used to report classifier outages
    #[serde(default)]
    pub reason: Option<String>,
}

pub struct Classifier {
    http: reqwest::Client,
    url: String,
}

impl Classifier {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }

    /// Classify one message. Never returns an error.
    pub async fn classify(&self, from: &str, subject: &str, body: &str) -> ClassificationResult {
        let request = ClassifyRequest { from, subject, body };

        let outcome = async {
            self.http
                .post(&self.url)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<ClassificationResult>()
                .await
        }
        .await;

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("Classifier unavailable, leaving message in place: {}", e);
                ClassificationResult {
                    scam_probability: 0,
                    reason: Some(format!("classifier unavailable: {}", e)),
                }
            }
        }
    }
}
