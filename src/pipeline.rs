//! Classification and relocation pipeline
//!
//! Both live batches and backfill scans converge here: normalize the
//! body, ask the classifier, and move the message into quarantine when
//! its probability meets the account threshold.

use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::config::AccountConfig;
use crate::error::Result;
use crate::imap::{folders, ImapSession, MessageEnvelope};

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Quarantined,
    Legitimate,
}

/// Run one message through classification and, when flagged, relocation.
///
/// Classification cannot fail (the classifier fails soft); a relocation
/// failure is surfaced to the caller, which logs it and moves on to the
/// next message of the batch.
pub async fn process_message(
    session: &mut ImapSession,
    message: &MessageEnvelope,
    classifier: &Classifier,
    account: &AccountConfig,
    quarantine: &str,
) -> Result<Outcome> {
    let body = normalize_body(&message.text, account.max_body_chars);
    let verdict = classifier
        .classify(&message.from, &message.subject, &body)
        .await;

    debug!(
        account = %account.label,
        uid = message.uid,
        probability = verdict.scam_probability,
        reason = verdict.reason.as_deref().unwrap_or(""),
        "Message classified"
    );

    if !should_quarantine(verdict.scam_probability, account.scam_threshold) {
        return Ok(Outcome::Legitimate);
    }

    folders::quarantine_message(session, message.uid, quarantine).await?;
    info!(
        account = %account.label,
        uid = message.uid,
        from = %message.from,
        probability = verdict.scam_probability,
        "Message moved to quarantine"
    );
    Ok(Outcome::Quarantined)
}

/// Run the pipeline over a whole batch, in the given order. Per-message
/// failures are logged with the affected UID and do not abort the batch;
/// no message is retried. Returns how many messages were quarantined.
pub async fn process_batch(
    session: &mut ImapSession,
    messages: &[MessageEnvelope],
    classifier: &Classifier,
    account: &AccountConfig,
    quarantine: &str,
) -> usize {
    let mut quarantined = 0;
    for message in messages {
        match process_message(session, message, classifier, account, quarantine).await {
            Ok(Outcome::Quarantined) => quarantined += 1,
            Ok(Outcome::Legitimate) => {}
            Err(e) => {
                warn!(
                    account = %account.label,
                    uid = message.uid,
                    "Message not processed: {}",
                    e
                );
            }
        }
    }
    quarantined
}

pub fn should_quarantine(probability: u8, threshold: u8) -> bool {
    probability >= threshold
}

/// Collapse control characters and whitespace runs to single spaces and
/// truncate to at most `max_chars` characters before the classifier call.
pub fn normalize_body(text: &str, max_chars: usize) -> String {
    let mut normalized = String::with_capacity(text.len().min(max_chars));
    let mut chars = 0;
    let mut last_was_space = true;

    for c in text.chars() {
        if chars >= max_chars {
            break;
        }
        if c.is_whitespace() || c.is_control() {
            if !last_was_space {
                normalized.push(' ');
                chars += 1;
                last_was_space = true;
            }
        } else {
            normalized.push(c);
            chars += 1;
            last_was_space = false;
        }
    }

    while normalized.ends_with(' ') {
        normalized.pop();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        assert!(should_quarantine(92, 80));
        assert!(should_quarantine(80, 80));
        assert!(!should_quarantine(50, 80));
        assert!(!should_quarantine(79, 80));
    }

    #[test]
    fn normalize_collapses_whitespace_and_controls() {
        let body = "Dear\r\n\r\n  friend,\t\tsend\u{0007} money";
        assert_eq!(normalize_body(body, 3000), "Dear friend, send money");
    }

    #[test]
    fn normalize_truncates_after_collapsing() {
        let body = "a  b  c  d";
        assert_eq!(normalize_body(body, 3), "a b");
    }

    #[test]
    fn normalize_strips_trailing_space() {
        assert_eq!(normalize_body("hello   ", 3000), "hello");
    }
}
