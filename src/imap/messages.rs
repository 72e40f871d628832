//! Message search, fetch and parsing
//!
//! Raw FETCH results are parsed with `mailparse` into the one shape the
//! pipeline consumes. Individual unparseable responses are logged and
//! skipped so a single odd message never sinks a whole batch.

use async_imap::types::Fetch;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use mailparse::MailHeaderMap;
use tracing::{debug, warn};

use super::connection::ImapSession;
use crate::error::{Result, WatchError};

/// One fetched message, consumed exactly once by the pipeline.
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    /// Server-assigned identifier
    pub uid: u32,
    pub subject: String,
    pub from: String,
    /// Server internal date when available, else the Date header, else now
    pub date: DateTime<Utc>,
    /// Plain-text body; falls back to the raw HTML part when no text part exists
    pub text: String,
    pub has_html: bool,
}

const FETCH_QUERY: &str = "(UID INTERNALDATE BODY.PEEK[])";

/// Collects a FETCH stream tolerantly — logs and skips individual
/// responses that fail to parse. Returns all successfully parsed items.
async fn collect_tolerant<E: std::fmt::Display>(
    stream: impl futures::Stream<Item = std::result::Result<Fetch, E>>,
    context: &str,
) -> Vec<Fetch> {
    futures::pin_mut!(stream);
    let mut items = Vec::new();
    while let Some(result) = stream.next().await {
        match result {
            Ok(fetch) => items.push(fetch),
            Err(e) => {
                warn!("Skipping unparseable IMAP response ({}): {}", context, e);
            }
        }
    }
    items
}

/// Format an instant the way IMAP SEARCH wants dates: `08-Feb-2025`.
/// SEARCH only has day precision; callers re-filter by exact instant.
pub fn imap_date(instant: DateTime<Utc>) -> String {
    instant.format("%d-%b-%Y").to_string()
}

/// UID SEARCH for all messages since the given day (or the entire mailbox
/// when absent), newest first.
pub async fn search_since(
    session: &mut ImapSession,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<u32>> {
    let query = match since {
        Some(instant) => format!("SINCE {}", imap_date(instant)),
        None => "ALL".to_string(),
    };

    let uid_set = session
        .uid_search(&query)
        .await
        .map_err(|e| WatchError::Transport(format!("SEARCH failed: {}", e)))?;

    let uids = newest_first_uids(uid_set.into_iter().collect());

    debug!(query = %query, matched = uids.len(), "UID SEARCH complete");
    Ok(uids)
}

/// UIDs grow with arrival order, so descending UID is newest-first.
fn newest_first_uids(mut uids: Vec<u32>) -> Vec<u32> {
    uids.sort_unstable();
    uids.reverse();
    uids
}

/// Batches and scans process messages newest-first.
fn sort_newest_first(messages: &mut [MessageEnvelope]) {
    messages.sort_unstable_by(|a, b| b.uid.cmp(&a.uid));
}

/// Fetch and parse a batch of messages by UID, newest first.
pub async fn fetch_uids(session: &mut ImapSession, uids: &[u32]) -> Result<Vec<MessageEnvelope>> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let uid_list: String = uids
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let fetches = collect_tolerant(
        session
            .uid_fetch(&uid_list, FETCH_QUERY)
            .await
            .map_err(|e| WatchError::Transport(format!("FETCH failed: {}", e)))?,
        "uid batch",
    )
    .await;

    Ok(parse_batch(&fetches))
}

/// Fetch and parse an inclusive sequence range, newest first.
pub async fn fetch_range(
    session: &mut ImapSession,
    first: u32,
    last: u32,
) -> Result<Vec<MessageEnvelope>> {
    let range = format!("{}:{}", first, last);

    let fetches = collect_tolerant(
        session
            .fetch(&range, FETCH_QUERY)
            .await
            .map_err(|e| WatchError::Transport(format!("FETCH {} failed: {}", range, e)))?,
        "sequence batch",
    )
    .await;

    Ok(parse_batch(&fetches))
}

fn parse_batch(fetches: &[Fetch]) -> Vec<MessageEnvelope> {
    let mut messages: Vec<MessageEnvelope> = fetches
        .iter()
        .filter_map(|fetch| match parse_message(fetch) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping message: {}", e);
                None
            }
        })
        .collect();

    // Server order is oldest-first.
    sort_newest_first(&mut messages);
    messages
}

/// Parse one FETCH response into an envelope.
fn parse_message(fetch: &Fetch) -> Result<MessageEnvelope> {
    let uid = fetch
        .uid
        .ok_or_else(|| WatchError::Parse("FETCH response without UID".into()))?;
    let raw = fetch
        .body()
        .ok_or_else(|| WatchError::Parse(format!("uid {}: FETCH response without body", uid)))?;

    let mail = mailparse::parse_mail(raw)
        .map_err(|e| WatchError::Parse(format!("uid {}: {}", uid, e)))?;

    // get_first_value decodes RFC 2047 encoded words for us
    let subject = mail
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();
    let from = mail.headers.get_first_value("From").unwrap_or_default();

    let date = fetch
        .internal_date()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| header_date(&mail))
        .unwrap_or_else(Utc::now);

    let text_part = find_part(&mail, "text/plain");
    let html_part = find_part(&mail, "text/html");
    let has_html = html_part.is_some();

    let text = text_part
        .or(html_part)
        .and_then(|part| part.get_body().ok())
        .unwrap_or_default();

    Ok(MessageEnvelope {
        uid,
        subject,
        from,
        date,
        text,
        has_html,
    })
}

fn header_date(mail: &mailparse::ParsedMail<'_>) -> Option<DateTime<Utc>> {
    let value = mail.headers.get_first_value("Date")?;
    let epoch = mailparse::dateparse(&value).ok()?;
    Utc.timestamp_opt(epoch, 0).single()
}

fn find_part<'a, 'b>(
    mail: &'a mailparse::ParsedMail<'b>,
    mimetype: &str,
) -> Option<&'a mailparse::ParsedMail<'b>> {
    if mail.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return Some(mail);
    }
    for part in &mail.subparts {
        if let Some(found) = find_part(part, mimetype) {
            return Some(found);
        }
    }
    None
}
