//! Quarantine folder resolution
//!
//! Providers disagree about what the junk folder is called and where it
//! lives. The resolver flattens the LIST response into full path strings
//! and tries a fixed priority list, then trailing path segments, before
//! giving up and creating a top-level `Spam` folder.

use futures::TryStreamExt;
use tracing::{debug, info, warn};

use super::connection::ImapSession;
use crate::error::{Result, WatchError};

/// One entry of the flattened folder hierarchy.
#[derive(Debug, Clone)]
pub struct Folder {
    /// Full path as reported by LIST, e.g. `INBOX/Junk`
    pub path: String,
    /// Hierarchy delimiter reported for this entry
    pub delimiter: Option<String>,
}

/// Candidate names, in priority order. The last entry is Gmail's fixed
/// spam path, which never appears as a plain top-level folder.
const QUARANTINE_CANDIDATES: &[&str] = &["spam", "junk", "junk e-mail", "bulk", "[gmail]/spam"];

/// Folder created when no existing quarantine candidate matches.
const FALLBACK_FOLDER: &str = "Spam";

pub async fn list_folders(session: &mut ImapSession) -> Result<Vec<Folder>> {
    let names: Vec<_> = session
        .list(None, Some("*"))
        .await
        .map_err(|e| WatchError::Transport(format!("LIST failed: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| WatchError::Transport(format!("Failed to collect folders: {}", e)))?;

    let folders: Vec<Folder> = names
        .iter()
        .map(|n| Folder {
            path: n.name().to_string(),
            delimiter: n.delimiter().map(|d| d.to_string()),
        })
        .collect();

    debug!("Listed {} IMAP folders", folders.len());
    Ok(folders)
}

/// Pick the quarantine folder from a flattened hierarchy.
///
/// First pass: case-insensitive exact match on the full path, respecting
/// candidate priority. Second pass: any folder whose last path segment
/// matches a candidate, so `INBOX/Junk` is found on providers that nest
/// the junk folder.
pub fn select_quarantine(folders: &[Folder]) -> Option<String> {
    for candidate in QUARANTINE_CANDIDATES {
        if let Some(folder) = folders
            .iter()
            .find(|f| f.path.eq_ignore_ascii_case(candidate))
        {
            return Some(folder.path.clone());
        }
    }

    for folder in folders {
        let delimiter = folder.delimiter.as_deref().unwrap_or("/");
        let last_segment = folder
            .path
            .rsplit(delimiter)
            .next()
            .unwrap_or(folder.path.as_str());
        if QUARANTINE_CANDIDATES
            .iter()
            .any(|c| last_segment.eq_ignore_ascii_case(c))
        {
            return Some(folder.path.clone());
        }
    }

    None
}

/// Resolve the quarantine folder for this session, creating a top-level
/// `Spam` folder when nothing in the hierarchy matches. Creation failure
/// is tolerated: the usual cause is the folder already existing.
pub async fn ensure_quarantine(session: &mut ImapSession) -> Result<String> {
    let folders = list_folders(session).await?;

    if let Some(path) = select_quarantine(&folders) {
        info!(folder = %path, "Using existing quarantine folder");
        return Ok(path);
    }

    info!(folder = FALLBACK_FOLDER, "No quarantine folder found, creating one");
    if let Err(e) = session.create(FALLBACK_FOLDER).await {
        warn!("CREATE {} failed, assuming it exists: {}", FALLBACK_FOLDER, e);
    }
    Ok(FALLBACK_FOLDER.to_string())
}

/// Move one message by UID into the quarantine folder.
///
/// A failure here is surfaced to the caller: losing track of a flagged
/// message is worse than leaving it in place.
pub async fn quarantine_message(
    session: &mut ImapSession,
    uid: u32,
    folder: &str,
) -> Result<()> {
    session
        .uid_mv(uid.to_string(), folder)
        .await
        .map_err(|e| WatchError::Relocation(format!("UID MOVE {} to {}: {}", uid, folder, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(path: &str) -> Folder {
        Folder {
            path: path.to_string(),
            delimiter: Some("/".to_string()),
        }
    }

    #[test]
    fn exact_match_wins() {
        let folders = vec![folder("INBOX"), folder("Junk"), folder("Archive")];
        assert_eq!(select_quarantine(&folders).as_deref(), Some("Junk"));
    }

    #[test]
    fn priority_order_is_respected() {
        let folders = vec![folder("Junk"), folder("Spam")];
        // "spam" outranks "junk" in the candidate list
        assert_eq!(select_quarantine(&folders).as_deref(), Some("Spam"));
    }

    #[test]
    fn match_is_case_insensitive() {
        let folders = vec![folder("INBOX"), folder("SPAM")];
        assert_eq!(select_quarantine(&folders).as_deref(), Some("SPAM"));
    }

    #[test]
    fn nested_junk_found_by_trailing_segment() {
        let folders = vec![folder("INBOX"), folder("INBOX/Junk"), folder("INBOX/Sent")];
        assert_eq!(select_quarantine(&folders).as_deref(), Some("INBOX/Junk"));
    }

    #[test]
    fn gmail_spam_path_matches_exactly() {
        let folders = vec![folder("INBOX"), folder("[Gmail]/Spam")];
        assert_eq!(select_quarantine(&folders).as_deref(), Some("[Gmail]/Spam"));
    }

    #[test]
    fn dotted_hierarchy_uses_reported_delimiter() {
        let folders = vec![Folder {
            path: "INBOX.Junk".to_string(),
            delimiter: Some(".".to_string()),
        }];
        assert_eq!(select_quarantine(&folders).as_deref(), Some("INBOX.Junk"));
    }

    #[test]
    fn no_match_yields_none() {
        let folders = vec![folder("INBOX"), folder("Archive"), folder("Drafts")];
        assert_eq!(select_quarantine(&folders), None);
    }
}
