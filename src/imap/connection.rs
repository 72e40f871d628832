use async_imap::types::Mailbox;
use async_imap::Session;
use async_native_tls::TlsStream;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::AccountConfig;
use crate::error::{Result, WatchError};

// This type alias saves us from writing this monster type everywhere.
// An IMAP session is generic over the stream type — in our case,
// it's TLS-encrypted TCP.
pub type ImapSession = Session<TlsStream<TcpStream>>;

/// Open a transport session, authenticate, and select the watched mailbox.
///
/// Returns the authenticated session together with the SELECT response,
/// whose `exists` count is the mailbox total at the moment of connecting.
/// No recovery happens here: every failure propagates to the caller, which
/// decides between stopping (authentication) and backing off (everything
/// else).
pub async fn connect(account: &AccountConfig) -> Result<(ImapSession, Mailbox)> {
    if !account.tls {
        return Err(WatchError::Config(format!(
            "account {}: plain connections are not supported, set tls = true",
            account.label
        )));
    }

    info!(host = %account.host, port = account.port, "Connecting to IMAP server");

    let tcp = TcpStream::connect((account.host.as_str(), account.port))
        .await
        .map_err(|e| WatchError::Transport(format!("TCP connection failed: {}", e)))?;

    let tls = async_native_tls::TlsConnector::new();
    let tls_stream = tls
        .connect(account.host.as_str(), tcp)
        .await
        .map_err(|e| WatchError::Transport(format!("TLS handshake failed: {}", e)))?;

    let client = async_imap::Client::new(tls_stream);

    // A NO/BAD on LOGIN means the credentials are wrong, not that the
    // network hiccupped. The caller must not retry it.
    let mut session = client
        .login(&account.email, &account.password)
        .await
        .map_err(|(e, _)| WatchError::Auth(format!("LOGIN failed: {}", e)))?;

    let mailbox = session
        .select(&account.mailbox)
        .await
        .map_err(|e| WatchError::Transport(format!("SELECT failed: {}", e)))?;

    debug!(
        mailbox = %account.mailbox,
        exists = mailbox.exists,
        "Mailbox selected"
    );

    Ok((session, mailbox))
}

/// Re-issue SELECT on the watched mailbox and return the fresh state.
///
/// Doubles as the keepalive no-op: a periodic reopen defeats provider-side
/// idle timeouts, and its `exists` count is the re-queried mailbox total
/// used to interpret notifications.
pub async fn reopen(session: &mut ImapSession, mailbox: &str) -> Result<Mailbox> {
    session
        .select(mailbox)
        .await
        .map_err(|e| WatchError::Transport(format!("SELECT failed: {}", e)))
}
