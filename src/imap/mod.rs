//! IMAP transport glue: connection setup, folder resolution, and
//! message search/fetch/parsing. The watcher owns the session handle;
//! everything here operates through a borrowed `&mut ImapSession`.

pub mod connection;
pub mod folders;
pub mod messages;

pub use connection::{connect, reopen, ImapSession};
pub use messages::MessageEnvelope;
