//! scamwatch - resilient IMAP scam-quarantine watcher
//!
//! Keeps one long-lived authenticated session per configured account,
//! classifies new and historical mail through an external scam
//! classifier, and moves flagged messages into the provider's
//! quarantine folder.
//!
//! ## Module Organization
//!
//! - `config`: TOML configuration loading
//! - `error`: unified error taxonomy
//! - `imap`: transport glue (connection, folders, message parsing)
//! - `watcher`: connection lifecycle, event interpretation, backfill,
//!   reconnect backoff
//! - `pipeline`: shared classification + relocation pipeline
//! - `classifier`: external classifier HTTP client
//! - `watermark`: persisted per-account progress

pub mod classifier;
pub mod config;
pub mod error;
pub mod imap;
pub mod pipeline;
pub mod watcher;
pub mod watermark;
