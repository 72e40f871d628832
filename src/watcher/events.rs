//! Mail event interpretation
//!
//! A server notification is just a count. The provider announces the
//! total mailbox size once when the mailbox is opened, and genuine new
//! mail afterwards; telling the two apart decides between a historical
//! backfill and a live batch fetch.

/// What one notification means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The count equals the freshly queried mailbox total: this is the
    /// provider's initial count announcement, fired once per connection.
    InitialAnnouncement,
    /// Genuinely new messages; fetch exactly this inclusive sequence range.
    NewMail { first: u32, last: u32 },
}

/// Interpret a notified count against the mailbox total re-queried at
/// notification time (never a cached one — the total may have changed
/// between registration and notification).
pub fn interpret(count: u32, total: u32) -> Notification {
    if count == total {
        Notification::InitialAnnouncement
    } else {
        // A count larger than the total cannot name a real range;
        // clamp to the whole mailbox instead of underflowing.
        Notification::NewMail {
            first: total.saturating_sub(count) + 1,
            last: total,
        }
    }
}
