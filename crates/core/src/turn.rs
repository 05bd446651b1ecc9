//! One conversation exchange.

use chrono::Local;
use compact_str::CompactString;

/// Timestamp format used for turn times.
///
/// Lexicographic order matches chronological order, and the date prefix is
/// what daily usage aggregation matches on.
pub const TIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// One user-message/model-reply exchange.
///
/// Created by the orchestrator after a successful backend call and owned by
/// the history store from then on. Excluded from history by clearing
/// `history` (soft delete); only `remove_last` deletes a turn physically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Local timestamp, formatted with [`TIME_FORMAT`].
    pub time: String,

    /// User identifier.
    pub user: CompactString,

    /// Group identifier, `None` for private chats.
    pub group: Option<CompactString>,

    /// The user's input text.
    pub message: String,

    /// The model's answer (reasoning stripped).
    pub reply: String,

    /// Paths of images referenced by the input.
    pub images: Vec<String>,

    /// Whether the turn counts toward history retrieval.
    pub history: bool,

    /// Token usage for the exchange, `None` when unknown.
    pub tokens: Option<u32>,
}

impl Turn {
    /// Create a turn stamped with the current local time.
    pub fn new(
        user: impl Into<CompactString>,
        group: Option<&str>,
        message: impl Into<String>,
        reply: impl Into<String>,
        images: Vec<String>,
        tokens: Option<u32>,
    ) -> Self {
        Self {
            time: Local::now().format(TIME_FORMAT).to_string(),
            user: user.into(),
            group: group.map(CompactString::from),
            message: message.into(),
            reply: reply.into(),
            images,
            history: true,
            tokens,
        }
    }
}
