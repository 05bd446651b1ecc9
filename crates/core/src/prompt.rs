//! Prompt-generation and identity collaborators.

/// Whether a request came from a private chat or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-on-one conversation.
    Private,
    /// Group conversation with speaker tagging.
    Group,
}

/// Produces system-prompt / user-instruction text when a configuration asks
/// for auto-generated prompts.
pub trait PromptBook: Send + Sync {
    /// Prompt text for an incoming raw message.
    fn generate(&self, message: &str, kind: ChatKind) -> String;
}

/// Resolves a display name from a stored user identifier, used for speaker
/// tags in group history. Implemented by the platform adapter.
pub trait SpeakerNames: Send + Sync {
    /// Display name for a user id.
    fn resolve(&self, user: &str) -> String;
}

/// `()` resolves every user to its raw identifier.
impl SpeakerNames for () {
    fn resolve(&self, user: &str) -> String {
        user.to_owned()
    }
}

const PRIVATE_PROMPT: &str = "You are a friendly conversational companion. \
Reply naturally and concisely in the language the user writes in, and stay \
in character across the whole conversation.";

const GROUP_PROMPT: &str = "You are a friendly conversational companion in a \
group chat. Messages are prefixed with the speaker's name in angle brackets; \
address the current speaker, keep replies short, and never invent messages \
for other members.";

/// Built-in persona templates, selected by chat kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPrompts;

impl PromptBook for BuiltinPrompts {
    fn generate(&self, _message: &str, kind: ChatKind) -> String {
        match kind {
            ChatKind::Private => PRIVATE_PROMPT.to_owned(),
            ChatKind::Group => GROUP_PROMPT.to_owned(),
        }
    }
}
