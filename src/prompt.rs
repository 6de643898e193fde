use crate::MAX_REPLY_CHARS;
use regex::Regex;
use std::sync::LazyLock;

/// Special markup tokens such as `<|im_end|>` or `<|endoftext|>`.
static SPECIAL_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\|[^>]*\|>").unwrap());

/// Characters kept when a reply is cut, leaving room for the ellipsis.
const TRUNCATED_CHARS: usize = 3990;
const ELLIPSIS: char = '…';

/// The role of one turn in a chat prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// The `PromptBuilder` struct assembles a ChatML prompt from a system instruction
/// and a user message, ending with an open assistant turn for the model to complete.
pub struct PromptBuilder {
    /// The turns of the conversation, in order.
    turns: Vec<(Role, String)>,
}

impl PromptBuilder {
    /// Creates a new `PromptBuilder` starting with the given system instruction.
    ///
    /// # Arguments
    ///
    /// * `system` - The instruction describing how the assistant should behave.
    ///
    /// # Returns
    ///
    /// A new instance of `PromptBuilder`.
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            turns: vec![(Role::System, system.into())],
        }
    }

    /// Adds a user message to the prompt.
    pub fn with_user(mut self, text: impl Into<String>) -> Self {
        self.turns.push((Role::User, text.into()));
        self
    }

    /// Builds the prompt string in the ChatML format used by Qwen instruct models.
    ///
    /// # Returns
    ///
    /// The formatted prompt, ending with `<|im_start|>assistant\n`.
    pub fn build(&self) -> String {
        let mut prompt = self
            .turns
            .iter()
            .map(|(role, content)| format!("<|im_start|>{}\n{}<|im_end|>\n", role.as_str(), content))
            .collect::<String>();

        prompt.push_str("<|im_start|>assistant\n");
        prompt
    }
}

/// Cleans raw model output into a reply that can be sent to a chat.
///
/// Special markup tokens are removed and surrounding whitespace trimmed. Replies
/// longer than 4000 characters are cut to their first 3990 characters and end
/// with an ellipsis.
pub fn postprocess(text: &str) -> String {
    let mut cleaned = SPECIAL_TAGS.replace_all(text, "").into_owned();
    // Removing one tag can join its neighbours into another.
    while SPECIAL_TAGS.is_match(&cleaned) {
        cleaned = SPECIAL_TAGS.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= MAX_REPLY_CHARS {
        return cleaned.to_string();
    }

    let mut truncated = cleaned
        .chars()
        .take(TRUNCATED_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string();
    truncated.push(ELLIPSIS);
    truncated
}
