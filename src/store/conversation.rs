//! Conversation log.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::persist::{load_state, save_state, MemoryPersistence, SharedPersistence};

/// Persistence key of the conversation log.
pub const CHAT_STORAGE_KEY: &str = "ai-chat-storage";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The person chatting.
    User,
    /// The consultant model.
    Ai,
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Author.
    pub role: MessageRole,
    /// Message text (raw model text for AI messages).
    pub content: String,
    /// Set while an AI placeholder awaits the model's reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
    /// Set when the content is a local error notice rather than a model reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ChatMessage {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            is_loading: None,
            is_error: None,
        }
    }

    /// A completed AI message.
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Ai,
            content: content.into(),
            is_loading: None,
            is_error: None,
        }
    }

    /// An empty AI placeholder awaiting the reply.
    #[must_use]
    pub fn loading() -> Self {
        Self {
            role: MessageRole::Ai,
            content: String::new(),
            is_loading: Some(true),
            is_error: None,
        }
    }

    /// True for a pending placeholder.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading.unwrap_or(false)
    }

    /// True for an error notice left in place of a reply.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// True for a completed model reply that can be replayed to the model.
    #[must_use]
    pub fn is_model_reply(&self) -> bool {
        self.role == MessageRole::Ai
            && !self.is_loading()
            && !self.is_error()
            && !self.content.is_empty()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConversationState {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

/// Ordered message log with load-on-init and save-on-change persistence.
///
/// Messages are only ever appended, except that
/// [`update_last_message`](Self::update_last_message) may rewrite the last
/// one. Persistence failures are logged and never surface to callers.
pub struct ConversationStore {
    state: ConversationState,
    persistence: SharedPersistence,
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("messages", &self.state.messages)
            .finish_non_exhaustive()
    }
}

impl ConversationStore {
    /// Loads the persisted log, starting empty when there is none or it is
    /// unreadable.
    pub fn load(persistence: SharedPersistence) -> Self {
        let state = match load_state::<ConversationState>(persistence.as_ref(), CHAT_STORAGE_KEY) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable conversation state");
                ConversationState::default()
            }
        };
        Self { state, persistence }
    }

    /// A store backed by process memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::load(Arc::new(MemoryPersistence::new()))
    }

    /// Appends a message.
    pub fn add_message(&mut self, message: ChatMessage) {
        self.state.messages.push(message);
        self.persist();
    }

    /// Appends the user's message followed by a loading placeholder.
    pub fn begin_turn(&mut self, user_text: impl Into<String>) {
        self.state.messages.push(ChatMessage::user(user_text));
        self.state.messages.push(ChatMessage::loading());
        self.persist();
    }

    /// Replaces the last message's content and clears its loading flag.
    ///
    /// Does nothing on an empty log.
    pub fn update_last_message(&mut self, content: impl Into<String>) {
        let Some(last) = self.state.messages.last_mut() else {
            return;
        };
        last.content = content.into();
        last.is_loading = Some(false);
        self.persist();
    }

    /// Replaces the last message with an error notice.
    ///
    /// The message stays visible in the log but is not a model reply.
    pub fn fail_last_message(&mut self, notice: impl Into<String>) {
        let Some(last) = self.state.messages.last_mut() else {
            return;
        };
        last.content = notice.into();
        last.is_loading = Some(false);
        last.is_error = Some(true);
        self.persist();
    }

    /// User/model pairs that completed successfully, oldest first.
    ///
    /// Exchanges whose reply failed or never arrived are left out.
    #[must_use]
    pub fn completed_exchanges(&self) -> Vec<(&ChatMessage, &ChatMessage)> {
        let mut exchanges = Vec::new();
        let mut pending_user = None;
        for message in &self.state.messages {
            match message.role {
                MessageRole::User => pending_user = Some(message),
                MessageRole::Ai => {
                    if let Some(user) = pending_user.take() {
                        if message.is_model_reply() {
                            exchanges.push((user, message));
                        }
                    }
                }
            }
        }
        exchanges
    }

    /// Removes every message.
    pub fn clear(&mut self) {
        self.state.messages.clear();
        self.persist();
    }

    /// Messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.state.messages
    }

    /// True while the last message is a pending placeholder.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.state
            .messages
            .last()
            .is_some_and(ChatMessage::is_loading)
    }

    fn persist(&self) {
        if let Err(e) = save_state(self.persistence.as_ref(), CHAT_STORAGE_KEY, &self.state) {
            warn!(error = %e, "Failed to persist conversation");
        }
    }
}
