use tracing::debug;

use crate::adapters::llm::{LLMAdapter, LLMResponse};
use crate::core::{Conversation, Message, ReviewError};

/// `Seeded -> Reviewed -> Chatting* -> Closed`.
///
/// `Closed` is also entered from `Seeded` when the review request itself
/// fails, so a session whose first request errored cannot be restarted.
/// `close()` is otherwise only called once the review has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Seeded,
    Reviewed,
    Chatting,
    Closed,
}

/// Review followed by optional chat turns over the same conversation.
///
/// Every request resends the full history. A failed request closes the
/// session.
pub struct ReviewSession {
    adapter: Box<dyn LLMAdapter>,
    conversation: Conversation,
    state: SessionState,
}

impl ReviewSession {
    pub fn new(adapter: Box<dyn LLMAdapter>, conversation: Conversation) -> Self {
        Self {
            adapter,
            conversation,
            state: SessionState::Seeded,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Send the seeded prompt and record the review.
    pub async fn start(&mut self) -> Result<LLMResponse, ReviewError> {
        if self.state != SessionState::Seeded {
            return Err(ReviewError::InvalidState(format!(
                "review already started (state: {:?})",
                self.state
            )));
        }
        let response = self.exchange().await?;
        self.state = SessionState::Reviewed;
        Ok(response)
    }

    /// Ask a follow-up question about the review.
    pub async fn turn(&mut self, user_text: &str) -> Result<LLMResponse, ReviewError> {
        match self.state {
            SessionState::Reviewed | SessionState::Chatting => {}
            state => {
                return Err(ReviewError::InvalidState(format!(
                    "cannot chat in state {state:?}"
                )))
            }
        }
        self.conversation.push(Message::user(user_text));
        let response = self.exchange().await?;
        self.state = SessionState::Chatting;
        Ok(response)
    }

    pub fn close(&mut self) {
        debug_assert_ne!(self.state, SessionState::Seeded, "closing before the review");
        self.state = SessionState::Closed;
    }

    async fn exchange(&mut self) -> Result<LLMResponse, ReviewError> {
        debug!(
            "Sending {} messages to {}",
            self.conversation.len(),
            self.adapter.model_name()
        );
        match self.adapter.complete(&self.conversation).await {
            Ok(response) => {
                self.conversation
                    .push(Message::assistant(response.content.clone()));
                Ok(response)
            }
            Err(err) => {
                self.state = SessionState::Closed;
                Err(err)
            }
        }
    }
}
