pub mod conversation;
pub mod error;
pub mod git;
pub mod prompt;
pub mod pull_request;
pub mod session;

pub use conversation::{Conversation, Message};
pub use error::ReviewError;
pub use git::{DiffBundle, DiffOptions, GitIntegration};
pub use prompt::{PromptBuilder, PromptConfig};
pub use pull_request::{PullRequestInfo, PullRequestRef, RevisionRange};
pub use session::ReviewSession;
