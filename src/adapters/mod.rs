pub mod llm;
pub mod openai;
pub mod self_hosted;

pub use openai::OpenAIAdapter;
pub use self_hosted::SelfHostedAdapter;
