//! Text generation elements
//!
//! Both kinds call the `text_generator` service from the run's extensions;
//! the engine itself knows nothing about model providers.

mod llm_structured;
mod llm_text;
#[cfg(test)]
pub(crate) mod testing;

pub use llm_structured::{parse_json_reply, LlmStructuredElement};
pub use llm_text::LlmTextElement;
