//! Input elements
//!
//! Sources of data for a flow: the user's message, earlier turns, fixed
//! values and remote endpoints.

mod chat_input;
mod constants;
mod context_history;
mod datablock;
mod metadata;
mod rest_api;

pub use chat_input::ChatInputElement;
pub use constants::ConstantsElement;
pub use context_history::ContextHistoryElement;
pub use datablock::{parse_csv, DatablockElement};
pub use metadata::MetadataElement;
pub use rest_api::RestApiElement;
