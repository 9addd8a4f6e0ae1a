//! Flow Elements
//!
//! The built-in element kinds for `flow-engine`, the factory that builds
//! them from flow definitions, and the custom-code sandbox.
//!
//! # Categories
//!
//! - **Flow control**: start, end, case and flow select
//! - **Inputs**: chat input, context history, datablocks, constants,
//!   metadata and REST calls
//! - **Utilities**: selector, merger, random values and time
//! - **AI**: free text and structured generation
//! - **On-chain**: view calls and transaction building
//! - **Custom**: user JavaScript in a supervised worker process
//!
//! # Example
//!
//! ```ignore
//! use flow_elements::{setup_extensions, BuiltinElements};
//! use flow_engine::{FlowConfig, FlowExecutor};
//!
//! let config = FlowConfig::from_env()?;
//! let mut extensions = flow_engine::ExecutorExtensions::new();
//! setup_extensions(&mut extensions, &config);
//!
//! let mut executor = FlowExecutor::from_definition(&flow, &BuiltinElements::new(), config)?
//!     .with_extensions(extensions);
//! let result = executor.execute_flow(initial_inputs).await?;
//! ```

pub mod ai;
mod common;
pub mod custom;
pub mod factory;
pub mod flow_control;
pub mod inputs;
pub mod onchain;
pub mod setup;
#[cfg(test)]
mod test_support;
pub mod util;

pub use ai::*;
pub use custom::{CustomElement, SandboxJob, SandboxLimits, SandboxRunner};
pub use factory::BuiltinElements;
pub use flow_control::*;
pub use inputs::*;
pub use onchain::*;
pub use setup::setup_extensions;
pub use util::*;
