//! User-supplied code
//!
//! [`CustomElement`] hands its script to a [`SandboxRunner`], which runs it in
//! the `flow-sandbox-worker` binary under memory and time ceilings. The
//! worker side lives in [`interpreter`].

pub mod interpreter;
mod element;
mod sandbox;

pub use element::CustomElement;
pub use interpreter::{run_job, SandboxJob, WorkerError, WorkerReply};
pub use sandbox::{SandboxLimits, SandboxRunner, WORKER_BINARY};
