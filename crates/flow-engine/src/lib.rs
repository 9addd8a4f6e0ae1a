//! Flow Engine - dependency-graph workflow execution
//!
//! This crate runs flows: directed graphs of elements with a designated
//! start element, assembled fresh for every request. It provides:
//!
//! - Depth-first execution with dependency pulling and memoised outputs
//! - Per-edge gates that branching elements open and close at runtime
//! - Ordered event envelopes delivered to a pluggable [`StreamSink`]
//! - Schema validation of element inputs and outputs
//!
//! # Architecture
//!
//! - `FlowGraph`: arena of elements and edges built from a [`FlowDefinition`]
//! - `FlowExecutor`: one run over a graph; discarded afterwards
//! - `Element`: the contract every element kind implements
//! - `StreamSink`: websocket push, in-process queue, or duplex writer
//!
//! Concrete element kinds live in the `flow-elements` crate.
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{FlowBuilder, FlowConfig, FlowExecutor, ElementKind};
//!
//! let flow = FlowBuilder::new("hello")
//!     .element("start", ElementKind::Start)
//!     .element("end", ElementKind::End)
//!     .connect("start", "end")
//!     .build();
//!
//! let mut executor = FlowExecutor::from_definition(&flow, &factory, FlowConfig::default())?;
//! let result = executor.execute_flow(Default::default()).await?;
//! ```

pub mod builder;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod element;
pub mod error;
pub mod events;
pub mod executor;
pub mod extensions;
pub mod graph;
pub mod schema;
pub mod streaming;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::FlowBuilder;
pub use collaborators::{ChainProvider, GenerationRequest, TextGenerator};
pub use config::FlowConfig;
pub use context::ExecutionContext;
pub use element::{Element, ElementCore, ValueMap};
pub use error::{AssemblyError, FlowError, FlowRunError, ResourceLimit, Result};
pub use events::{event_types, EventEmitter, FlowEvent};
pub use executor::{FlowExecutor, FlowResult};
pub use extensions::{extension_keys, ExecutorExtensions};
pub use graph::{BranchGates, Edge, EdgeIndex, ElementFactory, FlowGraph, NodeIndex};
pub use schema::{FieldSpec, FieldType, Schema};
pub use streaming::{ReconnectPolicy, RecordingSink, StreamSink};
pub use types::{
    ConnectionDefinition, ElementCategory, ElementDefinition, ElementId, ElementKind,
    FlowDefinition,
};
pub use validation::validate_definition;
