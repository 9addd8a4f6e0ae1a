//! Per-element view of the running flow

use serde_json::Value;

use crate::config::FlowConfig;
use crate::events::EventEmitter;
use crate::extensions::ExecutorExtensions;
use crate::graph::BranchGates;

/// What an element may see and touch while it executes.
///
/// Lent by the executor for the duration of one `execute` call.
pub struct ExecutionContext<'a> {
    flow_id: &'a str,
    config: &'a FlowConfig,
    emitter: &'a EventEmitter,
    extensions: &'a ExecutorExtensions,
    gates: BranchGates<'a>,
    backtracking: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        flow_id: &'a str,
        config: &'a FlowConfig,
        emitter: &'a EventEmitter,
        extensions: &'a ExecutorExtensions,
        gates: BranchGates<'a>,
        backtracking: bool,
    ) -> Self {
        Self {
            flow_id,
            config,
            emitter,
            extensions,
            gates,
            backtracking,
        }
    }

    pub fn flow_id(&self) -> &str {
        self.flow_id
    }

    pub fn config(&self) -> &FlowConfig {
        self.config
    }

    pub fn extensions(&self) -> &ExecutorExtensions {
        self.extensions
    }

    /// Whether this element is being pulled in as a prerequisite
    pub fn is_backtracking(&self) -> bool {
        self.backtracking
    }

    /// Whether events reach an observer
    pub fn is_streaming(&self) -> bool {
        self.emitter.is_attached()
    }

    pub fn emitter(&self) -> &EventEmitter {
        self.emitter
    }

    /// Gates of the element's outgoing edges
    pub fn gates(&mut self) -> &mut BranchGates<'a> {
        &mut self.gates
    }

    /// Send a diagnostic event; delivery failures are only logged.
    pub async fn emit(&self, event_type: &str, data: Value) {
        self.emitter.emit(event_type, data).await;
    }
}
