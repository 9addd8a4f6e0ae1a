//! The element contract
//!
//! An element is one unit of computation in a flow. Concrete kinds live in
//! the `flow-elements` crate; the engine only sees them through the
//! [`Element`] trait and the shared [`ElementCore`] state every kind embeds.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::schema::{self, Direction, Schema};
use crate::types::{ElementDefinition, ElementId, ElementKind};

/// Field name → value, in insertion order
pub type ValueMap = serde_json::Map<String, Value>;

/// State shared by every element kind.
///
/// Created fresh for each run and mutated only by that run.
#[derive(Debug, Clone)]
pub struct ElementCore {
    pub id: ElementId,
    pub kind: ElementKind,
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    pub inputs: ValueMap,
    pub outputs: ValueMap,
    pub executed: bool,
    /// When false, the executor does not propagate past this element at all
    pub downwards_execute: bool,
}

impl ElementCore {
    pub fn new(id: impl Into<ElementId>, kind: ElementKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            description: String::new(),
            input_schema: Schema::new(),
            output_schema: Schema::new(),
            inputs: ValueMap::new(),
            outputs: ValueMap::new(),
            executed: false,
            downwards_execute: true,
        }
    }

    /// Build the shared state from a flow definition entry.
    ///
    /// A `downwards_execute` parameter, when present and boolean, seeds the
    /// element-level propagation flag.
    pub fn from_definition(kind: ElementKind, def: &ElementDefinition) -> Self {
        Self {
            id: def.element_id.clone(),
            kind,
            name: def.name.clone(),
            description: def.description.clone(),
            input_schema: def.input_schema.clone(),
            output_schema: def.output_schema.clone(),
            inputs: ValueMap::new(),
            outputs: ValueMap::new(),
            executed: false,
            downwards_execute: def
                .params
                .get("downwards_execute")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        }
    }

    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = schema;
        self
    }

    /// Overwrite one input value.
    pub fn set_input(&mut self, name: impl Into<String>, value: Value) {
        self.inputs.insert(name.into(), value);
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// Input value, falling back to the schema default when absent.
    pub fn input_or_default(&self, name: &str) -> Option<Value> {
        self.inputs.get(name).cloned().or_else(|| {
            self.input_schema
                .get(name)
                .and_then(|spec| spec.default.clone())
        })
    }

    pub fn get_output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Replace the outputs and hand back a copy for the caller.
    pub fn set_outputs(&mut self, outputs: ValueMap) -> ValueMap {
        self.outputs = outputs;
        self.outputs.clone()
    }

    /// True iff every required input is present
    pub fn validate_inputs(&self) -> bool {
        schema::required_present(&self.inputs, &self.input_schema)
    }

    /// True iff every required output is present
    pub fn validate_outputs(&self) -> bool {
        schema::required_present(&self.outputs, &self.output_schema)
    }

    /// Full input check, naming every missing or mismatched field.
    pub fn check_inputs(&self) -> Result<()> {
        let problems = schema::validate_fields(&self.inputs, &self.input_schema, Direction::Input);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(FlowError::validation(&self.id, problems))
        }
    }

    /// Full output check, naming every missing or mismatched field.
    pub fn check_outputs(&self) -> Result<()> {
        let problems =
            schema::validate_fields(&self.outputs, &self.output_schema, Direction::Output);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(FlowError::validation(&self.id, problems))
        }
    }
}

/// Capability interface implemented by every element kind.
///
/// `execute` validates inputs first, does the element's work, stores the
/// result in the core's `outputs` and returns it. Elements do not guard
/// against re-entrant execution; the executor's cache provides
/// exactly-once semantics.
#[async_trait]
pub trait Element: Send + Sync {
    fn core(&self) -> &ElementCore;

    fn core_mut(&mut self) -> &mut ElementCore;

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap>;

    fn id(&self) -> &str {
        &self.core().id
    }

    fn kind(&self) -> ElementKind {
        self.core().kind
    }

    fn validate_inputs(&self) -> bool {
        self.core().validate_inputs()
    }

    fn validate_outputs(&self) -> bool {
        self.core().validate_outputs()
    }
}
