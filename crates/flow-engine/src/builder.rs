//! Fluent builder for flow definitions
//!
//! Provides a fluent API for constructing flows programmatically.

use serde_json::Value;

use crate::error::AssemblyError;
use crate::schema::FieldSpec;
use crate::types::{ConnectionDefinition, ElementDefinition, ElementKind, FlowDefinition};
use crate::validation::validate_definition;

/// Fluent builder for constructing flow definitions
///
/// # Example
///
/// ```ignore
/// let flow = FlowBuilder::new("greeting")
///     .element("start", ElementKind::Start)
///     .element("end", ElementKind::End)
///     .with_input("text_input", FieldSpec::required(FieldType::String))
///     .connect("start", "end")
///     .build();
/// ```
pub struct FlowBuilder {
    flow_id: String,
    elements: Vec<ElementDefinition>,
    connections: Vec<ConnectionDefinition>,
    start: Option<String>,
}

impl FlowBuilder {
    /// Create a new flow builder
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            elements: Vec::new(),
            connections: Vec::new(),
            start: None,
        }
    }

    /// Add an element to the flow
    ///
    /// The first element added is the start element unless `start` says
    /// otherwise.
    pub fn element(mut self, id: impl Into<String>, kind: ElementKind) -> Self {
        self.elements.push(ElementDefinition::new(id, kind));
        self
    }

    /// Merge type-specific parameters into the most recently added element
    ///
    /// Non-object values are ignored.
    pub fn with_params(mut self, params: Value) -> Self {
        if let (Some(def), Value::Object(map)) = (self.elements.last_mut(), params) {
            def.params.extend(map);
        }
        self
    }

    /// Declare an input field on the most recently added element
    pub fn with_input(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        if let Some(def) = self.elements.last_mut() {
            def.input_schema.insert(name.into(), spec);
        }
        self
    }

    /// Declare an output field on the most recently added element
    pub fn with_output(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        if let Some(def) = self.elements.last_mut() {
            def.output_schema.insert(name.into(), spec);
        }
        self
    }

    /// Add a connection between two elements
    pub fn connect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connections.push(ConnectionDefinition {
            from_id: from.into(),
            to_id: to.into(),
            ..Default::default()
        });
        self
    }

    /// Add a connection carrying a branch label
    pub fn connect_branch(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        self.connections.push(ConnectionDefinition {
            from_id: from.into(),
            to_id: to.into(),
            branch: Some(branch.into()),
            ..Default::default()
        });
        self
    }

    /// Set the initial gate on the most recently added connection
    pub fn with_gate(mut self, enabled: bool) -> Self {
        if let Some(conn) = self.connections.last_mut() {
            conn.enabled = Some(enabled);
        }
        self
    }

    /// Set explicit port names on the most recently added connection
    pub fn with_ports(mut self, from_output: impl Into<String>, to_input: impl Into<String>) -> Self {
        if let Some(conn) = self.connections.last_mut() {
            conn.from_output = Some(from_output.into());
            conn.to_input = Some(to_input.into());
        }
        self
    }

    /// Designate the start element
    pub fn start(mut self, id: impl Into<String>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Build the definition without validation
    pub fn build(self) -> FlowDefinition {
        let start_element_id = self
            .start
            .or_else(|| self.elements.first().map(|e| e.element_id.clone()))
            .unwrap_or_default();
        FlowDefinition {
            flow_id: self.flow_id,
            elements: self
                .elements
                .into_iter()
                .map(|e| (e.element_id.clone(), e))
                .collect(),
            connections: self.connections,
            start_element_id,
            metadata: Default::default(),
        }
    }

    /// Build and validate the definition
    pub fn build_validated(self) -> Result<FlowDefinition, AssemblyError> {
        let flow = self.build();
        match AssemblyError::from_problems(validate_definition(&flow)) {
            Some(err) => Err(err),
            None => Ok(flow),
        }
    }
}
