//! Core types for flow definitions
//!
//! These types describe a flow as the caller submits it: the element
//! declarations keyed by id, the directed connections between them, and the
//! designated start element. Assembly into an executable graph happens in
//! [`crate::graph`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::ValueMap;
use crate::schema::Schema;

/// Unique identifier for an element
pub type ElementId = String;

/// The closed set of element kinds a flow may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Start,
    End,
    Case,
    FlowSelect,
    ChatInput,
    ContextHistory,
    Datablock,
    Constants,
    Metadata,
    RestApi,
    Selector,
    Merger,
    RandomGenerator,
    Time,
    LlmText,
    LlmStructured,
    ReadBlockchainData,
    BuildTransactionJson,
    Custom,
}

impl ElementKind {
    /// Every kind, in catalogue order
    pub const ALL: [ElementKind; 19] = [
        ElementKind::Start,
        ElementKind::End,
        ElementKind::Case,
        ElementKind::FlowSelect,
        ElementKind::ChatInput,
        ElementKind::ContextHistory,
        ElementKind::Datablock,
        ElementKind::Constants,
        ElementKind::Metadata,
        ElementKind::RestApi,
        ElementKind::Selector,
        ElementKind::Merger,
        ElementKind::RandomGenerator,
        ElementKind::Time,
        ElementKind::LlmText,
        ElementKind::LlmStructured,
        ElementKind::ReadBlockchainData,
        ElementKind::BuildTransactionJson,
        ElementKind::Custom,
    ];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Case => "case",
            Self::FlowSelect => "flow_select",
            Self::ChatInput => "chat_input",
            Self::ContextHistory => "context_history",
            Self::Datablock => "datablock",
            Self::Constants => "constants",
            Self::Metadata => "metadata",
            Self::RestApi => "rest_api",
            Self::Selector => "selector",
            Self::Merger => "merger",
            Self::RandomGenerator => "random_generator",
            Self::Time => "time",
            Self::LlmText => "llm_text",
            Self::LlmStructured => "llm_structured",
            Self::ReadBlockchainData => "read_blockchain_data",
            Self::BuildTransactionJson => "build_transaction_json",
            Self::Custom => "custom",
        }
    }

    /// Category used for grouping in editors
    pub fn category(&self) -> ElementCategory {
        match self {
            Self::Start | Self::End | Self::Case | Self::FlowSelect => ElementCategory::FlowControl,
            Self::ChatInput
            | Self::ContextHistory
            | Self::Datablock
            | Self::Constants
            | Self::Metadata
            | Self::RestApi => ElementCategory::Input,
            Self::Selector | Self::Merger | Self::RandomGenerator | Self::Time => {
                ElementCategory::Util
            }
            Self::LlmText | Self::LlmStructured => ElementCategory::Ai,
            Self::ReadBlockchainData | Self::BuildTransactionJson => ElementCategory::Onchain,
            Self::Custom => ElementCategory::Custom,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Category of an element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    /// Start, end and branching
    FlowControl,
    /// Data sources (chat input, constants, REST calls, etc.)
    Input,
    /// Pure data transforms
    Util,
    /// Text generation
    Ai,
    /// Chain reads and transaction building
    Onchain,
    /// User-supplied code
    Custom,
}

/// One element as declared in a flow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDefinition {
    /// Type tag, checked against [`ElementKind`] at assembly time
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub element_id: ElementId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Schema,
    #[serde(default)]
    pub output_schema: Schema,
    /// Type-specific parameters
    #[serde(flatten)]
    pub params: ValueMap,
}

impl ElementDefinition {
    /// Create a definition with empty schemas and no parameters
    pub fn new(element_id: impl Into<String>, kind: ElementKind) -> Self {
        let element_id = element_id.into();
        Self {
            element_type: kind.as_str().to_string(),
            name: element_id.clone(),
            element_id,
            description: String::new(),
            input_schema: Schema::new(),
            output_schema: Schema::new(),
            params: ValueMap::new(),
        }
    }

    /// Deserialize the type-specific parameters into a typed struct.
    pub fn params_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(serde_json::Value::Object(self.params.clone()))
    }
}

/// A directed connection between two elements
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    pub from_id: ElementId,
    pub to_id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_input: Option<String>,
    /// Branch label matched by Case and FlowSelect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Initial state of the edge gate; `None` means no explicit flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// A complete flow as submitted by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub flow_id: String,
    pub elements: BTreeMap<ElementId, ElementDefinition>,
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
    pub start_element_id: ElementId,
    #[serde(default)]
    pub metadata: ValueMap,
}

impl FlowDefinition {
    /// Make the map keys authoritative for element ids.
    ///
    /// Unnamed elements are named after their id.
    pub fn normalize_ids(&mut self) {
        for (id, def) in self.elements.iter_mut() {
            if def.element_id != *id {
                def.element_id = id.clone();
            }
            if def.name.is_empty() {
                def.name = id.clone();
            }
        }
    }
}
