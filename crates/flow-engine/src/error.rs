//! Error types for the flow engine

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::element::ValueMap;

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur while assembling or running a flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// Missing or mismatched fields on an element's inputs or outputs
    #[error("Validation failed for element '{element_id}': {}", .problems.join("; "))]
    Validation {
        element_id: String,
        problems: Vec<String>,
    },

    /// A collaborator (model provider, HTTP endpoint, chain node) failed
    #[error("External call failed: {0}")]
    ExternalCall(String),

    /// The sandboxed worker crossed a resource ceiling
    #[error("{0}")]
    ResourceLimit(ResourceLimit),

    /// A feature needed by the element is disabled or not wired up
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The flow could not be assembled; nothing was executed
    #[error("Flow assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    /// Element execution failed for any other reason
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an external call error with a message
    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalCall(msg.into())
    }

    /// Create a validation error for one element
    pub fn validation(element_id: impl Into<String>, problems: Vec<String>) -> Self {
        Self::Validation {
            element_id: element_id.into(),
            problems,
        }
    }

    /// Stable tag for the error class, used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::ExternalCall(_) => "external_call_error",
            Self::ResourceLimit(_) => "resource_limit_error",
            Self::Configuration(_) => "configuration_error",
            Self::Assembly(_) => "unknown_type_error",
            Self::ExecutionFailed(_) => "execution_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }
}

/// Which ceiling a sandboxed worker crossed
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceLimit {
    MemoryExceeded { used_mb: f64, limit_mb: u64 },
    TimeExceeded { limit_secs: f64 },
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryExceeded { used_mb, limit_mb } => {
                write!(
                    f,
                    "Memory limit exceeded ({:.2} MB > {} MB)",
                    used_mb, limit_mb
                )
            }
            Self::TimeExceeded { limit_secs } => {
                write!(f, "Time limit exceeded ({} seconds)", limit_secs)
            }
        }
    }
}

/// Problems found while turning a flow definition into an executable graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("Element '{element_id}' has unknown type '{type_tag}'")]
    UnknownElementType { element_id: String, type_tag: String },

    #[error("Element '{element_id}' is declared more than once")]
    DuplicateElement { element_id: String },

    #[error("Connection references unknown element '{element_id}'")]
    UnknownElement { element_id: String },

    #[error("Start element '{element_id}' is not part of the flow")]
    MissingStart { element_id: String },

    #[error("Flow contains a cycle involving: {}", .element_ids.join(", "))]
    CycleDetected { element_ids: Vec<String> },

    #[error("Element '{element_id}' has invalid parameters: {message}")]
    InvalidParameters { element_id: String, message: String },

    #[error("{} problems: {}", .0.len(), join_problems(.0))]
    Multiple(Vec<AssemblyError>),
}

impl AssemblyError {
    /// Collapse a list of problems into a single error.
    ///
    /// Returns `None` when the list is empty.
    pub fn from_problems(mut problems: Vec<AssemblyError>) -> Option<Self> {
        match problems.len() {
            0 => None,
            1 => problems.pop(),
            _ => Some(Self::Multiple(problems)),
        }
    }
}

fn join_problems(problems: &[AssemblyError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A failed run together with everything accumulated before the failure
#[derive(Debug, Error, Serialize)]
#[error("Flow '{flow_id}' failed: {error}")]
#[serde(rename_all = "camelCase")]
pub struct FlowRunError {
    pub flow_id: String,
    #[serde(serialize_with = "serialize_display")]
    #[source]
    pub error: FlowError,
    pub partial_execution_order: Vec<String>,
    pub partial_outputs: serde_json::Map<String, serde_json::Value>,
    pub execution_time: f64,
}

impl FlowRunError {
    /// Outputs cached for one element before the run failed.
    pub fn partial_output(&self, element_id: &str) -> Option<ValueMap> {
        self.partial_outputs
            .get(element_id)
            .and_then(|v| v.as_object())
            .cloned()
    }
}

fn serialize_display<S: serde::Serializer>(
    value: &FlowError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_limit_messages() {
        let mem = ResourceLimit::MemoryExceeded {
            used_mb: 150.5,
            limit_mb: 100,
        };
        assert_eq!(mem.to_string(), "Memory limit exceeded (150.50 MB > 100 MB)");

        let time = ResourceLimit::TimeExceeded { limit_secs: 2.0 };
        assert_eq!(time.to_string(), "Time limit exceeded (2 seconds)");
    }

    #[test]
    fn test_validation_lists_every_problem() {
        let err = FlowError::validation(
            "llm",
            vec![
                "Required input 'prompt' is missing.".into(),
                "Required input 'context' is missing.".into(),
            ],
        );
        let msg = err.to_string();
        assert!(msg.contains("'prompt'"));
        assert!(msg.contains("'context'"));
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_from_problems() {
        assert!(AssemblyError::from_problems(vec![]).is_none());

        let single = AssemblyError::from_problems(vec![AssemblyError::MissingStart {
            element_id: "s".into(),
        }]);
        assert!(matches!(single, Some(AssemblyError::MissingStart { .. })));

        let multi = AssemblyError::from_problems(vec![
            AssemblyError::UnknownElement {
                element_id: "a".into(),
            },
            AssemblyError::UnknownElement {
                element_id: "b".into(),
            },
        ]);
        assert!(matches!(multi, Some(AssemblyError::Multiple(ref v)) if v.len() == 2));
    }
}
