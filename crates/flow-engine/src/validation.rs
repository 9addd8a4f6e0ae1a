//! Flow definition validation
//!
//! Runs before any element is constructed. Checks element types against the
//! closed [`ElementKind`] set, connection endpoints, the start element, and
//! detects cycles.

use std::collections::{BTreeMap, VecDeque};

use crate::error::AssemblyError;
use crate::types::{ElementKind, FlowDefinition};

/// Validate a flow definition
///
/// Returns all problems found (not just the first).
pub fn validate_definition(flow: &FlowDefinition) -> Vec<AssemblyError> {
    let mut errors = Vec::new();

    validate_element_types(flow, &mut errors);
    validate_start(flow, &mut errors);
    validate_connection_references(flow, &mut errors);
    detect_cycles(flow, &mut errors);

    errors
}

/// Check that every element type tag names a known kind
fn validate_element_types(flow: &FlowDefinition, errors: &mut Vec<AssemblyError>) {
    for (id, def) in &flow.elements {
        if def.element_type.parse::<ElementKind>().is_err() {
            errors.push(AssemblyError::UnknownElementType {
                element_id: id.clone(),
                type_tag: def.element_type.clone(),
            });
        }
    }
}

fn validate_start(flow: &FlowDefinition, errors: &mut Vec<AssemblyError>) {
    if !flow.elements.contains_key(&flow.start_element_id) {
        errors.push(AssemblyError::MissingStart {
            element_id: flow.start_element_id.clone(),
        });
    }
}

/// Check that all connection endpoints exist
fn validate_connection_references(flow: &FlowDefinition, errors: &mut Vec<AssemblyError>) {
    for conn in &flow.connections {
        for endpoint in [&conn.from_id, &conn.to_id] {
            if !flow.elements.contains_key(endpoint) {
                let already_reported = errors.iter().any(|e| {
                    matches!(e, AssemblyError::UnknownElement { element_id } if element_id == endpoint)
                });
                if !already_reported {
                    errors.push(AssemblyError::UnknownElement {
                        element_id: endpoint.clone(),
                    });
                }
            }
        }
    }
}

/// Detect cycles using Kahn's algorithm (topological sort)
///
/// Connections with unknown endpoints are ignored here; they are reported
/// separately.
fn detect_cycles(flow: &FlowDefinition, errors: &mut Vec<AssemblyError>) {
    let mut in_degree: BTreeMap<&str, usize> =
        flow.elements.keys().map(|id| (id.as_str(), 0)).collect();
    let known = |id: &str| flow.elements.contains_key(id);

    for conn in &flow.connections {
        if known(&conn.from_id) && known(&conn.to_id) {
            *in_degree.entry(conn.to_id.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    while let Some(element_id) = queue.pop_front() {
        for conn in &flow.connections {
            if conn.from_id == element_id && known(&conn.to_id) {
                if let Some(deg) = in_degree.get_mut(conn.to_id.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(&conn.to_id);
                    }
                }
            }
        }
    }

    let stuck: Vec<String> = in_degree
        .into_iter()
        .filter(|(_, deg)| *deg > 0)
        .map(|(id, _)| id.to_string())
        .collect();

    if !stuck.is_empty() {
        errors.push(AssemblyError::CycleDetected { element_ids: stuck });
    }
}
