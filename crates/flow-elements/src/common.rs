//! Helpers shared by element implementations

use flow_engine::events::{preview_value, PREVIEW_LIMIT};
use flow_engine::{AssemblyError, ElementDefinition, Result, ValueMap};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Implements the `core`/`core_mut` accessors for a struct with a `core` field.
macro_rules! core_accessors {
    () => {
        fn core(&self) -> &flow_engine::ElementCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut flow_engine::ElementCore {
            &mut self.core
        }
    };
}

pub(crate) use core_accessors;

/// Deserialize an element's type-specific parameters.
///
/// Malformed parameters are an assembly problem, reported before the run.
pub(crate) fn parse_params<T: DeserializeOwned>(def: &ElementDefinition) -> Result<T> {
    def.params_as().map_err(|e| {
        AssemblyError::InvalidParameters {
            element_id: def.element_id.clone(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Truncated rendering for diagnostic events
pub(crate) fn preview(value: &Value) -> String {
    preview_value(value, PREVIEW_LIMIT)
}

/// Lines of a context input: strings are kept, anything else is rendered.
pub(crate) fn context_lines(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Render a prompt from its parts.
///
/// A non-empty `wrapper` has its `{prompt}`, `{context}` and
/// `{additional_data}` placeholders substituted; otherwise the parts are laid
/// out as context, additional information, then the user request.
pub(crate) fn format_prompt(
    wrapper: &str,
    prompt: &str,
    context: &[String],
    additional_data: &ValueMap,
) -> String {
    let context_str = context.join("\n");
    let additional_str = if additional_data.is_empty() {
        String::new()
    } else {
        let rendered = serde_json::to_string_pretty(additional_data)
            .unwrap_or_else(|_| Value::Object(additional_data.clone()).to_string());
        format!("\nAdditional Information:\n{}", rendered)
    };

    let formatted = if wrapper.is_empty() {
        let mut out = String::new();
        if !context_str.is_empty() {
            out.push_str(&format!("Context Information:\n{}\n\n", context_str));
        }
        if !additional_str.is_empty() {
            out.push_str(&format!("{}\n\n", additional_str));
        }
        out.push_str(&format!("User Request:\n{}", prompt));
        out
    } else {
        wrapper
            .replace("{prompt}", prompt)
            .replace("{context}", &context_str)
            .replace("{additional_data}", &additional_str)
    };

    formatted.trim().to_string()
}

/// String view of an optional input, empty when absent or null
pub(crate) fn text_input(inputs: &ValueMap, name: &str) -> String {
    match inputs.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::ElementKind;
    use serde_json::json;

    #[test]
    fn test_default_prompt_layout() {
        let mut extra = ValueMap::new();
        extra.insert("price".into(), json!(3));
        let prompt = format_prompt("", "buy?", &["a".into(), "b".into()], &extra);
        assert!(prompt.starts_with("Context Information:\na\nb"));
        assert!(prompt.contains("Additional Information:"));
        assert!(prompt.ends_with("User Request:\nbuy?"));
    }

    #[test]
    fn test_wrapper_placeholders() {
        let prompt = format_prompt(
            "Q: {prompt} | C: {context}{additional_data}",
            "why",
            &["ctx".into()],
            &ValueMap::new(),
        );
        assert_eq!(prompt, "Q: why | C: ctx");
    }

    #[test]
    fn test_context_lines() {
        assert_eq!(context_lines(Some(&json!(["a", 1]))), vec!["a", "1"]);
        assert_eq!(context_lines(Some(&json!("solo"))), vec!["solo"]);
        assert!(context_lines(None).is_empty());
    }

    #[test]
    fn test_bad_params_are_assembly_errors() {
        #[derive(serde::Deserialize)]
        struct Needs {
            #[allow(dead_code)]
            count: u32,
        }
        let mut def = ElementDefinition::new("x", ElementKind::Constants);
        def.params.insert("count".into(), json!("many"));
        let err = parse_params::<Needs>(&def).err().unwrap();
        assert_eq!(err.kind(), "unknown_type_error");
    }
}
