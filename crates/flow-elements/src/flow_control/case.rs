//! Case element
//!
//! Evaluates an ordered list of named conditions against a `variables` map
//! and closes the outgoing edges of every condition that came out false.
//!
//! Edges are matched to conditions by branch label. When no outgoing edge
//! carries a label, the n-th condition governs the n-th edge.
//!
//! # Parameters
//! - `cases`: list of `{name: {variable1, variable2, compare}}`
//!
//! # Inputs
//! - `variables` - Map of variable name to value
//!
//! # Outputs
//! - `result` - Map of condition name to bool

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use flow_engine::{
    AssemblyError, Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result,
    ValueMap,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params};

/// Comparison applied by one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
}

impl Comparator {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    /// Apply the comparison; `None` when the operands cannot be compared.
    pub fn apply(self, left: &Value, right: &Value) -> Option<bool> {
        match self {
            Self::Eq => Some(values_equal(left, right)),
            Self::Ne => Some(!values_equal(left, right)),
            Self::Gt => order(left, right).map(|o| o == Ordering::Greater),
            Self::Lt => order(left, right).map(|o| o == Ordering::Less),
            Self::Ge => order(left, right).map(|o| o != Ordering::Less),
            Self::Le => order(left, right).map(|o| o != Ordering::Greater),
            Self::In => contains(right, left),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::In => "in",
        };
        f.write_str(symbol)
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) if left.is_number() && right.is_number() => a == b,
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match haystack {
        Value::String(s) => needle.as_str().map(|n| s.contains(n)),
        Value::Array(items) => Some(items.iter().any(|item| values_equal(item, needle))),
        Value::Object(map) => needle.as_str().map(|n| map.contains_key(n)),
        _ => None,
    }
}

/// One named condition
#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub variable1: String,
    /// A literal, or the name of another entry in `variables`
    #[serde(default)]
    pub variable2: Value,
    #[serde(default = "default_compare")]
    pub compare: String,
}

fn default_compare() -> String {
    "==".to_string()
}

impl Condition {
    /// Evaluate against a variable map. A missing `variable1` is false.
    pub fn evaluate(&self, name: &str, variables: &ValueMap) -> bool {
        let comparator = Comparator::parse(&self.compare).unwrap_or_else(|| {
            log::warn!(
                "Unknown comparison operator '{}' in case '{}', defaulting to '=='",
                self.compare,
                name
            );
            Comparator::Eq
        });

        let Some(left) = variables.get(&self.variable1) else {
            log::warn!(
                "Variable '{}' not found for case '{}', result is false",
                self.variable1,
                name
            );
            return false;
        };

        let right = match &self.variable2 {
            Value::String(reference) if variables.contains_key(reference) => &variables[reference],
            literal => literal,
        };

        match comparator.apply(left, right) {
            Some(result) => {
                log::debug!("Case '{}': {} {} {} = {}", name, left, comparator, right, result);
                result
            }
            None => {
                log::warn!(
                    "Case '{}': cannot compare {} {} {}, result is false",
                    name,
                    left,
                    comparator,
                    right
                );
                false
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CaseParams {
    cases: Vec<ValueMap>,
}

pub struct CaseElement {
    core: ElementCore,
    cases: Vec<(String, Condition)>,
}

impl CaseElement {
    pub const PORT_VARIABLES: &'static str = "variables";
    pub const PORT_RESULT: &'static str = "result";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: CaseParams = parse_params(def)?;
        let mut cases = Vec::new();
        for entry in params.cases {
            for (name, raw) in entry {
                let condition: Condition =
                    serde_json::from_value(raw).map_err(|e| AssemblyError::InvalidParameters {
                        element_id: def.element_id.clone(),
                        message: format!("case '{}': {}", name, e),
                    })?;
                cases.push((name, condition));
            }
        }
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::Case, def),
            cases,
        })
    }

    pub fn cases(&self) -> &[(String, Condition)] {
        &self.cases
    }

    /// Evaluate every condition in declared order
    pub fn evaluate(&self, variables: &ValueMap) -> ValueMap {
        self.cases
            .iter()
            .map(|(name, condition)| (name.clone(), Value::Bool(condition.evaluate(name, variables))))
            .collect()
    }
}

#[async_trait]
impl Element for CaseElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing case element: {} ({})", self.core.name, self.core.id);
        self.core.check_inputs()?;

        let variables = match self.core.input(Self::PORT_VARIABLES) {
            Some(Value::Object(map)) => map.clone(),
            _ => ValueMap::new(),
        };
        let results = self.evaluate(&variables);

        let gates = ctx.gates();
        for (ordinal, (name, _)) in self.cases.iter().enumerate() {
            if results.get(name) == Some(&Value::Bool(false)) {
                for position in gates.positions_for(name, ordinal) {
                    gates.set_gate(position, false);
                }
            }
        }

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_RESULT.into(), json!(results));
        Ok(self.core.set_outputs(outputs))
    }
}
