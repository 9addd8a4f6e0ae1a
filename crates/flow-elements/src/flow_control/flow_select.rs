//! Flow select element
//!
//! Picks exactly one of several downstream paths. Every outgoing edge is
//! closed, then the first target (in declared order) whose edge was open
//! before this element ran is reopened. When none was open, the first target
//! wins.
//!
//! Targets resolve to edges by branch label, or by position when no outgoing
//! edge is labeled.
//!
//! # Parameters
//! - `flows_to_switch`: ordered target names
//!
//! # Outputs
//! - a copy of the inputs, plus `chosen_flow`

use async_trait::async_trait;
use flow_engine::{
    BranchGates, Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result,
    ValueMap,
};
use serde::Deserialize;
use serde_json::Value;

use crate::common::{core_accessors, parse_params};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlowSelectParams {
    #[serde(alias = "targets")]
    flows_to_switch: Vec<String>,
}

pub struct FlowSelectElement {
    core: ElementCore,
    targets: Vec<String>,
}

impl FlowSelectElement {
    pub const PORT_CHOSEN_FLOW: &'static str = "chosen_flow";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: FlowSelectParams = parse_params(def)?;
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::FlowSelect, def),
            targets: params.flows_to_switch,
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Close every edge, reopen the chosen target's, and return its name.
    fn select(&self, gates: &mut BranchGates<'_>) -> Option<String> {
        let candidates: Vec<(&String, Vec<usize>, bool)> = self
            .targets
            .iter()
            .enumerate()
            .map(|(ordinal, target)| {
                let positions = gates.positions_for(target, ordinal);
                let was_open = positions.iter().any(|&p| gates.gate(p) != Some(false));
                (target, positions, was_open)
            })
            .filter(|(_, positions, _)| !positions.is_empty())
            .collect();

        for position in 0..gates.len() {
            gates.set_gate(position, false);
        }

        let chosen = candidates
            .iter()
            .find(|(_, _, was_open)| *was_open)
            .or_else(|| {
                let first = candidates.first();
                if let Some((target, _, _)) = first {
                    log::info!("Flow select defaulted to first flow: {}", target);
                }
                first
            })?;

        for &position in &chosen.1 {
            gates.set_gate(position, true);
        }
        Some(chosen.0.clone())
    }
}

#[async_trait]
impl Element for FlowSelectElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing flow select element: {} ({})", self.core.name, self.core.id);

        if self.targets.is_empty() || ctx.gates().is_empty() {
            let outputs: ValueMap = self
                .core
                .inputs
                .iter()
                .take(1)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            return Ok(self.core.set_outputs(outputs));
        }

        let chosen = self.select(ctx.gates());
        if let Some(flow) = &chosen {
            log::info!("Flow select element '{}' chose flow: {}", self.core.id, flow);
        }

        let mut outputs = self.core.inputs.clone();
        outputs.insert(
            Self::PORT_CHOSEN_FLOW.into(),
            chosen.map(Value::String).unwrap_or(Value::Null),
        );
        Ok(self.core.set_outputs(outputs))
    }
}
