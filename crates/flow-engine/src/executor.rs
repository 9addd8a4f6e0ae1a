//! Flow executor
//!
//! Runs an assembled [`FlowGraph`] depth-first from its start element.
//! Before an element runs, every upstream dependency that has not run yet is
//! pulled in first ("backtracking", which skips that dependency's own forward
//! fan-out). After it runs, its outputs are copied into each open downstream
//! element by input-schema name and the downstream element is visited in
//! connection order. Each element runs at most once per run; later visits get
//! the cached outputs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::FlowConfig;
use crate::context::ExecutionContext;
use crate::element::{ElementCore, ValueMap};
use crate::error::{AssemblyError, FlowError, FlowRunError, Result};
use crate::events::{event_types, EventEmitter};
use crate::extensions::ExecutorExtensions;
use crate::graph::{Edge, ElementFactory, FlowGraph, NodeIndex};
use crate::streaming::StreamSink;
use crate::types::{ElementKind, FlowDefinition};

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResult {
    pub flow_id: String,
    pub execution_order: Vec<String>,
    pub element_outputs: ValueMap,
    pub final_output: Value,
    /// Seconds
    pub execution_time: f64,
}

/// Executes one flow run. Construct per run and discard afterwards.
pub struct FlowExecutor {
    graph: FlowGraph,
    flow_id: String,
    run_id: String,
    config: FlowConfig,
    emitter: EventEmitter,
    extensions: ExecutorExtensions,
    output_cache: HashMap<NodeIndex, ValueMap>,
    execution_order: Vec<NodeIndex>,
    final_output: Option<ValueMap>,
}

impl FlowExecutor {
    /// Create an executor over an assembled graph
    pub fn new(graph: FlowGraph, config: FlowConfig) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        Self {
            graph,
            flow_id: run_id.clone(),
            run_id,
            config,
            emitter: EventEmitter::detached(),
            extensions: ExecutorExtensions::new(),
            output_cache: HashMap::new(),
            execution_order: Vec::new(),
            final_output: None,
        }
    }

    /// Assemble a flow definition and wrap it in an executor.
    ///
    /// Fails without executing anything when the definition has unknown
    /// element types, dangling connections, or cycles.
    pub fn from_definition(
        flow: &FlowDefinition,
        factory: &dyn ElementFactory,
        config: FlowConfig,
    ) -> Result<Self> {
        let graph = FlowGraph::assemble(flow, factory)?;
        let executor = Self::new(graph, config);
        Ok(if flow.flow_id.is_empty() {
            executor
        } else {
            executor.with_flow_id(flow.flow_id.clone())
        })
    }

    pub fn with_flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = flow_id.into();
        self
    }

    /// Attach the sink that receives every event of the run
    pub fn with_sink(mut self, sink: Arc<dyn StreamSink>) -> Self {
        self.emitter = EventEmitter::new(Some(sink));
        self
    }

    pub fn with_extensions(mut self, extensions: ExecutorExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// Ids of executed elements, in execution order
    pub fn execution_order(&self) -> Vec<String> {
        self.execution_order
            .iter()
            .map(|idx| self.graph.id_of(*idx).to_string())
            .collect()
    }

    /// Cached outputs of an element, if it has run
    pub fn cached_output(&self, element_id: &str) -> Option<&ValueMap> {
        self.graph
            .node_index(element_id)
            .and_then(|idx| self.output_cache.get(&idx))
    }

    /// Run the flow from its start element.
    ///
    /// `initial_inputs` maps element id → inputs applied before traversal;
    /// ids that are not part of the flow are skipped with a warning.
    pub async fn execute_flow(
        &mut self,
        initial_inputs: HashMap<String, ValueMap>,
    ) -> std::result::Result<FlowResult, FlowRunError> {
        let started = Instant::now();
        self.apply_initial_inputs(initial_inputs);

        log::info!("Starting flow '{}' (run {})", self.flow_id, self.run_id);
        let start = self.graph.start();
        self.emitter
            .emit(
                event_types::FLOW_STARTED,
                json!({
                    "flowId": self.flow_id,
                    "runId": self.run_id,
                    "startElementId": start.map(|idx| self.graph.id_of(idx).to_string()),
                }),
            )
            .await;

        let outcome = match start {
            Some(idx) => self.execute_node(idx, false).await,
            None => Err(AssemblyError::MissingStart {
                element_id: String::new(),
            }
            .into()),
        };
        let execution_time = started.elapsed().as_secs_f64();

        match outcome {
            Ok(start_outputs) => {
                let final_output = self.final_output.clone().unwrap_or(start_outputs);
                let result = FlowResult {
                    flow_id: self.flow_id.clone(),
                    execution_order: self.execution_order(),
                    element_outputs: self.outputs_snapshot(),
                    final_output: Value::Object(final_output),
                    execution_time,
                };
                log::info!(
                    "Flow '{}' completed: {} elements in {:.3}s",
                    self.flow_id,
                    result.execution_order.len(),
                    execution_time
                );
                self.emitter
                    .emit(event_types::FLOW_COMPLETED, to_payload(&result))
                    .await;
                Ok(result)
            }
            Err(error) => {
                log::error!("Flow '{}' failed: {}", self.flow_id, error);
                let failure = FlowRunError {
                    flow_id: self.flow_id.clone(),
                    error,
                    partial_execution_order: self.execution_order(),
                    partial_outputs: self.outputs_snapshot(),
                    execution_time,
                };
                self.emitter
                    .emit(event_types::FLOW_ERROR, to_payload(&failure))
                    .await;
                Err(failure)
            }
        }
    }

    fn apply_initial_inputs(&mut self, initial_inputs: HashMap<String, ValueMap>) {
        for (element_id, inputs) in initial_inputs {
            match self.graph.node_index(&element_id) {
                Some(idx) => {
                    let core = self.graph.element_mut(idx).core_mut();
                    for (name, value) in inputs {
                        core.set_input(name, value);
                    }
                }
                None => log::warn!(
                    "Initial inputs for unknown element '{}' skipped",
                    element_id
                ),
            }
        }
    }

    fn execute_node(&mut self, idx: NodeIndex, backtracking: bool) -> BoxFuture<'_, Result<ValueMap>> {
        Box::pin(async move {
            if self.graph.element(idx).core().executed {
                if let Some(cached) = self.output_cache.get(&idx) {
                    log::debug!("Element '{}' already executed; using cache", self.graph.id_of(idx));
                    return Ok(cached.clone());
                }
            }

            let dependencies = self.graph.dependencies(idx).to_vec();
            for dep in dependencies {
                if !self.graph.element(dep).core().executed {
                    log::debug!(
                        "Pulling dependency '{}' before '{}'",
                        self.graph.id_of(dep),
                        self.graph.id_of(idx)
                    );
                    self.execute_node(dep, true).await?;
                }
            }

            self.emit_element_event(event_types::ELEMENT_STARTED, idx, backtracking, None)
                .await;

            let outputs = match self.run_element(idx, backtracking).await {
                Ok(outputs) => outputs,
                Err(error) => {
                    log::error!("Element '{}' failed: {}", self.graph.id_of(idx), error);
                    let detail = json!({"error": error.to_string(), "errorKind": error.kind()});
                    self.emit_element_event(event_types::ELEMENT_ERROR, idx, backtracking, Some(detail))
                        .await;
                    return Err(error);
                }
            };

            self.graph.element_mut(idx).core_mut().executed = true;
            self.execution_order.push(idx);
            self.output_cache.insert(idx, outputs.clone());
            if self.graph.element(idx).kind() == ElementKind::End {
                self.final_output = Some(outputs.clone());
            }

            let detail = json!({"outputs": outputs});
            self.emit_element_event(event_types::ELEMENT_COMPLETED, idx, backtracking, Some(detail))
                .await;

            if !backtracking && self.graph.element(idx).core().downwards_execute {
                let connections = self.graph.connections(idx).to_vec();
                for edge_idx in connections {
                    let edge = self.graph.edge(edge_idx).clone();
                    if !edge.is_open() {
                        log::debug!(
                            "Edge '{}' -> '{}' is gated off",
                            self.graph.id_of(idx),
                            self.graph.id_of(edge.target)
                        );
                        continue;
                    }
                    self.propagate(&outputs, &edge);
                    self.execute_node(edge.target, false).await?;
                }
            }

            Ok(outputs)
        })
    }

    async fn run_element(&mut self, idx: NodeIndex, backtracking: bool) -> Result<ValueMap> {
        let Self {
            graph,
            flow_id,
            config,
            emitter,
            extensions,
            ..
        } = self;
        let (element, gates) = graph.split_for_execution(idx);
        let mut ctx = ExecutionContext::new(
            flow_id.as_str(),
            config,
            emitter,
            extensions,
            gates,
            backtracking,
        );
        element.execute(&mut ctx).await
    }

    /// Copy outputs into the edge target's declared inputs.
    ///
    /// Name matching against the target's input schema always applies. An
    /// edge that names both ports additionally copies that one output into
    /// that one input.
    fn propagate(&mut self, outputs: &ValueMap, edge: &Edge) {
        let ElementCore {
            input_schema,
            inputs,
            ..
        } = self.graph.element_mut(edge.target).core_mut();

        for name in input_schema.keys() {
            if let Some(value) = outputs.get(name) {
                inputs.insert(name.clone(), value.clone());
            }
        }

        if let Some((from, to)) = edge.port_mapping() {
            if let Some(value) = outputs.get(from) {
                inputs.insert(to.to_string(), value.clone());
            }
        }
    }

    fn outputs_snapshot(&self) -> ValueMap {
        self.execution_order
            .iter()
            .filter_map(|idx| {
                self.output_cache.get(idx).map(|outputs| {
                    (
                        self.graph.id_of(*idx).to_string(),
                        Value::Object(outputs.clone()),
                    )
                })
            })
            .collect()
    }

    async fn emit_element_event(
        &self,
        event_type: &str,
        idx: NodeIndex,
        backtracking: bool,
        detail: Option<Value>,
    ) {
        if !self.emitter.is_attached() {
            return;
        }
        let core = self.graph.element(idx).core();
        let mut data = json!({
            "flowId": self.flow_id,
            "elementId": core.id,
            "elementType": core.kind.as_str(),
            "elementName": core.name,
            "backtracking": backtracking,
        });
        if let (Some(Value::Object(extra)), Some(map)) = (detail, data.as_object_mut()) {
            map.extend(extra);
        }
        self.emitter.emit(event_type, data).await;
    }
}

fn to_payload<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Failed to serialise event payload: {}", e);
            Value::Null
        }
    }
}

impl From<FlowRunError> for FlowError {
    fn from(err: FlowRunError) -> Self {
        err.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FlowBuilder;
    use crate::element::Element;
    use crate::schema::{FieldSpec, FieldType};
    use crate::streaming::RecordingSink;
    use crate::types::ElementDefinition;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    type Counts = Arc<Mutex<HashMap<String, usize>>>;

    /// Copies its inputs to its outputs, adds `emit` params, and counts runs.
    struct Tracer {
        core: ElementCore,
        emit: ValueMap,
        fail: bool,
        counts: Counts,
    }

    #[async_trait]
    impl Element for Tracer {
        fn core(&self) -> &ElementCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ElementCore {
            &mut self.core
        }

        async fn execute(&mut self, _ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
            *self.counts.lock().entry(self.core.id.clone()).or_default() += 1;
            if self.fail {
                return Err(FlowError::failed("tracer failure"));
            }
            self.core.check_inputs()?;
            let mut outputs = self.core.inputs.clone();
            outputs.extend(self.emit.clone());
            Ok(self.core.set_outputs(outputs))
        }
    }

    #[derive(Default)]
    struct TracerFactory {
        counts: Counts,
    }

    impl TracerFactory {
        fn count(&self, id: &str) -> usize {
            self.counts.lock().get(id).copied().unwrap_or(0)
        }
    }

    impl ElementFactory for TracerFactory {
        fn build(&self, kind: ElementKind, def: &ElementDefinition) -> Result<Box<dyn Element>> {
            Ok(Box::new(Tracer {
                core: ElementCore::from_definition(kind, def),
                emit: def
                    .params
                    .get("emit")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
                fail: def.params.get("fail").and_then(Value::as_bool).unwrap_or(false),
                counts: self.counts.clone(),
            }))
        }
    }

    fn text() -> FieldSpec {
        FieldSpec::optional(FieldType::Any)
    }

    fn diamond() -> FlowDefinition {
        FlowBuilder::new("diamond")
            .element("start", ElementKind::Start)
            .with_params(json!({"emit": {"seed": 1}}))
            .element("left", ElementKind::Selector)
            .with_input("seed", text())
            .with_params(json!({"emit": {"left": "L"}}))
            .element("right", ElementKind::Selector)
            .with_input("seed", text())
            .with_params(json!({"emit": {"right": "R"}}))
            .element("join", ElementKind::Merger)
            .with_input("left", text())
            .with_input("right", text())
            .element("end", ElementKind::End)
            .with_input("left", text())
            .with_input("right", text())
            .connect("start", "left")
            .connect("start", "right")
            .connect("left", "join")
            .connect("right", "join")
            .connect("join", "end")
            .start("start")
            .build()
    }

    fn executor(flow: &FlowDefinition, factory: &TracerFactory) -> FlowExecutor {
        let _ = env_logger::builder().is_test(true).try_init();
        FlowExecutor::from_definition(flow, factory, FlowConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_shared_dependency_runs_once() {
        let factory = TracerFactory::default();
        let mut exec = executor(&diamond(), &factory);
        let result = exec.execute_flow(HashMap::new()).await.unwrap();

        assert_eq!(factory.count("join"), 1);
        assert_eq!(factory.count("right"), 1);
        assert_eq!(factory.count("end"), 1);
        assert_eq!(result.execution_order, vec!["start", "left", "right", "join", "end"]);

        let join = &result.element_outputs["join"];
        assert_eq!(join["left"], "L");
        // "right" was pulled in by "join", so it never pushed its outputs.
        assert!(join.get("right").is_none());
        assert_eq!(result.final_output["left"], "L");
    }

    #[tokio::test]
    async fn test_execution_order_is_topological() {
        let factory = TracerFactory::default();
        let mut exec = executor(&diamond(), &factory);
        let result = exec.execute_flow(HashMap::new()).await.unwrap();

        let position: HashMap<&str, usize> = result
            .execution_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let graph = exec.graph();
        for id in &result.execution_order {
            let idx = graph.node_index(id).unwrap();
            for dep in graph.dependencies(idx) {
                if let Some(dep_pos) = position.get(graph.id_of(*dep)) {
                    assert!(*dep_pos < position[id.as_str()], "{} ran before {}", id, graph.id_of(*dep));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_backtracking_pull_skips_forward_fan_out() {
        let flow = FlowBuilder::new("pull")
            .element("start", ElementKind::Start)
            .element("side", ElementKind::Constants)
            .with_params(json!({"emit": {"extra": 7}}))
            .element("target", ElementKind::Merger)
            .with_input("extra", text())
            .element("unreached", ElementKind::End)
            .connect("start", "target")
            .connect("side", "target")
            .connect("side", "unreached")
            .start("start")
            .build();
        let factory = TracerFactory::default();
        let mut exec = executor(&flow, &factory);
        let result = exec.execute_flow(HashMap::new()).await.unwrap();

        assert_eq!(result.execution_order, vec!["start", "side", "target"]);
        assert_eq!(factory.count("unreached"), 0);
        // Pulled dependencies do not push their outputs forward.
        assert!(result.element_outputs["target"].get("extra").is_none());
    }

    #[tokio::test]
    async fn test_unknown_initial_inputs_are_skipped() {
        let factory = TracerFactory::default();
        let mut exec = executor(&diamond(), &factory);
        let mut initial = HashMap::new();
        initial.insert("ghost".to_string(), ValueMap::new());
        let mut start_inputs = ValueMap::new();
        start_inputs.insert("greeting".into(), json!("hi"));
        initial.insert("start".to_string(), start_inputs);

        let result = exec.execute_flow(initial).await.unwrap();
        assert_eq!(result.element_outputs["start"]["greeting"], "hi");
    }

    #[tokio::test]
    async fn test_failure_aborts_with_partial_snapshot() {
        let flow = FlowBuilder::new("fails")
            .element("start", ElementKind::Start)
            .element("boom", ElementKind::Custom)
            .with_params(json!({"fail": true}))
            .element("after", ElementKind::End)
            .connect("start", "boom")
            .connect("boom", "after")
            .build();
        let factory = TracerFactory::default();
        let sink = Arc::new(RecordingSink::new());
        let mut exec = executor(&flow, &factory).with_sink(sink.clone());

        let err = exec.execute_flow(HashMap::new()).await.unwrap_err();
        assert_eq!(err.flow_id, "fails");
        assert_eq!(err.partial_execution_order, vec!["start"]);
        assert!(err.partial_output("start").is_some());
        assert_eq!(factory.count("after"), 0);
        assert!(matches!(err.error, FlowError::ExecutionFailed(_)));

        let types = sink.event_types();
        assert_eq!(
            types,
            vec![
                "flow_started",
                "element_started",
                "element_completed",
                "element_started",
                "element_error",
                "flow_error"
            ]
        );
        let error_event = sink.events_of("flow_error").remove(0);
        assert_eq!(error_event.data["partialExecutionOrder"], json!(["start"]));
        assert!(error_event.data["error"].as_str().unwrap().contains("tracer failure"));
        let element_error = sink.events_of("element_error").remove(0);
        assert_eq!(element_error.data["elementId"], "boom");
        assert_eq!(element_error.data["errorKind"], "execution_error");
    }

    #[tokio::test]
    async fn test_sink_order_matches_visitation_order() {
        let factory = TracerFactory::default();
        let sink = Arc::new(RecordingSink::new());
        let mut exec = executor(&diamond(), &factory).with_sink(sink.clone());
        let result = exec.execute_flow(HashMap::new()).await.unwrap();

        let started: Vec<String> = sink
            .events_of("element_started")
            .iter()
            .filter_map(|e| e.element_id().map(str::to_string))
            .collect();
        let completed: Vec<String> = sink
            .events_of("element_completed")
            .iter()
            .filter_map(|e| e.element_id().map(str::to_string))
            .collect();
        assert_eq!(started, result.execution_order);
        assert_eq!(completed, result.execution_order);

        let types = sink.event_types();
        assert_eq!(types.first().map(String::as_str), Some("flow_started"));
        assert_eq!(types.last().map(String::as_str), Some("flow_completed"));

        let done = sink.events_of("flow_completed").remove(0);
        assert_eq!(done.data["flowId"], "diamond");
        assert_eq!(done.data["executionOrder"], json!(result.execution_order));
        assert!(done.data["executionTime"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_disabled_edge_is_not_traversed() {
        let flow = FlowBuilder::new("gated")
            .element("start", ElementKind::Start)
            .element("open", ElementKind::End)
            .element("closed", ElementKind::End)
            .connect("start", "open")
            .connect("start", "closed")
            .with_gate(false)
            .build();
        let factory = TracerFactory::default();
        let mut exec = executor(&flow, &factory);
        let result = exec.execute_flow(HashMap::new()).await.unwrap();
        assert_eq!(result.execution_order, vec!["start", "open"]);
        assert_eq!(factory.count("closed"), 0);
    }

    #[tokio::test]
    async fn test_element_flag_stops_fan_out() {
        let flow = FlowBuilder::new("halt")
            .element("start", ElementKind::Start)
            .with_params(json!({"downwards_execute": false}))
            .element("next", ElementKind::End)
            .connect("start", "next")
            .build();
        let factory = TracerFactory::default();
        let mut exec = executor(&flow, &factory);
        let result = exec.execute_flow(HashMap::new()).await.unwrap();
        assert_eq!(result.execution_order, vec!["start"]);
        assert_eq!(result.final_output, result.element_outputs["start"]);
    }

    #[tokio::test]
    async fn test_named_ports_copy_after_name_matching() {
        let flow = FlowBuilder::new("ports")
            .element("start", ElementKind::Start)
            .with_params(json!({"emit": {"answer": 42, "text_input": "by name"}}))
            .element("end", ElementKind::End)
            .with_input("text_input", text())
            .with_input("result", text())
            .connect("start", "end")
            .with_ports("answer", "result")
            .build();
        let factory = TracerFactory::default();
        let mut exec = executor(&flow, &factory);
        let result = exec.execute_flow(HashMap::new()).await.unwrap();

        let end = &result.element_outputs["end"];
        assert_eq!(end["text_input"], "by name");
        assert_eq!(end["result"], 42);
        assert!(end.get("answer").is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_names_fields() {
        let flow = FlowBuilder::new("invalid")
            .element("start", ElementKind::Start)
            .element("end", ElementKind::End)
            .with_input("text_input", FieldSpec::required(FieldType::String))
            .with_input("count", FieldSpec::required(FieldType::Int))
            .connect("start", "end")
            .build();
        let factory = TracerFactory::default();
        let mut exec = executor(&flow, &factory);
        let err = exec.execute_flow(HashMap::new()).await.unwrap_err();
        match err.error {
            FlowError::Validation { element_id, problems } => {
                assert_eq!(element_id, "end");
                assert_eq!(problems.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_rejected_before_execution() {
        let flow = FlowBuilder::new("loop")
            .element("a", ElementKind::Start)
            .element("b", ElementKind::Merger)
            .connect("a", "b")
            .connect("b", "a")
            .build();
        let factory = TracerFactory::default();
        let err = FlowExecutor::from_definition(&flow, &factory, FlowConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, FlowError::Assembly(AssemblyError::CycleDetected { .. })));
        assert_eq!(err.kind(), "unknown_type_error");
        assert_eq!(factory.count("a"), 0);
    }

    #[test]
    fn test_unknown_type_rejected_before_execution() {
        let mut flow = diamond();
        if let Some(def) = flow.elements.get_mut("join") {
            def.element_type = "teleport".into();
        }
        let err = FlowExecutor::from_definition(&flow, &TracerFactory::default(), FlowConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            FlowError::Assembly(AssemblyError::UnknownElementType { .. })
        ));
    }

    #[tokio::test]
    async fn test_runs_get_fresh_ids() {
        let factory = TracerFactory::default();
        let a = executor(&diamond(), &factory);
        let b = executor(&diamond(), &factory);
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.flow_id(), "diamond");
    }
}
