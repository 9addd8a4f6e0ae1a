//! Arena-backed flow graph
//!
//! Elements live in a `Vec` and are addressed by [`NodeIndex`]; edges live in
//! a second `Vec` addressed by [`EdgeIndex`]. Each node slot keeps its
//! ordered outgoing edges and its upstream dependencies, and
//! [`FlowGraph::connect`] always updates both sides.

use std::collections::HashMap;

use crate::element::Element;
use crate::error::{AssemblyError, Result};
use crate::types::{ConnectionDefinition, ElementDefinition, ElementKind, FlowDefinition};
use crate::validation::validate_definition;

/// Stable index of an element in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stable index of an edge in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeIndex(usize);

impl EdgeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A directed edge between two arena nodes
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub branch: Option<String>,
    pub from_output: Option<String>,
    pub to_input: Option<String>,
    /// Per-edge gate; `None` means no explicit flag has been set
    pub downwards_execute: Option<bool>,
}

impl Edge {
    /// Whether forward propagation may cross this edge
    pub fn is_open(&self) -> bool {
        self.downwards_execute != Some(false)
    }

    /// Explicit port pair, when both ends are named
    pub fn port_mapping(&self) -> Option<(&str, &str)> {
        match (&self.from_output, &self.to_input) {
            (Some(from), Some(to)) => Some((from.as_str(), to.as_str())),
            _ => None,
        }
    }
}

/// Builds concrete elements for assembly.
///
/// Implementations match exhaustively over [`ElementKind`], so adding a kind
/// without a constructor is a compile error rather than a runtime lookup miss.
pub trait ElementFactory: Send + Sync {
    fn build(&self, kind: ElementKind, definition: &ElementDefinition) -> Result<Box<dyn Element>>;
}

pub(crate) struct NodeSlot {
    pub(crate) element: Box<dyn Element>,
    pub(crate) connections: Vec<EdgeIndex>,
    pub(crate) dependencies: Vec<NodeIndex>,
}

/// Executable flow graph
pub struct FlowGraph {
    pub(crate) nodes: Vec<NodeSlot>,
    pub(crate) edges: Vec<Edge>,
    index: HashMap<String, NodeIndex>,
    start: Option<NodeIndex>,
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            start: None,
        }
    }

    /// Validate a definition and build every element through `factory`.
    ///
    /// Nothing is constructed when validation finds a problem.
    pub fn assemble(flow: &FlowDefinition, factory: &dyn ElementFactory) -> Result<Self> {
        let mut flow = flow.clone();
        flow.normalize_ids();

        if let Some(err) = AssemblyError::from_problems(validate_definition(&flow)) {
            return Err(err.into());
        }

        let mut graph = Self::new();
        for (id, def) in &flow.elements {
            let kind: ElementKind =
                def.element_type
                    .parse()
                    .map_err(|type_tag| AssemblyError::UnknownElementType {
                        element_id: id.clone(),
                        type_tag,
                    })?;
            let element = factory.build(kind, def)?;
            graph.add_element(element)?;
        }

        for conn in &flow.connections {
            graph.connect_definition(conn)?;
        }

        graph.set_start(&flow.start_element_id)?;
        log::debug!(
            "Assembled flow '{}' with {} elements and {} connections",
            flow.flow_id,
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    /// Add an element to the arena
    pub fn add_element(&mut self, element: Box<dyn Element>) -> Result<NodeIndex> {
        let id = element.id().to_string();
        if self.index.contains_key(&id) {
            return Err(AssemblyError::DuplicateElement { element_id: id }.into());
        }
        let idx = NodeIndex(self.nodes.len());
        self.nodes.push(NodeSlot {
            element,
            connections: Vec::new(),
            dependencies: Vec::new(),
        });
        self.index.insert(id, idx);
        Ok(idx)
    }

    /// Record a downstream edge from `from` to `to`.
    ///
    /// Inserts the edge into `from`'s connections and `from` into `to`'s
    /// dependencies in one step.
    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex) -> EdgeIndex {
        self.connect_edge(Edge {
            source: from,
            target: to,
            branch: None,
            from_output: None,
            to_input: None,
            downwards_execute: None,
        })
    }

    fn connect_edge(&mut self, edge: Edge) -> EdgeIndex {
        let (from, to) = (edge.source, edge.target);
        let edge_idx = EdgeIndex(self.edges.len());
        self.edges.push(edge);
        self.nodes[from.0].connections.push(edge_idx);
        if !self.nodes[to.0].dependencies.contains(&from) {
            self.nodes[to.0].dependencies.push(from);
        }
        edge_idx
    }

    fn connect_definition(&mut self, conn: &ConnectionDefinition) -> Result<EdgeIndex> {
        let from = self.require(&conn.from_id)?;
        let to = self.require(&conn.to_id)?;
        Ok(self.connect_edge(Edge {
            source: from,
            target: to,
            branch: conn.branch.clone(),
            from_output: conn.from_output.clone(),
            to_input: conn.to_input.clone(),
            downwards_execute: conn.enabled,
        }))
    }

    fn require(&self, id: &str) -> Result<NodeIndex> {
        self.node_index(id).ok_or_else(|| {
            AssemblyError::UnknownElement {
                element_id: id.to_string(),
            }
            .into()
        })
    }

    /// Designate the start element by id
    pub fn set_start(&mut self, id: &str) -> Result<()> {
        let idx = self.node_index(id).ok_or_else(|| AssemblyError::MissingStart {
            element_id: id.to_string(),
        })?;
        self.start = Some(idx);
        Ok(())
    }

    pub fn start(&self) -> Option<NodeIndex> {
        self.start
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn element(&self, idx: NodeIndex) -> &dyn Element {
        self.nodes[idx.0].element.as_ref()
    }

    pub fn element_mut(&mut self, idx: NodeIndex) -> &mut dyn Element {
        self.nodes[idx.0].element.as_mut()
    }

    /// Outgoing edges of a node, in declaration order
    pub fn connections(&self, idx: NodeIndex) -> &[EdgeIndex] {
        &self.nodes[idx.0].connections
    }

    /// Upstream nodes of a node, in first-connection order
    pub fn dependencies(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.nodes[idx.0].dependencies
    }

    pub fn edge(&self, idx: EdgeIndex) -> &Edge {
        &self.edges[idx.0]
    }

    /// Id of the element at `idx`
    pub fn id_of(&self, idx: NodeIndex) -> &str {
        self.nodes[idx.0].element.id()
    }

    /// Borrow an element mutably together with the gates of its outgoing
    /// edges.
    pub(crate) fn split_for_execution(
        &mut self,
        idx: NodeIndex,
    ) -> (&mut dyn Element, BranchGates<'_>) {
        let NodeSlot {
            element,
            connections,
            ..
        } = &mut self.nodes[idx.0];
        (
            element.as_mut(),
            BranchGates {
                connections: connections.as_slice(),
                edges: self.edges.as_mut_slice(),
            },
        )
    }
}

/// Mutable view over the gates of one element's outgoing edges.
///
/// Positions are indexes into the element's ordered connection list.
pub struct BranchGates<'a> {
    connections: &'a [EdgeIndex],
    edges: &'a mut [Edge],
}

impl<'a> BranchGates<'a> {
    /// Gates for an element with no outgoing edges
    pub fn detached() -> Self {
        Self {
            connections: &[],
            edges: &mut [],
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn edge(&self, position: usize) -> Option<&Edge> {
        self.connections
            .get(position)
            .and_then(|e| self.edges.get(e.0))
    }

    pub fn label(&self, position: usize) -> Option<&str> {
        self.edge(position).and_then(|e| e.branch.as_deref())
    }

    /// Current gate state; `None` when no explicit flag was set
    pub fn gate(&self, position: usize) -> Option<bool> {
        self.edge(position).and_then(|e| e.downwards_execute)
    }

    pub fn set_gate(&mut self, position: usize, open: bool) {
        if let Some(edge_idx) = self.connections.get(position) {
            if let Some(edge) = self.edges.get_mut(edge_idx.0) {
                edge.downwards_execute = Some(open);
            }
        }
    }

    /// Whether any outgoing edge carries a branch label
    pub fn is_labeled(&self) -> bool {
        (0..self.len()).any(|p| self.label(p).is_some())
    }

    /// Positions of the edges that belong to a named branch.
    ///
    /// Labeled edges are matched by label. When no outgoing edge carries a
    /// label, the branch at `ordinal` maps to the edge at the same position.
    pub fn positions_for(&self, branch: &str, ordinal: usize) -> Vec<usize> {
        if self.is_labeled() {
            (0..self.len())
                .filter(|&p| self.label(p) == Some(branch))
                .collect()
        } else if ordinal < self.len() {
            vec![ordinal]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::element::{ElementCore, ValueMap};
    use async_trait::async_trait;

    struct Plain {
        core: ElementCore,
    }

    #[async_trait]
    impl Element for Plain {
        fn core(&self) -> &ElementCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ElementCore {
            &mut self.core
        }

        async fn execute(&mut self, _ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
            Ok(ValueMap::new())
        }
    }

    fn plain(id: &str) -> Box<dyn Element> {
        Box::new(Plain {
            core: ElementCore::new(id, ElementKind::Start),
        })
    }

    #[test]
    fn test_connect_records_both_sides() {
        let mut graph = FlowGraph::new();
        let a = graph.add_element(plain("a")).unwrap();
        let b = graph.add_element(plain("b")).unwrap();
        let edge = graph.connect(a, b);

        assert_eq!(graph.connections(a), &[edge]);
        assert_eq!(graph.dependencies(b), &[a]);
        assert!(graph.dependencies(a).is_empty());
        assert_eq!(graph.edge(edge).target, b);
        assert!(graph.edge(edge).is_open());
    }

    #[test]
    fn test_duplicate_element_rejected() {
        let mut graph = FlowGraph::new();
        graph.add_element(plain("a")).unwrap();
        assert!(graph.add_element(plain("a")).is_err());
    }

    #[test]
    fn test_gates_resolve_by_label() {
        let mut graph = FlowGraph::new();
        let src = graph.add_element(plain("src")).unwrap();
        let x = graph.add_element(plain("x")).unwrap();
        let y = graph.add_element(plain("y")).unwrap();
        let e1 = graph.connect(src, x);
        let e2 = graph.connect(src, y);
        graph.edges[e1.index()].branch = Some("second".into());
        graph.edges[e2.index()].branch = Some("first".into());

        let (_, mut gates) = graph.split_for_execution(src);
        assert!(gates.is_labeled());
        assert_eq!(gates.positions_for("first", 0), vec![1]);
        assert_eq!(gates.positions_for("second", 1), vec![0]);
        assert!(gates.positions_for("third", 2).is_empty());

        gates.set_gate(1, false);
        assert_eq!(gates.gate(1), Some(false));
        assert_eq!(gates.gate(0), None);
        assert!(!graph.edge(e2).is_open());
    }

    #[test]
    fn test_gates_fall_back_to_position() {
        let mut graph = FlowGraph::new();
        let src = graph.add_element(plain("src")).unwrap();
        let x = graph.add_element(plain("x")).unwrap();
        graph.connect(src, x);

        let (_, gates) = graph.split_for_execution(src);
        assert_eq!(gates.positions_for("anything", 0), vec![0]);
        assert!(gates.positions_for("anything", 3).is_empty());
        assert!(BranchGates::detached().is_empty());
    }
}
