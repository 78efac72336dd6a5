//! Pipeline graph: node declarations, edges and the default receivables
//! pipeline.
//!
//! Edges are either fixed or conditional. A conditional edge owns a pure
//! router that maps the state to a label, and a table mapping labels to
//! branches. A branch targets another node, the park sentinel or an end
//! status, and may set the status the instance carries into that target.
//! `GraphBuilder::build` checks the whole graph once so routing at run time
//! only fails on labels a router invents.

use std::collections::HashMap;

use arflow_types::config::GraphConfig;
use arflow_types::state::{InvoiceState, NodeId, WorkflowStatus};
use thiserror::Error;

use super::nodes::triage;

/// Maps a state to an edge label. Must be pure and must not read `status`.
pub type Router = fn(&InvoiceState) -> &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    /// Halt for human review.
    Park,
    /// Terminate with this status.
    End(WorkflowStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    pub target: Target,
    /// Status set when the branch is taken (defaults to `Processing`).
    pub status: Option<WorkflowStatus>,
}

impl Branch {
    pub fn to(node: NodeId) -> Self {
        Self {
            target: Target::Node(node),
            status: None,
        }
    }

    pub fn park() -> Self {
        Self {
            target: Target::Park,
            status: None,
        }
    }

    pub fn end(status: WorkflowStatus) -> Self {
        Self {
            target: Target::End(status),
            status: None,
        }
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone)]
pub enum Edge {
    Fixed(Branch),
    Conditional {
        router: Router,
        branches: HashMap<&'static str, Branch>,
    },
}

/// Declaration of one node and its interrupt points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub interrupt_before: bool,
    pub interrupt_after: bool,
}

impl NodeSpec {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            interrupt_before: false,
            interrupt_after: false,
        }
    }

    pub fn interrupt_before(mut self) -> Self {
        self.interrupt_before = true;
        self
    }

    pub fn interrupt_after(mut self) -> Self {
        self.interrupt_after = true;
        self
    }
}

/// Outcome of evaluating a node's outgoing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub branch: Branch,
    /// Router label, for conditional edges.
    pub label: Option<&'static str>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no entry node")]
    NoEntry,

    #[error("graph has no review node")]
    NoReviewNode,

    #[error("node '{0}' declared twice")]
    DuplicateNode(NodeId),

    #[error("node '{0}' has more than one outgoing edge")]
    DuplicateEdge(NodeId),

    #[error("node '{0}' is referenced but not declared")]
    UnknownNode(NodeId),

    #[error("node '{0}' has no outgoing edge")]
    MissingEdge(NodeId),

    #[error("conditional edge from '{0}' has no branches")]
    EmptyBranches(NodeId),

    #[error("router on '{node}' returned unmapped label '{label}'")]
    UnknownLabel { node: NodeId, label: String },
}

/// Immutable, validated pipeline graph.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    entry: NodeId,
    review_node: NodeId,
    nodes: HashMap<NodeId, NodeSpec>,
    edges: HashMap<NodeId, Edge>,
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Node that parked-by-failure instances are positioned at.
    pub fn review_node(&self) -> NodeId {
        self.review_node
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Evaluate the outgoing edge of `from` against `state`.
    pub fn next(&self, from: NodeId, state: &InvoiceState) -> Result<Transition, GraphError> {
        match self.edges.get(&from) {
            None => Err(GraphError::MissingEdge(from)),
            Some(Edge::Fixed(branch)) => Ok(Transition {
                branch: *branch,
                label: None,
            }),
            Some(Edge::Conditional { router, branches }) => {
                let label = router(state);
                let branch = branches.get(label).ok_or_else(|| GraphError::UnknownLabel {
                    node: from,
                    label: label.to_string(),
                })?;
                Ok(Transition {
                    branch: *branch,
                    label: Some(label),
                })
            }
        }
    }

    /// The default receivables pipeline.
    ///
    /// `intake -> extract -> enrich -> validate -> payer_check -> terms ->
    /// collection -> working_capital -> triage`, where triage routes to
    /// `export` (approve), park (review), `Escalated` or `Cancelled`.
    pub fn invoice_pipeline(config: &GraphConfig) -> Result<Graph, GraphError> {
        let linear = [
            NodeId::Intake,
            NodeId::Extract,
            NodeId::Enrich,
            NodeId::Validate,
            NodeId::PayerCheck,
            NodeId::Terms,
            NodeId::Collection,
            NodeId::WorkingCapital,
            NodeId::Triage,
        ];

        let mut export = NodeSpec::new(NodeId::Export);
        if config.interrupt_before_export {
            export = export.interrupt_before();
        }

        let mut builder = GraphBuilder::new("invoice_pipeline")
            .entry(NodeId::Intake)
            .review_node(NodeId::Triage);
        for node in linear {
            builder = builder.node(NodeSpec::new(node));
        }
        builder = builder.node(export);
        for pair in linear.windows(2) {
            builder = builder.edge(pair[0], Branch::to(pair[1]));
        }

        builder
            .conditional_edge(
                NodeId::Triage,
                triage::route,
                [
                    (
                        triage::TriageOutcome::Approve.label(),
                        Branch::to(NodeId::Export).with_status(WorkflowStatus::Ready),
                    ),
                    (triage::TriageOutcome::Review.label(), Branch::park()),
                    (
                        triage::TriageOutcome::Escalate.label(),
                        Branch::end(WorkflowStatus::Escalated),
                    ),
                    (
                        triage::TriageOutcome::Reject.label(),
                        Branch::end(WorkflowStatus::Cancelled),
                    ),
                ],
            )
            .edge(NodeId::Export, Branch::end(WorkflowStatus::Completed))
            .build()
    }
}

/// Incremental graph construction; all checks happen in `build`.
#[derive(Debug)]
pub struct GraphBuilder {
    name: String,
    entry: Option<NodeId>,
    review_node: Option<NodeId>,
    nodes: Vec<NodeSpec>,
    edges: Vec<(NodeId, Edge)>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            review_node: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn entry(mut self, node: NodeId) -> Self {
        self.entry = Some(node);
        self
    }

    pub fn review_node(mut self, node: NodeId) -> Self {
        self.review_node = Some(node);
        self
    }

    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    pub fn edge(mut self, from: NodeId, branch: Branch) -> Self {
        self.edges.push((from, Edge::Fixed(branch)));
        self
    }

    pub fn conditional_edge(
        mut self,
        from: NodeId,
        router: Router,
        branches: impl IntoIterator<Item = (&'static str, Branch)>,
    ) -> Self {
        self.edges.push((
            from,
            Edge::Conditional {
                router,
                branches: branches.into_iter().collect(),
            },
        ));
        self
    }

    pub fn build(self) -> Result<Graph, GraphError> {
        let entry = self.entry.ok_or(GraphError::NoEntry)?;
        let review_node = self.review_node.ok_or(GraphError::NoReviewNode)?;

        let mut nodes = HashMap::new();
        for spec in self.nodes {
            if nodes.insert(spec.id, spec).is_some() {
                return Err(GraphError::DuplicateNode(spec.id));
            }
        }
        for id in [entry, review_node] {
            if !nodes.contains_key(&id) {
                return Err(GraphError::UnknownNode(id));
            }
        }

        let mut edges = HashMap::new();
        for (from, edge) in self.edges {
            if !nodes.contains_key(&from) {
                return Err(GraphError::UnknownNode(from));
            }
            let targets: Vec<Branch> = match &edge {
                Edge::Fixed(branch) => vec![*branch],
                Edge::Conditional { branches, .. } => {
                    if branches.is_empty() {
                        return Err(GraphError::EmptyBranches(from));
                    }
                    branches.values().copied().collect()
                }
            };
            for branch in targets {
                if let Target::Node(to) = branch.target {
                    if !nodes.contains_key(&to) {
                        return Err(GraphError::UnknownNode(to));
                    }
                }
            }
            if edges.insert(from, edge).is_some() {
                return Err(GraphError::DuplicateEdge(from));
            }
        }

        if let Some(missing) = nodes.keys().find(|id| !edges.contains_key(*id)) {
            return Err(GraphError::MissingEdge(*missing));
        }

        Ok(Graph {
            name: self.name,
            entry,
            review_node,
            nodes,
            edges,
        })
    }
}
