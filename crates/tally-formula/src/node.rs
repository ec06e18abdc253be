//! Formula tree nodes
//!
//! Nodes live in the arena of a [`crate::FormulaTree`] and refer to each
//! other by [`NodeId`]. Children are owned top-down; `parents` holds the
//! back-references used to broadcast invalidation upwards.

use std::fmt;
use std::sync::Arc;

use tally_core::{Value, ValueSource};

use crate::ast::{BinaryOperator, BoolOperator, CompareOperator, UnaryOperator};
use crate::call::CallNode;

/// Handle to a node in a [`crate::FormulaTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena slot of this node
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node in the arena
#[derive(Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    /// Nodes consuming this node's value, one entry per consuming edge
    pub(crate) parents: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parents: Vec::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }
}

/// Node variants
#[derive(Debug)]
pub enum NodeKind {
    /// Number or text constant
    Literal(Value),
    /// Reference to a dataset column
    Column(ColumnNode),
    Unary {
        op: UnaryOperator,
        operand: NodeId,
    },
    Bool {
        op: BoolOperator,
        values: Vec<NodeId>,
    },
    Binary {
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    Compare {
        left: NodeId,
        ops: Vec<CompareOperator>,
        comparators: Vec<NodeId>,
    },
    Call(CallNode),
}

impl NodeKind {
    /// Child nodes, in evaluation order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Literal(_) | NodeKind::Column(_) => Vec::new(),
            NodeKind::Unary { operand, .. } => vec![*operand],
            NodeKind::Bool { values, .. } => values.clone(),
            NodeKind::Binary { left, right, .. } => vec![*left, *right],
            NodeKind::Compare {
                left, comparators, ..
            } => std::iter::once(*left)
                .chain(comparators.iter().copied())
                .collect(),
            NodeKind::Call(call) => call.args().to_vec(),
        }
    }

    /// Short name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Literal(_) => "literal",
            NodeKind::Column(_) => "column",
            NodeKind::Unary { .. } => "unary",
            NodeKind::Bool { .. } => "bool",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Compare { .. } => "compare",
            NodeKind::Call(_) => "call",
        }
    }
}

/// Leaf reading a column of the dataset
#[derive(Clone)]
pub struct ColumnNode {
    name: String,
    source: Arc<dyn ValueSource>,
}

impl ColumnNode {
    pub fn new<S: Into<String>>(name: S, source: Arc<dyn ValueSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Column name as written in the formula
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<dyn ValueSource> {
        &self.source
    }
}

impl fmt::Debug for ColumnNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnNode")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .finish()
    }
}
