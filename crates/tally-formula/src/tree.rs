//! Arena holding compiled formula nodes
//!
//! [`FormulaTree::compile`] turns a [`FormulaExpr`] into nodes; the builder
//! methods do the same one node at a time. Nodes are released explicitly,
//! which unlinks them from their children and frees children no longer
//! referenced by anything.

use std::fmt;
use std::sync::Arc;

use tally_core::{ColumnResolver, Value, ValueSource};
use tracing::{debug, trace};

use crate::ast::{BinaryOperator, BoolOperator, CompareOperator, FormulaExpr, UnaryOperator};
use crate::call::{check_arity, synthesis_plan, CallNode};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{default_registry, FunctionDef, FunctionRegistry};
use crate::node::{ColumnNode, Node, NodeId, NodeKind};

/// Arena of formula nodes sharing one function registry
pub struct FormulaTree {
    nodes: Vec<Option<Node>>,
    registry: Arc<FunctionRegistry>,
}

impl FormulaTree {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            nodes: Vec::new(),
            registry,
        }
    }

    /// Tree using the built-in functions
    pub fn with_default_registry() -> Self {
        Self::new(default_registry())
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    pub fn node(&self, id: NodeId) -> FormulaResult<&Node> {
        match self.nodes.get(id.0) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(FormulaError::ReleasedNode(id)),
            None => Err(FormulaError::InvalidNode(format!("{} is not part of this tree", id))),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> FormulaResult<&mut Node> {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => Ok(node),
            Some(None) => Err(FormulaError::ReleasedNode(id)),
            None => Err(FormulaError::InvalidNode(format!("{} is not part of this tree", id))),
        }
    }

    /// Nodes consuming the value of `id`
    pub fn parents(&self, id: NodeId) -> FormulaResult<&[NodeId]> {
        Ok(self.node(id)?.parents())
    }

    /// Live nodes nothing else consumes
    pub fn roots(&self) -> Vec<NodeId> {
        self.live_ids()
            .filter(|id| self.nodes[id.0].as_ref().map_or(false, |n| n.parents.is_empty()))
            .collect()
    }

    /// Live column leaves reading the named column
    pub fn column_nodes(&self, name: &str) -> Vec<NodeId> {
        self.live_ids()
            .filter(|id| {
                matches!(
                    self.nodes[id.0].as_ref().map(|n| &n.kind),
                    Some(NodeKind::Column(column)) if column.name() == name
                )
            })
            .collect()
    }

    fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i))
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        for child in kind.children() {
            if let Some(Some(node)) = self.nodes.get_mut(child.0) {
                node.parents.push(id);
            }
        }
        trace!(node = %id, kind = kind.name(), "inserted node");
        self.nodes.push(Some(Node::new(kind)));
        id
    }

    fn ensure_live(&self, ids: &[NodeId]) -> FormulaResult<()> {
        for id in ids {
            self.node(*id)?;
        }
        Ok(())
    }

    // === Compilation ===

    /// Compile a parsed formula, resolving column names through `resolver`
    pub fn compile(
        &mut self,
        expr: &FormulaExpr,
        resolver: &dyn ColumnResolver,
    ) -> FormulaResult<NodeId> {
        let root = self.compile_expr(expr, resolver)?;
        debug!(root = %root, nodes = self.len(), "compiled formula");
        Ok(root)
    }

    fn compile_expr(
        &mut self,
        expr: &FormulaExpr,
        resolver: &dyn ColumnResolver,
    ) -> FormulaResult<NodeId> {
        match expr {
            FormulaExpr::Number(n) => Ok(self.number(*n)),
            FormulaExpr::Text(s) => Ok(self.text(s.clone())),
            FormulaExpr::Column(name) => {
                let source = resolver
                    .resolve(name)
                    .ok_or_else(|| FormulaError::UnknownColumn(name.clone()))?;
                Ok(self.column(name.clone(), source))
            }
            FormulaExpr::UnaryOp { op, operand } => {
                let operand = self.compile_expr(operand, resolver)?;
                self.unary(*op, operand)
            }
            FormulaExpr::BoolOp { op, values } => {
                let values = self.compile_all(values.iter(), resolver)?;
                let result = self.boolean(*op, values.clone());
                self.discard_on_error(result, &values)
            }
            FormulaExpr::BinaryOp { op, left, right } => {
                let ids = self.compile_all([left.as_ref(), right.as_ref()], resolver)?;
                self.binary(*op, ids[0], ids[1])
            }
            FormulaExpr::Compare {
                left,
                ops,
                comparators,
            } => {
                let left = self.compile_expr(left, resolver)?;
                let comparators = match self.compile_all(comparators.iter(), resolver) {
                    Ok(ids) => ids,
                    Err(e) => {
                        self.discard(&[left]);
                        return Err(e);
                    }
                };
                let result = self.compare(left, ops.clone(), comparators.clone());
                let mut children = vec![left];
                children.extend(comparators);
                self.discard_on_error(result, &children)
            }
            FormulaExpr::Call { name, args } => {
                let function = self
                    .registry
                    .get(name)
                    .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
                let args = self.compile_all(args.iter(), resolver)?;
                let result = self.call_function(function, args.clone());
                self.discard_on_error(result, &args)
            }
        }
    }

    /// Compile several expressions; on failure the ones already built are
    /// released
    fn compile_all<'e, I>(
        &mut self,
        exprs: I,
        resolver: &dyn ColumnResolver,
    ) -> FormulaResult<Vec<NodeId>>
    where
        I: IntoIterator<Item = &'e FormulaExpr>,
    {
        let mut ids = Vec::new();
        for expr in exprs {
            match self.compile_expr(expr, resolver) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    self.discard(&ids);
                    return Err(e);
                }
            }
        }
        Ok(ids)
    }

    fn discard_on_error(
        &mut self,
        result: FormulaResult<NodeId>,
        children: &[NodeId],
    ) -> FormulaResult<NodeId> {
        if result.is_err() {
            self.discard(children);
        }
        result
    }

    /// Release freshly built subtrees nothing references
    fn discard(&mut self, ids: &[NodeId]) {
        for id in ids {
            if self.node(*id).map_or(false, |n| n.parents.is_empty()) {
                self.release_cascade(*id, &[]);
            }
        }
    }

    // === Builders ===

    /// Numeric literal; integral values within `i32` become integers
    pub fn number(&mut self, n: f64) -> NodeId {
        let value = if n.fract() == 0.0 && n > f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
            Value::Integer(n as i32)
        } else {
            Value::Decimal(n)
        };
        self.insert(NodeKind::Literal(value))
    }

    pub fn text<S: Into<String>>(&mut self, s: S) -> NodeId {
        self.insert(NodeKind::Literal(Value::Text(s.into())))
    }

    pub fn column<S: Into<String>>(&mut self, name: S, source: Arc<dyn ValueSource>) -> NodeId {
        self.insert(NodeKind::Column(ColumnNode::new(name, source)))
    }

    pub fn unary(&mut self, op: UnaryOperator, operand: NodeId) -> FormulaResult<NodeId> {
        self.ensure_live(&[operand])?;
        Ok(self.insert(NodeKind::Unary { op, operand }))
    }

    pub fn boolean(&mut self, op: BoolOperator, values: Vec<NodeId>) -> FormulaResult<NodeId> {
        if values.is_empty() {
            return Err(FormulaError::InvalidNode(
                "boolean operator without operands".into(),
            ));
        }
        self.ensure_live(&values)?;
        Ok(self.insert(NodeKind::Bool { op, values }))
    }

    pub fn binary(
        &mut self,
        op: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> FormulaResult<NodeId> {
        self.ensure_live(&[left, right])?;
        Ok(self.insert(NodeKind::Binary { op, left, right }))
    }

    pub fn compare(
        &mut self,
        left: NodeId,
        ops: Vec<CompareOperator>,
        comparators: Vec<NodeId>,
    ) -> FormulaResult<NodeId> {
        if ops.is_empty() || ops.len() != comparators.len() {
            return Err(FormulaError::InvalidNode(format!(
                "comparison with {} operators and {} comparators",
                ops.len(),
                comparators.len()
            )));
        }
        self.ensure_live(&[left])?;
        self.ensure_live(&comparators)?;
        Ok(self.insert(NodeKind::Compare {
            left,
            ops,
            comparators,
        }))
    }

    /// Call a registered function, synthesizing omitted sub-function
    /// arguments
    pub fn call(&mut self, name: &str, args: Vec<NodeId>) -> FormulaResult<NodeId> {
        let function = self
            .registry
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        self.call_function(function, args)
    }

    fn call_function(
        &mut self,
        function: Arc<FunctionDef>,
        args: Vec<NodeId>,
    ) -> FormulaResult<NodeId> {
        self.ensure_live(&args)?;

        let plan = synthesis_plan(&function, args.len());
        check_arity(&function, args.len() + plan.len())?;

        let shared = args[..function.sub_function_start().min(args.len())].to_vec();
        let mut synthesized = Vec::with_capacity(plan.len());
        for sub in plan {
            match self.call(sub, shared.clone()) {
                Ok(id) => {
                    debug!(
                        function = function.name,
                        sub_function = sub,
                        node = %id,
                        "synthesized sub-function argument"
                    );
                    synthesized.push(id);
                }
                Err(e) => {
                    for id in synthesized {
                        self.release_cascade(id, &args);
                    }
                    return Err(e);
                }
            }
        }

        let count = synthesized.len();
        let mut all = args;
        all.extend(synthesized);
        Ok(self.insert(NodeKind::Call(CallNode::new(function, all, count))))
    }

    // === Release ===

    /// Release a root node and every descendant no other node references
    pub fn release(&mut self, id: NodeId) -> FormulaResult<()> {
        let parents = self.node(id)?.parents.len();
        if parents > 0 {
            return Err(FormulaError::InvalidNode(format!(
                "{} is still referenced by {} node(s)",
                id, parents
            )));
        }
        self.release_cascade(id, &[]);
        Ok(())
    }

    /// Free `id`, unlink it from its children and free children whose
    /// parent list becomes empty, except the `protected` ones
    fn release_cascade(&mut self, id: NodeId, protected: &[NodeId]) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) else {
                continue;
            };
            trace!(node = %current, kind = node.kind.name(), "released node");
            for child in node.kind.children() {
                if let Some(Some(child_node)) = self.nodes.get_mut(child.0) {
                    if let Some(pos) = child_node.parents.iter().position(|p| *p == current) {
                        child_node.parents.remove(pos);
                    }
                    if child_node.parents.is_empty() && !protected.contains(&child) {
                        stack.push(child);
                    }
                }
            }
        }
    }

    // === Invalidation ===

    /// Source data below `id` changed: clear whole-column memos from `id`
    /// upwards and return the roots reached, one entry per path
    pub fn notify_recalc(&mut self, id: NodeId) -> FormulaResult<Vec<NodeId>> {
        self.node(id)?;
        let mut roots = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current)?;
            if let NodeKind::Call(call) = &mut node.kind {
                if call.invalidate() {
                    trace!(node = %current, function = call.name(), "cleared memoized result");
                }
            }
            if node.parents.is_empty() {
                roots.push(current);
            } else {
                stack.extend(node.parents.iter().copied());
            }
        }
        Ok(roots)
    }

    /// Structure or types below `id` changed: return the roots that need
    /// recompiling, one entry per path
    pub fn notify_reparse(&self, id: NodeId) -> FormulaResult<Vec<NodeId>> {
        let mut roots = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            if node.parents.is_empty() {
                roots.push(current);
            } else {
                stack.extend(node.parents.iter().copied());
            }
        }
        Ok(roots)
    }

    /// Whether a whole-column result must be recomputed before use
    ///
    /// Only call nodes cache anything; for them this is true whenever no
    /// result is cached, which includes every row-wise call.
    pub fn needs_recalc(&self, id: NodeId) -> FormulaResult<bool> {
        match &self.node(id)?.kind {
            NodeKind::Call(call) => Ok(!call.is_memoized()),
            _ => Ok(false),
        }
    }

    /// Clear every memoized whole-column result
    pub fn invalidate_all(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            if let NodeKind::Call(call) = &mut node.kind {
                call.invalidate();
            }
        }
    }
}

impl Default for FormulaTree {
    fn default() -> Self {
        Self::with_default_registry()
    }
}

impl fmt::Debug for FormulaTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaTree")
            .field("nodes", &self.nodes)
            .finish()
    }
}
