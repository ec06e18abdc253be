//! # tally-formula
//!
//! Formula trees and evaluator for tally computed columns.
//!
//! This crate provides:
//! - The parsed formula form ([`FormulaExpr`]) handed over by a parser
//! - Compilation into an arena of typed nodes ([`FormulaTree`])
//! - Point and column evaluation with missing-value propagation
//! - A function registry with sub-function synthesis and memoized
//!   whole-column functions
//! - Dependency tracking between computed columns
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tally_core::{ColumnResolver, DataColumn, Value, ValueSource};
//! use tally_formula::{BinaryOperator, EvalContext, FormulaExpr, FormulaTree};
//!
//! struct Columns(Arc<DataColumn>);
//!
//! impl ColumnResolver for Columns {
//!     fn resolve(&self, name: &str) -> Option<Arc<dyn ValueSource>> {
//!         (name == self.0.name()).then(|| Arc::clone(&self.0) as Arc<dyn ValueSource>)
//!     }
//! }
//!
//! let columns = Columns(Arc::new(DataColumn::integer("x", [1, 2, 3])));
//! let expr = FormulaExpr::binary(
//!     FormulaExpr::column("x"),
//!     BinaryOperator::Multiply,
//!     FormulaExpr::number(2.0),
//! );
//!
//! let mut tree = FormulaTree::with_default_registry();
//! let root = tree.compile(&expr, &columns).unwrap();
//! let ctx = EvalContext::new(3);
//! assert_eq!(tree.fvalue(root, 2, &ctx, false).unwrap(), Value::Integer(6));
//! ```

pub mod ast;
pub mod call;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod node;
pub mod operators;
pub mod tree;
pub mod view;

pub use ast::{BinaryOperator, BoolOperator, CompareOperator, FormulaExpr, UnaryOperator};
pub use call::CallNode;
pub use dependency::{CalculationOrder, ColumnKey, DependencyGraph};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::EvalContext;
pub use functions::{default_registry, FunctionDef, FunctionRegistry, ParamDef, ParamDefault};
pub use node::{ColumnNode, Node, NodeId, NodeKind};
pub use tree::FormulaTree;
pub use view::{ColumnView, ColumnIter};
