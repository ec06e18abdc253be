//! Lazy column view over a node

use tally_core::Value;

use crate::error::FormulaResult;
use crate::evaluator::EvalContext;
use crate::node::NodeId;
use crate::tree::FormulaTree;

/// The values of a node for every row, produced on demand
///
/// With `filt` set, rows excluded by the context's row filter are skipped.
/// Each call to [`ColumnView::iter`] starts again from the first row.
#[derive(Clone, Copy)]
pub struct ColumnView<'t, 'c> {
    tree: &'t FormulaTree,
    node: NodeId,
    ctx: EvalContext<'c>,
    filt: bool,
}

impl<'t, 'c> ColumnView<'t, 'c> {
    pub(crate) fn new(tree: &'t FormulaTree, node: NodeId, ctx: EvalContext<'c>, filt: bool) -> Self {
        Self {
            tree,
            node,
            ctx,
            filt,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn iter(&self) -> ColumnIter<'t, 'c> {
        ColumnIter {
            view: *self,
            row: 0,
        }
    }

    /// Evaluate every row eagerly
    pub fn to_vec(&self) -> FormulaResult<Vec<Value>> {
        self.iter().collect()
    }
}

impl<'t, 'c> IntoIterator for ColumnView<'t, 'c> {
    type Item = FormulaResult<Value>;
    type IntoIter = ColumnIter<'t, 'c>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`ColumnView`]
pub struct ColumnIter<'t, 'c> {
    view: ColumnView<'t, 'c>,
    row: usize,
}

impl<'t, 'c> ColumnIter<'t, 'c> {
    /// Row the next value will come from, before filtering
    pub fn position(&self) -> usize {
        self.row
    }
}

impl Iterator for ColumnIter<'_, '_> {
    type Item = FormulaResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let view = &self.view;
        while self.row < view.ctx.row_count {
            let row = self.row;
            self.row += 1;
            if view.filt && view.ctx.is_filtered(row) {
                continue;
            }
            return Some(view.tree.fvalue(view.node, row, &view.ctx, view.filt));
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.view.ctx.row_count.saturating_sub(self.row);
        if self.view.filt && self.view.ctx.filter.is_some() {
            (0, Some(remaining))
        } else {
            (remaining, Some(remaining))
        }
    }
}
