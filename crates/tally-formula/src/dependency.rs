//! Dependency tracking between computed columns

use std::fmt;

use ahash::{AHashMap, AHashSet};

/// Column identity in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnKey(String);

impl ColumnKey {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of ordering a set of columns for calculation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CalculationOrder {
    /// Columns whose precedents all come earlier in this list
    pub order: Vec<ColumnKey>,
    /// Columns on, or downstream of, a circular reference
    pub circular: Vec<ColumnKey>,
}

/// Dependency graph between columns
///
/// Tracks which columns' formulas reference which other columns, enabling
/// targeted recalculation.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Column → columns that depend on it (dependents)
    dependents: AHashMap<ColumnKey, AHashSet<ColumnKey>>,
    /// Column → columns it depends on (precedents)
    precedents: AHashMap<ColumnKey, AHashSet<ColumnKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: ColumnKey, dependent: ColumnKey) {
        self.dependents
            .entry(precedent.clone())
            .or_default()
            .insert(dependent.clone());
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Replace the precedents of a column
    pub fn set_precedents<I>(&mut self, dependent: &ColumnKey, precedents: I)
    where
        I: IntoIterator<Item = ColumnKey>,
    {
        self.clear_precedents(dependent);
        for precedent in precedents {
            self.add_dependency(precedent, dependent.clone());
        }
    }

    /// Remove the dependencies a column's formula introduced
    pub fn clear_precedents(&mut self, column: &ColumnKey) {
        if let Some(precedents) = self.precedents.remove(column) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(column);
                }
            }
        }
    }

    /// Remove all dependencies for a column, in both directions
    pub fn clear_dependencies(&mut self, column: &ColumnKey) {
        self.clear_precedents(column);

        if let Some(dependents) = self.dependents.remove(column) {
            for dependent in dependents {
                if let Some(precs) = self.precedents.get_mut(&dependent) {
                    precs.remove(column);
                }
            }
        }
    }

    /// Columns that depend directly on the given column, sorted
    pub fn get_dependents(&self, column: &ColumnKey) -> Vec<ColumnKey> {
        sorted(self.dependents.get(column))
    }

    /// Columns the given column depends on directly, sorted
    pub fn get_precedents(&self, column: &ColumnKey) -> Vec<ColumnKey> {
        sorted(self.precedents.get(column))
    }

    /// Every column downstream of the changed ones, in recalculation order
    ///
    /// The changed columns themselves are not included. Columns on a cycle
    /// are skipped.
    pub fn get_recalc_order(&self, changed: &[ColumnKey]) -> Vec<ColumnKey> {
        let mut result = Vec::new();
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for column in changed {
            self.topological_sort(column, &mut result, &mut visited, &mut in_stack);
        }

        result.reverse();
        result.retain(|c| !changed.contains(c));
        result
    }

    /// DFS over dependents; pushes a column after everything downstream
    fn topological_sort(
        &self,
        column: &ColumnKey,
        result: &mut Vec<ColumnKey>,
        visited: &mut AHashSet<ColumnKey>,
        in_stack: &mut AHashSet<ColumnKey>,
    ) {
        if visited.contains(column) || in_stack.contains(column) {
            return;
        }

        in_stack.insert(column.clone());

        for dependent in self.get_dependents(column) {
            self.topological_sort(&dependent, result, visited, in_stack);
        }

        in_stack.remove(column);
        visited.insert(column.clone());
        result.push(column.clone());
    }

    /// Order columns so each comes after its precedents
    ///
    /// Columns that reach a cycle through their precedents are reported in
    /// [`CalculationOrder::circular`] instead of being ordered.
    pub fn calculation_order(&self, columns: &[ColumnKey]) -> CalculationOrder {
        let mut result = CalculationOrder::default();
        let mut visited = AHashSet::new();

        for column in columns {
            if self.has_circular_reference(column) {
                result.circular.push(column.clone());
            }
        }

        for column in columns {
            if !result.circular.contains(column) {
                self.visit_precedents(column, columns, &mut visited, &mut result.order);
            }
        }

        result
    }

    fn visit_precedents(
        &self,
        column: &ColumnKey,
        wanted: &[ColumnKey],
        visited: &mut AHashSet<ColumnKey>,
        order: &mut Vec<ColumnKey>,
    ) {
        if !visited.insert(column.clone()) {
            return;
        }
        for precedent in self.get_precedents(column) {
            self.visit_precedents(&precedent, wanted, visited, order);
        }
        if wanted.contains(column) {
            order.push(column.clone());
        }
    }

    /// Whether a cycle is reachable from the column through its precedents
    pub fn has_circular_reference(&self, column: &ColumnKey) -> bool {
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();
        self.detect_cycle(column, &mut visited, &mut in_stack)
    }

    fn detect_cycle(
        &self,
        column: &ColumnKey,
        visited: &mut AHashSet<ColumnKey>,
        in_stack: &mut AHashSet<ColumnKey>,
    ) -> bool {
        if in_stack.contains(column) {
            return true;
        }
        if visited.contains(column) {
            return false;
        }

        visited.insert(column.clone());
        in_stack.insert(column.clone());

        if let Some(precedents) = self.precedents.get(column) {
            for precedent in precedents {
                if self.detect_cycle(precedent, visited, in_stack) {
                    return true;
                }
            }
        }

        in_stack.remove(column);
        false
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
    }
}

fn sorted(set: Option<&AHashSet<ColumnKey>>) -> Vec<ColumnKey> {
    let mut keys: Vec<ColumnKey> = set.into_iter().flatten().cloned().collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(name: &str) -> ColumnKey {
        ColumnKey::from(name)
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(key("a"), key("b"));

        assert_eq!(graph.get_dependents(&key("a")), vec![key("b")]);
        assert_eq!(graph.get_precedents(&key("b")), vec![key("a")]);
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(key("a"), key("b"));
        graph.add_dependency(key("b"), key("a"));
        graph.add_dependency(key("a"), key("c"));
        graph.add_dependency(key("x"), key("y"));

        assert!(graph.has_circular_reference(&key("a")));
        assert!(graph.has_circular_reference(&key("c")));
        assert!(!graph.has_circular_reference(&key("y")));

        let order = graph.calculation_order(&[key("a"), key("b"), key("c"), key("y")]);
        assert_eq!(order.order, vec![key("y")]);
        assert_eq!(order.circular, vec![key("a"), key("b"), key("c")]);
    }

    #[test]
    fn test_calculation_order() {
        let mut graph = DependencyGraph::new();
        // c = f(b), b = f(a), d = f(a, c)
        graph.set_precedents(&key("c"), [key("b")]);
        graph.set_precedents(&key("b"), [key("a")]);
        graph.set_precedents(&key("d"), [key("a"), key("c")]);

        let order = graph.calculation_order(&[key("d"), key("c"), key("b")]);
        assert_eq!(order.order, vec![key("b"), key("c"), key("d")]);
        assert!(order.circular.is_empty());
    }

    #[test]
    fn test_recalc_order() {
        let mut graph = DependencyGraph::new();
        graph.set_precedents(&key("b"), [key("a")]);
        graph.set_precedents(&key("c"), [key("b")]);
        graph.set_precedents(&key("d"), [key("a")]);

        let order = graph.get_recalc_order(&[key("a")]);
        assert_eq!(order.len(), 3);
        let pos = |k: &str| order.iter().position(|c| c == &key(k)).unwrap();
        assert!(pos("b") < pos("c"));
        assert!(!order.contains(&key("a")));
    }

    #[test]
    fn test_set_precedents_replaces() {
        let mut graph = DependencyGraph::new();
        graph.set_precedents(&key("b"), [key("a")]);
        graph.set_precedents(&key("b"), [key("c")]);

        assert!(graph.get_dependents(&key("a")).is_empty());
        assert_eq!(graph.get_precedents(&key("b")), vec![key("c")]);

        graph.clear_dependencies(&key("c"));
        assert!(graph.get_precedents(&key("b")).is_empty());
    }
}
