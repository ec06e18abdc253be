//! Parsed formula types
//!
//! This is the form an upstream parser hands to the engine. It is compiled
//! into a [`crate::FormulaTree`] before evaluation.

/// Parsed formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// Text literal
    Text(String),

    // === References ===
    /// Reference to a dataset column by name
    Column(String),

    // === Operators ===
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },
    /// `and`/`or` over two or more operands
    BoolOp {
        op: BoolOperator,
        values: Vec<FormulaExpr>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Chained comparison: `left ops[0] comparators[0] ops[1] comparators[1] ...`
    Compare {
        left: Box<FormulaExpr>,
        ops: Vec<CompareOperator>,
        comparators: Vec<FormulaExpr>,
    },

    // === Function call ===
    Call {
        name: String,
        args: Vec<FormulaExpr>,
    },
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
    Invert,
}

/// Boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    /// `^`, evaluated as exponentiation
    BitXor,
}

/// Relational operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl FormulaExpr {
    pub fn number(n: f64) -> Self {
        FormulaExpr::Number(n)
    }

    pub fn text<S: Into<String>>(s: S) -> Self {
        FormulaExpr::Text(s.into())
    }

    pub fn column<S: Into<String>>(name: S) -> Self {
        FormulaExpr::Column(name.into())
    }

    pub fn unary(op: UnaryOperator, operand: FormulaExpr) -> Self {
        FormulaExpr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn and(values: Vec<FormulaExpr>) -> Self {
        FormulaExpr::BoolOp {
            op: BoolOperator::And,
            values,
        }
    }

    pub fn or(values: Vec<FormulaExpr>) -> Self {
        FormulaExpr::BoolOp {
            op: BoolOperator::Or,
            values,
        }
    }

    pub fn binary(left: FormulaExpr, op: BinaryOperator, right: FormulaExpr) -> Self {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build a comparison chain from a first operand and `(op, operand)` pairs
    pub fn compare(left: FormulaExpr, rest: Vec<(CompareOperator, FormulaExpr)>) -> Self {
        let (ops, comparators) = rest.into_iter().unzip();
        FormulaExpr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        }
    }

    pub fn call<S: Into<String>>(name: S, args: Vec<FormulaExpr>) -> Self {
        FormulaExpr::Call {
            name: name.into(),
            args,
        }
    }

    /// Names of all columns referenced by this expression, in first-use order
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_columns(&mut names);
        names
    }

    fn collect_columns<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            FormulaExpr::Number(_) | FormulaExpr::Text(_) => {}
            FormulaExpr::Column(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_columns(names),
            FormulaExpr::BoolOp { values, .. } => {
                for value in values {
                    value.collect_columns(names);
                }
            }
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_columns(names);
                right.collect_columns(names);
            }
            FormulaExpr::Compare {
                left, comparators, ..
            } => {
                left.collect_columns(names);
                for comparator in comparators {
                    comparator.collect_columns(names);
                }
            }
            FormulaExpr::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(names);
                }
            }
        }
    }
}
