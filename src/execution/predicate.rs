use std::fmt;

use crate::common::Result;
use crate::tuple::{CompareOp, Tuple, Value};

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    field: usize,
    op: CompareOp,
    operand: Value,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: Value) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Evaluates `tuple[field] op operand`.
    pub fn filter(&self, tuple: &Tuple) -> Result<bool> {
        tuple.value(self.field)?.compare(self.op, &self.operand)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f = {} op = {} operand = {}", self.field, self.op, self.operand)
    }
}
