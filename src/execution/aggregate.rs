use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::common::{DbError, Result};
use crate::tuple::{Column, DataType, Schema, Tuple, Value};

use super::OpIterator;

/// Aggregate functions over one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Count,
    Avg,
}

impl AggregateOp {
    fn init(self) -> AggState {
        match self {
            AggregateOp::Min => AggState::Min(None),
            AggregateOp::Max => AggState::Max(None),
            AggregateOp::Sum => AggState::Sum(0),
            AggregateOp::Count => AggState::Count(0),
            AggregateOp::Avg => AggState::Avg { sum: 0, count: 0 },
        }
    }

    /// Returns whether this function accepts values of `data_type`.
    pub fn supports(self, data_type: DataType) -> bool {
        matches!(data_type, DataType::Integer) || self == AggregateOp::Count
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Count => "count",
            AggregateOp::Avg => "avg",
        };
        f.write_str(s)
    }
}

/// Running state of one aggregate for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggState {
    Min(Option<i32>),
    Max(Option<i32>),
    Sum(i64),
    Count(i64),
    Avg { sum: i64, count: i64 },
}

impl AggState {
    fn fold(self, value: &Value) -> Result<AggState> {
        if let AggState::Count(n) = self {
            return Ok(AggState::Count(n + 1));
        }
        let v = value.as_int().ok_or_else(|| {
            DbError::TypeMismatch(format!("cannot aggregate {} values", value.data_type()))
        })?;
        Ok(match self {
            AggState::Min(m) => AggState::Min(Some(m.map_or(v, |m| m.min(v)))),
            AggState::Max(m) => AggState::Max(Some(m.map_or(v, |m| m.max(v)))),
            AggState::Sum(s) => AggState::Sum(s + v as i64),
            AggState::Avg { sum, count } => AggState::Avg {
                sum: sum + v as i64,
                count: count + 1,
            },
            AggState::Count(n) => AggState::Count(n + 1),
        })
    }

    fn finish(self) -> i32 {
        match self {
            AggState::Min(m) | AggState::Max(m) => m.unwrap_or(0),
            AggState::Sum(s) => s as i32,
            AggState::Count(n) => n as i32,
            AggState::Avg { sum, count } if count > 0 => (sum / count) as i32,
            AggState::Avg { .. } => 0,
        }
    }
}

/// Computes one aggregate over a child, optionally grouped by another column.
///
/// Output is `(group, aggregate)` when grouping and `(aggregate)` otherwise.
/// Groups come out in the order they were first seen. An empty child yields
/// no rows.
pub struct Aggregate<'a> {
    child: Box<dyn OpIterator + 'a>,
    agg_field: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    schema: Arc<Schema>,
    results: Vec<Tuple>,
    position: usize,
    computed: bool,
}

impl<'a> Aggregate<'a> {
    pub fn new(
        child: Box<dyn OpIterator + 'a>,
        agg_field: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        let child_schema = child.schema().clone();
        let agg_column = child_schema.column(agg_field)?;
        if !op.supports(agg_column.data_type()) {
            return Err(DbError::TypeMismatch(format!(
                "{} is not defined for {}",
                op,
                agg_column.data_type()
            )));
        }

        let agg_name = format!("{}({})", op, agg_column.name().unwrap_or("null"));
        let mut columns = Vec::new();
        if let Some(g) = group_by {
            columns.push(child_schema.column(g)?.clone());
        }
        columns.push(Column::new(agg_name, DataType::Integer));

        Ok(Self {
            child,
            agg_field,
            group_by,
            op,
            schema: Arc::new(Schema::new(columns)?),
            results: Vec::new(),
            position: 0,
            computed: false,
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn group_by(&self) -> Option<usize> {
        self.group_by
    }

    /// Drains the child and folds every tuple into its group.
    fn compute(&mut self) -> Result<()> {
        let mut groups: Vec<(Option<Value>, AggState)> = Vec::new();
        let mut index: HashMap<Option<Value>, usize> = HashMap::new();

        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let key = match self.group_by {
                Some(g) => Some(tuple.value(g)?.clone()),
                None => None,
            };
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push((key, self.op.init()));
                groups.len() - 1
            });
            let state = &mut groups[slot].1;
            *state = state.fold(tuple.value(self.agg_field)?)?;
        }

        self.results = groups
            .into_iter()
            .map(|(key, state)| {
                let mut values: Vec<Value> = key.into_iter().collect();
                values.push(Value::Integer(state.finish()));
                Tuple::new(self.schema.clone(), values)
            })
            .collect::<Result<Vec<_>>>()?;
        self.position = 0;
        self.computed = true;
        Ok(())
    }
}

impl OpIterator for Aggregate<'_> {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.computed = false;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        if !self.computed {
            self.compute()?;
        }
        Ok(self.position < self.results.len())
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(DbError::IllegalState("aggregate has no more tuples".into()));
        }
        self.position += 1;
        Ok(self.results[self.position - 1].clone())
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.computed = false;
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
