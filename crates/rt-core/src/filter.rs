//! Filter engine
//!
//! Per-column predicates combined by logical AND. Each predicate only looks at
//! its own column, so the order predicates were added in never changes the
//! outcome.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::columns::{descriptor, FilterKind};
use crate::row::{Cell, ColumnId, Row, Value};

/// Errors raised by filter operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("column {column} does not accept {kind:?} filters")]
    NotFilterable { column: ColumnId, kind: FilterKind },

    #[error("range bound on {0} is not a number")]
    InvalidBound(ColumnId),
}

/// Argument to [`FilterState::set_equality`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Choice {
    /// Inactive: every value passes
    All,
    /// Only rows whose cell strictly equals this value pass
    Only(Value),
}

/// Inclusive numeric bounds; an absent side is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeBounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// An active predicate on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Equals(Value),
    Range(RangeBounds),
}

impl Predicate {
    pub fn test(&self, cell: Cell<'_>) -> bool {
        match self {
            Predicate::Equals(target) => target.matches(cell),
            // Non-numeric cells never satisfy an active range
            Predicate::Range(bounds) => cell.as_number().map_or(false, |n| bounds.contains(n)),
        }
    }
}

/// The set of active predicates of one table instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    predicates: IndexMap<ColumnId, Predicate>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate or clear an equality predicate. Returns whether the state changed.
    pub fn set_equality(&mut self, column: ColumnId, choice: Choice) -> Result<bool, FilterError> {
        check_kind(column, FilterKind::Equality)?;

        let changed = match choice {
            Choice::All => self.predicates.shift_remove(&column).is_some(),
            Choice::Only(value) => {
                let predicate = Predicate::Equals(value);
                self.predicates.insert(column, predicate.clone()) != Some(predicate)
            }
        };
        Ok(changed)
    }

    /// Activate or clear a range predicate. Both bounds absent clears it.
    /// Returns whether the state changed.
    pub fn set_range(
        &mut self,
        column: ColumnId,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<bool, FilterError> {
        check_kind(column, FilterKind::Range)?;
        if min.is_some_and(f64::is_nan) || max.is_some_and(f64::is_nan) {
            return Err(FilterError::InvalidBound(column));
        }

        let bounds = RangeBounds::new(min, max);
        let changed = if bounds.is_unbounded() {
            self.predicates.shift_remove(&column).is_some()
        } else {
            let predicate = Predicate::Range(bounds);
            self.predicates.insert(column, predicate.clone()) != Some(predicate)
        };
        Ok(changed)
    }

    /// Clear every predicate. Returns whether anything was active.
    pub fn clear(&mut self) -> bool {
        let had_any = !self.predicates.is_empty();
        self.predicates.clear();
        had_any
    }

    pub fn get(&self, column: ColumnId) -> Option<&Predicate> {
        self.predicates.get(&column)
    }

    /// Current bounds of a range column, unbounded when inactive
    pub fn range(&self, column: ColumnId) -> RangeBounds {
        match self.predicates.get(&column) {
            Some(Predicate::Range(bounds)) => *bounds,
            _ => RangeBounds::default(),
        }
    }

    /// Current equality choice of a column
    pub fn choice(&self, column: ColumnId) -> Choice {
        match self.predicates.get(&column) {
            Some(Predicate::Equals(value)) => Choice::Only(value.clone()),
            _ => Choice::All,
        }
    }

    /// Active predicates in the order they were activated
    pub fn iter(&self) -> impl Iterator<Item = (ColumnId, &Predicate)> {
        self.predicates.iter().map(|(column, predicate)| (*column, predicate))
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// A row passes iff it passes every active predicate
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates
            .iter()
            .all(|(column, predicate)| predicate.test(row.cell(*column)))
    }
}

fn check_kind(column: ColumnId, kind: FilterKind) -> Result<(), FilterError> {
    if descriptor(column).filter == Some(kind) {
        Ok(())
    } else {
        Err(FilterError::NotFilterable { column, kind })
    }
}

/// Distinct values of a column, numbers ascending first, then text ascending.
/// Missing cells are not offered as options.
pub fn option_domain(rows: &[Row], column: ColumnId) -> Vec<Value> {
    let mut cells: Vec<Cell<'_>> = rows
        .iter()
        .map(|row| row.cell(column))
        .filter(|cell| !cell.is_missing())
        .collect();
    cells.sort_by(|a, b| a.total_cmp(b));
    cells.dedup_by(|a, b| a.total_cmp(b).is_eq());
    cells.iter().filter_map(Cell::to_value).collect()
}
