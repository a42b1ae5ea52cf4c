//! Sort engine
//!
//! Multi-key, directional comparison over row indices. Ties on every active key
//! fall back to the row's index in the store, which makes the final order
//! stable regardless of the underlying sort algorithm.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::columns::{descriptor, ComparatorKind};
use crate::row::{Cell, ColumnId, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// One priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: ColumnId,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: ColumnId) -> Self {
        Self { column, direction: SortDirection::Ascending }
    }

    pub fn desc(column: ColumnId) -> Self {
        Self { column, direction: SortDirection::Descending }
    }
}

/// Ordered sort keys; the first key is the primary one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    keys: Vec<SortKey>,
}

impl SortState {
    pub fn new(keys: Vec<SortKey>) -> Self {
        let mut state = Self::default();
        for key in keys {
            // Later duplicates of a column are dropped
            if state.direction_of(key.column).is_none() {
                state.keys.push(key);
            }
        }
        state
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn direction_of(&self, column: ColumnId) -> Option<SortDirection> {
        self.keys.iter().find(|k| k.column == column).map(|k| k.direction)
    }

    /// Priority of a column (0 = primary), if it is sorted
    pub fn priority_of(&self, column: ColumnId) -> Option<usize> {
        self.keys.iter().position(|k| k.column == column)
    }

    /// Advance a column through inactive → ascending → descending → inactive.
    ///
    /// Without `multi` the column becomes the only sort key. With `multi`, an
    /// existing tier changes direction in place and a new column is appended
    /// as the lowest priority tier. Unsortable columns are ignored.
    pub fn toggle(&mut self, column: ColumnId, multi: bool) {
        if !descriptor(column).is_sortable() {
            return;
        }

        let next = match self.direction_of(column) {
            None => Some(SortDirection::Ascending),
            Some(SortDirection::Ascending) => Some(SortDirection::Descending),
            Some(SortDirection::Descending) => None,
        };

        if !multi {
            self.keys.clear();
            if let Some(direction) = next {
                self.keys.push(SortKey { column, direction });
            }
            return;
        }

        match (self.priority_of(column), next) {
            (Some(idx), Some(direction)) => self.keys[idx].direction = direction,
            (Some(idx), None) => {
                self.keys.remove(idx);
            }
            (None, Some(direction)) => self.keys.push(SortKey { column, direction }),
            (None, None) => {}
        }
    }

    /// Compare two rows over every tier, in priority order
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for key in &self.keys {
            let kind = descriptor(key.column).comparator.unwrap_or(ComparatorKind::Text);
            let ordering = compare_cells(kind, a.cell(key.column), b.cell(key.column));
            if ordering != Ordering::Equal {
                return key.direction.apply(ordering);
            }
        }
        Ordering::Equal
    }

    /// Sort row indices in place. Ties are broken by index so equal rows keep
    /// their store order.
    pub fn sort_indices(&self, rows: &[Row], indices: &mut [usize]) {
        if self.keys.is_empty() {
            indices.sort_unstable();
            return;
        }
        indices.sort_unstable_by(|&a, &b| self.compare(&rows[a], &rows[b]).then(a.cmp(&b)));
    }

    /// Parallel variant of [`SortState::sort_indices`] for large views
    pub fn par_sort_indices(&self, rows: &[Row], indices: &mut [usize]) {
        use rayon::slice::ParallelSliceMut;

        if self.keys.is_empty() {
            indices.par_sort_unstable();
            return;
        }
        indices.par_sort_unstable_by(|&a, &b| self.compare(&rows[a], &rows[b]).then(a.cmp(&b)));
    }
}

/// Ascending comparison of two cells of one column.
///
/// Both kinds share the cross-kind order numbers < text < missing, so a text
/// column holding some numeric cells still orders those numerically.
pub fn compare_cells(kind: ComparatorKind, a: Cell<'_>, b: Cell<'_>) -> Ordering {
    match kind {
        ComparatorKind::Numeric | ComparatorKind::Text => a.total_cmp(&b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    fn rocket(engine: &str, wet_mass: f64, twr: f64) -> Row {
        Row::with_required(engine, 1.0, wet_mass, 1.0, 3000.0, 2500.0, twr, 1.0)
    }

    fn sorted(rows: &[Row], state: &SortState) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..rows.len()).collect();
        state.sort_indices(rows, &mut indices);
        indices
    }

    #[test]
    fn test_secondary_key_breaks_primary_tie() {
        let rows = vec![rocket("A", 5.0, 1.0), rocket("B", 5.0, 3.0), rocket("C", 1.0, 2.0)];
        let state = SortState::new(vec![SortKey::asc(ColumnId::WetMass), SortKey::desc(ColumnId::Twr)]);

        assert_eq!(sorted(&rows, &state), vec![2, 1, 0]);
    }

    #[test]
    fn test_ties_keep_store_order() {
        let rows: Vec<Row> = (0..50).map(|i| rocket(&format!("E{i}"), (i % 3) as f64, 1.0)).collect();
        let state = SortState::new(vec![SortKey::desc(ColumnId::WetMass)]);
        let order = sorted(&rows, &state);

        for pair in order.windows(2) {
            let (a, b) = (&rows[pair[0]], &rows[pair[1]]);
            if a.wet_mass == b.wet_mass {
                assert!(pair[0] < pair[1], "tie reordered: {pair:?}");
            }
        }
    }

    #[test]
    fn test_sort_is_idempotent() {
        let rows: Vec<Row> = (0..30).map(|i| rocket("X", ((i * 7) % 11) as f64, (i % 4) as f64)).collect();
        let state = SortState::new(vec![SortKey::asc(ColumnId::Twr), SortKey::desc(ColumnId::WetMass)]);

        let once = sorted(&rows, &state);
        let mut twice = once.clone();
        state.sort_indices(&rows, &mut twice);
        assert_eq!(once, twice);

        let mut parallel: Vec<usize> = (0..rows.len()).collect();
        state.par_sort_indices(&rows, &mut parallel);
        assert_eq!(once, parallel);
    }

    #[test]
    fn test_text_columns_sort_lexicographically() {
        let rows = vec![rocket("RD-108", 1.0, 1.0), rocket("Aerobee", 1.0, 1.0), rocket("LR-79", 1.0, 1.0)];
        let state = SortState::new(vec![SortKey::asc(ColumnId::Engine)]);
        assert_eq!(sorted(&rows, &state), vec![1, 2, 0]);
    }

    #[test]
    fn test_mixed_text_column_orders_numbers_first() {
        let mut rows = vec![rocket("A", 1.0, 1.0), rocket("B", 1.0, 1.0), rocket("C", 1.0, 1.0)];
        rows[0].cyl_fuselage = Value::Number(5.0);
        rows[1].cyl_fuselage = Value::from("10 Fuselage");
        rows[2].cyl_fuselage = Value::Number(10.0);

        let asc = SortState::new(vec![SortKey::asc(ColumnId::CylFuselage)]);
        assert_eq!(sorted(&rows, &asc), vec![0, 2, 1]);

        let desc = SortState::new(vec![SortKey::desc(ColumnId::CylFuselage)]);
        assert_eq!(sorted(&rows, &desc), vec![1, 2, 0]);
    }

    #[test]
    fn test_signed_zero_ties_keep_store_order() {
        let rows = vec![rocket("A", 0.0, 1.0), rocket("B", -0.0, 1.0), rocket("C", 0.0, 1.0)];
        for direction in [SortKey::asc(ColumnId::WetMass), SortKey::desc(ColumnId::WetMass)] {
            let state = SortState::new(vec![direction]);
            assert_eq!(sorted(&rows, &state), vec![0, 1, 2]);

            let mut parallel: Vec<usize> = (0..rows.len()).collect();
            state.par_sort_indices(&rows, &mut parallel);
            assert_eq!(parallel, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_single_toggle_cycle() {
        let mut state = SortState::default();
        state.toggle(ColumnId::Twr, false);
        assert_eq!(state.keys(), &[SortKey::asc(ColumnId::Twr)]);
        state.toggle(ColumnId::Twr, false);
        assert_eq!(state.keys(), &[SortKey::desc(ColumnId::Twr)]);
        state.toggle(ColumnId::Twr, false);
        assert!(state.is_empty());
    }

    #[test]
    fn test_single_toggle_replaces_other_keys() {
        let mut state = SortState::new(vec![SortKey::asc(ColumnId::WetMass), SortKey::asc(ColumnId::Twr)]);
        state.toggle(ColumnId::Engine, false);
        assert_eq!(state.keys(), &[SortKey::asc(ColumnId::Engine)]);
    }

    #[test]
    fn test_multi_toggle_appends_and_cycles_in_place() {
        let mut state = SortState::default();
        state.toggle(ColumnId::WetMass, true);
        state.toggle(ColumnId::Twr, true);
        assert_eq!(state.keys(), &[SortKey::asc(ColumnId::WetMass), SortKey::asc(ColumnId::Twr)]);

        state.toggle(ColumnId::WetMass, true);
        assert_eq!(state.keys(), &[SortKey::desc(ColumnId::WetMass), SortKey::asc(ColumnId::Twr)]);

        state.toggle(ColumnId::WetMass, true);
        assert_eq!(state.keys(), &[SortKey::asc(ColumnId::Twr)]);
        assert_eq!(state.priority_of(ColumnId::Twr), Some(0));
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let state = SortState::new(vec![SortKey::asc(ColumnId::Twr), SortKey::desc(ColumnId::Twr)]);
        assert_eq!(state.keys(), &[SortKey::asc(ColumnId::Twr)]);
    }
}
