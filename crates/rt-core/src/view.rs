//! Filter then sort: the ordered list of store indices a table shows

use rayon::prelude::*;

use crate::filter::FilterState;
use crate::row::Row;
use crate::sort::SortState;

/// Store indices of the rows passing `filters`, ordered by `sort`.
///
/// With no sort keys the result is in store order. From `parallel_threshold`
/// rows on, both passes run on the rayon pool; the result is identical.
pub fn derive_view(
    rows: &[Row],
    filters: &FilterState,
    sort: &SortState,
    parallel_threshold: usize,
) -> Vec<usize> {
    let parallel = rows.len() >= parallel_threshold;

    let mut indices: Vec<usize> = if filters.is_empty() {
        (0..rows.len()).collect()
    } else if parallel {
        (0..rows.len())
            .into_par_iter()
            .filter(|&idx| filters.matches(&rows[idx]))
            .collect()
    } else {
        (0..rows.len()).filter(|&idx| filters.matches(&rows[idx])).collect()
    };

    if !sort.is_empty() {
        if parallel {
            sort.par_sort_indices(rows, &mut indices);
        } else {
            sort.sort_indices(rows, &mut indices);
        }
    }

    indices
}
