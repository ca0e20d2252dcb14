//! Display ordering and filtering of fetched collections.

use crate::model::{ListFilter, Record};

/// Stable sort by tier, so records of the same tier keep fetch order and
/// the list does not jump between refreshes.
pub fn sort_by_tier<R: Record>(records: &mut [R]) {
    records.sort_by_key(|record| record.tier());
}

pub fn visible<R: Record>(records: &[R], filter: ListFilter) -> Vec<&R> {
    records
        .iter()
        .filter(|record| record.matches(filter))
        .collect()
}

pub fn visible_len<R: Record>(records: &[R], filter: ListFilter) -> usize {
    records
        .iter()
        .filter(|record| record.matches(filter))
        .count()
}

/// The `index`-th record of the filtered view.
pub fn nth_visible<R: Record>(records: &[R], filter: ListFilter, index: usize) -> Option<&R> {
    records
        .iter()
        .filter(|record| record.matches(filter))
        .nth(index)
}
