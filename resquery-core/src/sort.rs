//! Parsing of the `sort` parameter.

use crate::query::{Sort, SortDirection};

pub const SORT_PARAM: &str = "sort";

/// Parses `field[:direction]` entries separated by commas or whitespace.
///
/// Only `-1`, `desc` and `descending` (any case) sort descending; a missing or
/// unrecognized direction sorts ascending. Field names are not checked against the
/// schema.
pub fn parse_sort<S: AsRef<str>>(values: &[S]) -> Vec<Sort> {
    values
        .iter()
        .flat_map(|value| split_list(value.as_ref()))
        .filter_map(|entry| {
            let (field, direction) = match entry.split_once(':') {
                Some((field, direction)) => (field, parse_direction(direction)),
                None => (entry, SortDirection::Asc),
            };
            (!field.is_empty()).then(|| Sort::new(field, direction))
        })
        .collect()
}

fn parse_direction(token: &str) -> SortDirection {
    match token.to_ascii_lowercase().as_str() {
        "-1" | "desc" | "descending" => SortDirection::Desc,
        _ => SortDirection::Asc,
    }
}

/// Splits a parameter value on commas and whitespace, dropping empty entries.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
}
