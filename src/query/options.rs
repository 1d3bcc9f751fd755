//! Query Options Module
//!
//! Sorting and 1-based paging applied after filtering.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::expr::{FieldAccess, Value};

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

/// Sort and paging options for list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    sort: Vec<SortField>,
    /// (page, page size), page counted from 1
    page: Option<(usize, usize)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn sort_by_descending(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            descending: true,
        });
        self
    }

    /// Parses `"name,-id"` style sort lists; a leading `-` means descending.
    pub fn sort_from_str(self, spec: &str) -> Self {
        spec.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .fold(self, |options, part| match part.strip_prefix('-') {
                Some(field) => options.sort_by_descending(field),
                None => options.sort_by(part),
            })
    }

    /// # Arguments
    /// * `page` - Page number counted from 1; 0 is treated as 1
    /// * `size` - Page size; 0 disables paging
    pub fn paged(mut self, page: usize, size: usize) -> Self {
        self.page = (size > 0).then(|| (page.max(1), size));
        self
    }

    pub fn sort(&self) -> &[SortField] {
        &self.sort
    }

    pub fn page(&self) -> Option<(usize, usize)> {
        self.page
    }

    pub fn is_empty(&self) -> bool {
        self.sort.is_empty() && self.page.is_none()
    }

    /// Deterministic text for cache keys; empty when there are no options.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for sort in &self.sort {
            let direction = if sort.descending { "desc" } else { "asc" };
            let _ = write!(out, "order:{:?}:{};", sort.field, direction);
        }
        if let Some((page, size)) = self.page {
            let _ = write!(out, "page:{}:{};", page, size);
        }
        out
    }

    /// Sorts (stable, missing fields first) and then pages `items`.
    pub fn apply<T: FieldAccess>(&self, mut items: Vec<T>) -> Vec<T> {
        if !self.sort.is_empty() {
            items.sort_by(|a, b| self.compare(a, b));
        }
        match self.page {
            Some((page, size)) => items
                .into_iter()
                .skip((page - 1).saturating_mul(size))
                .take(size)
                .collect(),
            None => items,
        }
    }

    fn compare<T: FieldAccess>(&self, a: &T, b: &T) -> Ordering {
        for sort in &self.sort {
            let left = a.field(&sort.field).unwrap_or(Value::Null);
            let right = b.field(&sort.field).unwrap_or(Value::Null);
            let ordering = if sort.descending {
                right.cmp(&left)
            } else {
                left.cmp(&right)
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(i64, &'static str);

    impl FieldAccess for Row {
        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(Value::Int(self.0)),
                "name" => Some(Value::from(self.1)),
                _ => None,
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![Row(3, "b"), Row(1, "a"), Row(2, "b"), Row(4, "a")]
    }

    #[test]
    fn test_sort_multiple_fields() {
        let options = QueryOptions::new().sort_by("name").sort_by_descending("id");
        let ids: Vec<i64> = options.apply(rows()).iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![4, 1, 3, 2]);
    }

    #[test]
    fn test_paging_is_one_based() {
        let options = QueryOptions::new().sort_by("id").paged(2, 3);
        let ids: Vec<i64> = options.apply(rows()).iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![4]);

        let first = QueryOptions::new().sort_by("id").paged(0, 2);
        assert_eq!(first.page(), Some((1, 2)));
        assert_eq!(first.apply(rows()).len(), 2);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let options = QueryOptions::new().paged(10, 5);
        assert!(options.apply(rows()).is_empty());
    }

    #[test]
    fn test_sort_from_str() {
        let options = QueryOptions::new().sort_from_str(" name , -id,");
        assert_eq!(
            options.sort(),
            &[
                SortField { field: "name".into(), descending: false },
                SortField { field: "id".into(), descending: true },
            ]
        );
    }

    #[test]
    fn test_canonical_distinguishes_options() {
        let a = QueryOptions::new().sort_by("id").paged(1, 10);
        let b = QueryOptions::new().sort_by_descending("id").paged(1, 10);
        let c = QueryOptions::new().sort_by("id").paged(2, 10);
        assert_ne!(a.canonical(), b.canonical());
        assert_ne!(a.canonical(), c.canonical());
        assert_eq!(QueryOptions::new().canonical(), "");
        assert!(QueryOptions::new().paged(3, 0).is_empty());
    }
}
