use std::collections::HashMap;

use crate::models::{Bucket, SparseCount};

/// Overlay sparse counts onto a dense template.
///
/// The result has exactly the template's labels in the template's order.
/// When a label appears more than once in `sparse` the first value wins;
/// labels missing from the template are ignored.
pub fn merge(template: &[Bucket], sparse: &[SparseCount]) -> Vec<Bucket> {
    let mut counts: HashMap<&str, u64> = HashMap::with_capacity(sparse.len());
    for entry in sparse {
        counts.entry(entry.label.as_str()).or_insert(entry.value);
    }

    template
        .iter()
        .map(|bucket| Bucket {
            label: bucket.label.clone(),
            value: counts
                .get(bucket.label.as_str())
                .copied()
                .unwrap_or(bucket.value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(labels: &[&str]) -> Vec<Bucket> {
        labels.iter().map(|l| Bucket::empty(l.to_string())).collect()
    }

    fn pairs(buckets: &[Bucket]) -> Vec<(&str, u64)> {
        buckets.iter().map(|b| (b.label.as_str(), b.value)).collect()
    }

    #[test]
    fn test_merge_fills_matching_labels() {
        let merged = merge(
            &template(&["d1", "d2", "d3"]),
            &[SparseCount::new("d2", 5)],
        );
        assert_eq!(pairs(&merged), vec![("d1", 0), ("d2", 5), ("d3", 0)]);
    }

    #[test]
    fn test_merge_first_occurrence_wins() {
        let merged = merge(
            &template(&["d1", "d2"]),
            &[SparseCount::new("d1", 3), SparseCount::new("d1", 7)],
        );
        assert_eq!(pairs(&merged), vec![("d1", 3), ("d2", 0)]);
    }

    #[test]
    fn test_merge_ignores_labels_outside_template() {
        let merged = merge(
            &template(&["2024-08-01"]),
            &[
                SparseCount::new("2024-07-31", 9),
                SparseCount::new("2024-08-01", 2),
                SparseCount::new("garbage", 1),
            ],
        );
        assert_eq!(pairs(&merged), vec![("2024-08-01", 2)]);
    }

    #[test]
    fn test_merge_keeps_template_order_for_unordered_input() {
        let merged = merge(
            &template(&["a", "b", "c"]),
            &[SparseCount::new("c", 1), SparseCount::new("a", 4)],
        );
        assert_eq!(pairs(&merged), vec![("a", 4), ("b", 0), ("c", 1)]);
    }

    #[test]
    fn test_merge_empty_sparse_is_template() {
        let base = template(&["x", "y"]);
        assert_eq!(merge(&base, &[]), base);
    }
}
