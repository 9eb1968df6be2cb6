/// Sparse binary instance-feature matrix, stored row-wise.
///
/// Only the presence of a feature matters; weights are dropped on input.
/// Every row is sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMatrix {
    rows: Vec<Vec<u64>>,
}

impl SparseMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from per-row feature lists.
    pub fn from_rows<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = u64>,
    {
        let rows = rows
            .into_iter()
            .map(|r| {
                let mut row: Vec<u64> = r.into_iter().collect();
                row.sort_unstable();
                row.dedup();
                row
            })
            .collect();
        Self { rows }
    }

    /// Build from `(instance_id, feature_id)` nonzero coordinates.
    ///
    /// The row count is `n_rows` when given (trailing empty rows are kept),
    /// otherwise one past the largest instance id. Coordinates beyond an
    /// explicit `n_rows` grow the matrix.
    pub fn from_coordinates<I>(pairs: I, n_rows: Option<usize>) -> Self
    where
        I: IntoIterator<Item = (usize, u64)>,
    {
        let mut rows: Vec<Vec<u64>> = vec![Vec::new(); n_rows.unwrap_or(0)];
        for (instance, feature) in pairs {
            if instance >= rows.len() {
                rows.resize_with(instance + 1, Vec::new);
            }
            rows[instance].push(feature);
        }
        for row in &mut rows {
            row.sort_unstable();
            row.dedup();
        }
        Self { rows }
    }

    /// Build from `(instance_id, feature_id, value)` triplets; zero values are
    /// treated as absent, every other value as presence.
    pub fn from_triplets<I>(triplets: I, n_rows: Option<usize>) -> Self
    where
        I: IntoIterator<Item = (usize, u64, f32)>,
    {
        Self::from_coordinates(
            triplets
                .into_iter()
                .filter(|&(_, _, v)| v != 0.0)
                .map(|(i, f, _)| (i, f)),
            n_rows,
        )
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, instance: usize) -> Option<&[u64]> {
        self.rows.get(instance).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.rows
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Append the rows of `other`, keeping their order.
    pub fn extend(&mut self, other: SparseMatrix) {
        self.rows.extend(other.rows);
    }

    pub fn into_rows(self) -> Vec<Vec<u64>> {
        self.rows
    }
}

/// Exact Jaccard similarity of two sorted, duplicate-free feature lists.
/// Two empty sets have similarity 0.
pub fn jaccard(a: &[u64], b: &[u64]) -> f64 {
    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - shared;
    if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_group_by_row() {
        let m = SparseMatrix::from_coordinates(vec![(0, 5), (1, 3), (0, 1), (0, 5)], None);
        assert_eq!(m.len(), 2);
        assert_eq!(m.row(0), Some(&[1u64, 5][..]));
        assert_eq!(m.row(1), Some(&[3u64][..]));
        assert_eq!(m.nnz(), 3);
    }

    #[test]
    fn explicit_row_count_keeps_empty_rows() {
        let m = SparseMatrix::from_coordinates(vec![(0, 1)], Some(3));
        assert_eq!(m.len(), 3);
        assert_eq!(m.row(2).map(<[u64]>::len), Some(0));
    }

    #[test]
    fn triplet_weights_ignored() {
        let m = SparseMatrix::from_triplets(vec![(0, 1, 0.5), (0, 2, 3.0), (0, 3, 0.0)], None);
        assert_eq!(m.row(0), Some(&[1u64, 2][..]));
    }

    #[test]
    fn no_coordinates_is_empty() {
        let m = SparseMatrix::from_coordinates(Vec::new(), None);
        assert!(m.is_empty());
    }

    #[test]
    fn jaccard_values() {
        assert!((jaccard(&[1, 2], &[1, 3]) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(jaccard(&[1, 2], &[1, 2]), 1.0);
        assert_eq!(jaccard(&[1], &[2]), 0.0);
        assert_eq!(jaccard(&[], &[]), 0.0);
    }
}
