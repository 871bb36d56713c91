//! Two-phase protocol for sparse derivative matrices.
//!
//! The Jacobian and Hessian callbacks are asked first for coordinates
//! (structure mode) and later for values at those coordinates (value mode).
//! The native solver signals the mode with a nullable values pointer; the
//! trampolines classify it once into a [`SparseQuery`].

use ipopt_bridge_sys::{Index, Number};
use thiserror::Error;

/// One request made to a sparse derivative callback.
#[derive(Debug)]
pub enum SparseQuery<'a> {
    /// Write the row/column coordinates of every nonzero.
    Structure {
        rows: &'a mut [Index],
        cols: &'a mut [Index],
    },
    /// Write the values, in the order the structure declared.
    Values(&'a mut [Number]),
}

impl SparseQuery<'_> {
    /// Number of entries the callback must write.
    pub fn nele(&self) -> usize {
        match self {
            SparseQuery::Structure { rows, .. } => rows.len(),
            SparseQuery::Values(values) => values.len(),
        }
    }

    pub fn is_structure(&self) -> bool {
        matches!(self, SparseQuery::Structure { .. })
    }
}

/// An ordered list of nonzero coordinates (0-based).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparsityPattern {
    rows: Vec<Index>,
    cols: Vec<Index>,
}

impl SparsityPattern {
    /// Pattern with the given coordinates, in the given order.
    pub fn new(entries: impl IntoIterator<Item = (Index, Index)>) -> Self {
        let (rows, cols) = entries.into_iter().unzip();
        Self { rows, cols }
    }

    /// Every entry of an `nrows x ncols` matrix, row-major.
    pub fn dense(nrows: usize, ncols: usize) -> Self {
        Self::new((0..nrows).flat_map(|r| (0..ncols).map(move |c| (r as Index, c as Index))))
    }

    /// Lower triangle (diagonal included) of an `n x n` matrix, row-major with `col <= row`.
    ///
    /// Holds `n * (n + 1) / 2` entries; this is the conventional Hessian layout.
    pub fn lower_triangle(n: usize) -> Self {
        Self::new((0..n).flat_map(|r| (0..=r).map(move |c| (r as Index, c as Index))))
    }

    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Index] {
        &self.rows
    }

    pub fn cols(&self) -> &[Index] {
        &self.cols
    }

    pub fn entries(&self) -> impl Iterator<Item = (Index, Index)> + '_ {
        self.rows.iter().copied().zip(self.cols.iter().copied())
    }

    /// Fill structure-mode buffers. Returns `false` if their length differs from [`nnz`](Self::nnz).
    pub fn write_structure(&self, rows: &mut [Index], cols: &mut [Index]) -> bool {
        if rows.len() != self.nnz() || cols.len() != self.nnz() {
            return false;
        }
        rows.copy_from_slice(&self.rows);
        cols.copy_from_slice(&self.cols);
        true
    }

    /// Answer a structure-mode query; value-mode queries are left to the caller.
    ///
    /// Returns `None` for [`SparseQuery::Values`].
    pub fn answer_structure(&self, query: &mut SparseQuery<'_>) -> Option<bool> {
        match query {
            SparseQuery::Structure { rows, cols } => Some(self.write_structure(rows, cols)),
            SparseQuery::Values(_) => None,
        }
    }
}

/// A structure-mode answer that breaks the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("entry {index} at ({row}, {col}) is outside the {nrows} x {ncols} matrix")]
    OutOfRange {
        index: usize,
        row: Index,
        col: Index,
        nrows: Index,
        ncols: Index,
    },
    #[error("structure has {actual} entries, first request declared {expected}")]
    LengthChanged { expected: usize, actual: usize },
    #[error("entry {index} moved from {before:?} to {after:?} since the first request")]
    Changed {
        index: usize,
        before: (Index, Index),
        after: (Index, Index),
    },
}

/// Records the first structure-mode answer of one sparse callback and holds
/// every later answer to it.
#[derive(Debug, Clone)]
pub(crate) struct StructureLedger {
    nrows: Index,
    ncols: Index,
    recorded: Option<SparsityPattern>,
}

impl StructureLedger {
    pub(crate) fn new(nrows: Index, ncols: Index) -> Self {
        Self {
            nrows,
            ncols,
            recorded: None,
        }
    }

    pub(crate) fn recorded(&self) -> Option<&SparsityPattern> {
        self.recorded.as_ref()
    }

    /// Check a structure-mode answer, recording it if it is the first one.
    pub(crate) fn check(&mut self, rows: &[Index], cols: &[Index]) -> Result<(), StructureError> {
        for (index, (&row, &col)) in rows.iter().zip(cols).enumerate() {
            if !(0..self.nrows).contains(&row) || !(0..self.ncols).contains(&col) {
                return Err(StructureError::OutOfRange {
                    index,
                    row,
                    col,
                    nrows: self.nrows,
                    ncols: self.ncols,
                });
            }
        }

        let Some(recorded) = &self.recorded else {
            self.recorded = Some(SparsityPattern::new(
                rows.iter().copied().zip(cols.iter().copied()),
            ));
            return Ok(());
        };

        if recorded.nnz() != rows.len() {
            return Err(StructureError::LengthChanged {
                expected: recorded.nnz(),
                actual: rows.len(),
            });
        }
        for (index, (before, after)) in recorded
            .entries()
            .zip(rows.iter().copied().zip(cols.iter().copied()))
            .enumerate()
        {
            if before != after {
                return Err(StructureError::Changed {
                    index,
                    before,
                    after,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_triangle_is_row_major() {
        let pattern = SparsityPattern::lower_triangle(3);
        let entries: Vec<_> = pattern.entries().collect();
        assert_eq!(entries, vec![(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (2, 2)]);
        assert_eq!(SparsityPattern::lower_triangle(4).nnz(), 10);
    }

    #[test]
    fn test_dense_pattern_matches_jacobian_layout() {
        let pattern = SparsityPattern::dense(2, 4);
        assert_eq!(pattern.nnz(), 8);
        assert_eq!(pattern.rows(), &[0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(pattern.cols(), &[0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_write_structure_requires_exact_length() {
        let pattern = SparsityPattern::lower_triangle(2);
        let mut rows = [0; 2];
        let mut cols = [0; 2];
        assert!(!pattern.write_structure(&mut rows, &mut cols));

        let mut rows = [0; 3];
        let mut cols = [0; 3];
        assert!(pattern.write_structure(&mut rows, &mut cols));
        assert_eq!(rows, [0, 1, 1]);
        assert_eq!(cols, [0, 0, 1]);
    }

    #[test]
    fn test_answer_structure_ignores_value_queries() {
        let pattern = SparsityPattern::dense(1, 2);
        let mut values = [0.0; 2];
        let mut query = SparseQuery::Values(&mut values);
        assert_eq!(pattern.answer_structure(&mut query), None);
        assert!(!query.is_structure());
        assert_eq!(query.nele(), 2);
    }

    #[test]
    fn test_ledger_accepts_identical_replay() {
        let mut ledger = StructureLedger::new(2, 4);
        let pattern = SparsityPattern::dense(2, 4);
        assert!(ledger.check(pattern.rows(), pattern.cols()).is_ok());
        assert!(ledger.check(pattern.rows(), pattern.cols()).is_ok());
        assert_eq!(ledger.recorded(), Some(&pattern));
    }

    #[test]
    fn test_ledger_rejects_reordered_structure() {
        let mut ledger = StructureLedger::new(4, 4);
        ledger.check(&[0, 1], &[0, 0]).unwrap();
        let err = ledger.check(&[1, 0], &[0, 0]).unwrap_err();
        assert_eq!(
            err,
            StructureError::Changed {
                index: 0,
                before: (0, 0),
                after: (1, 0)
            }
        );
    }

    #[test]
    fn test_ledger_rejects_length_change() {
        let mut ledger = StructureLedger::new(4, 4);
        ledger.check(&[0, 1], &[0, 0]).unwrap();
        let err = ledger.check(&[0], &[0]).unwrap_err();
        assert_eq!(err, StructureError::LengthChanged { expected: 2, actual: 1 });
    }

    #[test]
    fn test_ledger_rejects_out_of_range_and_records_nothing() {
        let mut ledger = StructureLedger::new(2, 4);
        let err = ledger.check(&[0, 2], &[0, 0]).unwrap_err();
        assert!(matches!(err, StructureError::OutOfRange { index: 1, row: 2, .. }));
        assert!(ledger.recorded().is_none());

        let err = ledger.check(&[0], &[-1]).unwrap_err();
        assert!(matches!(err, StructureError::OutOfRange { index: 0, col: -1, .. }));
    }
}
