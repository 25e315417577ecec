/// Dense simplex tableau with row-major order.
///
/// The last column holds the right-hand side and the last row is the
/// objective row. Every access is bounds-checked against the declared shape,
/// so a bad row or column index panics instead of reading a neighbouring row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Tableau {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl Tableau {
    pub(crate) fn zeros(nrows: usize, ncols: usize) -> Self {
        assert!(nrows > 0, "tableau needs at least the objective row");
        assert!(ncols > 0, "tableau needs at least the RHS column");
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    pub(crate) fn nrows(&self) -> usize {
        self.nrows
    }

    pub(crate) fn ncols(&self) -> usize {
        self.ncols
    }

    pub(crate) fn objective_row(&self) -> usize {
        self.nrows - 1
    }

    pub(crate) fn rhs_column(&self) -> usize {
        self.ncols - 1
    }

    fn raw_index(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.nrows && j < self.ncols,
            "tableau index out of bounds; i={}, j={}, shape=({}, {})",
            i,
            j,
            self.nrows,
            self.ncols
        );
        i * self.ncols + j
    }

    pub(crate) fn value_at(&self, i: usize, j: usize) -> f64 {
        self.data[self.raw_index(i, j)]
    }

    pub(crate) fn set_value_at(&mut self, i: usize, j: usize, value: f64) {
        let k = self.raw_index(i, j);
        self.data[k] = value;
    }

    pub(crate) fn rhs(&self, i: usize) -> f64 {
        self.value_at(i, self.rhs_column())
    }

    pub(crate) fn row(&self, i: usize) -> &[f64] {
        let start = self.raw_index(i, 0);
        &self.data[start..start + self.ncols]
    }

    fn row_mut(&mut self, i: usize) -> &mut [f64] {
        let start = self.raw_index(i, 0);
        &mut self.data[start..start + self.ncols]
    }

    pub(crate) fn column(&self, j: usize) -> impl Iterator<Item = &f64> {
        assert!(j < self.ncols);
        self.data.iter().skip(j).step_by(self.ncols)
    }

    pub(crate) fn scale_row(&mut self, i: usize, scalar: f64) {
        assert!(!scalar.is_infinite() && !scalar.is_nan());
        self.row_mut(i).iter_mut().for_each(|x| *x *= scalar);
    }

    /// `row[target] -= scalar * row[source]`
    pub(crate) fn combine_rows(&mut self, target: usize, source: usize, scalar: f64) {
        assert_ne!(target, source, "cannot combine a row with itself");
        assert!(!scalar.is_infinite() && !scalar.is_nan());
        let ncols = self.ncols;
        let (t, s) = (self.raw_index(target, 0), self.raw_index(source, 0));
        for j in 0..ncols {
            let adjustment = scalar * self.data[s + j];
            self.data[t + j] -= adjustment;
        }
    }

    pub(crate) fn clear_row(&mut self, i: usize) {
        self.row_mut(i).iter_mut().for_each(|x| *x = 0.0);
    }

    pub(crate) fn clear_column(&mut self, j: usize) {
        for i in 0..self.nrows {
            self.set_value_at(i, j, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tableau(nrows: usize, ncols: usize, data: Vec<f64>) -> Tableau {
        assert_eq!(data.len(), nrows * ncols);
        Tableau { nrows, ncols, data }
    }

    #[test]
    fn test_row_column_access() {
        let t = tableau(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(t.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(t.row(1), &[4.0, 5.0, 6.0]);

        assert_eq!(t.column(0).cloned().collect::<Vec<_>>(), &[1.0, 4.0]);
        assert_eq!(t.column(2).cloned().collect::<Vec<_>>(), &[3.0, 6.0]);

        assert_eq!(t.value_at(1, 0), 4.0);
        assert_eq!(t.rhs(0), 3.0);
        assert_eq!(t.objective_row(), 1);
        assert_eq!(t.rhs_column(), 2);
    }

    #[test]
    #[should_panic]
    fn test_out_of_bounds_column_panics() {
        // (0, 3) would alias (1, 0) in the flat buffer.
        let t = tableau(2, 3, vec![0.0; 6]);
        t.value_at(0, 3);
    }

    #[test]
    fn test_scale_row() {
        let mut t = tableau(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        t.scale_row(1, 2.0);
        assert_eq!(t.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(t.row(1), &[8.0, 10.0, 12.0])
    }

    #[test]
    fn test_combine_rows() {
        let mut t = tableau(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        t.combine_rows(1, 0, 3.0);
        assert_eq!(t.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(t.row(1), &[1.0, -1.0, -3.0]);
    }

    #[test]
    fn test_clear() {
        let mut t = tableau(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        t.clear_column(1);
        assert_eq!(t.row(0), &[1.0, 0.0, 3.0]);
        t.clear_row(1);
        assert_eq!(t.row(1), &[0.0, 0.0, 0.0]);
    }
}
