//! Small dense linear algebra: row-major matrices, sample covariance and a
//! Cholesky factorisation with a relative pivot tolerance.

use crate::error::{InfodynError, Result};

/// Pivots below `RELATIVE_PIVOT_TOLERANCE * max(diag)` are treated as zero.
/// Exactly collinear columns leave rounding residue around 1e-16 relative;
/// this keeps them from passing as positive definite.
pub const RELATIVE_PIVOT_TOLERANCE: f64 = 1e-12;

/// Row-major dense matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Matrix with `cols` columns and no rows, ready for [`Matrix::push_row`].
    pub fn empty(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::new(),
        }
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut matrix = Self::empty(cols);
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.cols {
            return Err(InfodynError::Estimator(format!(
                "row has {} columns, matrix has {}",
                row.len(),
                self.cols
            )));
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Appends every row of `other` below `self`.
    pub fn append_rows(&mut self, other: &Matrix) -> Result<()> {
        if other.cols != self.cols {
            return Err(InfodynError::Estimator(format!(
                "cannot stack {} columns under {}",
                other.cols, self.cols
            )));
        }
        self.data.extend_from_slice(&other.data);
        self.rows += other.rows;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|row| self.get(row, col)).collect()
    }

    pub fn set_column(&mut self, col: usize, values: &[f64]) {
        for (row, &value) in values.iter().enumerate().take(self.rows) {
            self.set(row, col, value);
        }
    }

    /// Horizontal concatenation `[self | other]`.
    pub fn hstack(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows != other.rows {
            return Err(InfodynError::Estimator(format!(
                "cannot join {} rows beside {}",
                other.rows, self.rows
            )));
        }
        let mut joined = Matrix::zeros(self.rows, self.cols + other.cols);
        for row in 0..self.rows {
            let target = &mut joined.data[row * joined.cols..(row + 1) * joined.cols];
            target[..self.cols].copy_from_slice(self.row(row));
            target[self.cols..].copy_from_slice(other.row(row));
        }
        Ok(joined)
    }

    /// Copy keeping only `indices` as both rows and columns (for square
    /// matrices such as covariances).
    pub fn principal_submatrix(&self, indices: &[usize]) -> Matrix {
        let mut sub = Matrix::zeros(indices.len(), indices.len());
        for (i, &row) in indices.iter().enumerate() {
            for (j, &col) in indices.iter().enumerate() {
                sub.set(i, j, self.get(row, col));
            }
        }
        sub
    }

    /// Copy with row and column `index` removed.
    pub fn without(&self, index: usize) -> Matrix {
        let keep: Vec<usize> = (0..self.cols).filter(|&i| i != index).collect();
        self.principal_submatrix(&keep)
    }

    pub fn diagonal(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.rows.min(self.cols)).map(move |i| self.get(i, i))
    }

    /// Column means.
    pub fn means(&self) -> Vec<f64> {
        let mut means = vec![0.0; self.cols];
        for row in 0..self.rows {
            for (mean, value) in means.iter_mut().zip(self.row(row)) {
                *mean += value;
            }
        }
        let n = self.rows.max(1) as f64;
        means.iter_mut().for_each(|mean| *mean /= n);
        means
    }

    /// Unbiased (n - 1) sample covariance of the columns.
    pub fn covariance(&self) -> Result<Matrix> {
        if self.rows < 2 {
            return Err(InfodynError::NumericalConditioning(format!(
                "covariance needs at least 2 observations, got {}",
                self.rows
            )));
        }
        let means = self.means();
        let mut covariance = Matrix::zeros(self.cols, self.cols);
        let mut centred = vec![0.0; self.cols];
        for row in 0..self.rows {
            for ((c, value), mean) in centred.iter_mut().zip(self.row(row)).zip(&means) {
                *c = value - mean;
            }
            for i in 0..self.cols {
                for j in i..self.cols {
                    covariance.data[i * self.cols + j] += centred[i] * centred[j];
                }
            }
        }
        let denominator = (self.rows - 1) as f64;
        for i in 0..self.cols {
            for j in i..self.cols {
                let value = covariance.get(i, j) / denominator;
                covariance.set(i, j, value);
                covariance.set(j, i, value);
            }
        }
        Ok(covariance)
    }
}

/// Lower-triangular factor `L` with `A = L Lᵀ`.
#[derive(Clone, Debug)]
pub struct Cholesky {
    factor: Matrix,
}

impl Cholesky {
    /// Factorises a symmetric matrix, failing with
    /// [`InfodynError::NumericalConditioning`] if it is not numerically
    /// positive definite.
    pub fn new(matrix: &Matrix) -> Result<Self> {
        let n = matrix.rows();
        if n != matrix.cols() {
            return Err(InfodynError::Estimator(format!(
                "cholesky of non-square {}x{} matrix",
                n,
                matrix.cols()
            )));
        }
        let scale = matrix.diagonal().fold(0.0_f64, f64::max);
        if n > 0 && !(scale.is_finite() && scale > 0.0) {
            return Err(InfodynError::NumericalConditioning(format!(
                "covariance diagonal is not positive (max {})",
                scale
            )));
        }
        let tolerance = scale * RELATIVE_PIVOT_TOLERANCE;

        let mut factor = Matrix::zeros(n, n);
        for j in 0..n {
            let mut pivot = matrix.get(j, j);
            for k in 0..j {
                pivot -= factor.get(j, k) * factor.get(j, k);
            }
            if !(pivot > tolerance) {
                return Err(InfodynError::NumericalConditioning(format!(
                    "matrix is not positive definite (pivot {} = {:e})",
                    j, pivot
                )));
            }
            let diagonal = pivot.sqrt();
            factor.set(j, j, diagonal);
            for i in j + 1..n {
                let mut value = matrix.get(i, j);
                for k in 0..j {
                    value -= factor.get(i, k) * factor.get(j, k);
                }
                factor.set(i, j, value / diagonal);
            }
        }
        Ok(Self { factor })
    }

    /// `ln det(A)`; zero for an empty matrix.
    pub fn log_determinant(&self) -> f64 {
        2.0 * self.factor.diagonal().map(f64::ln).sum::<f64>()
    }

    /// Quadratic form `vᵀ A⁻¹ v` via forward substitution on `L`.
    pub fn mahalanobis(&self, v: &[f64]) -> f64 {
        let n = self.factor.rows();
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut value = v[i];
            for (k, y_k) in y.iter().enumerate().take(i) {
                value -= self.factor.get(i, k) * y_k;
            }
            y[i] = value / self.factor.get(i, i);
        }
        y.iter().map(|value| value * value).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covariance_matches_hand_computation() {
        let data = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 7.0]]).unwrap();
        let covariance = data.covariance().unwrap();
        assert!((covariance.get(0, 0) - 1.0).abs() < 1e-12);
        assert!((covariance.get(1, 1) - 6.333333333333333).abs() < 1e-12);
        assert!((covariance.get(0, 1) - 2.5).abs() < 1e-12);
        assert_eq!(covariance.get(0, 1), covariance.get(1, 0));
    }

    #[test]
    fn test_cholesky_determinant_and_quadratic_form() {
        let a = Matrix::from_rows(&[vec![4.0, 2.0], vec![2.0, 3.0]]).unwrap();
        let cholesky = Cholesky::new(&a).unwrap();
        assert!((cholesky.log_determinant() - 8.0_f64.ln()).abs() < 1e-12);
        // A⁻¹ = [[3, -2], [-2, 4]] / 8
        let q = cholesky.mahalanobis(&[1.0, 1.0]);
        assert!((q - 3.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let a = Matrix::from_rows(&[vec![2.0, 2.0], vec![2.0, 2.0]]).unwrap();
        assert!(matches!(
            Cholesky::new(&a),
            Err(InfodynError::NumericalConditioning(_))
        ));
    }

    #[test]
    fn test_submatrix_and_stacking() {
        let a = Matrix::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        let without = a.without(1);
        assert_eq!(without, Matrix::from_rows(&[vec![1.0, 3.0], vec![7.0, 9.0]]).unwrap());

        let joined = a.hstack(&Matrix::zeros(3, 1)).unwrap();
        assert_eq!(joined.cols(), 4);
        assert_eq!(joined.row(2), &[7.0, 8.0, 9.0, 0.0]);

        let mut stacked = Matrix::empty(3);
        stacked.append_rows(&a).unwrap();
        stacked.append_rows(&a).unwrap();
        assert_eq!(stacked.rows(), 6);
        assert!(stacked.append_rows(&Matrix::zeros(1, 2)).is_err());
    }
}
