//! LU factorization of banded matrices, used for the implicit field step.

use crate::error::FieldError;

/// A square matrix with `bandwidth` sub- and super-diagonals, stored row by row.
#[derive(Debug, Clone)]
pub struct BandedMatrix {
    n: usize,
    bandwidth: usize,
    data: Vec<f64>,
}

impl BandedMatrix {
    pub fn zeros(n: usize, bandwidth: usize) -> Self {
        Self { n, bandwidth, data: vec![0.0; n * (2 * bandwidth + 1)] }
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        debug_assert!(col + self.bandwidth >= row && col <= row + self.bandwidth);
        row * (2 * self.bandwidth + 1) + (col + self.bandwidth - row)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if col + self.bandwidth < row || col > row + self.bandwidth {
            return 0.0;
        }
        self.data[self.offset(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        let idx = self.offset(row, col);
        self.data[idx] = value;
    }

    /// Replaces a row with the identity row.
    pub fn pin_row(&mut self, row: usize) {
        let lo = row.saturating_sub(self.bandwidth);
        let hi = (row + self.bandwidth).min(self.n - 1);
        for col in lo..=hi {
            self.set(row, col, 0.0);
        }
        self.set(row, row, 1.0);
    }

    /// Factors the matrix in place without pivoting.
    ///
    /// Suitable for diagonally dominant operators. Zero multipliers are skipped,
    /// so identity rows pass through the factorization and both solves unchanged.
    pub fn factorize(mut self) -> Result<BandedLu, FieldError> {
        let n = self.n;
        let b = self.bandwidth;
        for k in 0..n {
            let pivot = self.get(k, k);
            if pivot == 0.0 || !pivot.is_finite() {
                return Err(FieldError::Singular { row: k });
            }
            let last = (k + b).min(n - 1);
            for i in (k + 1)..=last {
                let below = self.get(i, k);
                if below == 0.0 {
                    continue;
                }
                let factor = below / pivot;
                self.set(i, k, factor);
                for j in (k + 1)..=last {
                    let upper = self.get(k, j);
                    if upper != 0.0 {
                        let idx = self.offset(i, j);
                        self.data[idx] -= factor * upper;
                    }
                }
            }
        }
        Ok(BandedLu { factors: self })
    }
}

/// Combined unit-lower / upper factors of a banded matrix.
#[derive(Debug, Clone)]
pub struct BandedLu {
    factors: BandedMatrix,
}

impl BandedLu {
    /// Solves `A x = rhs`, overwriting `rhs` with `x`.
    pub fn solve_in_place(&self, rhs: &mut [f64]) {
        let m = &self.factors;
        let n = m.n;
        let b = m.bandwidth;
        assert_eq!(rhs.len(), n, "right-hand side length must match the operator");

        for i in 0..n {
            let mut acc = rhs[i];
            for j in i.saturating_sub(b)..i {
                let l = m.get(i, j);
                if l != 0.0 {
                    acc -= l * rhs[j];
                }
            }
            rhs[i] = acc;
        }

        for i in (0..n).rev() {
            let mut acc = rhs[i];
            let last = (i + b).min(n - 1);
            for j in (i + 1)..=last {
                let u = m.get(i, j);
                if u != 0.0 {
                    acc -= u * rhs[j];
                }
            }
            rhs[i] = acc / m.get(i, i);
        }
    }
}
