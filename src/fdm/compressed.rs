use crate::fdm::{Blas, FdmLinearSystem, FdmVector};
use crate::global_variables::*;
use rayon::prelude::*;

/// Compressed sparse row matrix, built one row at a time.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixCsr {
    rows: usize,
    cols: usize,
    non_zeros: Vec<Float>,
    row_pointers: Vec<usize>,
    column_indices: Vec<usize>,
}

impl Default for MatrixCsr {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixCsr {
    pub fn new() -> Self {
        Self {
            rows: 0,
            cols: 0,
            non_zeros: Vec::new(),
            row_pointers: vec![0],
            column_indices: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn add_row(&mut self, values: &[Float], columns: &[usize]) {
        self.non_zeros.extend_from_slice(values);
        self.column_indices.extend_from_slice(columns);
        if let Some(&max_column) = columns.iter().max() {
            self.cols = self.cols.max(max_column + 1);
        }
        self.rows += 1;
        self.row_pointers.push(self.non_zeros.len());
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn number_of_non_zeros(&self) -> usize {
        self.non_zeros.len()
    }

    pub fn non_zeros(&self) -> &[Float] {
        &self.non_zeros
    }

    pub fn row_pointers(&self) -> &[usize] {
        &self.row_pointers
    }

    pub fn column_indices(&self) -> &[usize] {
        &self.column_indices
    }

    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, Float)> + '_ {
        let range = self.row_pointers[i]..self.row_pointers[i + 1];
        self.column_indices[range.clone()]
            .iter()
            .cloned()
            .zip(self.non_zeros[range].iter().cloned())
    }

    /// Diagonal entry of row `i`, 1 when the row stores none.
    pub fn diagonal(&self, i: usize) -> Float {
        self.row(i)
            .find(|&(j, _)| j == i)
            .map(|(_, value)| value)
            .unwrap_or(1.0)
    }

    pub fn set(&mut self, s: Float) {
        self.non_zeros.iter_mut().for_each(|value| *value = s);
    }

    /// Row `i` applied to `x`, with the diagonal split out as
    /// `(diagonal, off_diagonal_sum)`.
    pub fn split_row_product(&self, i: usize, x: &[Float]) -> (Float, Float) {
        let mut diagonal = 1.0;
        let mut off_diagonal = 0.0;
        for (j, value) in self.row(i) {
            if j == i {
                diagonal = value;
            } else {
                off_diagonal += value * x[j];
            }
        }
        (diagonal, off_diagonal)
    }

    pub fn row_product(&self, i: usize, x: &[Float]) -> Float {
        self.row(i).map(|(j, value)| value * x[j]).sum()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompressedLinearSystem {
    pub a: MatrixCsr,
    pub x: Vec<Float>,
    pub b: Vec<Float>,
}

impl CompressedLinearSystem {
    pub fn clear(&mut self) {
        self.a.clear();
        self.x.clear();
        self.b.clear();
    }

    /// Compresses a stencil system keeping every cell, in linear-index order.
    pub fn from_stencil<const D: usize>(system: &FdmLinearSystem<D>) -> Self {
        let size = system.a.size();
        let mut a = MatrixCsr::new();
        let mut values = Vec::with_capacity(2 * D + 1);
        let mut columns = Vec::with_capacity(2 * D + 1);
        for l in 0..system.a.len() {
            let index = system.a.unravel(l);
            values.clear();
            columns.clear();
            values.push(system.a[l].center);
            columns.push(l);
            let mut stride = 1;
            for axis in 0..D {
                if index[axis] > 0 && system.a[l - stride].neighbors[axis] != 0.0 {
                    values.push(system.a[l - stride].neighbors[axis]);
                    columns.push(l - stride);
                }
                if index[axis] + 1 < size[axis] && system.a[l].neighbors[axis] != 0.0 {
                    values.push(system.a[l].neighbors[axis]);
                    columns.push(l + stride);
                }
                stride *= size[axis];
            }
            a.add_row(&values, &columns);
        }
        Self {
            a,
            x: system.x.as_slice().to_vec(),
            b: system.b.as_slice().to_vec(),
        }
    }

    /// Scatters the solution back onto the grid: row `r` lands on the cell
    /// with linear index `cells[r]`, every other cell is zeroed.
    pub fn decompress<const D: usize>(&self, cells: &[usize], x: &mut FdmVector<D>) {
        x.fill(0.0);
        for (&cell, &value) in cells.iter().zip(self.x.iter()) {
            x[cell] = value;
        }
    }
}

pub struct CompressedBlas;

impl Blas for CompressedBlas {
    type Vector = Vec<Float>;
    type Matrix = MatrixCsr;

    fn set(s: Float, result: &mut Vec<Float>) {
        result.par_iter_mut().for_each(|value| *value = s);
    }

    fn set_from(v: &Vec<Float>, result: &mut Vec<Float>) {
        result.clone_from(v);
    }

    fn zeros_like(v: &Vec<Float>) -> Vec<Float> {
        vec![0.0; v.len()]
    }

    fn dot(a: &Vec<Float>, b: &Vec<Float>) -> Float {
        a.par_iter().zip(b.par_iter()).map(|(a, b)| a * b).sum()
    }

    fn axpy(a: Float, x: &Vec<Float>, y: &Vec<Float>, result: &mut Vec<Float>) {
        result.resize(x.len(), 0.0);
        result
            .par_iter_mut()
            .zip(x.par_iter().zip(y.par_iter()))
            .for_each(|(r, (x, y))| *r = a * x + y);
    }

    fn axpy_assign(a: Float, x: &Vec<Float>, y: &mut Vec<Float>) {
        y.par_iter_mut()
            .zip(x.par_iter())
            .for_each(|(y, x)| *y += a * x);
    }

    fn scale_add_assign(a: Float, x: &mut Vec<Float>, y: &Vec<Float>) {
        x.par_iter_mut()
            .zip(y.par_iter())
            .for_each(|(x, y)| *x = y + a * *x);
    }

    fn mvm(m: &MatrixCsr, v: &Vec<Float>, result: &mut Vec<Float>) {
        result.resize(m.rows(), 0.0);
        result
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, value)| *value = m.row_product(i, v));
    }

    fn residual(a: &MatrixCsr, x: &Vec<Float>, b: &Vec<Float>, result: &mut Vec<Float>) {
        result.resize(a.rows(), 0.0);
        result
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, value)| *value = b[i] - a.row_product(i, x));
    }

    fn linf_norm(v: &Vec<Float>) -> Float {
        v.par_iter().map(|value| value.abs()).reduce(|| 0.0, Float::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdm::tests::poisson_system;
    use crate::fdm::FdmBlas;

    #[test]
    fn test_add_row_tracks_shape() {
        let mut matrix = MatrixCsr::new();
        matrix.add_row(&[2.0, -1.0], &[0, 1]);
        matrix.add_row(&[-1.0, 2.0, -1.0], &[0, 1, 2]);
        matrix.add_row(&[-1.0, 2.0], &[1, 2]);
        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.cols(), 3);
        assert_eq!(matrix.number_of_non_zeros(), 7);
        assert_eq!(matrix.row_pointers(), &[0, 2, 5, 7]);
        assert_eq!(matrix.diagonal(1), 2.0);
        let (diagonal, off_diagonal) = matrix.split_row_product(1, &[1.0, 1.0, 3.0]);
        assert_eq!(diagonal, 2.0);
        assert_eq!(off_diagonal, -4.0);
    }

    #[test]
    fn test_stencil_and_compressed_residuals_agree() {
        let mut system = poisson_system([5, 4, 3]);
        system
            .x
            .par_for_each_index_mut(|[i, j, k], value| *value = (i * j) as Float - 0.5 * k as Float);
        let compressed = CompressedLinearSystem::from_stencil(&system);
        assert_eq!(compressed.a.rows(), 60);

        let mut stencil_residual = FdmVector::default();
        FdmBlas::<3>::residual(&system.a, &system.x, &system.b, &mut stencil_residual);
        let mut compressed_residual = Vec::new();
        CompressedBlas::residual(&compressed.a, &compressed.x, &compressed.b, &mut compressed_residual);

        for (stencil, compressed) in stencil_residual.iter().zip(compressed_residual.iter()) {
            assert!((stencil - compressed).abs() < 1e-12);
        }
        assert!(
            (FdmBlas::<3>::l2_norm(&stencil_residual) - CompressedBlas::l2_norm(&compressed_residual))
                .abs()
                < 1e-10
        );
    }

    #[test]
    fn test_compressed_reductions() {
        let a: Vec<Float> = (0..1000).map(|i| (i % 7) as Float - 3.0).collect();
        let b = vec![2.0; 1000];
        let expected: Float = a.iter().map(|value| 2.0 * value).sum();
        assert!((CompressedBlas::dot(&a, &b) - expected).abs() < 1e-9);
        assert_eq!(CompressedBlas::linf_norm(&a), 3.0);
        assert_eq!(CompressedBlas::linf_norm(&Vec::new()), 0.0);
    }

    #[test]
    fn test_decompress_scatters_rows_to_cells() {
        let system = CompressedLinearSystem {
            x: vec![1.5, -2.0],
            ..Default::default()
        };
        let mut x = FdmVector::new([3, 2], 7.0);
        system.decompress(&[4, 1], &mut x);
        assert_eq!(x.as_slice(), &[0.0, -2.0, 0.0, 0.0, 1.5, 0.0]);
    }
}
