//! Finite-difference linear systems `A x = b` on regular grids.
//!
//! The stencil matrix stores, per cell, the diagonal and the coupling to the
//! positive neighbor along every axis (right, up, front). The coupling to
//! the negative neighbor is read from that neighbor's row, so the operator is
//! symmetric by construction.

pub mod compressed;
pub mod mg;

use crate::global_variables::*;
use crate::grid::*;
use rayon::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FdmMatrixRow<const D: usize> {
    pub center: Float,
    pub neighbors: [Float; D],
}

impl<const D: usize> Default for FdmMatrixRow<D> {
    fn default() -> Self {
        Self {
            center: 0.0,
            neighbors: [0.0; D],
        }
    }
}

pub type FdmMatrix<const D: usize> = Array<FdmMatrixRow<D>, D>;

pub type FdmVector<const D: usize> = Array<Float, D>;

#[derive(Clone, Debug, Default)]
pub struct FdmLinearSystem<const D: usize> {
    pub a: FdmMatrix<D>,
    pub x: FdmVector<D>,
    pub b: FdmVector<D>,
}

impl<const D: usize> FdmLinearSystem<D> {
    pub fn new(size: [usize; D]) -> Self {
        let mut system = Self::default();
        system.resize(size);
        system
    }

    pub fn resize(&mut self, size: [usize; D]) {
        self.a.resize(size, FdmMatrixRow::default());
        self.x.resize(size, 0.0);
        self.b.resize(size, 0.0);
    }

    pub fn clear(&mut self) {
        self.a.clear();
        self.x.clear();
        self.b.clear();
    }

    pub fn size(&self) -> [usize; D] {
        self.a.size()
    }
}

/// Linear-algebra capability set shared by the stencil and compressed
/// representations. Solvers and the V-cycle are written against this trait.
pub trait Blas {
    type Vector: Clone + Default + Send + Sync;
    type Matrix: Clone + Default + Send + Sync;

    fn set(s: Float, result: &mut Self::Vector);

    fn set_from(v: &Self::Vector, result: &mut Self::Vector);

    fn zeros_like(v: &Self::Vector) -> Self::Vector;

    fn dot(a: &Self::Vector, b: &Self::Vector) -> Float;

    /// `result = a * x + y`
    fn axpy(a: Float, x: &Self::Vector, y: &Self::Vector, result: &mut Self::Vector);

    /// `y += a * x`
    fn axpy_assign(a: Float, x: &Self::Vector, y: &mut Self::Vector);

    /// `x = y + a * x`
    fn scale_add_assign(a: Float, x: &mut Self::Vector, y: &Self::Vector);

    fn mvm(m: &Self::Matrix, v: &Self::Vector, result: &mut Self::Vector);

    /// `result = b - a * x`
    fn residual(a: &Self::Matrix, x: &Self::Vector, b: &Self::Vector, result: &mut Self::Vector);

    fn l2_norm(v: &Self::Vector) -> Float {
        Self::dot(v, v).sqrt()
    }

    fn linf_norm(v: &Self::Vector) -> Float;
}

/// Sum of the off-diagonal terms of row `l` applied to `x`.
pub fn off_diagonal_product<const D: usize>(
    a: &FdmMatrix<D>,
    x: &FdmVector<D>,
    index: &[usize; D],
    l: usize,
) -> Float {
    let size = a.size();
    let mut result = 0.0;
    let mut stride = 1;
    for axis in 0..D {
        if index[axis] > 0 {
            result += a[l - stride].neighbors[axis] * x[l - stride];
        }
        if index[axis] + 1 < size[axis] {
            result += a[l].neighbors[axis] * x[l + stride];
        }
        stride *= size[axis];
    }
    result
}

pub struct FdmBlas<const D: usize>;

impl<const D: usize> Blas for FdmBlas<D> {
    type Vector = FdmVector<D>;
    type Matrix = FdmMatrix<D>;

    fn set(s: Float, result: &mut FdmVector<D>) {
        result.as_mut_slice().par_iter_mut().for_each(|value| *value = s);
    }

    fn set_from(v: &FdmVector<D>, result: &mut FdmVector<D>) {
        result.clone_from(v);
    }

    fn zeros_like(v: &FdmVector<D>) -> FdmVector<D> {
        FdmVector::new(v.size(), 0.0)
    }

    fn dot(a: &FdmVector<D>, b: &FdmVector<D>) -> Float {
        a.as_slice()
            .par_iter()
            .zip(b.as_slice().par_iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    fn axpy(a: Float, x: &FdmVector<D>, y: &FdmVector<D>, result: &mut FdmVector<D>) {
        if result.size() != x.size() {
            result.resize(x.size(), 0.0);
        }
        result
            .as_mut_slice()
            .par_iter_mut()
            .zip(x.as_slice().par_iter().zip(y.as_slice().par_iter()))
            .for_each(|(r, (x, y))| *r = a * x + y);
    }

    fn axpy_assign(a: Float, x: &FdmVector<D>, y: &mut FdmVector<D>) {
        y.as_mut_slice()
            .par_iter_mut()
            .zip(x.as_slice().par_iter())
            .for_each(|(y, x)| *y += a * x);
    }

    fn scale_add_assign(a: Float, x: &mut FdmVector<D>, y: &FdmVector<D>) {
        x.as_mut_slice()
            .par_iter_mut()
            .zip(y.as_slice().par_iter())
            .for_each(|(x, y)| *x = y + a * *x);
    }

    fn mvm(m: &FdmMatrix<D>, v: &FdmVector<D>, result: &mut FdmVector<D>) {
        if result.size() != v.size() {
            result.resize(v.size(), 0.0);
        }
        result.par_for_each_index_mut(|index, value| {
            let l = m.linear_index(&index);
            *value = m[l].center * v[l] + off_diagonal_product(m, v, &index, l);
        });
    }

    fn residual(a: &FdmMatrix<D>, x: &FdmVector<D>, b: &FdmVector<D>, result: &mut FdmVector<D>) {
        if result.size() != x.size() {
            result.resize(x.size(), 0.0);
        }
        result.par_for_each_index_mut(|index, value| {
            let l = a.linear_index(&index);
            *value = b[l] - a[l].center * x[l] - off_diagonal_product(a, x, &index, l);
        });
    }

    fn linf_norm(v: &FdmVector<D>) -> Float {
        v.as_slice()
            .par_iter()
            .map(|value| value.abs())
            .reduce(|| 0.0, Float::max)
    }
}
