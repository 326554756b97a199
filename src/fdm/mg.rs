//! Multigrid level stacks and the grid-transfer operators for both matrix
//! representations.
//!
//! Stencil levels halve the resolution along every axis. Transfers use the
//! cell-centered full-weighting kernel `[1, 3, 3, 1] / 8` for restriction
//! and multilinear interpolation for the correction. Coarse operators are
//! the piecewise-constant Galerkin aggregate of the finer level scaled by
//! `1 / 2^(D + 1)`, which matches a 2h rediscretization of the Laplacian.
//!
//! Compressed levels aggregate rows pairwise (`i -> i / 2`) with the exact
//! Galerkin product `P^T A P`.

use crate::fdm::compressed::{CompressedBlas, CompressedLinearSystem, MatrixCsr};
use crate::fdm::{Blas, FdmBlas, FdmLinearSystem, FdmMatrix, FdmMatrixRow, FdmVector};
use crate::global_variables::*;
use crate::solver::multigrid::{MgParameters, Relaxation};
use crate::solver::{gauss_seidel, jacobi};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Level 0 is the finest.
pub struct MgLinearSystem<B: Blas> {
    pub a: Vec<B::Matrix>,
    pub x: Vec<B::Vector>,
    pub b: Vec<B::Vector>,
}

impl<B: Blas> Default for MgLinearSystem<B> {
    fn default() -> Self {
        Self {
            a: Vec::new(),
            x: Vec::new(),
            b: Vec::new(),
        }
    }
}

impl<B: Blas> Clone for MgLinearSystem<B> {
    fn clone(&self) -> Self {
        Self {
            a: self.a.clone(),
            x: self.x.clone(),
            b: self.b.clone(),
        }
    }
}

impl<B: Blas> MgLinearSystem<B> {
    pub fn clear(&mut self) {
        self.a.clear();
        self.x.clear();
        self.b.clear();
    }

    pub fn number_of_levels(&self) -> usize {
        self.a.len()
    }
}

pub type FdmMgLinearSystem<const D: usize> = MgLinearSystem<FdmBlas<D>>;

pub type CompressedMgLinearSystem = MgLinearSystem<CompressedBlas>;

/// Operators the V-cycle needs on top of [`Blas`].
pub trait MultigridBlas: Blas {
    fn relax(
        a: &Self::Matrix,
        b: &Self::Vector,
        number_of_iterations: usize,
        parameters: &MgParameters,
        x: &mut Self::Vector,
        buffer: &mut Self::Vector,
    );

    fn restrict(finer: &Self::Vector, coarser: &mut Self::Vector);

    /// Interpolates `coarser` and adds it to `finer`.
    fn correct(coarser: &Self::Vector, finer: &mut Self::Vector);
}

/// Resolutions from the finest down, halving while every axis stays even.
pub fn level_resolutions<const D: usize>(
    finest: [usize; D],
    max_number_of_levels: usize,
) -> Vec<[usize; D]> {
    let mut resolutions = vec![finest];
    let mut resolution = finest;
    while resolutions.len() < max_number_of_levels
        && resolution.iter().all(|&n| n >= 2 && n % 2 == 0)
    {
        resolution = resolution.map(|n| n / 2);
        resolutions.push(resolution);
    }
    resolutions
}

impl<const D: usize> FdmMgLinearSystem<D> {
    pub fn resize_with_finest(&mut self, finest: [usize; D], max_number_of_levels: usize) {
        let resolutions = level_resolutions(finest, max_number_of_levels);
        self.a = resolutions
            .iter()
            .map(|&size| FdmMatrix::new(size, FdmMatrixRow::default()))
            .collect();
        self.x = resolutions.iter().map(|&size| FdmVector::new(size, 0.0)).collect();
        self.b = resolutions.iter().map(|&size| FdmVector::new(size, 0.0)).collect();
    }

    pub fn from_finest(finest: &FdmLinearSystem<D>, max_number_of_levels: usize) -> Self {
        let mut system = Self::default();
        system.resize_with_finest(finest.size(), max_number_of_levels);
        system.a[0].clone_from(&finest.a);
        system.x[0].clone_from(&finest.x);
        system.b[0].clone_from(&finest.b);
        system.build_coarse_operators();
        system
    }

    /// Recomputes every coarse matrix from level 0.
    pub fn build_coarse_operators(&mut self) {
        for level in 1..self.a.len() {
            let (finer, coarser) = self.a.split_at_mut(level);
            coarsen_matrix(&finer[level - 1], &mut coarser[0]);
        }
    }

    pub fn finest(&self) -> FdmLinearSystem<D> {
        FdmLinearSystem {
            a: self.a[0].clone(),
            x: self.x[0].clone(),
            b: self.b[0].clone(),
        }
    }
}

pub fn coarsen_matrix<const D: usize>(finer: &FdmMatrix<D>, coarser: &mut FdmMatrix<D>) {
    let fine_size = finer.size();
    let scale = 1.0 / (1usize << (D + 1)) as Float;
    coarser.par_for_each_index_mut(|index, row| {
        let mut center = 0.0;
        let mut neighbors = [0.0; D];
        for child in 0..(1usize << D) {
            let fine_index: [usize; D] =
                std::array::from_fn(|axis| 2 * index[axis] + ((child >> axis) & 1));
            let fine_row = &finer[fine_index];
            center += fine_row.center;
            for axis in 0..D {
                if (child >> axis) & 1 == 0 {
                    center += 2.0 * fine_row.neighbors[axis];
                } else if fine_index[axis] + 1 < fine_size[axis] {
                    neighbors[axis] += fine_row.neighbors[axis];
                }
            }
        }
        *row = FdmMatrixRow {
            center: scale * center,
            neighbors: neighbors.map(|value| scale * value),
        };
    });
}

pub fn restrict<const D: usize>(finer: &FdmVector<D>, coarser: &mut FdmVector<D>) {
    const KERNEL: [Float; 4] = [0.125, 0.375, 0.375, 0.125];
    let fine_size = finer.size();
    coarser.par_for_each_index_mut(|index, value| {
        let indices: [[usize; 4]; D] = std::array::from_fn(|axis| {
            let i = 2 * index[axis];
            [
                if i > 0 { i - 1 } else { i },
                i,
                i + 1,
                if i + 2 < fine_size[axis] { i + 2 } else { i + 1 },
            ]
        });
        let mut sum = 0.0;
        for combination in 0..(1usize << (2 * D)) {
            let mut weight = 1.0;
            let mut l = 0;
            let mut stride = 1;
            for axis in 0..D {
                let k = (combination >> (2 * axis)) & 3;
                weight *= KERNEL[k];
                l += indices[axis][k] * stride;
                stride *= fine_size[axis];
            }
            sum += weight * finer[l];
        }
        *value = sum;
    });
}

pub fn correct<const D: usize>(coarser: &FdmVector<D>, finer: &mut FdmVector<D>) {
    let coarse_size = coarser.size();
    let fine_size = finer.size();
    finer.par_for_each_index_mut(|index, value| {
        let mut indices = [[0usize; 2]; D];
        let mut weights = [[0.0; 2]; D];
        for axis in 0..D {
            let i = index[axis];
            let ci = i / 2;
            if i % 2 == 0 {
                indices[axis] = [if i > 1 { ci - 1 } else { ci }, ci];
                weights[axis] = [0.25, 0.75];
            } else {
                indices[axis] = [ci, if i + 1 < fine_size[axis] { ci + 1 } else { ci }];
                weights[axis] = [0.75, 0.25];
            }
        }
        let mut sum = 0.0;
        for corner in 0..(1usize << D) {
            let mut weight = 1.0;
            let mut l = 0;
            let mut stride = 1;
            for axis in 0..D {
                let k = (corner >> axis) & 1;
                weight *= weights[axis][k];
                l += indices[axis][k] * stride;
                stride *= coarse_size[axis];
            }
            sum += weight * coarser[l];
        }
        *value += sum;
    });
}

impl<const D: usize> MultigridBlas for FdmBlas<D> {
    fn relax(
        a: &FdmMatrix<D>,
        b: &FdmVector<D>,
        number_of_iterations: usize,
        parameters: &MgParameters,
        x: &mut FdmVector<D>,
        buffer: &mut FdmVector<D>,
    ) {
        if buffer.size() != x.size() {
            buffer.resize(x.size(), 0.0);
        }
        for _ in 0..number_of_iterations {
            match parameters.relaxation {
                Relaxation::GaussSeidel if parameters.use_red_black_ordering => {
                    gauss_seidel::relax_red_black(a, b, parameters.sor_factor, x, buffer)
                }
                Relaxation::GaussSeidel => gauss_seidel::relax(a, b, parameters.sor_factor, x),
                Relaxation::Jacobi => {
                    jacobi::relax(a, b, x, buffer);
                    std::mem::swap(x, buffer);
                }
            }
        }
    }

    fn restrict(finer: &FdmVector<D>, coarser: &mut FdmVector<D>) {
        restrict(finer, coarser);
    }

    fn correct(coarser: &FdmVector<D>, finer: &mut FdmVector<D>) {
        correct(coarser, finer);
    }
}

/// Galerkin product `P^T A P` for the pairwise aggregation `i -> i / 2`.
pub fn coarsen_compressed(finer: &MatrixCsr) -> MatrixCsr {
    let coarse_rows = (finer.rows() + 1) / 2;
    let mut coarser = MatrixCsr::new();
    let mut entries = BTreeMap::new();
    let mut values = Vec::new();
    let mut columns = Vec::new();
    for row in 0..coarse_rows {
        entries.clear();
        for fine_row in (2 * row)..(2 * row + 2).min(finer.rows()) {
            for (column, value) in finer.row(fine_row) {
                *entries.entry(column / 2).or_insert(0.0) += value;
            }
        }
        values.clear();
        columns.clear();
        for (&column, &value) in entries.iter() {
            columns.push(column);
            values.push(value);
        }
        coarser.add_row(&values, &columns);
    }
    coarser
}

impl CompressedMgLinearSystem {
    pub fn from_finest(finest: &CompressedLinearSystem, max_number_of_levels: usize) -> Self {
        let mut system = Self::default();
        system.a.push(finest.a.clone());
        system.x.push(finest.x.clone());
        system.b.push(finest.b.clone());
        while system.a.len() < max_number_of_levels {
            let Some(finer) = system.a.last() else {
                break;
            };
            if finer.rows() < 2 {
                break;
            }
            let coarser = coarsen_compressed(finer);
            let rows = coarser.rows();
            system.a.push(coarser);
            system.x.push(vec![0.0; rows]);
            system.b.push(vec![0.0; rows]);
        }
        system
    }
}

impl MultigridBlas for CompressedBlas {
    fn relax(
        a: &MatrixCsr,
        b: &Vec<Float>,
        number_of_iterations: usize,
        parameters: &MgParameters,
        x: &mut Vec<Float>,
        buffer: &mut Vec<Float>,
    ) {
        buffer.resize(x.len(), 0.0);
        for _ in 0..number_of_iterations {
            match parameters.relaxation {
                Relaxation::GaussSeidel => {
                    gauss_seidel::relax_compressed(a, b, parameters.sor_factor, x)
                }
                Relaxation::Jacobi => {
                    jacobi::relax_compressed(a, b, x, buffer);
                    std::mem::swap(x, buffer);
                }
            }
        }
    }

    fn restrict(finer: &Vec<Float>, coarser: &mut Vec<Float>) {
        coarser.resize((finer.len() + 1) / 2, 0.0);
        coarser.par_iter_mut().enumerate().for_each(|(i, value)| {
            *value = finer[2 * i] + finer.get(2 * i + 1).copied().unwrap_or(0.0);
        });
    }

    fn correct(coarser: &Vec<Float>, finer: &mut Vec<Float>) {
        finer
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, value)| *value += coarser[i / 2]);
    }
}
