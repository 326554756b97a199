//! Pressure projection: builds the Poisson system from the velocity
//! divergence and the boundary geometry, solves it and subtracts the
//! pressure gradient from the face velocities.

pub mod fractional;

use crate::boundary::blocked::BlockedBoundaryConditionSolver;
use crate::boundary::{build_markers, BoundaryConditionSolver};
use crate::fdm::compressed::CompressedLinearSystem;
use crate::fdm::mg::FdmMgLinearSystem;
use crate::fdm::{FdmLinearSystem, FdmMatrixRow, FdmVector};
use crate::field::*;
use crate::global_variables::*;
use crate::grid::*;
use crate::solver::cg::ConjugateGradientSolver;
use crate::solver::{LinearSystemSolver, SolverParameters};
use crate::CellMarker;
use rayon::prelude::*;

pub trait GridPressureSolver<const D: usize>: Send {
    /// Makes `velocity` divergence free in place. Returns whether the
    /// linear solve converged; an unconverged solve still applies its
    /// best-effort pressure.
    fn solve(
        &mut self,
        velocity: &mut FaceCenteredGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
        boundary_velocity: &dyn VectorField<D>,
        fluid_sdf: &dyn ScalarField<D>,
        use_compressed: bool,
    ) -> bool;

    /// Cell-centered pressure of the last solve.
    fn pressure(&self) -> &FdmVector<D>;

    fn linear_system_solver(&self) -> &dyn LinearSystemSolver<D>;

    fn set_linear_system_solver(&mut self, solver: Box<dyn LinearSystemSolver<D>>);

    fn suggested_boundary_condition_solver(&self) -> Box<dyn BoundaryConditionSolver<D>>;
}

pub(crate) fn default_linear_system_solver<const D: usize>() -> Box<dyn LinearSystemSolver<D>> {
    Box::new(ConjugateGradientSolver::new(SolverParameters::default()))
}

/// A pressure row before it is laid out as a stencil or a CSR row.
/// `lower[a]` and `upper[a]` couple to the neighbors along axis `a`; they
/// are zero unless that neighbor is itself an unknown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PressureRow<const D: usize> {
    pub center: Float,
    pub lower: [Float; D],
    pub upper: [Float; D],
    pub rhs: Float,
}

impl<const D: usize> PressureRow<D> {
    pub fn new() -> Self {
        Self {
            center: 0.0,
            lower: [0.0; D],
            upper: [0.0; D],
            rhs: 0.0,
        }
    }
}

/// The linear solver plus every layout of the pressure system it may be
/// handed: stencil, compressed (unknown cells only) or the multigrid stack.
pub(crate) struct PressureSystem<const D: usize> {
    solver: Box<dyn LinearSystemSolver<D>>,
    system: FdmLinearSystem<D>,
    compressed: CompressedLinearSystem,
    cells: Vec<usize>,
}

impl<const D: usize> PressureSystem<D> {
    pub fn new(solver: Box<dyn LinearSystemSolver<D>>) -> Self {
        Self {
            solver,
            system: FdmLinearSystem::default(),
            compressed: CompressedLinearSystem::default(),
            cells: Vec::new(),
        }
    }

    pub fn solver(&self) -> &dyn LinearSystemSolver<D> {
        self.solver.as_ref()
    }

    pub fn set_solver(&mut self, solver: Box<dyn LinearSystemSolver<D>>) {
        self.solver = solver;
    }

    pub fn pressure(&self) -> &FdmVector<D> {
        &self.system.x
    }

    pub fn linear_system(&self) -> &FdmLinearSystem<D> {
        &self.system
    }

    pub fn compressed_linear_system(&self) -> &CompressedLinearSystem {
        &self.compressed
    }

    /// Builds the system from `row_at` (`None` for cells that are not
    /// unknowns) and solves it. The pressure always ends up on the grid.
    pub fn solve<F>(&mut self, resolution: [usize; D], use_compressed: bool, row_at: F) -> bool
    where
        F: Fn([usize; D]) -> Option<PressureRow<D>> + Send + Sync,
    {
        let number_of_cells: usize = resolution.iter().product();
        let rows: Vec<Option<PressureRow<D>>> = (0..number_of_cells)
            .into_par_iter()
            .map(|l| row_at(unravel(&resolution, l)))
            .collect();

        let number_of_levels = self.solver.max_number_of_levels();
        let converged = if number_of_levels > 1 {
            self.build_stencil(resolution, &rows);
            let mut levels = FdmMgLinearSystem::from_finest(&self.system, number_of_levels);
            let converged = self.solver.solve_multigrid(&mut levels);
            std::mem::swap(&mut self.system.x, &mut levels.x[0]);
            converged
        } else if use_compressed {
            self.build_compressed(resolution, &rows);
            let converged = self.solver.solve_compressed(&mut self.compressed);
            self.system.x.resize(resolution, 0.0);
            self.compressed.decompress(&self.cells, &mut self.system.x);
            converged
        } else {
            self.build_stencil(resolution, &rows);
            self.solver.solve(&mut self.system)
        };

        if !converged {
            let stats = self.solver.stats();
            log::warn!(
                "{} pressure solve did not converge: residual {:.6e} after {} iterations (tolerance {:.1e})",
                self.solver.kind(),
                stats.last_residual,
                stats.last_number_of_iterations,
                stats.tolerance
            );
        }
        converged
    }

    fn build_stencil(&mut self, resolution: [usize; D], rows: &[Option<PressureRow<D>>]) {
        self.system.resize(resolution);
        let FdmLinearSystem { a, b, .. } = &mut self.system;
        a.as_mut_slice()
            .par_iter_mut()
            .zip(b.as_mut_slice().par_iter_mut())
            .zip(rows.par_iter())
            .for_each(|((matrix_row, rhs), row)| match row {
                Some(row) => {
                    *matrix_row = FdmMatrixRow {
                        center: row.center,
                        neighbors: row.upper,
                    };
                    *rhs = row.rhs;
                }
                None => {
                    *matrix_row = FdmMatrixRow {
                        center: 1.0,
                        neighbors: [0.0; D],
                    };
                    *rhs = 0.0;
                }
            });
    }

    fn build_compressed(&mut self, resolution: [usize; D], rows: &[Option<PressureRow<D>>]) {
        let strides = strides(&resolution);

        self.cells.clear();
        let mut row_of_cell = vec![None; rows.len()];
        for (cell, row) in rows.iter().enumerate() {
            if row.is_some() {
                row_of_cell[cell] = Some(self.cells.len());
                self.cells.push(cell);
            }
        }

        self.compressed.clear();
        let mut values = Vec::with_capacity(2 * D + 1);
        let mut columns = Vec::with_capacity(2 * D + 1);
        for (own_row, &cell) in self.cells.iter().enumerate() {
            let Some(row) = &rows[cell] else {
                continue;
            };
            values.clear();
            columns.clear();
            values.push(row.center);
            columns.push(own_row);
            for axis in 0..D {
                if row.lower[axis] != 0.0 {
                    if let Some(column) = row_of_cell[cell - strides[axis]] {
                        values.push(row.lower[axis]);
                        columns.push(column);
                    }
                }
                if row.upper[axis] != 0.0 {
                    if let Some(column) = row_of_cell[cell + strides[axis]] {
                        values.push(row.upper[axis]);
                        columns.push(column);
                    }
                }
            }
            self.compressed.a.add_row(&values, &columns);
            self.compressed.b.push(row.rhs);
        }
        self.compressed.x = vec![0.0; self.cells.len()];
    }
}

pub(crate) fn neighbor<const D: usize>(index: [usize; D], axis: usize, is_positive: bool) -> [usize; D] {
    let mut neighbor = index;
    if is_positive {
        neighbor[axis] += 1;
    } else {
        neighbor[axis] -= 1;
    }
    neighbor
}

/// Pressure projection over blocked cells: every cell is wholly fluid,
/// air or solid.
pub struct SinglePhasePressureSolver<const D: usize> {
    system: PressureSystem<D>,
    markers: Array<CellMarker, D>,
}

impl<const D: usize> Default for SinglePhasePressureSolver<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> SinglePhasePressureSolver<D> {
    pub fn new() -> Self {
        Self::with_solver(default_linear_system_solver())
    }

    pub fn with_solver(solver: Box<dyn LinearSystemSolver<D>>) -> Self {
        Self {
            system: PressureSystem::new(solver),
            markers: Array::default(),
        }
    }

    pub fn markers(&self) -> &Array<CellMarker, D> {
        &self.markers
    }

    pub fn linear_system(&self) -> &FdmLinearSystem<D> {
        self.system.linear_system()
    }

    pub fn compressed_linear_system(&self) -> &CompressedLinearSystem {
        self.system.compressed_linear_system()
    }

    fn apply_pressure_gradient(&self, velocity: &mut FaceCenteredGrid<D>) {
        let markers = &self.markers;
        let pressure = self.system.pressure();
        let resolution = markers.size();
        let spacing = velocity.shape().spacing;
        let pressure_at = |cell: [usize; D]| {
            if markers[cell] == CellMarker::Fluid {
                pressure[cell]
            } else {
                0.0
            }
        };

        for axis in 0..D {
            let inv_h = 1.0 / spacing[axis];
            velocity
                .component_mut(axis)
                .par_for_each_index_mut(|face, value| {
                    if face[axis] == 0 || face[axis] == resolution[axis] {
                        return;
                    }
                    let lower = neighbor(face, axis, false);
                    let (lower_marker, upper_marker) = (markers[lower], markers[face]);
                    if lower_marker == CellMarker::Boundary || upper_marker == CellMarker::Boundary {
                        return;
                    }
                    if lower_marker == CellMarker::Fluid || upper_marker == CellMarker::Fluid {
                        *value += inv_h * (pressure_at(face) - pressure_at(lower));
                    }
                });
        }
    }
}

/// Row of a fluid cell. Solid neighbors drop out of the stencil and their
/// face flux is the solid velocity; air neighbors are p = 0 Dirichlet cells.
fn blocked_row<const D: usize>(
    markers: &Array<CellMarker, D>,
    velocity: &FaceCenteredGrid<D>,
    boundary_velocity: &dyn VectorField<D>,
    index: [usize; D],
) -> Option<PressureRow<D>> {
    if markers[index] != CellMarker::Fluid {
        return None;
    }
    let resolution = markers.size();
    let spacing = velocity.shape().spacing;
    let mut row = PressureRow::new();

    for axis in 0..D {
        let inv_h = 1.0 / spacing[axis];
        let inv_h2 = inv_h * inv_h;
        let upper_face = neighbor(index, axis, true);
        let component = velocity.component(axis);
        let mut upper_flux = component[upper_face];
        let mut lower_flux = component[index];

        if index[axis] + 1 < resolution[axis] {
            match markers[upper_face] {
                CellMarker::Boundary => {
                    upper_flux =
                        boundary_velocity.sample(&velocity.face_position(axis, &upper_face))[axis];
                }
                CellMarker::Fluid => {
                    row.center += inv_h2;
                    row.upper[axis] = -inv_h2;
                }
                CellMarker::Air => row.center += inv_h2,
            }
        }
        if index[axis] > 0 {
            match markers[neighbor(index, axis, false)] {
                CellMarker::Boundary => {
                    lower_flux = boundary_velocity.sample(&velocity.face_position(axis, &index))[axis];
                }
                CellMarker::Fluid => {
                    row.center += inv_h2;
                    row.lower[axis] = -inv_h2;
                }
                CellMarker::Air => row.center += inv_h2,
            }
        }
        row.rhs += inv_h * (upper_flux - lower_flux);
    }

    if row.center < Float::EPSILON {
        row.center = 1.0;
        row.rhs = 0.0;
    }
    Some(row)
}

impl<const D: usize> GridPressureSolver<D> for SinglePhasePressureSolver<D> {
    fn solve(
        &mut self,
        velocity: &mut FaceCenteredGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
        boundary_velocity: &dyn VectorField<D>,
        fluid_sdf: &dyn ScalarField<D>,
        use_compressed: bool,
    ) -> bool {
        let shape = *velocity.shape();
        build_markers(&shape, boundary_sdf, fluid_sdf, &mut self.markers);

        let markers = &self.markers;
        let input: &FaceCenteredGrid<D> = velocity;
        let converged = self.system.solve(shape.resolution, use_compressed, |index| {
            blocked_row(markers, input, boundary_velocity, index)
        });

        self.apply_pressure_gradient(velocity);
        converged
    }

    fn pressure(&self) -> &FdmVector<D> {
        self.system.pressure()
    }

    fn linear_system_solver(&self) -> &dyn LinearSystemSolver<D> {
        self.system.solver()
    }

    fn set_linear_system_solver(&mut self, solver: Box<dyn LinearSystemSolver<D>>) {
        self.system.set_solver(solver);
    }

    fn suggested_boundary_condition_solver(&self) -> Box<dyn BoundaryConditionSolver<D>> {
        Box::new(BlockedBoundaryConditionSolver::new())
    }
}
