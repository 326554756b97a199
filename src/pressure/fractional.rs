use crate::boundary::fractional::FractionalBoundaryConditionSolver;
use crate::boundary::{face_weight, fraction_inside_sdf, is_inside_sdf, BoundaryConditionSolver};
use crate::fdm::compressed::CompressedLinearSystem;
use crate::fdm::{FdmLinearSystem, FdmVector};
use crate::field::*;
use crate::global_variables::*;
use crate::grid::*;
use crate::pressure::*;
use crate::solver::LinearSystemSolver;

/// Pressure projection with sub-cell boundaries (ghost fluid): face areas
/// open to the fluid come from the collider level set and the free surface
/// position from the fluid level set.
pub struct FractionalSinglePhasePressureSolver<const D: usize> {
    system: PressureSystem<D>,
    fluid_sdf: Array<Float, D>,
    weights: [Array<Float, D>; D],
}

impl<const D: usize> Default for FractionalSinglePhasePressureSolver<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> FractionalSinglePhasePressureSolver<D> {
    pub fn new() -> Self {
        Self::with_solver(default_linear_system_solver())
    }

    pub fn with_solver(solver: Box<dyn LinearSystemSolver<D>>) -> Self {
        Self {
            system: PressureSystem::new(solver),
            fluid_sdf: Array::default(),
            weights: std::array::from_fn(|_| Array::default()),
        }
    }

    /// Open area fraction of every face, per velocity component.
    pub fn weights(&self) -> &[Array<Float, D>; D] {
        &self.weights
    }

    pub fn fluid_sdf(&self) -> &Array<Float, D> {
        &self.fluid_sdf
    }

    pub fn linear_system(&self) -> &FdmLinearSystem<D> {
        self.system.linear_system()
    }

    pub fn compressed_linear_system(&self) -> &CompressedLinearSystem {
        self.system.compressed_linear_system()
    }

    fn sample_geometry(
        &mut self,
        velocity: &FaceCenteredGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
        fluid_sdf: &dyn ScalarField<D>,
    ) {
        let shape = *velocity.shape();
        self.fluid_sdf.resize(shape.resolution, 0.0);
        self.fluid_sdf
            .par_for_each_index_mut(|index, phi| *phi = fluid_sdf.sample(&shape.cell_center(&index)));

        for (axis, weights) in self.weights.iter_mut().enumerate() {
            weights.resize(velocity.component(axis).size(), 0.0);
            weights.par_for_each_index_mut(|face, weight| {
                *weight = face_weight(boundary_sdf, &velocity.face_position(axis, &face), axis, &shape.spacing);
            });
        }
    }

    fn apply_pressure_gradient(&self, velocity: &mut FaceCenteredGrid<D>) {
        let fluid_sdf = &self.fluid_sdf;
        let pressure = self.system.pressure();
        let resolution = fluid_sdf.size();
        let spacing = velocity.shape().spacing;
        let pressure_at = |cell: [usize; D]| {
            if is_inside_sdf(fluid_sdf[cell]) {
                pressure[cell]
            } else {
                0.0
            }
        };

        for axis in 0..D {
            let inv_h = 1.0 / spacing[axis];
            let weights = &self.weights[axis];
            velocity
                .component_mut(axis)
                .par_for_each_index_mut(|face, value| {
                    if face[axis] == 0 || face[axis] == resolution[axis] || weights[face] <= 0.0 {
                        return;
                    }
                    let lower = neighbor(face, axis, false);
                    let (lower_phi, upper_phi) = (fluid_sdf[lower], fluid_sdf[face]);
                    if !is_inside_sdf(lower_phi) && !is_inside_sdf(upper_phi) {
                        return;
                    }
                    let theta = fraction_inside_sdf(lower_phi, upper_phi).max(MIN_FLUID_FRACTION);
                    *value += inv_h / theta * (pressure_at(face) - pressure_at(lower));
                });
        }
    }
}

/// Row of a cell whose center is inside the fluid. Faces are weighted by
/// their open area; a neighbor across the free surface enters as a ghost
/// pressure at the interpolated surface position. The covered part of each
/// face carries the collider velocity.
fn fractional_row<const D: usize>(
    fluid_sdf: &Array<Float, D>,
    weights: &[Array<Float, D>; D],
    velocity: &FaceCenteredGrid<D>,
    boundary_velocity: &dyn VectorField<D>,
    index: [usize; D],
) -> Option<PressureRow<D>> {
    let phi = fluid_sdf[index];
    if !is_inside_sdf(phi) {
        return None;
    }
    let resolution = fluid_sdf.size();
    let spacing = velocity.shape().spacing;
    let mut row = PressureRow::new();

    for axis in 0..D {
        let inv_h = 1.0 / spacing[axis];
        let inv_h2 = inv_h * inv_h;
        let component = velocity.component(axis);

        for is_positive in [false, true] {
            let (face, sign, has_neighbor) = if is_positive {
                (neighbor(index, axis, true), 1.0, index[axis] + 1 < resolution[axis])
            } else {
                (index, -1.0, index[axis] > 0)
            };
            let weight = weights[axis][face];

            if has_neighbor {
                let neighbor_phi = fluid_sdf[neighbor(index, axis, is_positive)];
                let term = weight * inv_h2;
                if is_inside_sdf(neighbor_phi) {
                    row.center += term;
                    if is_positive {
                        row.upper[axis] = -term;
                    } else {
                        row.lower[axis] = -term;
                    }
                } else {
                    let theta = fraction_inside_sdf(phi, neighbor_phi).max(MIN_FLUID_FRACTION);
                    row.center += term / theta;
                }
                row.rhs += sign * weight * component[face] * inv_h;
            } else {
                row.rhs += sign * component[face] * inv_h;
            }

            let solid_velocity = boundary_velocity.sample(&velocity.face_position(axis, &face))[axis];
            row.rhs += sign * (1.0 - weight) * solid_velocity * inv_h;
        }
    }

    if row.center < Float::EPSILON {
        row.center = 1.0;
        row.rhs = 0.0;
    }
    Some(row)
}

impl<const D: usize> GridPressureSolver<D> for FractionalSinglePhasePressureSolver<D> {
    fn solve(
        &mut self,
        velocity: &mut FaceCenteredGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
        boundary_velocity: &dyn VectorField<D>,
        fluid_sdf: &dyn ScalarField<D>,
        use_compressed: bool,
    ) -> bool {
        self.sample_geometry(velocity, boundary_sdf, fluid_sdf);

        let fluid_sdf = &self.fluid_sdf;
        let weights = &self.weights;
        let input: &FaceCenteredGrid<D> = velocity;
        let converged = self.system.solve(input.resolution(), use_compressed, |index| {
            fractional_row(fluid_sdf, weights, input, boundary_velocity, index)
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
        Box::new(FractionalBoundaryConditionSolver::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::tests::{precise_solver, unit_inflow};
    use crate::solver::multigrid::MgParameters;
    use crate::solver::{SolverKind, SolverParameters};
    use std::f64::consts::PI;

    fn free_surface(use_compressed: bool) {
        let mut velocity = unit_inflow();
        let mut solver = FractionalSinglePhasePressureSolver::with_solver(precise_solver());
        let fluid_sdf = CustomScalarField::new(|point: &Vector<2>| point[1] - 2.0);
        solver.solve(
            &mut velocity,
            &ConstantScalarField(Float::MAX),
            &ConstantVectorField(Vector::<2>::zeros()),
            &fluid_sdf,
            use_compressed,
        );

        for axis in 0..2 {
            assert!(velocity.component(axis).iter().all(|value| value.abs() < 1e-6));
        }
        assert!((solver.fluid_sdf()[[1, 2]] - 0.5).abs() < 1e-12);
        assert!((solver.fluid_sdf()[[1, 0]] + 1.5).abs() < 1e-12);
        let expected = [1.5, 0.5, 0.0];
        for i in 0..3 {
            for (j, expected) in expected.iter().enumerate() {
                assert!((solver.pressure()[[i, j]] - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_free_surface_projection() {
        free_surface(false);
    }

    #[test]
    fn test_free_surface_projection_compressed() {
        free_surface(true);
    }

    #[test]
    fn test_partially_covered_column_balances_the_inflow() {
        let mut velocity = unit_inflow();
        let mut solver = FractionalSinglePhasePressureSolver::with_solver(precise_solver());
        let wall = CustomScalarField::new(|point: &Vector<2>| 1.5 - point[0]);
        solver.solve(
            &mut velocity,
            &wall,
            &ConstantVectorField(Vector::<2>::zeros()),
            &ConstantScalarField(-Float::MAX),
            false,
        );

        let v_weights = &solver.weights()[1];
        assert_eq!(v_weights[[0, 1]], 1.0);
        assert!((v_weights[[1, 1]] - 0.5).abs() < 1e-12);
        assert_eq!(v_weights[[2, 1]], 0.0);
        // The fully covered column is left out of the system.
        assert_eq!(solver.linear_system().a[[2, 0]].center, 1.0);

        let v = velocity.component(1);
        for j in 0..4 {
            assert!(v[[0, j]].abs() < 1e-6);
            assert!(v[[1, j]].abs() < 1e-6);
        }
        assert_eq!(v[[2, 1]], 1.0);
        assert!(velocity.component(0).iter().all(|value| value.abs() < 1e-6));
    }

    #[test]
    fn test_multigrid_preconditioned_projection() {
        let shape = GridShape::<2>::uniform([16, 16], 1.0 / 16.0);
        let mut velocity = FaceCenteredGrid::new(shape, Vector::<2>::zeros());
        velocity.fill_with(|point| Vector::<2>::new((PI * point[0]).sin() * point[1], 0.0));
        let cells: Vec<[usize; 2]> = (0..16).flat_map(|i| (0..16).map(move |j| [i, j])).collect();
        let divergence = |velocity: &FaceCenteredGrid<2>| -> Float {
            cells
                .iter()
                .map(|index| velocity.divergence_at_cell_center(index).abs())
                .sum()
        };
        let before = divergence(&velocity);

        let mut solver = FractionalSinglePhasePressureSolver::new();
        let mg_parameters = MgParameters::new(4).unwrap();
        solver.set_linear_system_solver(
            SolverKind::MultigridPcg.build(SolverParameters::default(), mg_parameters),
        );
        assert!(solver.solve(
            &mut velocity,
            &ConstantScalarField(Float::MAX),
            &ConstantVectorField(Vector::<2>::zeros()),
            &ConstantScalarField(-Float::MAX),
            false,
        ));
        assert!(divergence(&velocity) < 1e-3 * before);
    }
}
