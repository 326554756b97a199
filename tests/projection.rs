use fdm_lesc::boundary::BoundaryConditionSolver;
use fdm_lesc::collider::{Collider, SphereCollider};
use fdm_lesc::field::*;
use fdm_lesc::grid::*;
use fdm_lesc::pressure::fractional::FractionalSinglePhasePressureSolver;
use fdm_lesc::pressure::{GridPressureSolver, SinglePhasePressureSolver};
use fdm_lesc::solver::multigrid::MgParameters;
use fdm_lesc::solver::{SolverKind, SolverParameters};
use fdm_lesc::Float;
use std::sync::Arc;

const N: usize = 24;

const H: Float = 1.0 / N as Float;

fn stirred_tank() -> FaceCenteredGrid<2> {
    let shape = GridShape::uniform([N, N], H);
    let mut velocity = FaceCenteredGrid::new(shape, Vector::<2>::zeros());
    velocity.fill_with(|point| Vector::<2>::new(point[0] * (1.0 - point[0]), 0.5 * point[1] - 0.3));
    velocity
}

/// Projects a stirred tank with a free surface at y = 0.75 and a sphere
/// resting in the fluid, then returns the largest divergence over the cells
/// whose faces all lie in the open fluid.
fn project(
    mut pressure_solver: Box<dyn GridPressureSolver<2>>,
    use_compressed: bool,
) -> (FaceCenteredGrid<2>, Float) {
    let mut velocity = stirred_tank();
    let shape = *velocity.shape();
    pressure_solver.set_linear_system_solver(SolverKind::ConjugateGradient.build(
        SolverParameters::new(1000, 1e-11, 10, 1.5, false).unwrap(),
        MgParameters::default(),
    ));

    let sphere: Arc<dyn Collider<2>> = Arc::new(SphereCollider::new(Vector::<2>::new(0.5, 0.35), 0.15));
    let mut boundary_solver = pressure_solver.suggested_boundary_condition_solver();
    boundary_solver.update_collider(Some(sphere.clone()), &shape);
    boundary_solver.constrain_velocity(&mut velocity, 5);

    let free_surface = CustomScalarField::new(|point: &Vector<2>| point[1] - 0.75);
    let converged = pressure_solver.solve(
        &mut velocity,
        boundary_solver.collider_sdf(),
        boundary_solver.collider_velocity_field(),
        &free_surface,
        use_compressed,
    );
    assert!(converged);

    let mut max_divergence: Float = 0.0;
    for i in 0..N {
        for j in 0..N {
            let center = shape.cell_center(&[i, j]);
            let in_fluid = free_surface.sample(&center) < 0.0;
            let away_from_sphere = sphere.signed_distance(&center) > 2.0 * H;
            if in_fluid && away_from_sphere {
                max_divergence = max_divergence.max(velocity.divergence_at_cell_center(&[i, j]).abs());
            }
        }
    }
    (velocity, max_divergence)
}

#[test]
fn blocked_projection_removes_divergence_around_a_sphere() {
    let (_, divergence) = project(Box::new(SinglePhasePressureSolver::new()), false);
    assert!(divergence < 1e-7, "divergence {divergence}");
}

#[test]
fn fractional_projection_removes_divergence_around_a_sphere() {
    let (_, divergence) = project(Box::new(FractionalSinglePhasePressureSolver::new()), false);
    assert!(divergence < 1e-7, "divergence {divergence}");
}

#[test]
fn compressed_systems_match_the_stencil_systems() {
    for use_fractional in [false, true] {
        let build = || -> Box<dyn GridPressureSolver<2>> {
            if use_fractional {
                Box::new(FractionalSinglePhasePressureSolver::new())
            } else {
                Box::new(SinglePhasePressureSolver::new())
            }
        };
        let (stencil, _) = project(build(), false);
        let (compressed, divergence) = project(build(), true);
        assert!(divergence < 1e-7);
        for axis in 0..2 {
            for (x, y) in stencil
                .component(axis)
                .iter()
                .zip(compressed.component(axis).iter())
            {
                assert!((x - y).abs() < 1e-7);
            }
        }
    }
}

#[test]
fn closed_walls_keep_their_zero_flux() {
    let (velocity, _) = project(Box::new(FractionalSinglePhasePressureSolver::new()), false);
    let u = velocity.component(0);
    let v = velocity.component(1);
    for j in 0..N {
        assert_eq!(u[[0, j]], 0.0);
        assert_eq!(u[[N, j]], 0.0);
    }
    for i in 0..N {
        assert_eq!(v[[i, 0]], 0.0);
    }
}
