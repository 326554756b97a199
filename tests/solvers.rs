use fdm_lesc::field::*;
use fdm_lesc::grid::*;
use fdm_lesc::pressure::fractional::FractionalSinglePhasePressureSolver;
use fdm_lesc::pressure::GridPressureSolver;
use fdm_lesc::solver::multigrid::MgParameters;
use fdm_lesc::solver::{LinearSystemSolver, SolverKind, SolverParameters};
use fdm_lesc::Float;

const N: usize = 12;

fn sloshing() -> FaceCenteredGrid<2> {
    let shape = GridShape::uniform([N, N], 1.0 / N as Float);
    let mut velocity = FaceCenteredGrid::new(shape, Vector::<2>::zeros());
    velocity.fill_with(|point| Vector::<2>::new(point[0] * (1.0 - point[0]), -0.2 * point[0]));
    velocity
}

fn project(solver: Box<dyn LinearSystemSolver<2>>, use_compressed: bool) -> (FdmPressure, Float, bool) {
    let mut velocity = sloshing();
    let mut pressure_solver = FractionalSinglePhasePressureSolver::with_solver(solver);
    let free_surface = CustomScalarField::new(|point: &Vector<2>| point[1] - 0.6);
    let converged = pressure_solver.solve(
        &mut velocity,
        &ConstantScalarField(Float::MAX),
        &ConstantVectorField(Vector::<2>::zeros()),
        &free_surface,
        use_compressed,
    );
    (
        pressure_solver.pressure().clone(),
        total_divergence(&velocity, &free_surface),
        converged,
    )
}

type FdmPressure = Array<Float, 2>;

fn total_divergence(velocity: &FaceCenteredGrid<2>, free_surface: &dyn ScalarField<2>) -> Float {
    let shape = *velocity.shape();
    let mut total = 0.0;
    for i in 0..N {
        for j in 0..N {
            if free_surface.sample(&shape.cell_center(&[i, j])) < 0.0 {
                total += velocity.divergence_at_cell_center(&[i, j]).abs();
            }
        }
    }
    total
}

fn parameters(max_number_of_iterations: usize, use_red_black_ordering: bool) -> SolverParameters {
    SolverParameters::new(max_number_of_iterations, 1e-10, 10, 1.5, use_red_black_ordering).unwrap()
}

fn assert_same_pressure(x: &FdmPressure, y: &FdmPressure) {
    for (a, b) in x.iter().zip(y.iter()) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }
}

#[test]
fn iterative_solvers_agree_with_conjugate_gradient() {
    let mg_parameters = MgParameters::new(3).unwrap();
    let (reference, divergence, converged) = project(
        SolverKind::ConjugateGradient.build(parameters(500, false), mg_parameters),
        false,
    );
    assert!(converged);
    assert!(divergence < 1e-6);

    let candidates = [
        (SolverKind::Jacobi, parameters(20_000, false)),
        (SolverKind::GaussSeidel, parameters(20_000, false)),
        (SolverKind::GaussSeidel, parameters(20_000, true)),
        (SolverKind::MultigridPcg, parameters(500, false)),
    ];
    for use_compressed in [false, true] {
        for (kind, parameters) in candidates {
            let (pressure, _, converged) =
                project(kind.build(parameters, mg_parameters), use_compressed);
            assert!(converged, "{kind} did not converge");
            assert_same_pressure(&reference, &pressure);
        }
    }
}

#[test]
fn one_v_cycle_reduces_the_divergence() {
    let before = {
        let velocity = sloshing();
        let free_surface = CustomScalarField::new(|point: &Vector<2>| point[1] - 0.6);
        total_divergence(&velocity, &free_surface)
    };
    let mg_parameters = MgParameters::new(3).unwrap();
    let (_, after, _) = project(
        SolverKind::Multigrid.build(SolverParameters::default(), mg_parameters),
        false,
    );
    assert!(after < 0.5 * before, "{after} >= 0.5 * {before}");
}
