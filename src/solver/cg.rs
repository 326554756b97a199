//! Preconditioned conjugate gradient, plain and with a multigrid
//! V-cycle as the preconditioner.

use crate::fdm::compressed::{CompressedBlas, CompressedLinearSystem};
use crate::fdm::mg::{CompressedMgLinearSystem, FdmMgLinearSystem};
use crate::fdm::{FdmBlas, FdmLinearSystem};
use crate::global_variables::*;
use crate::solver::multigrid::{MgParameters, MgPreconditioner};
use crate::solver::*;

pub trait Preconditioner<B: Blas> {
    /// Approximately solves `M x = b`.
    fn solve(&mut self, b: &B::Vector, x: &mut B::Vector);
}

/// Identity preconditioner; turns [`pcg`] into plain CG.
pub struct NullPreconditioner;

impl<B: Blas> Preconditioner<B> for NullPreconditioner {
    fn solve(&mut self, b: &B::Vector, x: &mut B::Vector) {
        B::set_from(b, x);
    }
}

pub struct PcgBuffers<B: Blas> {
    r: B::Vector,
    d: B::Vector,
    q: B::Vector,
    s: B::Vector,
}

impl<B: Blas> Default for PcgBuffers<B> {
    fn default() -> Self {
        Self {
            r: B::Vector::default(),
            d: B::Vector::default(),
            q: B::Vector::default(),
            s: B::Vector::default(),
        }
    }
}

/// Solves `A x = b` starting from the current `x`.
///
/// The recurrence residual is replaced by the exact `b - A x` every
/// [`PCG_RESIDUAL_RESET_INTERVAL`] iterations, and on the iteration after
/// `sigma` grows. Returns the number of iterations and the norm of the
/// exact final residual.
pub fn pcg<B: Blas, P: Preconditioner<B>>(
    a: &B::Matrix,
    b: &B::Vector,
    max_number_of_iterations: usize,
    tolerance: Float,
    preconditioner: &mut P,
    x: &mut B::Vector,
    buffers: &mut PcgBuffers<B>,
) -> (usize, Float) {
    let PcgBuffers { r, d, q, s } = buffers;
    B::residual(a, x, b, r);
    *d = B::zeros_like(r);
    *q = B::zeros_like(r);
    *s = B::zeros_like(r);
    preconditioner.solve(r, d);
    let mut sigma = B::dot(d, r);

    let mut iteration = 0;
    let mut trigger = false;
    while B::l2_norm(r) > tolerance && iteration < max_number_of_iterations {
        B::mvm(a, d, q);
        let denominator = B::dot(d, q);
        if denominator == 0.0 {
            break;
        }
        let alpha = sigma / denominator;
        B::axpy_assign(alpha, d, x);

        if trigger || (iteration % PCG_RESIDUAL_RESET_INTERVAL == 0 && iteration != 0) {
            B::residual(a, x, b, r);
            trigger = false;
        } else {
            B::axpy_assign(-alpha, q, r);
        }

        preconditioner.solve(r, s);
        let sigma_new = B::dot(s, r);
        if sigma_new > sigma {
            trigger = true;
        }
        B::scale_add_assign(sigma_new / sigma, d, s);
        sigma = sigma_new;
        iteration += 1;
    }

    B::residual(a, x, b, r);
    (iteration, B::l2_norm(r))
}

pub struct ConjugateGradientSolver<const D: usize> {
    parameters: SolverParameters,
    last_number_of_iterations: usize,
    last_residual: Float,
    buffers: PcgBuffers<FdmBlas<D>>,
    buffers_compressed: PcgBuffers<CompressedBlas>,
}

impl<const D: usize> ConjugateGradientSolver<D> {
    pub fn new(parameters: SolverParameters) -> Self {
        Self {
            parameters,
            last_number_of_iterations: 0,
            last_residual: Float::MAX,
            buffers: PcgBuffers::default(),
            buffers_compressed: PcgBuffers::default(),
        }
    }
}

impl<const D: usize> LinearSystemSolver<D> for ConjugateGradientSolver<D> {
    fn solve(&mut self, system: &mut FdmLinearSystem<D>) -> bool {
        let (iterations, norm) = pcg::<FdmBlas<D>, _>(
            &system.a,
            &system.b,
            self.parameters.max_number_of_iterations,
            self.parameters.tolerance,
            &mut NullPreconditioner,
            &mut system.x,
            &mut self.buffers,
        );
        self.last_number_of_iterations = iterations;
        self.last_residual = norm;
        log::debug!("cg: {iterations} iterations, residual {norm:.6e}");
        norm <= self.parameters.tolerance
    }

    fn solve_compressed(&mut self, system: &mut CompressedLinearSystem) -> bool {
        let (iterations, norm) = pcg::<CompressedBlas, _>(
            &system.a,
            &system.b,
            self.parameters.max_number_of_iterations,
            self.parameters.tolerance,
            &mut NullPreconditioner,
            &mut system.x,
            &mut self.buffers_compressed,
        );
        self.last_number_of_iterations = iterations;
        self.last_residual = norm;
        norm <= self.parameters.tolerance
    }

    fn stats(&self) -> SolverStats {
        SolverStats {
            max_number_of_iterations: self.parameters.max_number_of_iterations,
            last_number_of_iterations: self.last_number_of_iterations,
            last_residual: self.last_residual,
            tolerance: self.parameters.tolerance,
        }
    }

    fn kind(&self) -> SolverKind {
        SolverKind::ConjugateGradient
    }
}

pub struct MgPcgSolver<const D: usize> {
    parameters: SolverParameters,
    mg_parameters: MgParameters,
    last_number_of_iterations: usize,
    last_residual: Float,
    buffers: PcgBuffers<FdmBlas<D>>,
    buffers_compressed: PcgBuffers<CompressedBlas>,
}

impl<const D: usize> MgPcgSolver<D> {
    pub fn new(parameters: SolverParameters, mg_parameters: MgParameters) -> Self {
        Self {
            parameters,
            mg_parameters,
            last_number_of_iterations: 0,
            last_residual: Float::MAX,
            buffers: PcgBuffers::default(),
            buffers_compressed: PcgBuffers::default(),
        }
    }

    fn record(&mut self, iterations: usize, norm: Float) -> bool {
        self.last_number_of_iterations = iterations;
        self.last_residual = norm;
        log::debug!("mgpcg: {iterations} iterations, residual {norm:.6e}");
        norm <= self.parameters.tolerance
    }
}

impl<const D: usize> LinearSystemSolver<D> for MgPcgSolver<D> {
    fn solve(&mut self, system: &mut FdmLinearSystem<D>) -> bool {
        let mut levels =
            FdmMgLinearSystem::from_finest(system, self.mg_parameters.max_number_of_levels);
        let converged = self.solve_multigrid(&mut levels);
        std::mem::swap(&mut system.x, &mut levels.x[0]);
        converged
    }

    fn solve_compressed(&mut self, system: &mut CompressedLinearSystem) -> bool {
        let levels =
            CompressedMgLinearSystem::from_finest(system, self.mg_parameters.max_number_of_levels);
        let mut preconditioner =
            MgPreconditioner::<CompressedBlas>::new(&levels.a, &levels.x, self.mg_parameters);
        let (iterations, norm) = pcg::<CompressedBlas, _>(
            &system.a,
            &system.b,
            self.parameters.max_number_of_iterations,
            self.parameters.tolerance,
            &mut preconditioner,
            &mut system.x,
            &mut self.buffers_compressed,
        );
        self.record(iterations, norm)
    }

    fn solve_multigrid(&mut self, system: &mut FdmMgLinearSystem<D>) -> bool {
        if system.a.is_empty() {
            return true;
        }
        let mut preconditioner =
            MgPreconditioner::<FdmBlas<D>>::new(&system.a, &system.x, self.mg_parameters);
        let (iterations, norm) = pcg::<FdmBlas<D>, _>(
            &system.a[0],
            &system.b[0],
            self.parameters.max_number_of_iterations,
            self.parameters.tolerance,
            &mut preconditioner,
            &mut system.x[0],
            &mut self.buffers,
        );
        self.record(iterations, norm)
    }

    fn max_number_of_levels(&self) -> usize {
        self.mg_parameters.max_number_of_levels
    }

    fn stats(&self) -> SolverStats {
        SolverStats {
            max_number_of_iterations: self.parameters.max_number_of_iterations,
            last_number_of_iterations: self.last_number_of_iterations,
            last_residual: self.last_residual,
            tolerance: self.parameters.tolerance,
        }
    }

    fn kind(&self) -> SolverKind {
        SolverKind::MultigridPcg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdm::tests::poisson_system;
    use crate::fdm::FdmVector;

    #[test]
    fn test_cg_converges_within_system_size() {
        let parameters = SolverParameters::new(200, 1e-10, 1, 1.5, false).unwrap();
        let mut solver = ConjugateGradientSolver::new(parameters);
        let mut system = poisson_system([6, 6, 6]);
        assert!(solver.solve(&mut system));
        let stats = solver.stats();
        assert!(stats.last_residual <= 1e-10);
        assert!(stats.last_number_of_iterations <= 216);

        let mut residual = FdmVector::default();
        FdmBlas::<3>::residual(&system.a, &system.x, &system.b, &mut residual);
        assert!(FdmBlas::<3>::l2_norm(&residual) <= 1e-10);
    }

    #[test]
    fn test_cg_returns_immediately_on_zero_rhs() {
        let parameters = SolverParameters::default();
        let mut solver = ConjugateGradientSolver::new(parameters);
        let mut system = poisson_system([4, 4]);
        system.b.fill(0.0);
        assert!(solver.solve(&mut system));
        assert_eq!(solver.stats().last_number_of_iterations, 0);
        assert!(system.x.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn test_compressed_cg_matches_stencil_cg() {
        let parameters = SolverParameters::new(100, 1e-12, 1, 1.5, false).unwrap();
        let mut system = poisson_system([7, 5]);
        let mut compressed = CompressedLinearSystem::from_stencil(&system);
        let mut solver = ConjugateGradientSolver::new(parameters);
        assert!(solver.solve(&mut system));
        assert!(solver.solve_compressed(&mut compressed));
        for (x, y) in system.x.iter().zip(compressed.x.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mgpcg_needs_fewer_iterations_than_cg() {
        let parameters = SolverParameters::new(500, 1e-8, 1, 1.5, false).unwrap();
        let mut cg_system = poisson_system([32, 32]);
        let mut mg_system = cg_system.clone();
        let mut cg = ConjugateGradientSolver::new(parameters);
        let mut mgpcg = MgPcgSolver::new(parameters, MgParameters::default());
        assert!(cg.solve(&mut cg_system));
        assert!(mgpcg.solve(&mut mg_system));
        assert!(mgpcg.stats().last_number_of_iterations < cg.stats().last_number_of_iterations);
        for (x, y) in cg_system.x.iter().zip(mg_system.x.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_compressed_mgpcg_converges() {
        let parameters = SolverParameters::new(200, 1e-8, 1, 1.5, false).unwrap();
        let system = poisson_system([8, 8]);
        let mut compressed = CompressedLinearSystem::from_stencil(&system);
        let mut solver = MgPcgSolver::<2>::new(parameters, MgParameters::default());
        assert!(solver.solve_compressed(&mut compressed));
        assert!(solver.stats().last_residual <= 1e-8);
    }
}
