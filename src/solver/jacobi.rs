use crate::fdm::compressed::{CompressedBlas, CompressedLinearSystem, MatrixCsr};
use crate::fdm::{off_diagonal_product, FdmBlas, FdmLinearSystem, FdmMatrix, FdmVector};
use crate::global_variables::*;
use crate::solver::*;
use rayon::prelude::*;

/// One Jacobi sweep from `x` into `x_temp`. `x` is only read, so every cell
/// can be updated concurrently.
pub fn relax<const D: usize>(
    a: &FdmMatrix<D>,
    b: &FdmVector<D>,
    x: &FdmVector<D>,
    x_temp: &mut FdmVector<D>,
) {
    if x_temp.size() != x.size() {
        x_temp.resize(x.size(), 0.0);
    }
    x_temp.par_for_each_index_mut(|index, value| {
        let l = a.linear_index(&index);
        *value = (b[l] - off_diagonal_product(a, x, &index, l)) / a[l].center;
    });
}

pub fn relax_compressed(a: &MatrixCsr, b: &[Float], x: &[Float], x_temp: &mut [Float]) {
    x_temp.par_iter_mut().enumerate().for_each(|(i, value)| {
        let (diagonal, off_diagonal) = a.split_row_product(i, x);
        *value = (b[i] - off_diagonal) / diagonal;
    });
}

pub struct JacobiSolver<const D: usize> {
    parameters: SolverParameters,
    last_number_of_iterations: usize,
    last_residual: Float,
    x_temp: FdmVector<D>,
    residual: FdmVector<D>,
    x_temp_compressed: Vec<Float>,
    residual_compressed: Vec<Float>,
}

impl<const D: usize> JacobiSolver<D> {
    pub fn new(parameters: SolverParameters) -> Self {
        Self {
            parameters,
            last_number_of_iterations: 0,
            last_residual: Float::MAX,
            x_temp: FdmVector::default(),
            residual: FdmVector::default(),
            x_temp_compressed: Vec::new(),
            residual_compressed: Vec::new(),
        }
    }
}

impl<const D: usize> LinearSystemSolver<D> for JacobiSolver<D> {
    fn solve(&mut self, system: &mut FdmLinearSystem<D>) -> bool {
        let Self {
            parameters,
            x_temp,
            residual,
            ..
        } = self;
        x_temp.resize(system.x.size(), 0.0);
        residual.resize(system.x.size(), 0.0);
        let (iterations, norm) = iterate::<FdmBlas<D>, _>(
            parameters,
            &system.a,
            &system.b,
            &mut system.x,
            residual,
            |a, b, x| {
                relax(a, b, x, x_temp);
                std::mem::swap(x, x_temp);
            },
        );
        self.last_number_of_iterations = iterations;
        self.last_residual = norm;
        log::debug!("jacobi: {iterations} iterations, residual {norm:.6e}");
        norm < self.parameters.tolerance
    }

    fn solve_compressed(&mut self, system: &mut CompressedLinearSystem) -> bool {
        let Self {
            parameters,
            x_temp_compressed,
            residual_compressed,
            ..
        } = self;
        x_temp_compressed.resize(system.x.len(), 0.0);
        residual_compressed.resize(system.x.len(), 0.0);
        let (iterations, norm) = iterate::<CompressedBlas, _>(
            parameters,
            &system.a,
            &system.b,
            &mut system.x,
            residual_compressed,
            |a, b, x| {
                relax_compressed(a, b, x, x_temp_compressed);
                std::mem::swap(x, x_temp_compressed);
            },
        );
        self.last_number_of_iterations = iterations;
        self.last_residual = norm;
        norm < self.parameters.tolerance
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
        SolverKind::Jacobi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdm::tests::poisson_system;
    use crate::fdm::Blas;

    #[test]
    fn test_jacobi_residual_is_non_increasing() {
        let mut system = poisson_system([8, 8]);
        let mut x_temp = FdmVector::default();
        let mut residual = FdmVector::default();
        let mut previous = Float::MAX;
        for _ in 0..30 {
            relax(&system.a, &system.b, &system.x, &mut x_temp);
            std::mem::swap(&mut system.x, &mut x_temp);
            FdmBlas::<2>::residual(&system.a, &system.x, &system.b, &mut residual);
            let norm = FdmBlas::<2>::l2_norm(&residual);
            assert!(norm <= previous * (1.0 + 1e-12));
            previous = norm;
        }
    }

    #[test]
    fn test_jacobi_solver_converges() {
        let parameters = SolverParameters::new(2000, 1e-8, 10, 1.0, false).unwrap();
        let mut solver = JacobiSolver::new(parameters);
        let mut system = poisson_system([6, 5, 4]);
        assert!(solver.solve(&mut system));
        let stats = solver.stats();
        assert!(stats.last_residual < 1e-8);
        assert!(stats.last_number_of_iterations < 2000);
        assert_eq!(stats.last_number_of_iterations % 10, 1);
    }

    #[test]
    fn test_jacobi_solver_reports_non_convergence() {
        let parameters = SolverParameters::new(3, 1e-12, 10, 1.0, false).unwrap();
        let mut solver = JacobiSolver::new(parameters);
        let mut system = poisson_system([16, 16]);
        assert!(!solver.solve(&mut system));
        assert_eq!(solver.stats().last_number_of_iterations, 3);
    }

    #[test]
    fn test_compressed_jacobi_matches_stencil_jacobi() {
        let parameters = SolverParameters::new(7, 1e-12, 100, 1.0, false).unwrap();
        let mut system = poisson_system([5, 4]);
        let mut compressed = CompressedLinearSystem::from_stencil(&system);
        let mut solver = JacobiSolver::new(parameters);
        solver.solve(&mut system);
        solver.solve_compressed(&mut compressed);
        for (x, y) in system.x.iter().zip(compressed.x.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
