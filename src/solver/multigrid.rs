//! Recursive multigrid V-cycle, generic over the matrix representation
//! through [`MultigridBlas`].

use crate::error::{parse_or, ParameterError};
use crate::fdm::compressed::{CompressedBlas, CompressedLinearSystem};
use crate::fdm::mg::{CompressedMgLinearSystem, FdmMgLinearSystem, MultigridBlas};
use crate::fdm::{FdmBlas, FdmLinearSystem, FdmVector};
use crate::global_variables::*;
use crate::solver::cg::Preconditioner;
use crate::solver::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relaxation {
    Jacobi,
    GaussSeidel,
}

impl FromStr for Relaxation {
    type Err = ParameterError;

    fn from_str(name: &str) -> Result<Self, ParameterError> {
        match name.trim().to_lowercase().as_str() {
            "jacobi" => Ok(Relaxation::Jacobi),
            "gauss_seidel" | "sor" => Ok(Relaxation::GaussSeidel),
            _ => Err(ParameterError::InvalidValue {
                key: "mg_relaxation".to_string(),
                value: name.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MgParameters {
    pub max_number_of_levels: usize,
    pub number_of_restriction_iter: usize,
    pub number_of_correction_iter: usize,
    pub number_of_coarsest_iter: usize,
    pub number_of_final_iter: usize,
    pub max_tolerance: Float,
    pub sor_factor: Float,
    pub use_red_black_ordering: bool,
    pub relaxation: Relaxation,
}

impl Default for MgParameters {
    fn default() -> Self {
        Self {
            max_number_of_levels: MAX_NUMBER_OF_LEVELS,
            number_of_restriction_iter: NUMBER_OF_RESTRICTION_ITER,
            number_of_correction_iter: NUMBER_OF_CORRECTION_ITER,
            number_of_coarsest_iter: NUMBER_OF_COARSEST_ITER,
            number_of_final_iter: NUMBER_OF_FINAL_ITER,
            max_tolerance: MG_MAX_TOLERANCE,
            sor_factor: SOR_FACTOR,
            use_red_black_ordering: false,
            relaxation: Relaxation::GaussSeidel,
        }
    }
}

impl MgParameters {
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.max_number_of_levels == 0 {
            return Err(ParameterError::ZeroLevels);
        }
        if self.max_number_of_levels > MAX_ALLOWED_LEVELS {
            return Err(ParameterError::TooManyLevels {
                requested: self.max_number_of_levels,
                max: MAX_ALLOWED_LEVELS,
            });
        }
        if self.number_of_coarsest_iter == 0 {
            return Err(ParameterError::ZeroIterations("coarsest level iterations"));
        }
        if !(self.max_tolerance > 0.0 && self.max_tolerance.is_finite()) {
            return Err(ParameterError::NonPositiveTolerance(self.max_tolerance));
        }
        if !(self.sor_factor > 0.0 && self.sor_factor < 2.0) {
            return Err(ParameterError::InvalidSorFactor(self.sor_factor));
        }
        Ok(())
    }

    pub fn new(max_number_of_levels: usize) -> Result<Self, ParameterError> {
        let parameters = Self {
            max_number_of_levels,
            ..Self::default()
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn from_setup(parameters: &HashMap<String, String>) -> Result<Self, ParameterError> {
        let default = Self::default();
        let result = Self {
            max_number_of_levels: parse_or(parameters, "mg_levels", default.max_number_of_levels)?,
            number_of_restriction_iter: parse_or(
                parameters,
                "mg_restriction_iter",
                default.number_of_restriction_iter,
            )?,
            number_of_correction_iter: parse_or(
                parameters,
                "mg_correction_iter",
                default.number_of_correction_iter,
            )?,
            number_of_coarsest_iter: parse_or(
                parameters,
                "mg_coarsest_iter",
                default.number_of_coarsest_iter,
            )?,
            number_of_final_iter: parse_or(parameters, "mg_final_iter", default.number_of_final_iter)?,
            max_tolerance: parse_or(parameters, "mg_tolerance", default.max_tolerance)?,
            sor_factor: parse_or(parameters, "sor_factor", default.sor_factor)?,
            use_red_black_ordering: parse_or(
                parameters,
                "red_black_ordering",
                default.use_red_black_ordering,
            )?,
            relaxation: parse_or(parameters, "mg_relaxation", default.relaxation)?,
        };
        result.validate()?;
        Ok(result)
    }
}

/// Runs one V-cycle over the level stack and returns the residual norm on
/// the finest level. `buffer` holds one scratch vector per level.
pub fn v_cycle<B: MultigridBlas>(
    a: &[B::Matrix],
    x: &mut [B::Vector],
    b: &mut [B::Vector],
    buffer: &mut [B::Vector],
    parameters: &MgParameters,
) -> Float {
    v_cycle_level::<B>(a, x, b, buffer, parameters, 0, parameters.max_tolerance)
}

fn v_cycle_level<B: MultigridBlas>(
    a: &[B::Matrix],
    x: &mut [B::Vector],
    b: &mut [B::Vector],
    buffer: &mut [B::Vector],
    parameters: &MgParameters,
    level: usize,
    tolerance: Float,
) -> Float {
    let coarsest = a.len() - 1;
    B::relax(
        &a[level],
        &b[level],
        parameters.number_of_restriction_iter,
        parameters,
        &mut x[level],
        &mut buffer[level],
    );

    if level < coarsest {
        B::residual(&a[level], &x[level], &b[level], &mut buffer[level]);
        B::restrict(&buffer[level], &mut b[level + 1]);
        B::set(0.0, &mut x[level + 1]);
        v_cycle_level::<B>(a, x, b, buffer, parameters, level + 1, 2.0 * tolerance);
        let (finer, coarser) = x.split_at_mut(level + 1);
        B::correct(&coarser[0], &mut finer[level]);
        let number_of_iterations = if level == 0 {
            parameters.number_of_final_iter
        } else {
            parameters.number_of_correction_iter
        };
        B::relax(
            &a[level],
            &b[level],
            number_of_iterations,
            parameters,
            &mut x[level],
            &mut buffer[level],
        );
    } else {
        B::relax(
            &a[level],
            &b[level],
            parameters.number_of_coarsest_iter,
            parameters,
            &mut x[level],
            &mut buffer[level],
        );
    }

    B::residual(&a[level], &x[level], &b[level], &mut buffer[level]);
    let residual = B::l2_norm(&buffer[level]);
    log::debug!("v-cycle level {level}: residual {residual:.6e}, tolerance {tolerance:.1e}");
    residual
}

fn resize_buffer<B: MultigridBlas>(x: &[B::Vector], buffer: &mut Vec<B::Vector>) {
    buffer.clear();
    buffer.extend(x.iter().map(B::zeros_like));
}

/// One V-cycle from a zero guess, used as the preconditioner of MGPCG.
pub struct MgPreconditioner<'a, B: MultigridBlas> {
    a: &'a [B::Matrix],
    x: Vec<B::Vector>,
    b: Vec<B::Vector>,
    buffer: Vec<B::Vector>,
    parameters: MgParameters,
}

impl<'a, B: MultigridBlas> MgPreconditioner<'a, B> {
    pub fn new(a: &'a [B::Matrix], levels: &[B::Vector], parameters: MgParameters) -> Self {
        let x: Vec<B::Vector> = levels.iter().map(B::zeros_like).collect();
        let b = x.clone();
        let buffer = x.clone();
        Self {
            a,
            x,
            b,
            buffer,
            parameters,
        }
    }
}

impl<B: MultigridBlas> Preconditioner<B> for MgPreconditioner<'_, B> {
    fn solve(&mut self, b: &B::Vector, x: &mut B::Vector) {
        B::set_from(b, &mut self.b[0]);
        for level in self.x.iter_mut() {
            B::set(0.0, level);
        }
        v_cycle::<B>(
            self.a,
            &mut self.x,
            &mut self.b,
            &mut self.buffer,
            &self.parameters,
        );
        B::set_from(&self.x[0], x);
    }
}

pub struct MultigridSolver<const D: usize> {
    parameters: MgParameters,
    last_residual: Float,
    buffer: Vec<FdmVector<D>>,
    buffer_compressed: Vec<Vec<Float>>,
}

impl<const D: usize> MultigridSolver<D> {
    pub fn new(parameters: MgParameters) -> Self {
        Self {
            parameters,
            last_residual: Float::MAX,
            buffer: Vec::new(),
            buffer_compressed: Vec::new(),
        }
    }

    pub fn parameters(&self) -> &MgParameters {
        &self.parameters
    }
}

impl<const D: usize> LinearSystemSolver<D> for MultigridSolver<D> {
    fn solve(&mut self, system: &mut FdmLinearSystem<D>) -> bool {
        let mut levels = FdmMgLinearSystem::from_finest(system, self.parameters.max_number_of_levels);
        let converged = self.solve_multigrid(&mut levels);
        std::mem::swap(&mut system.x, &mut levels.x[0]);
        converged
    }

    fn solve_compressed(&mut self, system: &mut CompressedLinearSystem) -> bool {
        let mut levels =
            CompressedMgLinearSystem::from_finest(system, self.parameters.max_number_of_levels);
        resize_buffer::<CompressedBlas>(&levels.x, &mut self.buffer_compressed);
        self.last_residual = v_cycle::<CompressedBlas>(
            &levels.a,
            &mut levels.x,
            &mut levels.b,
            &mut self.buffer_compressed,
            &self.parameters,
        );
        std::mem::swap(&mut system.x, &mut levels.x[0]);
        self.last_residual < self.parameters.max_tolerance
    }

    fn solve_multigrid(&mut self, system: &mut FdmMgLinearSystem<D>) -> bool {
        if system.a.is_empty() {
            return true;
        }
        resize_buffer::<FdmBlas<D>>(&system.x, &mut self.buffer);
        self.last_residual = v_cycle::<FdmBlas<D>>(
            &system.a,
            &mut system.x,
            &mut system.b,
            &mut self.buffer,
            &self.parameters,
        );
        log::debug!(
            "multigrid: {} levels, residual {:.6e}",
            system.a.len(),
            self.last_residual
        );
        self.last_residual < self.parameters.max_tolerance
    }

    fn max_number_of_levels(&self) -> usize {
        self.parameters.max_number_of_levels
    }

    fn stats(&self) -> SolverStats {
        SolverStats {
            max_number_of_iterations: 1,
            last_number_of_iterations: 1,
            last_residual: self.last_residual,
            tolerance: self.parameters.max_tolerance,
        }
    }

    fn kind(&self) -> SolverKind {
        SolverKind::Multigrid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdm::tests::poisson_system;
    use crate::fdm::Blas;

    fn residual_norm<const D: usize>(system: &FdmLinearSystem<D>) -> Float {
        let mut residual = FdmVector::default();
        FdmBlas::<D>::residual(&system.a, &system.x, &system.b, &mut residual);
        FdmBlas::<D>::l2_norm(&residual)
    }

    #[test]
    fn test_invalid_level_counts_are_rejected() {
        assert_eq!(MgParameters::new(0), Err(ParameterError::ZeroLevels));
        assert!(matches!(
            MgParameters::new(MAX_ALLOWED_LEVELS + 1),
            Err(ParameterError::TooManyLevels { .. })
        ));
        assert!(MgParameters::new(3).is_ok());
    }

    #[test]
    fn test_v_cycle_keeps_exact_solution() {
        let mut system = poisson_system([16, 16]);
        system
            .x
            .par_for_each_index_mut(|[i, j], value| *value = (0.3 * i as Float).cos() + 0.1 * j as Float);
        let mut b = FdmVector::default();
        FdmBlas::<2>::mvm(&system.a, &system.x, &mut b);
        system.b = b;
        let expected = system.x.clone();

        let mut solver = MultigridSolver::new(MgParameters::default());
        assert!(solver.solve(&mut system));
        assert!(solver.stats().last_residual < 1e-9);
        for (x, y) in system.x.iter().zip(expected.iter()) {
            assert!((x - y).abs() < 1e-10);
        }
    }

    #[test]
    fn test_v_cycle_reduces_the_residual() {
        let mut system = poisson_system([32, 32]);
        let initial = residual_norm(&system);
        let mut solver = MultigridSolver::new(MgParameters::default());
        solver.solve(&mut system);
        let after_one = residual_norm(&system);
        assert!(after_one < 0.1 * initial);
        assert!((solver.stats().last_residual - after_one).abs() < 1e-10);
        solver.solve(&mut system);
        assert!(residual_norm(&system) < after_one);
    }

    #[test]
    fn test_loose_tolerance_still_corrects_on_coarse_levels() {
        let loose = MgParameters {
            max_tolerance: 1e6,
            ..MgParameters::default()
        };
        let run = |parameters: MgParameters| {
            let mut system = poisson_system([32, 32]);
            let mut solver = MultigridSolver::new(parameters);
            solver.solve(&mut system);
            residual_norm(&system)
        };

        let multilevel = run(loose);
        let relaxation_only = run(MgParameters {
            max_number_of_levels: 1,
            ..loose
        });
        assert!(multilevel < 0.2 * relaxation_only);
        assert!((multilevel - run(MgParameters::default())).abs() < 1e-12);
    }

    #[test]
    fn test_jacobi_relaxation_v_cycle() {
        let mut system = poisson_system([16, 8, 8]);
        let initial = residual_norm(&system);
        let parameters = MgParameters {
            relaxation: Relaxation::Jacobi,
            number_of_coarsest_iter: 50,
            ..MgParameters::default()
        };
        let mut solver = MultigridSolver::new(parameters);
        assert_eq!(solver.parameters().relaxation, Relaxation::Jacobi);
        assert_eq!(solver.parameters().number_of_coarsest_iter, 50);
        solver.solve(&mut system);
        assert!(residual_norm(&system) < 0.5 * initial);
    }

    #[test]
    fn test_compressed_v_cycle_reduces_the_residual() {
        let system = poisson_system([16, 16]);
        let mut compressed = CompressedLinearSystem::from_stencil(&system);
        let mut residual = Vec::new();
        CompressedBlas::residual(&compressed.a, &compressed.x, &compressed.b, &mut residual);
        let initial = CompressedBlas::l2_norm(&residual);
        let mut solver = MultigridSolver::<2>::new(MgParameters::default());
        solver.solve_compressed(&mut compressed);
        CompressedBlas::residual(&compressed.a, &compressed.x, &compressed.b, &mut residual);
        assert!(CompressedBlas::l2_norm(&residual) < 0.5 * initial);
    }

    #[test]
    fn test_single_level_hierarchy_relaxes_only() {
        let mut system = poisson_system([5, 5]);
        let mut solver = MultigridSolver::new(MgParameters::default());
        let initial = residual_norm(&system);
        solver.solve(&mut system);
        assert!(residual_norm(&system) < initial);
    }
}
