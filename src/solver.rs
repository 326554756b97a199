//! Iterative solvers for the pressure linear systems.
//!
//! Every solver works on the three system layouts: the stencil system, the
//! compressed (CSR) system and the multigrid level stack.

pub mod cg;
pub mod gauss_seidel;
pub mod jacobi;
pub mod multigrid;

use crate::error::{parse_or, ParameterError};
use crate::fdm::compressed::CompressedLinearSystem;
use crate::fdm::mg::FdmMgLinearSystem;
use crate::fdm::{Blas, FdmLinearSystem};
use crate::global_variables::*;
use cg::{ConjugateGradientSolver, MgPcgSolver};
use gauss_seidel::GaussSeidelSolver;
use jacobi::JacobiSolver;
use multigrid::{MgParameters, MultigridSolver};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverParameters {
    pub max_number_of_iterations: usize,
    pub tolerance: Float,
    pub residual_check_interval: usize,
    pub sor_factor: Float,
    pub use_red_black_ordering: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            max_number_of_iterations: MAX_ITER,
            tolerance: TOLERANCE,
            residual_check_interval: RESIDUAL_CHECK_INTERVAL,
            sor_factor: SOR_FACTOR,
            use_red_black_ordering: false,
        }
    }
}

impl SolverParameters {
    pub fn new(
        max_number_of_iterations: usize,
        tolerance: Float,
        residual_check_interval: usize,
        sor_factor: Float,
        use_red_black_ordering: bool,
    ) -> Result<Self, ParameterError> {
        let parameters = Self {
            max_number_of_iterations,
            tolerance,
            residual_check_interval,
            sor_factor,
            use_red_black_ordering,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.max_number_of_iterations == 0 {
            return Err(ParameterError::ZeroIterations("iterations"));
        }
        if self.residual_check_interval == 0 {
            return Err(ParameterError::ZeroIterations("iterations between residual checks"));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(ParameterError::NonPositiveTolerance(self.tolerance));
        }
        if !(self.sor_factor > 0.0 && self.sor_factor < 2.0) {
            return Err(ParameterError::InvalidSorFactor(self.sor_factor));
        }
        Ok(())
    }

    pub fn from_setup(parameters: &HashMap<String, String>) -> Result<Self, ParameterError> {
        let default = Self::default();
        Self::new(
            parse_or(parameters, "max_iterations", default.max_number_of_iterations)?,
            parse_or(parameters, "tolerance", default.tolerance)?,
            parse_or(parameters, "residual_check_interval", default.residual_check_interval)?,
            parse_or(parameters, "sor_factor", default.sor_factor)?,
            parse_or(parameters, "red_black_ordering", default.use_red_black_ordering)?,
        )
    }
}

/// What the last call to a solve method did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolverStats {
    pub max_number_of_iterations: usize,
    pub last_number_of_iterations: usize,
    pub last_residual: Float,
    pub tolerance: Float,
}

pub trait LinearSystemSolver<const D: usize>: Send {
    fn solve(&mut self, system: &mut FdmLinearSystem<D>) -> bool;

    fn solve_compressed(&mut self, system: &mut CompressedLinearSystem) -> bool;

    /// Single-level solvers only use the finest level of the stack.
    fn solve_multigrid(&mut self, system: &mut FdmMgLinearSystem<D>) -> bool {
        if system.a.is_empty() {
            return true;
        }
        let mut finest = FdmLinearSystem {
            a: std::mem::take(&mut system.a[0]),
            x: std::mem::take(&mut system.x[0]),
            b: std::mem::take(&mut system.b[0]),
        };
        let converged = self.solve(&mut finest);
        system.a[0] = finest.a;
        system.x[0] = finest.x;
        system.b[0] = finest.b;
        converged
    }

    /// Depth of the level stack this solver wants; 1 for single-level solvers.
    fn max_number_of_levels(&self) -> usize {
        1
    }

    fn stats(&self) -> SolverStats;

    fn kind(&self) -> SolverKind;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolverKind {
    Jacobi,
    GaussSeidel,
    ConjugateGradient,
    Multigrid,
    MultigridPcg,
}

impl SolverKind {
    pub fn build<const D: usize>(
        &self,
        parameters: SolverParameters,
        mg_parameters: MgParameters,
    ) -> Box<dyn LinearSystemSolver<D>> {
        match self {
            SolverKind::Jacobi => Box::new(JacobiSolver::new(parameters)),
            SolverKind::GaussSeidel => Box::new(GaussSeidelSolver::new(parameters)),
            SolverKind::ConjugateGradient => Box::new(ConjugateGradientSolver::new(parameters)),
            SolverKind::Multigrid => Box::new(MultigridSolver::new(mg_parameters)),
            SolverKind::MultigridPcg => Box::new(MgPcgSolver::new(parameters, mg_parameters)),
        }
    }
}

impl FromStr for SolverKind {
    type Err = ParameterError;

    fn from_str(name: &str) -> Result<Self, ParameterError> {
        match name.trim().to_lowercase().as_str() {
            "jacobi" => Ok(SolverKind::Jacobi),
            "gauss_seidel" | "sor" => Ok(SolverKind::GaussSeidel),
            "cg" | "conjugate_gradient" => Ok(SolverKind::ConjugateGradient),
            "mg" | "multigrid" => Ok(SolverKind::Multigrid),
            "mgpcg" | "multigrid_pcg" => Ok(SolverKind::MultigridPcg),
            _ => Err(ParameterError::UnknownSolver(name.to_string())),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::Jacobi => "jacobi",
            SolverKind::GaussSeidel => "gauss_seidel",
            SolverKind::ConjugateGradient => "conjugate_gradient",
            SolverKind::Multigrid => "multigrid",
            SolverKind::MultigridPcg => "multigrid_pcg",
        };
        write!(f, "{name}")
    }
}

/// Sweep loop shared by the stationary solvers: runs `sweep` up to the
/// iteration limit, checks the residual every `residual_check_interval`
/// sweeps and always leaves the final residual in `residual`.
/// Returns the number of sweeps and the final residual norm.
pub(crate) fn iterate<B, F>(
    parameters: &SolverParameters,
    a: &B::Matrix,
    b: &B::Vector,
    x: &mut B::Vector,
    residual: &mut B::Vector,
    mut sweep: F,
) -> (usize, Float)
where
    B: Blas,
    F: FnMut(&B::Matrix, &B::Vector, &mut B::Vector),
{
    let mut number_of_iterations = 0;
    for iteration in 0..parameters.max_number_of_iterations {
        sweep(a, b, x);
        number_of_iterations = iteration + 1;
        if iteration != 0 && iteration % parameters.residual_check_interval == 0 {
            B::residual(a, x, b, residual);
            if B::l2_norm(residual) < parameters.tolerance {
                break;
            }
        }
    }
    B::residual(a, x, b, residual);
    (number_of_iterations, B::l2_norm(residual))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert_eq!(
            SolverParameters::new(0, 1e-6, 10, 1.5, false),
            Err(ParameterError::ZeroIterations("iterations"))
        );
        assert_eq!(
            SolverParameters::new(10, 0.0, 10, 1.5, false),
            Err(ParameterError::NonPositiveTolerance(0.0))
        );
        assert_eq!(
            SolverParameters::new(10, 1e-6, 10, 2.5, false),
            Err(ParameterError::InvalidSorFactor(2.5))
        );
        assert!(SolverParameters::new(10, 1e-6, 10, 1.0, true).is_ok());
    }

    #[test]
    fn test_parameters_from_setup() {
        let mut setup = HashMap::new();
        setup.insert("max_iterations".to_string(), "250".to_string());
        setup.insert("red_black_ordering".to_string(), "true".to_string());
        let parameters = SolverParameters::from_setup(&setup).unwrap();
        assert_eq!(parameters.max_number_of_iterations, 250);
        assert!(parameters.use_red_black_ordering);
        assert_eq!(parameters.tolerance, TOLERANCE);

        setup.insert("tolerance".to_string(), "small".to_string());
        assert!(matches!(
            SolverParameters::from_setup(&setup),
            Err(ParameterError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_solver_kind_names() {
        for kind in [
            SolverKind::Jacobi,
            SolverKind::GaussSeidel,
            SolverKind::ConjugateGradient,
            SolverKind::Multigrid,
            SolverKind::MultigridPcg,
        ] {
            assert_eq!(kind.to_string().parse::<SolverKind>(), Ok(kind));
        }
        assert!("ilu".parse::<SolverKind>().is_err());
    }
}
