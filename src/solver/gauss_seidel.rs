use crate::fdm::compressed::{CompressedBlas, CompressedLinearSystem, MatrixCsr};
use crate::fdm::{off_diagonal_product, FdmBlas, FdmLinearSystem, FdmMatrix, FdmVector};
use crate::global_variables::*;
use crate::solver::*;

/// Cells whose index sum is even form the red set.
pub fn is_red<const D: usize>(index: &[usize; D]) -> bool {
    index.iter().sum::<usize>() % 2 == 0
}

/// Serial SOR sweep in linear-index order.
pub fn relax<const D: usize>(
    a: &FdmMatrix<D>,
    b: &FdmVector<D>,
    sor_factor: Float,
    x: &mut FdmVector<D>,
) {
    for l in 0..x.len() {
        let index = x.unravel(l);
        let r = off_diagonal_product(a, x, &index, l);
        x[l] = (1.0 - sor_factor) * x[l] + sor_factor * (b[l] - r) / a[l].center;
    }
}

/// Red-black SOR sweep. A cell of one color only reads cells of the other
/// color, so each half sweep runs in parallel; the half sweep is written to
/// `buffer` and swapped in.
pub fn relax_red_black<const D: usize>(
    a: &FdmMatrix<D>,
    b: &FdmVector<D>,
    sor_factor: Float,
    x: &mut FdmVector<D>,
    buffer: &mut FdmVector<D>,
) {
    if buffer.size() != x.size() {
        buffer.resize(x.size(), 0.0);
    }
    for red in [true, false] {
        let current = &*x;
        buffer.par_for_each_index_mut(|index, value| {
            let l = current.linear_index(&index);
            *value = if is_red(&index) == red {
                let r = off_diagonal_product(a, current, &index, l);
                (1.0 - sor_factor) * current[l] + sor_factor * (b[l] - r) / a[l].center
            } else {
                current[l]
            };
        });
        std::mem::swap(x, buffer);
    }
}

pub fn relax_compressed(a: &MatrixCsr, b: &[Float], sor_factor: Float, x: &mut [Float]) {
    for i in 0..x.len() {
        let (diagonal, r) = a.split_row_product(i, x);
        x[i] = (1.0 - sor_factor) * x[i] + sor_factor * (b[i] - r) / diagonal;
    }
}

pub struct GaussSeidelSolver<const D: usize> {
    parameters: SolverParameters,
    last_number_of_iterations: usize,
    last_residual: Float,
    buffer: FdmVector<D>,
    residual: FdmVector<D>,
    residual_compressed: Vec<Float>,
}

impl<const D: usize> GaussSeidelSolver<D> {
    pub fn new(parameters: SolverParameters) -> Self {
        Self {
            parameters,
            last_number_of_iterations: 0,
            last_residual: Float::MAX,
            buffer: FdmVector::default(),
            residual: FdmVector::default(),
            residual_compressed: Vec::new(),
        }
    }
}

impl<const D: usize> LinearSystemSolver<D> for GaussSeidelSolver<D> {
    fn solve(&mut self, system: &mut FdmLinearSystem<D>) -> bool {
        let Self {
            parameters,
            buffer,
            residual,
            ..
        } = self;
        residual.resize(system.x.size(), 0.0);
        let sor_factor = parameters.sor_factor;
        let use_red_black_ordering = parameters.use_red_black_ordering;
        let (iterations, norm) = iterate::<FdmBlas<D>, _>(
            parameters,
            &system.a,
            &system.b,
            &mut system.x,
            residual,
            |a, b, x| {
                if use_red_black_ordering {
                    relax_red_black(a, b, sor_factor, x, buffer);
                } else {
                    relax(a, b, sor_factor, x);
                }
            },
        );
        self.last_number_of_iterations = iterations;
        self.last_residual = norm;
        log::debug!("gauss-seidel: {iterations} iterations, residual {norm:.6e}");
        norm < self.parameters.tolerance
    }

    /// Red-black ordering has no meaning for an arbitrary row set and is
    /// ignored here.
    fn solve_compressed(&mut self, system: &mut CompressedLinearSystem) -> bool {
        let Self {
            parameters,
            residual_compressed,
            ..
        } = self;
        residual_compressed.resize(system.x.len(), 0.0);
        let sor_factor = parameters.sor_factor;
        let (iterations, norm) = iterate::<CompressedBlas, _>(
            parameters,
            &system.a,
            &system.b,
            &mut system.x,
            residual_compressed,
            |a, b, x| relax_compressed(a, b, sor_factor, x),
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
        SolverKind::GaussSeidel
    }
}
