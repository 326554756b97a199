//! Semi-Lagrangian advection: every output sample traces its characteristic
//! backwards through the flow and resamples the input where it lands.

use crate::field::*;
use crate::global_variables::*;
use crate::grid::*;

pub trait AdvectionSolver<const D: usize>: Send + Sync {
    /// Samples outside the boundary (`boundary_sdf > 0`) receive the
    /// advected value; the others keep what `output` already holds.
    fn advect_scalar(
        &self,
        input: &ScalarGrid<D>,
        flow: &dyn VectorField<D>,
        dt: Float,
        output: &mut ScalarGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
    );

    fn advect_collocated(
        &self,
        input: &CollocatedVectorGrid<D>,
        flow: &dyn VectorField<D>,
        dt: Float,
        output: &mut CollocatedVectorGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
    );

    fn advect_face_centered(
        &self,
        input: &FaceCenteredGrid<D>,
        flow: &dyn VectorField<D>,
        dt: Float,
        output: &mut FaceCenteredGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
    );
}

/// First-order semi-Lagrangian scheme with the linear sampler.
#[derive(Clone, Copy, Debug, Default)]
pub struct SemiLagrangian;

impl SemiLagrangian {
    pub fn new() -> Self {
        Self
    }

    /// Where the sample at `point` was `dt` ago. Sub-steps move at most about
    /// `grid_spacing` each, with a midpoint rule; the trace stops on the
    /// boundary surface when a sub-step crosses it.
    pub fn back_trace<const D: usize>(
        &self,
        flow: &dyn VectorField<D>,
        dt: Float,
        grid_spacing: Float,
        point: &Vector<D>,
        boundary_sdf: &dyn ScalarField<D>,
    ) -> Vector<D> {
        let mut remaining = dt;
        let mut start = *point;
        let mut end = *point;

        while remaining > Float::EPSILON {
            let start_velocity = flow.sample(&start);
            let number_of_steps = (start_velocity.norm() * remaining / grid_spacing).ceil().max(1.0);
            let step = remaining / number_of_steps;

            let midpoint = start - 0.5 * step * start_velocity;
            end = start - step * flow.sample(&midpoint);

            let start_phi = boundary_sdf.sample(&start);
            let end_phi = boundary_sdf.sample(&end);
            if start_phi * end_phi < 0.0 {
                let weight = end_phi.abs() / (start_phi.abs() + end_phi.abs());
                end = weight * start + (1.0 - weight) * end;
                break;
            }

            remaining -= step;
            start = end;
        }
        end
    }
}

impl<const D: usize> AdvectionSolver<D> for SemiLagrangian {
    fn advect_scalar(
        &self,
        input: &ScalarGrid<D>,
        flow: &dyn VectorField<D>,
        dt: Float,
        output: &mut ScalarGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
    ) {
        let grid_spacing = output.shape().min_spacing();
        let data_origin = *output.data_origin();
        let spacing = output.shape().spacing;
        output.data_mut().par_for_each_index_mut(|index, value| {
            let point = data_origin + spacing.component_mul(&to_vector(&index));
            if boundary_sdf.sample(&point) > 0.0 {
                let traced = self.back_trace(flow, dt, grid_spacing, &point, boundary_sdf);
                *value = input.sample(&traced);
            }
        });
    }

    fn advect_collocated(
        &self,
        input: &CollocatedVectorGrid<D>,
        flow: &dyn VectorField<D>,
        dt: Float,
        output: &mut CollocatedVectorGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
    ) {
        let grid_spacing = output.shape().min_spacing();
        let data_origin = output.data_origin();
        let spacing = output.shape().spacing;
        output.data_mut().par_for_each_index_mut(|index, value| {
            let point = data_origin + spacing.component_mul(&to_vector(&index));
            if boundary_sdf.sample(&point) > 0.0 {
                let traced = self.back_trace(flow, dt, grid_spacing, &point, boundary_sdf);
                *value = input.sample(&traced);
            }
        });
    }

    fn advect_face_centered(
        &self,
        input: &FaceCenteredGrid<D>,
        flow: &dyn VectorField<D>,
        dt: Float,
        output: &mut FaceCenteredGrid<D>,
        boundary_sdf: &dyn ScalarField<D>,
    ) {
        let grid_spacing = output.shape().min_spacing();
        let spacing = output.shape().spacing;
        for axis in 0..D {
            let data_origin = *output.component_origin(axis);
            output
                .component_mut(axis)
                .par_for_each_index_mut(|index, value| {
                    let point = data_origin + spacing.component_mul(&to_vector(&index));
                    if boundary_sdf.sample(&point) > 0.0 {
                        let traced = self.back_trace(flow, dt, grid_spacing, &point, boundary_sdf);
                        *value = input.sample(&traced)[axis];
                    }
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> ConstantScalarField {
        ConstantScalarField(Float::MAX)
    }

    #[test]
    fn test_constant_field_is_preserved() {
        let shape = GridShape::<2>::uniform([10, 10], 0.1);
        let input = ScalarGrid::cell_centered(shape, 3.0);
        let mut output = ScalarGrid::cell_centered(shape, 0.0);
        let swirl = CustomVectorField::new(|point: &Vector<2>| {
            Vector::<2>::new(-(point[1] - 0.5), point[0] - 0.5)
        });
        SemiLagrangian.advect_scalar(&input, &swirl, 0.7, &mut output, &open());
        assert!(output.data().iter().all(|value| (value - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_zero_velocity_copies_the_input() {
        let shape = GridShape::<3>::uniform([4, 5, 6], 0.2);
        let mut input = ScalarGrid::cell_centered(shape, 0.0);
        input.fill_with(|point| point[0] + 2.0 * point[1] - point[2]);
        let mut output = ScalarGrid::cell_centered(shape, 0.0);
        let still = ConstantVectorField(Vector::<3>::zeros());
        SemiLagrangian.advect_scalar(&input, &still, 0.5, &mut output, &open());
        for (x, y) in input.data().iter().zip(output.data().iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_uniform_flow_translates_a_linear_field() {
        let shape = GridShape::<2>::uniform([20, 4], 0.05);
        let mut input = ScalarGrid::cell_centered(shape, 0.0);
        input.fill_with(|point| point[0]);
        let mut output = ScalarGrid::cell_centered(shape, 0.0);
        let flow = ConstantVectorField(Vector::<2>::new(1.0, 0.0));
        SemiLagrangian.advect_scalar(&input, &flow, 0.12, &mut output, &open());
        for i in 5..20 {
            let expected = input[[i, 2]] - 0.12;
            assert!((output[[i, 2]] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_back_trace_stops_on_the_boundary() {
        let wall = CustomScalarField::new(|point: &Vector<2>| point[0] - 0.5);
        let flow = ConstantVectorField(Vector::<2>::new(1.0, 0.0));
        let traced = SemiLagrangian.back_trace(&flow, 0.5, 0.1, &Vector::<2>::new(0.65, 0.3), &wall);
        assert!((traced[0] - 0.5).abs() < 1e-9);
        assert!((traced[1] - 0.3).abs() < 1e-12);

        let far = SemiLagrangian.back_trace(&flow, 0.1, 0.1, &Vector::<2>::new(0.9, 0.3), &wall);
        assert!((far[0] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_samples_inside_the_boundary_are_skipped() {
        let shape = GridShape::<2>::uniform([8, 8], 0.125);
        let input = ScalarGrid::cell_centered(shape, 1.0);
        let mut output = ScalarGrid::cell_centered(shape, -1.0);
        let wall = CustomScalarField::new(|point: &Vector<2>| point[0] - 0.5);
        let flow = ConstantVectorField(Vector::<2>::new(0.3, 0.0));
        SemiLagrangian.advect_scalar(&input, &flow, 0.1, &mut output, &wall);
        for j in 0..8 {
            assert_eq!(output[[0, j]], -1.0);
            assert_eq!(output[[3, j]], -1.0);
            assert!((output[[4, j]] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_face_centered_uniform_flow_is_steady() {
        let shape = GridShape::<3>::uniform([6, 6, 6], 1.0 / 6.0);
        let uniform = Vector::<3>::new(0.4, -0.2, 0.1);
        let input = FaceCenteredGrid::new(shape, uniform);
        let mut output = FaceCenteredGrid::new(shape, Vector::<3>::zeros());
        SemiLagrangian.advect_face_centered(&input, &input, 0.3, &mut output, &open());
        for axis in 0..3 {
            assert!(output
                .component(axis)
                .iter()
                .all(|value| (value - uniform[axis]).abs() < 1e-12));
        }
    }

    #[test]
    fn test_collocated_advection_moves_each_component() {
        let shape = GridShape::<2>::uniform([16, 16], 1.0 / 16.0);
        let mut input = CollocatedVectorGrid::new(shape, Vector::<2>::zeros());
        let data_origin = input.data_origin();
        input.data_mut().par_for_each_index_mut(|index, value| {
            let point = data_origin + to_vector(&index) / 16.0;
            *value = Vector::<2>::new(point[1], -point[1]);
        });
        let mut output = CollocatedVectorGrid::new(shape, Vector::<2>::zeros());
        let flow = ConstantVectorField(Vector::<2>::new(0.0, 0.5));
        SemiLagrangian.advect_collocated(&input, &flow, 0.1, &mut output, &open());
        for j in 4..16 {
            let expected = input[[7, j]][0] - 0.05;
            assert!((output[[7, j]][0] - expected).abs() < 1e-9);
            assert!((output[[7, j]][1] + expected).abs() < 1e-9);
        }
    }
}
