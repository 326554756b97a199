//! Scalar and vector fields: analytic fields and the three grid layouts the
//! solvers work on (cell/vertex-centered scalars, collocated vectors and the
//! staggered face-centered velocity).

use crate::global_variables::*;
use crate::grid::*;
use rayon::prelude::*;
use std::ops::{Index, IndexMut};

pub trait ScalarField<const D: usize>: Send + Sync {
    fn sample(&self, point: &Vector<D>) -> Float;

    fn gradient(&self, point: &Vector<D>) -> Vector<D> {
        let h = 1e-4;
        Vector::<D>::from_fn(|axis, _| {
            let mut offset = Vector::<D>::zeros();
            offset[axis] = h;
            (self.sample(&(point + offset)) - self.sample(&(point - offset))) / (2.0 * h)
        })
    }
}

pub trait VectorField<const D: usize>: Send + Sync {
    fn sample(&self, point: &Vector<D>) -> Vector<D>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantScalarField(pub Float);

impl<const D: usize> ScalarField<D> for ConstantScalarField {
    fn sample(&self, _point: &Vector<D>) -> Float {
        self.0
    }

    fn gradient(&self, _point: &Vector<D>) -> Vector<D> {
        Vector::<D>::zeros()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantVectorField<const D: usize>(pub Vector<D>);

impl<const D: usize> VectorField<D> for ConstantVectorField<D> {
    fn sample(&self, _point: &Vector<D>) -> Vector<D> {
        self.0
    }
}

/// Scalar field backed by a closure, e.g. an analytic signed distance.
pub struct CustomScalarField<F> {
    function: F,
}

impl<F> CustomScalarField<F> {
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F, const D: usize> ScalarField<D> for CustomScalarField<F>
where
    F: Fn(&Vector<D>) -> Float + Send + Sync,
{
    fn sample(&self, point: &Vector<D>) -> Float {
        (self.function)(point)
    }
}

pub struct CustomVectorField<F> {
    function: F,
}

impl<F> CustomVectorField<F> {
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F, const D: usize> VectorField<D> for CustomVectorField<F>
where
    F: Fn(&Vector<D>) -> Vector<D> + Send + Sync,
{
    fn sample(&self, point: &Vector<D>) -> Vector<D> {
        (self.function)(point)
    }
}

#[derive(Clone, Debug)]
pub struct ScalarGrid<const D: usize> {
    shape: GridShape<D>,
    data_origin: Vector<D>,
    data: Array<Float, D>,
}

impl<const D: usize> ScalarGrid<D> {
    /// One sample per cell, stored at the cell center.
    pub fn cell_centered(shape: GridShape<D>, initial_value: Float) -> Self {
        Self {
            shape,
            data_origin: shape.origin + 0.5 * shape.spacing,
            data: Array::new(shape.resolution, initial_value),
        }
    }

    /// One sample per grid vertex, `resolution + 1` along each axis.
    pub fn vertex_centered(shape: GridShape<D>, initial_value: Float) -> Self {
        Self {
            shape,
            data_origin: shape.origin,
            data: Array::new(shape.resolution.map(|n| n + 1), initial_value),
        }
    }

    pub fn shape(&self) -> &GridShape<D> {
        &self.shape
    }

    pub fn resolution(&self) -> [usize; D] {
        self.shape.resolution
    }

    pub fn data(&self) -> &Array<Float, D> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array<Float, D> {
        &mut self.data
    }

    pub fn data_origin(&self) -> &Vector<D> {
        &self.data_origin
    }

    pub fn data_position(&self, index: &[usize; D]) -> Vector<D> {
        self.data_origin + self.shape.spacing.component_mul(&to_vector(index))
    }

    pub fn fill(&mut self, value: Float) {
        self.data.fill(value);
    }

    pub fn fill_with<F>(&mut self, function: F)
    where
        F: Fn(&Vector<D>) -> Float + Send + Sync,
    {
        let data_origin = self.data_origin;
        let spacing = self.shape.spacing;
        self.data.par_for_each_index_mut(|index, value| {
            *value = function(&(data_origin + spacing.component_mul(&to_vector(&index))));
        });
    }
}

impl<const D: usize> Index<[usize; D]> for ScalarGrid<D> {
    type Output = Float;

    fn index(&self, index: [usize; D]) -> &Float {
        &self.data[index]
    }
}

impl<const D: usize> IndexMut<[usize; D]> for ScalarGrid<D> {
    fn index_mut(&mut self, index: [usize; D]) -> &mut Float {
        &mut self.data[index]
    }
}

impl<const D: usize> ScalarField<D> for ScalarGrid<D> {
    fn sample(&self, point: &Vector<D>) -> Float {
        sample_linear(&self.data, &self.data_origin, &self.shape.spacing, point)
    }

    fn gradient(&self, point: &Vector<D>) -> Vector<D> {
        let spacing = self.shape.spacing;
        Vector::<D>::from_fn(|axis, _| {
            let mut offset = Vector::<D>::zeros();
            offset[axis] = 0.5 * spacing[axis];
            (self.sample(&(point + offset)) - self.sample(&(point - offset))) / spacing[axis]
        })
    }
}

/// Cell-centered vector grid, every component stored at the cell center.
#[derive(Clone, Debug)]
pub struct CollocatedVectorGrid<const D: usize> {
    shape: GridShape<D>,
    data: Array<Vector<D>, D>,
}

impl<const D: usize> CollocatedVectorGrid<D> {
    pub fn new(shape: GridShape<D>, initial_value: Vector<D>) -> Self {
        Self {
            shape,
            data: Array::new(shape.resolution, initial_value),
        }
    }

    pub fn shape(&self) -> &GridShape<D> {
        &self.shape
    }

    pub fn data(&self) -> &Array<Vector<D>, D> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array<Vector<D>, D> {
        &mut self.data
    }

    pub fn data_origin(&self) -> Vector<D> {
        self.shape.origin + 0.5 * self.shape.spacing
    }

    pub fn data_position(&self, index: &[usize; D]) -> Vector<D> {
        self.shape.cell_center(index)
    }
}

impl<const D: usize> Index<[usize; D]> for CollocatedVectorGrid<D> {
    type Output = Vector<D>;

    fn index(&self, index: [usize; D]) -> &Vector<D> {
        &self.data[index]
    }
}

impl<const D: usize> IndexMut<[usize; D]> for CollocatedVectorGrid<D> {
    fn index_mut(&mut self, index: [usize; D]) -> &mut Vector<D> {
        &mut self.data[index]
    }
}

impl<const D: usize> VectorField<D> for CollocatedVectorGrid<D> {
    fn sample(&self, point: &Vector<D>) -> Vector<D> {
        let mut result = Vector::<D>::zeros();
        for_each_linear_weight(
            &self.data.size(),
            &self.data_origin(),
            &self.shape.spacing,
            point,
            |l, weight| result += weight * self.data[l],
        );
        result
    }
}

/// Staggered (MAC) velocity grid. Component `a` lives on the faces normal to
/// axis `a` and has `resolution[a] + 1` samples along that axis.
#[derive(Clone, Debug)]
pub struct FaceCenteredGrid<const D: usize> {
    shape: GridShape<D>,
    data: [Array<Float, D>; D],
    data_origins: [Vector<D>; D],
}

impl<const D: usize> FaceCenteredGrid<D> {
    pub fn new(shape: GridShape<D>, initial_value: Vector<D>) -> Self {
        let data = std::array::from_fn(|axis| {
            let mut size = shape.resolution;
            size[axis] += 1;
            Array::new(size, initial_value[axis])
        });
        let data_origins = std::array::from_fn(|axis| {
            let mut offset = 0.5 * shape.spacing;
            offset[axis] = 0.0;
            shape.origin + offset
        });
        Self {
            shape,
            data,
            data_origins,
        }
    }

    pub fn shape(&self) -> &GridShape<D> {
        &self.shape
    }

    pub fn resolution(&self) -> [usize; D] {
        self.shape.resolution
    }

    pub fn component(&self, axis: usize) -> &Array<Float, D> {
        &self.data[axis]
    }

    pub fn component_mut(&mut self, axis: usize) -> &mut Array<Float, D> {
        &mut self.data[axis]
    }

    pub fn component_origin(&self, axis: usize) -> &Vector<D> {
        &self.data_origins[axis]
    }

    pub fn face_position(&self, axis: usize, index: &[usize; D]) -> Vector<D> {
        self.data_origins[axis] + self.shape.spacing.component_mul(&to_vector(index))
    }

    pub fn fill(&mut self, value: Vector<D>) {
        for axis in 0..D {
            self.data[axis].fill(value[axis]);
        }
    }

    pub fn fill_with<F>(&mut self, function: F)
    where
        F: Fn(&Vector<D>) -> Vector<D> + Send + Sync,
    {
        let spacing = self.shape.spacing;
        for (axis, component) in self.data.iter_mut().enumerate() {
            let data_origin = self.data_origins[axis];
            component.par_for_each_index_mut(|index, value| {
                *value = function(&(data_origin + spacing.component_mul(&to_vector(&index))))[axis];
            });
        }
    }

    pub fn value_at_cell_center(&self, index: &[usize; D]) -> Vector<D> {
        Vector::<D>::from_fn(|axis, _| {
            let mut upper = *index;
            upper[axis] += 1;
            0.5 * (self.data[axis][*index] + self.data[axis][upper])
        })
    }

    pub fn divergence_at_cell_center(&self, index: &[usize; D]) -> Float {
        (0..D)
            .map(|axis| {
                let mut upper = *index;
                upper[axis] += 1;
                (self.data[axis][upper] - self.data[axis][*index]) / self.shape.spacing[axis]
            })
            .sum()
    }

    pub fn max_speed(&self) -> Float {
        let mut result: Float = 0.0;
        for component in self.data.iter() {
            let max = component
                .as_slice()
                .par_iter()
                .map(|value| value.abs())
                .reduce(|| 0.0, Float::max);
            result = result.max(max);
        }
        result
    }
}

impl<const D: usize> VectorField<D> for FaceCenteredGrid<D> {
    fn sample(&self, point: &Vector<D>) -> Vector<D> {
        Vector::<D>::from_fn(|axis, _| {
            sample_linear(
                &self.data[axis],
                &self.data_origins[axis],
                &self.shape.spacing,
                point,
            )
        })
    }
}
