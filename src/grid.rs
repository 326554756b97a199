//! Dense storage over regular grids and the shape/sampling helpers shared by
//! every field and linear system in the crate.
//!
//! Cells are laid out x-fastest: the linear index of `[i, j, k]` is
//! `i + nx * (j + ny * k)`.

use crate::global_variables::*;
use nalgebra::SVector;
use rayon::prelude::*;
use std::ops::{Index, IndexMut};

pub type Vector<const D: usize> = SVector<Float, D>;

pub fn unravel<const D: usize>(size: &[usize; D], mut index: usize) -> [usize; D] {
    let mut result = [0; D];
    for axis in 0..D {
        result[axis] = index % size[axis];
        index /= size[axis];
    }
    result
}

pub fn linear_index<const D: usize>(size: &[usize; D], index: &[usize; D]) -> usize {
    let mut result = 0;
    let mut stride = 1;
    for axis in 0..D {
        result += index[axis] * stride;
        stride *= size[axis];
    }
    result
}

pub fn strides<const D: usize>(size: &[usize; D]) -> [usize; D] {
    let mut result = [1; D];
    for axis in 1..D {
        result[axis] = result[axis - 1] * size[axis - 1];
    }
    result
}

pub fn to_vector<const D: usize>(index: &[usize; D]) -> Vector<D> {
    Vector::<D>::from_fn(|axis, _| index[axis] as Float)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Array<T, const D: usize> {
    size: [usize; D],
    data: Vec<T>,
}

impl<T, const D: usize> Default for Array<T, D> {
    fn default() -> Self {
        Self {
            size: [0; D],
            data: Vec::new(),
        }
    }
}

impl<T: Clone, const D: usize> Array<T, D> {
    pub fn new(size: [usize; D], initial_value: T) -> Self {
        Self {
            size,
            data: vec![initial_value; size.iter().product()],
        }
    }

    /// Reallocates to `size`, overwriting every element with `initial_value`.
    pub fn resize(&mut self, size: [usize; D], initial_value: T) {
        self.size = size;
        self.data.clear();
        self.data.resize(size.iter().product(), initial_value);
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T, const D: usize> Array<T, D> {
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.size = [0; D];
        self.data.clear();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn stride(&self, axis: usize) -> usize {
        self.size[..axis].iter().product()
    }

    pub fn linear_index(&self, index: &[usize; D]) -> usize {
        linear_index(&self.size, index)
    }

    pub fn unravel(&self, index: usize) -> [usize; D] {
        unravel(&self.size, index)
    }

    pub fn get(&self, index: &[usize; D]) -> Option<&T> {
        if (0..D).all(|axis| index[axis] < self.size[axis]) {
            self.data.get(self.linear_index(index))
        } else {
            None
        }
    }

    pub fn for_each_index<F>(&self, mut function: F)
    where
        F: FnMut([usize; D], &T),
    {
        self.data
            .iter()
            .enumerate()
            .for_each(|(l, value)| function(unravel(&self.size, l), value));
    }
}

impl<T: Send + Sync, const D: usize> Array<T, D> {
    /// Runs `function` on every element from the rayon pool. Each call owns
    /// its element; anything else it reads must not be written in the same pass.
    pub fn par_for_each_index_mut<F>(&mut self, function: F)
    where
        F: Fn([usize; D], &mut T) + Send + Sync,
    {
        let size = self.size;
        self.data
            .par_iter_mut()
            .enumerate()
            .for_each(|(l, value)| function(unravel(&size, l), value));
    }
}

impl<T, const D: usize> Index<usize> for Array<T, D> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T, const D: usize> IndexMut<usize> for Array<T, D> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl<T, const D: usize> Index<[usize; D]> for Array<T, D> {
    type Output = T;

    fn index(&self, index: [usize; D]) -> &T {
        &self.data[linear_index(&self.size, &index)]
    }
}

impl<T, const D: usize> IndexMut<[usize; D]> for Array<T, D> {
    fn index_mut(&mut self, index: [usize; D]) -> &mut T {
        let l = linear_index(&self.size, &index);
        &mut self.data[l]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridShape<const D: usize> {
    pub resolution: [usize; D],
    pub spacing: Vector<D>,
    pub origin: Vector<D>,
}

impl<const D: usize> GridShape<D> {
    pub fn new(resolution: [usize; D], spacing: Vector<D>, origin: Vector<D>) -> Self {
        Self {
            resolution,
            spacing,
            origin,
        }
    }

    pub fn uniform(resolution: [usize; D], grid_spacing: Float) -> Self {
        Self::new(
            resolution,
            Vector::<D>::repeat(grid_spacing),
            Vector::<D>::zeros(),
        )
    }

    pub fn number_of_cells(&self) -> usize {
        self.resolution.iter().product()
    }

    pub fn min_spacing(&self) -> Float {
        self.spacing.iter().cloned().fold(Float::INFINITY, Float::min)
    }

    pub fn cell_center(&self, index: &[usize; D]) -> Vector<D> {
        self.origin + self.spacing.component_mul(&(to_vector(index) + Vector::<D>::repeat(0.5)))
    }

    pub fn upper_corner(&self) -> Vector<D> {
        self.origin + self.spacing.component_mul(&to_vector(&self.resolution))
    }
}

/// Clamped cell index and fraction of `x` (in data index units) along an
/// axis holding `n` samples.
pub fn barycentric(x: Float, n: usize) -> (usize, Float) {
    if n <= 1 {
        return (0, 0.0);
    }
    let s = x.floor();
    let i = s as isize;
    if i < 0 {
        (0, 0.0)
    } else if i as usize > n - 2 {
        (n - 2, 1.0)
    } else {
        (i as usize, x - s)
    }
}

/// Visits the (linear index, weight) pairs of the multilinear stencil around
/// `point`. Corners with a zero weight are skipped so that saturated samples
/// such as `Float::MAX` never enter the sum.
pub fn for_each_linear_weight<const D: usize, F>(
    size: &[usize; D],
    data_origin: &Vector<D>,
    spacing: &Vector<D>,
    point: &Vector<D>,
    mut visit: F,
) where
    F: FnMut(usize, Float),
{
    if size.iter().any(|&n| n == 0) {
        return;
    }
    let mut base = [0; D];
    let mut fraction = [0.0; D];
    for axis in 0..D {
        let x = (point[axis] - data_origin[axis]) / spacing[axis];
        (base[axis], fraction[axis]) = barycentric(x, size[axis]);
    }
    for corner in 0..(1usize << D) {
        let mut weight = 1.0;
        let mut l = 0;
        let mut stride = 1;
        for axis in 0..D {
            let upper = (corner >> axis) & 1 == 1;
            let i = if upper {
                weight *= fraction[axis];
                (base[axis] + 1).min(size[axis] - 1)
            } else {
                weight *= 1.0 - fraction[axis];
                base[axis]
            };
            l += i * stride;
            stride *= size[axis];
        }
        if weight != 0.0 {
            visit(l, weight);
        }
    }
}

pub fn sample_linear<const D: usize>(
    data: &Array<Float, D>,
    data_origin: &Vector<D>,
    spacing: &Vector<D>,
    point: &Vector<D>,
) -> Float {
    let mut result = 0.0;
    for_each_linear_weight(&data.size(), data_origin, spacing, point, |l, weight| {
        result += weight * data[l];
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unravel_is_inverse_of_linear_index() {
        let size = [3, 4, 5];
        for l in 0..60 {
            assert_eq!(linear_index(&size, &unravel(&size, l)), l);
        }
        assert_eq!(unravel(&size, 1 + 3 * (2 + 4 * 3)), [1, 2, 3]);
        assert_eq!(strides(&size), [1, 3, 12]);
    }

    #[test]
    fn test_barycentric_clamps_to_the_data_range() {
        assert_eq!(barycentric(-0.3, 4), (0, 0.0));
        assert_eq!(barycentric(3.0, 4), (2, 1.0));
        assert_eq!(barycentric(7.5, 4), (2, 1.0));
        let (i, f) = barycentric(1.25, 4);
        assert_eq!(i, 1);
        assert!((f - 0.25).abs() < 1e-12);
        assert_eq!(barycentric(0.7, 1), (0, 0.0));
    }

    #[test]
    fn test_sample_linear_reproduces_linear_function() {
        let size = [4, 3];
        let mut data = Array::new(size, 0.0);
        let origin = Vector::<2>::new(0.5, 0.5);
        let spacing = Vector::<2>::new(1.0, 1.0);
        for l in 0..data.len() {
            let [i, j] = data.unravel(l);
            data[l] = 2.0 * (i as Float + 0.5) - (j as Float + 0.5);
        }
        let point = Vector::<2>::new(1.7, 2.1);
        let value = sample_linear(&data, &origin, &spacing, &point);
        assert!((value - (2.0 * 1.7 - 2.1)).abs() < 1e-12);
    }

    #[test]
    fn test_sample_linear_ignores_zero_weight_corners() {
        let mut data = Array::new([2, 2], Float::MAX);
        data[[0, 0]] = 1.0;
        let value = sample_linear(
            &data,
            &Vector::<2>::zeros(),
            &Vector::<2>::repeat(1.0),
            &Vector::<2>::zeros(),
        );
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_par_for_each_index_mut_visits_every_cell_once() {
        let mut data = Array::new([5, 6], 0usize);
        data.par_for_each_index_mut(|[i, j], value| *value = i + 10 * j);
        data.for_each_index(|[i, j], value| assert_eq!(*value, i + 10 * j));
    }
}
