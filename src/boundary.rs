//! Solid and free-surface boundaries: cell markers, level-set coverage
//! helpers and the boundary-condition solvers that constrain the velocity
//! field around colliders.

pub mod blocked;
pub mod fractional;

use crate::collider::Collider;
use crate::error::ParameterError;
use crate::field::*;
use crate::global_variables::*;
use crate::grid::*;
use crate::CellMarker;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryFace {
    West,
    East,
    South,
    North,
    Bottom,
    Top,
}

impl BoundaryFace {
    pub const ALL: [BoundaryFace; 6] = [
        BoundaryFace::West,
        BoundaryFace::East,
        BoundaryFace::South,
        BoundaryFace::North,
        BoundaryFace::Bottom,
        BoundaryFace::Top,
    ];

    pub fn new(axis: usize, is_positive: bool) -> Self {
        Self::ALL[2 * axis + is_positive as usize]
    }

    pub fn axis(&self) -> usize {
        *self as usize / 2
    }

    pub fn is_positive(&self) -> bool {
        *self as usize % 2 == 1
    }
}

/// How solid boundaries enter the pressure system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryScheme {
    Blocked,
    Fractional,
}

impl FromStr for BoundaryScheme {
    type Err = ParameterError;

    fn from_str(name: &str) -> Result<Self, ParameterError> {
        match name.trim().to_lowercase().as_str() {
            "blocked" | "lego" => Ok(BoundaryScheme::Blocked),
            "fractional" | "ghost_fluid" => Ok(BoundaryScheme::Fractional),
            _ => Err(ParameterError::UnknownBoundaryScheme(name.to_string())),
        }
    }
}

impl fmt::Display for BoundaryScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryScheme::Blocked => write!(f, "blocked"),
            BoundaryScheme::Fractional => write!(f, "fractional"),
        }
    }
}

pub fn is_inside_sdf(phi: Float) -> bool {
    phi < 0.0
}

/// Fraction of the segment between two samples that lies inside the level set.
pub fn fraction_inside_sdf(phi0: Float, phi1: Float) -> Float {
    match (is_inside_sdf(phi0), is_inside_sdf(phi1)) {
        (true, true) => 1.0,
        (true, false) => phi0 / (phi0 - phi1),
        (false, true) => phi1 / (phi1 - phi0),
        (false, false) => 0.0,
    }
}

/// Area fraction of a unit square inside the level set, from the values at
/// its four corners.
pub fn fraction_inside(
    phi_bottom_left: Float,
    phi_bottom_right: Float,
    phi_top_left: Float,
    phi_top_right: Float,
) -> Float {
    // Counter-clockwise corner order.
    let mut list = [phi_bottom_left, phi_bottom_right, phi_top_right, phi_top_left];
    let inside_count = list.iter().filter(|&&phi| is_inside_sdf(phi)).count();

    match inside_count {
        4 => 1.0,
        3 => {
            while is_inside_sdf(list[0]) {
                list.rotate_left(1);
            }
            let side0 = 1.0 - fraction_inside_sdf(list[0], list[3]);
            let side1 = 1.0 - fraction_inside_sdf(list[0], list[1]);
            1.0 - 0.5 * side0 * side1
        }
        2 => {
            while !is_inside_sdf(list[0]) || !(is_inside_sdf(list[1]) || is_inside_sdf(list[2])) {
                list.rotate_left(1);
            }
            if is_inside_sdf(list[1]) {
                let side_left = fraction_inside_sdf(list[0], list[3]);
                let side_right = fraction_inside_sdf(list[1], list[2]);
                0.5 * (side_left + side_right)
            } else {
                // Diagonal pair; the sign at the center picks the topology.
                let middle = 0.25 * list.iter().sum::<Float>();
                if middle < 0.0 {
                    let side1 = 1.0 - fraction_inside_sdf(list[0], list[3]);
                    let side3 = 1.0 - fraction_inside_sdf(list[2], list[3]);
                    let side2 = 1.0 - fraction_inside_sdf(list[2], list[1]);
                    let side0 = 1.0 - fraction_inside_sdf(list[0], list[1]);
                    1.0 - 0.5 * side1 * side3 - 0.5 * side0 * side2
                } else {
                    let side0 = fraction_inside_sdf(list[0], list[1]);
                    let side1 = fraction_inside_sdf(list[0], list[3]);
                    let side2 = fraction_inside_sdf(list[2], list[1]);
                    let side3 = fraction_inside_sdf(list[2], list[3]);
                    0.5 * side0 * side1 + 0.5 * side2 * side3
                }
            }
        }
        1 => {
            while !is_inside_sdf(list[0]) {
                list.rotate_left(1);
            }
            let side0 = fraction_inside_sdf(list[0], list[3]);
            let side1 = fraction_inside_sdf(list[0], list[1]);
            0.5 * side0 * side1
        }
        _ => 0.0,
    }
}

/// Coverage of a face from the level set at its corners: a point in 1-D,
/// a segment in 2-D and a square in 3-D. Corners are ordered with the first
/// tangential axis varying fastest.
pub fn face_fraction_inside(corners: &[Float]) -> Float {
    match corners {
        [phi] => {
            if is_inside_sdf(*phi) {
                1.0
            } else {
                0.0
            }
        }
        [phi0, phi1] => fraction_inside_sdf(*phi0, *phi1),
        [bottom_left, bottom_right, top_left, top_right] => {
            fraction_inside(*bottom_left, *bottom_right, *top_left, *top_right)
        }
        _ => 0.0,
    }
}

/// Open fraction of the face normal to `axis` centered at `point`, clamped
/// to [0, 1] and raised to [`MIN_WEIGHT`] when it is positive but tiny.
pub fn face_weight<const D: usize>(
    boundary_sdf: &dyn ScalarField<D>,
    point: &Vector<D>,
    axis: usize,
    spacing: &Vector<D>,
) -> Float {
    let tangents: Vec<usize> = (0..D).filter(|&t| t != axis).collect();
    let corners: Vec<Float> = (0..(1usize << tangents.len()))
        .map(|corner| {
            let mut offset = Vector::<D>::zeros();
            for (bit, &t) in tangents.iter().enumerate() {
                let sign = if (corner >> bit) & 1 == 1 { 0.5 } else { -0.5 };
                offset[t] = sign * spacing[t];
            }
            boundary_sdf.sample(&(point + offset))
        })
        .collect();
    let weight = (1.0 - face_fraction_inside(&corners)).clamp(0.0, 1.0);
    if weight > 0.0 && weight < MIN_WEIGHT {
        MIN_WEIGHT
    } else {
        weight
    }
}

/// Classifies every cell center: boundary when inside the boundary level
/// set, fluid when inside the fluid level set, air otherwise.
pub fn build_markers<const D: usize>(
    shape: &GridShape<D>,
    boundary_sdf: &dyn ScalarField<D>,
    fluid_sdf: &dyn ScalarField<D>,
    markers: &mut Array<CellMarker, D>,
) {
    markers.resize(shape.resolution, CellMarker::Fluid);
    markers.par_for_each_index_mut(|index, marker| {
        let point = shape.cell_center(&index);
        *marker = if is_inside_sdf(boundary_sdf.sample(&point)) {
            CellMarker::Boundary
        } else if is_inside_sdf(fluid_sdf.sample(&point)) {
            CellMarker::Fluid
        } else {
            CellMarker::Air
        };
    });
}

/// Fills the invalid samples of `input` layer by layer with the average of
/// their valid axis neighbors, `depth` layers deep. Valid samples are copied.
pub fn extrapolate_to_region<const D: usize>(
    input: &Array<Float, D>,
    valid: &Array<bool, D>,
    depth: usize,
    output: &mut Array<Float, D>,
) {
    let size = input.size();
    output.clone_from(input);
    let mut valid0 = valid.clone();
    let mut valid1 = valid.clone();
    let mut previous = output.clone();

    for _ in 0..depth {
        previous.clone_from(output);
        {
            let (previous, valid0) = (&previous, &valid0);
            output.par_for_each_index_mut(|index, value| {
                if valid0[index] {
                    return;
                }
                let mut sum = 0.0;
                let mut count = 0;
                for axis in 0..D {
                    let mut neighbor = index;
                    if index[axis] + 1 < size[axis] {
                        neighbor[axis] = index[axis] + 1;
                        if valid0[neighbor] {
                            sum += previous[neighbor];
                            count += 1;
                        }
                    }
                    if index[axis] > 0 {
                        neighbor[axis] = index[axis] - 1;
                        if valid0[neighbor] {
                            sum += previous[neighbor];
                            count += 1;
                        }
                    }
                }
                if count > 0 {
                    *value = sum / count as Float;
                }
            });
        }
        {
            let (output_valid, valid0) = (&mut valid1, &valid0);
            output_valid.par_for_each_index_mut(|index, flag| {
                *flag = valid0[index] || {
                    (0..D).any(|axis| {
                        let mut neighbor = index;
                        let upper = index[axis] + 1 < size[axis] && {
                            neighbor[axis] = index[axis] + 1;
                            valid0[neighbor]
                        };
                        let lower = index[axis] > 0 && {
                            neighbor[axis] = index[axis] - 1;
                            valid0[neighbor]
                        };
                        upper || lower
                    })
                };
            });
        }
        std::mem::swap(&mut valid0, &mut valid1);
    }
}

/// Tangential part of `velocity` relative to `normal`, slowed down by
/// Coulomb friction proportional to the normal component.
pub fn project_and_apply_friction<const D: usize>(
    velocity: &Vector<D>,
    normal: &Vector<D>,
    friction_coefficient: Float,
) -> Vector<D> {
    let normal_speed = velocity.dot(normal);
    let mut tangential = velocity - normal_speed * normal;
    let tangential_speed = tangential.norm();
    if tangential_speed > 0.0 {
        let penetration = (-normal_speed).max(0.0);
        tangential *= (1.0 - friction_coefficient * penetration / tangential_speed).max(0.0);
    }
    tangential
}

/// Velocity of the collider surface, or zero without a collider.
#[derive(Clone, Default)]
pub struct ColliderVelocityField<const D: usize> {
    collider: Option<Arc<dyn Collider<D>>>,
}

impl<const D: usize> VectorField<D> for ColliderVelocityField<D> {
    fn sample(&self, point: &Vector<D>) -> Vector<D> {
        match &self.collider {
            Some(collider) => collider.velocity_at(point),
            None => Vector::<D>::zeros(),
        }
    }
}

/// Collider state shared by the boundary-condition solvers: the sampled
/// collider level set, its velocity field and the closed domain faces.
pub struct ColliderFields<const D: usize> {
    collider: Option<Arc<dyn Collider<D>>>,
    sdf: ScalarGrid<D>,
    velocity: ColliderVelocityField<D>,
    closed: [[bool; 2]; D],
}

impl<const D: usize> Default for ColliderFields<D> {
    fn default() -> Self {
        Self {
            collider: None,
            sdf: ScalarGrid::cell_centered(GridShape::uniform([0; D], 1.0), Float::MAX),
            velocity: ColliderVelocityField::default(),
            closed: [[true; 2]; D],
        }
    }
}

impl<const D: usize> ColliderFields<D> {
    /// Samples the collider on the cell centers of `shape`. An absent or
    /// invalid collider leaves the whole domain open.
    pub fn update(&mut self, collider: Option<Arc<dyn Collider<D>>>, shape: &GridShape<D>) {
        let collider = collider.filter(|collider| collider.is_valid_geometry());
        let mut sdf = ScalarGrid::cell_centered(*shape, Float::MAX);
        match &collider {
            Some(collider) => {
                sdf.fill_with(|point| {
                    collider
                        .signed_distance(point)
                        .clamp(-Float::MAX, Float::MAX)
                });
                log::info!(
                    "collider sampled on a {:?} grid",
                    shape.resolution
                );
            }
            None => log::info!("no valid collider, the domain is open"),
        }
        self.sdf = sdf;
        self.velocity = ColliderVelocityField {
            collider: collider.clone(),
        };
        self.collider = collider;
    }

    pub fn collider(&self) -> Option<&Arc<dyn Collider<D>>> {
        self.collider.as_ref()
    }

    pub fn sdf(&self) -> &ScalarGrid<D> {
        &self.sdf
    }

    pub fn velocity(&self) -> &ColliderVelocityField<D> {
        &self.velocity
    }

    pub fn friction_coefficient(&self) -> Float {
        self.collider
            .as_ref()
            .map_or(0.0, |collider| collider.friction_coefficient())
    }

    pub fn is_closed(&self, face: BoundaryFace) -> bool {
        face.axis() < D && self.closed[face.axis()][face.is_positive() as usize]
    }

    pub fn set_closed(&mut self, face: BoundaryFace, is_closed: bool) {
        if face.axis() < D {
            self.closed[face.axis()][face.is_positive() as usize] = is_closed;
        }
    }

    /// Zeroes the normal velocity on the closed domain faces.
    pub fn apply_closed_domain_boundaries(&self, velocity: &mut FaceCenteredGrid<D>) {
        for axis in 0..D {
            let [lower, upper] = self.closed[axis];
            let component = velocity.component_mut(axis);
            let last = component.size()[axis] - 1;
            component.par_for_each_index_mut(|index, value| {
                if (lower && index[axis] == 0) || (upper && index[axis] == last) {
                    *value = 0.0;
                }
            });
        }
    }
}

pub trait BoundaryConditionSolver<const D: usize>: Send {
    fn fields(&self) -> &ColliderFields<D>;

    fn fields_mut(&mut self) -> &mut ColliderFields<D>;

    fn update_collider(&mut self, collider: Option<Arc<dyn Collider<D>>>, shape: &GridShape<D>) {
        self.fields_mut().update(collider, shape);
    }

    /// Makes the velocity field consistent with the collider and the closed
    /// domain faces. Collider fields are resampled when the grid changed.
    fn constrain_velocity(&mut self, velocity: &mut FaceCenteredGrid<D>, extrapolation_depth: usize);

    fn collider_sdf(&self) -> &ScalarGrid<D> {
        self.fields().sdf()
    }

    fn collider_velocity_field(&self) -> &ColliderVelocityField<D> {
        self.fields().velocity()
    }

    fn is_closed_domain_boundary(&self, face: BoundaryFace) -> bool {
        self.fields().is_closed(face)
    }

    fn set_closed_domain_boundary(&mut self, face: BoundaryFace, is_closed: bool) {
        self.fields_mut().set_closed(face, is_closed);
    }
}
