use crate::global_variables::*;
use crate::grid::Vector;

/// Solid geometry seen by the boundary-condition solvers. Signed distances
/// are negative inside the solid.
pub trait Collider<const D: usize>: Send + Sync {
    fn signed_distance(&self, point: &Vector<D>) -> Float;

    fn closest_normal(&self, point: &Vector<D>) -> Vector<D>;

    fn is_valid_geometry(&self) -> bool {
        true
    }

    fn velocity_at(&self, point: &Vector<D>) -> Vector<D>;

    fn friction_coefficient(&self) -> Float {
        0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereCollider<const D: usize> {
    pub center: Vector<D>,
    pub radius: Float,
    pub linear_velocity: Vector<D>,
    pub friction_coefficient: Float,
    pub is_normal_flipped: bool,
}

impl<const D: usize> SphereCollider<D> {
    pub fn new(center: Vector<D>, radius: Float) -> Self {
        Self {
            center,
            radius,
            linear_velocity: Vector::<D>::zeros(),
            friction_coefficient: 0.0,
            is_normal_flipped: false,
        }
    }

    /// Solid everywhere outside the sphere, i.e. a round container.
    pub fn container(center: Vector<D>, radius: Float) -> Self {
        Self {
            is_normal_flipped: true,
            ..Self::new(center, radius)
        }
    }

    pub fn with_velocity(mut self, linear_velocity: Vector<D>) -> Self {
        self.linear_velocity = linear_velocity;
        self
    }

    pub fn with_friction(mut self, friction_coefficient: Float) -> Self {
        self.friction_coefficient = friction_coefficient;
        self
    }
}

impl<const D: usize> Collider<D> for SphereCollider<D> {
    fn signed_distance(&self, point: &Vector<D>) -> Float {
        let distance = (point - self.center).norm() - self.radius;
        if self.is_normal_flipped {
            -distance
        } else {
            distance
        }
    }

    fn closest_normal(&self, point: &Vector<D>) -> Vector<D> {
        let offset = point - self.center;
        let length = offset.norm();
        let normal = if length > 0.0 {
            offset / length
        } else {
            let mut normal = Vector::<D>::zeros();
            normal[0] = 1.0;
            normal
        };
        if self.is_normal_flipped {
            -normal
        } else {
            normal
        }
    }

    fn is_valid_geometry(&self) -> bool {
        self.radius > 0.0 && self.radius.is_finite() && self.center.iter().all(|x| x.is_finite())
    }

    fn velocity_at(&self, _point: &Vector<D>) -> Vector<D> {
        self.linear_velocity
    }

    fn friction_coefficient(&self) -> Float {
        self.friction_coefficient
    }
}

/// Half-space solid below a plane; `normal` points into the fluid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneCollider<const D: usize> {
    pub normal: Vector<D>,
    pub point: Vector<D>,
    pub linear_velocity: Vector<D>,
    pub friction_coefficient: Float,
}

impl<const D: usize> PlaneCollider<D> {
    pub fn new(normal: Vector<D>, point: Vector<D>) -> Self {
        Self {
            normal,
            point,
            linear_velocity: Vector::<D>::zeros(),
            friction_coefficient: 0.0,
        }
    }
}

impl<const D: usize> Collider<D> for PlaneCollider<D> {
    fn signed_distance(&self, point: &Vector<D>) -> Float {
        (point - self.point).dot(&self.normal) / self.normal.norm()
    }

    fn closest_normal(&self, _point: &Vector<D>) -> Vector<D> {
        self.normal.normalize()
    }

    fn is_valid_geometry(&self) -> bool {
        self.normal.norm() > 0.0
    }

    fn velocity_at(&self, _point: &Vector<D>) -> Vector<D> {
        self.linear_velocity
    }

    fn friction_coefficient(&self) -> Float {
        self.friction_coefficient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_signed_distance() {
        let sphere = SphereCollider::<2>::new(Vector::<2>::new(1.0, 1.0), 0.5);
        assert!((sphere.signed_distance(&Vector::<2>::new(1.0, 1.0)) + 0.5).abs() < 1e-12);
        assert!((sphere.signed_distance(&Vector::<2>::new(2.0, 1.0)) - 0.5).abs() < 1e-12);
        let normal = sphere.closest_normal(&Vector::<2>::new(1.0, 3.0));
        assert!((normal - Vector::<2>::new(0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_container_is_solid_outside() {
        let container = SphereCollider::<3>::container(Vector::<3>::zeros(), 1.0);
        assert!(container.signed_distance(&Vector::<3>::new(2.0, 0.0, 0.0)) < 0.0);
        assert!(container.signed_distance(&Vector::<3>::zeros()) > 0.0);
    }

    #[test]
    fn test_degenerate_sphere_is_invalid() {
        assert!(!SphereCollider::<2>::new(Vector::<2>::zeros(), 0.0).is_valid_geometry());
    }
}
