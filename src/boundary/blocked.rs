use crate::boundary::fractional::constrain_to_collider;
use crate::boundary::*;

/// Velocity constraint for the blocked (voxelized) collider: on top of the
/// fractional constraint, faces between a solid cell and a fluid cell carry
/// the collider velocity.
#[derive(Default)]
pub struct BlockedBoundaryConditionSolver<const D: usize> {
    fields: ColliderFields<D>,
    markers: Array<CellMarker, D>,
}

impl<const D: usize> BlockedBoundaryConditionSolver<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &Array<CellMarker, D> {
        &self.markers
    }

    fn rebuild_markers(&mut self) {
        let sdf = self.fields.sdf();
        self.markers.resize(sdf.resolution(), CellMarker::Fluid);
        self.markers.par_for_each_index_mut(|index, marker| {
            *marker = if is_inside_sdf(sdf[index]) {
                CellMarker::Boundary
            } else {
                CellMarker::Fluid
            };
        });
    }
}

impl<const D: usize> BoundaryConditionSolver<D> for BlockedBoundaryConditionSolver<D> {
    fn fields(&self) -> &ColliderFields<D> {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut ColliderFields<D> {
        &mut self.fields
    }

    fn update_collider(&mut self, collider: Option<Arc<dyn Collider<D>>>, shape: &GridShape<D>) {
        self.fields.update(collider, shape);
        self.rebuild_markers();
    }

    fn constrain_velocity(&mut self, velocity: &mut FaceCenteredGrid<D>, extrapolation_depth: usize) {
        if self.fields.sdf().resolution() != velocity.resolution() {
            let collider = self.fields.collider().cloned();
            self.update_collider(collider, velocity.shape());
        }
        constrain_to_collider(&self.fields, velocity, extrapolation_depth);

        let markers = &self.markers;
        let resolution = markers.size();
        let collider_velocity = self.fields.velocity();
        let spacing = velocity.shape().spacing;
        for axis in 0..D {
            let origin = *velocity.component_origin(axis);
            velocity
                .component_mut(axis)
                .par_for_each_index_mut(|index, value| {
                    if index[axis] == 0 || index[axis] == resolution[axis] {
                        return;
                    }
                    let mut lower = index;
                    lower[axis] -= 1;
                    let pair = (markers[lower], markers[index]);
                    if matches!(
                        pair,
                        (CellMarker::Boundary, CellMarker::Fluid)
                            | (CellMarker::Fluid, CellMarker::Boundary)
                    ) {
                        let point = origin + spacing.component_mul(&to_vector(&index));
                        *value = collider_velocity.sample(&point)[axis];
                    }
                });
        }

        self.fields.apply_closed_domain_boundaries(velocity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::SphereCollider;

    #[test]
    fn test_markers_follow_the_collider() {
        let shape = GridShape::<2>::uniform([4, 4], 0.25);
        let sphere: Arc<dyn Collider<2>> =
            Arc::new(SphereCollider::new(Vector::<2>::new(0.0, 0.0), 0.3));
        let mut solver = BlockedBoundaryConditionSolver::new();
        solver.update_collider(Some(sphere), &shape);
        assert_eq!(solver.markers()[[0, 0]], CellMarker::Boundary);
        assert_eq!(solver.markers()[[1, 1]], CellMarker::Fluid);
        assert_eq!(solver.markers()[[3, 3]], CellMarker::Fluid);
    }

    #[test]
    fn test_solid_fluid_faces_take_collider_velocity() {
        let shape = GridShape::<2>::uniform([4, 4], 0.25);
        let sphere: Arc<dyn Collider<2>> = Arc::new(
            SphereCollider::new(Vector::<2>::new(0.0, 0.0), 0.3)
                .with_velocity(Vector::<2>::new(0.5, 0.25)),
        );
        let mut velocity = FaceCenteredGrid::new(shape, Vector::<2>::new(-1.0, -1.0));
        let mut solver = BlockedBoundaryConditionSolver::new();
        for face in BoundaryFace::ALL {
            solver.set_closed_domain_boundary(face, false);
        }
        solver.update_collider(Some(sphere), &shape);
        solver.constrain_velocity(&mut velocity, 1);

        // Face between the solid cell [0, 0] and the fluid cell [1, 0].
        assert_eq!(velocity.component(0)[[1, 0]], 0.5);
        assert_eq!(velocity.component(1)[[0, 1]], 0.25);
        // Face between two fluid cells keeps its value.
        assert_eq!(velocity.component(0)[[3, 3]], -1.0);
    }

    #[test]
    fn test_missing_collider_keeps_fluid_markers() {
        let shape = GridShape::<3>::uniform([2, 2, 2], 1.0);
        let mut velocity = FaceCenteredGrid::new(shape, Vector::<3>::repeat(1.0));
        let mut solver = BlockedBoundaryConditionSolver::new();
        solver.constrain_velocity(&mut velocity, 2);
        assert!(solver.markers().iter().all(|&marker| marker == CellMarker::Fluid));
        assert_eq!(velocity.component(2)[[1, 1, 0]], 0.0);
        assert_eq!(velocity.component(2)[[1, 1, 1]], 1.0);
    }
}
